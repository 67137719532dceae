#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure knight-move validation over read-only board views.
//!
//! A knight jump is not fully airborne here: each of the eight offsets
//! decomposes into three two-step lanes through adjacent squares, and a
//! square whose kind blocks jumps closes any lane passing over it. The jump
//! is possible while at least one lane stays open. Blocking is a property of
//! the square's kind, so an open barricade still closes its lanes.

use knight_gambit_board::query::{OccupancyView, PassabilityView};
use knight_gambit_core::{GridPos, KNIGHT_OFFSETS};

/// Computes every legal knight destination from the given square.
///
/// A destination is legal when it exists, can currently be entered, is not
/// occupied by an enemy piece, and at least one of its three jump lanes is
/// clear of jump-blocking squares. Results follow the fixed clockwise offset
/// order, so highlight rendering is deterministic.
#[must_use]
pub fn legal_destinations(
    passability: PassabilityView<'_>,
    occupancy: OccupancyView<'_>,
    from: GridPos,
) -> Vec<GridPos> {
    KNIGHT_OFFSETS
        .iter()
        .filter(|&&(dx, dy)| {
            let to = from.offset(dx, dy);
            passability.is_passable(to)
                && !occupancy.is_enemy_at(to)
                && lane_is_open(passability, from, dx, dy)
        })
        .map(|&(dx, dy)| from.offset(dx, dy))
        .collect()
}

/// Whether moving the player from one square to another is a legal knight move.
#[must_use]
pub fn is_legal_move(
    passability: PassabilityView<'_>,
    occupancy: OccupancyView<'_>,
    from: GridPos,
    to: GridPos,
) -> bool {
    let (dx, dy) = (to.x() - from.x(), to.y() - from.y());
    KNIGHT_OFFSETS.contains(&(dx, dy))
        && passability.is_passable(to)
        && !occupancy.is_enemy_at(to)
        && lane_is_open(passability, from, dx, dy)
}

/// The three two-step lanes of one knight offset, as relative cells.
///
/// With `l` the unit step along the offset's long axis and `s` along its
/// short axis, the lanes are long-long, long-short, and short-long.
fn jump_lanes(dx: i32, dy: i32) -> [[(i32, i32); 2]; 3] {
    let (lx, ly, sx, sy) = if dx.abs() == 2 {
        (dx / 2, 0, 0, dy)
    } else {
        (0, dy / 2, dx, 0)
    };
    [
        [(lx, ly), (2 * lx, 2 * ly)],
        [(lx, ly), (lx + sx, ly + sy)],
        [(sx, sy), (sx + lx, sy + ly)],
    ]
}

fn lane_is_open(passability: PassabilityView<'_>, from: GridPos, dx: i32, dy: i32) -> bool {
    jump_lanes(dx, dy).iter().any(|lane| {
        lane.iter()
            .all(|&(cx, cy)| !passability.blocks_jump(from.offset(cx, cy)))
    })
}
