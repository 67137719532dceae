#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Track path resolution for moving platforms.
//!
//! The board announces each platform about to advance and this system
//! answers with the resolved path. At every square the platform prefers to
//! continue straight, then to turn onto a perpendicular rail, then to
//! reverse; travel ends on the first stop square reached. Rail networks are
//! authored data, so a closed circuit with no stop square is possible; the
//! walk carries a step ceiling and reports such circuits as faults instead
//! of spinning.

use knight_gambit_board::query::TrackView;
use knight_gambit_core::{Command, Direction, Event, GridPos};
use thiserror::Error;

const MAX_PATH_STEPS: usize = 1000;

/// Unresolvable rail configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TrackFault {
    /// The platform's square connects to no other rail.
    #[error("track square at {at:?} has no neighboring rail; the platform is stranded")]
    Isolated {
        /// The stranded platform's square.
        at: GridPos,
    },
    /// The walk never reached a stop square within the step ceiling.
    #[error("platform path from {from:?} found no stop square within {MAX_PATH_STEPS} steps")]
    PathCeiling {
        /// Square the walk started from.
        from: GridPos,
    },
}

/// Consumes path requests from board events and emits platform advances.
pub fn handle(
    events: &[Event],
    tracks: TrackView<'_>,
    out: &mut Vec<Command>,
) -> Result<(), TrackFault> {
    for event in events {
        if let Event::PlatformPathNeeded { at, direction } = event {
            let steps = resolve_path(tracks, *at, *direction)?;
            out.push(Command::AdvancePlatform { from: *at, steps });
        }
    }
    Ok(())
}

/// Walks the rail network from a platform's square until a stop square.
///
/// Returns the unit steps of the walk in travel order. The departure square
/// is always left, even when it is itself a stop.
pub fn resolve_path(
    tracks: TrackView<'_>,
    from: GridPos,
    direction: Direction,
) -> Result<Vec<Direction>, TrackFault> {
    let mut steps = Vec::new();
    let mut at = from;
    let mut heading = direction;

    loop {
        if steps.len() == MAX_PATH_STEPS {
            return Err(TrackFault::PathCeiling { from });
        }
        let step = next_step(tracks, at, heading).ok_or(TrackFault::Isolated { at })?;
        let Some(next) = tracks.track_neighbor(at, step) else {
            // next_step only proposes directions with a rail neighbor.
            return Err(TrackFault::Isolated { at });
        };
        steps.push(step);
        at = next;
        heading = step;
        if tracks.is_stop(at) {
            return Ok(steps);
        }
    }
}

/// Picks the travel direction out of a square: straight, else the first
/// perpendicular rail in scan order, else reverse.
fn next_step(tracks: TrackView<'_>, at: GridPos, heading: Direction) -> Option<Direction> {
    if tracks.track_neighbor(at, heading).is_some() {
        return Some(heading);
    }
    for side in heading.perpendicular() {
        if tracks.track_neighbor(at, side).is_some() {
            return Some(side);
        }
    }
    let reverse = heading.reverse();
    tracks.track_neighbor(at, reverse).map(|_| reverse)
}
