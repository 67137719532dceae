//! Event-driven charge propagation over the conductor subgraph.
//!
//! Propagation is incremental: a source square recomputes its own output and
//! pushes it to each linked neighbor as that neighbor's stored incoming value
//! for this sender. A neighbor whose stored value changed runs its change
//! hook and, when it is itself an emitter, joins the work stack so the
//! cascade continues. There is no global fixed-point solve; an acyclic
//! conductor graph settles in one cascade regardless of update order.
//!
//! Gate feedback loops never settle meaningfully: an odd inverter ring
//! oscillates forever, and an even ring freezes into whichever latch state
//! the wiring order happens to produce. Both are authoring mistakes, so the
//! build walks the gate subgraph and rejects any cycle before the first
//! propagation. The push budget stays as a runtime backstop; exhausting it
//! is a level-logic fault surfaced to the caller, never a hang.

use knight_gambit_core::{Event, GridPos, TileKind};
use thiserror::Error;

use crate::{Board, SquareId};

const PROPAGATION_BUDGET: u32 = 10_000;

/// Runtime logic gaps in the electrical network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LogicFault {
    /// The conductor graph contains a gate feedback loop, so its charge
    /// cannot settle to a well-defined state.
    #[error("charge cannot settle near {at:?}: the conductor graph contains a feedback loop")]
    ChargeOscillation {
        /// A square on the offending loop, or the square being updated when
        /// the propagation budget ran out.
        at: GridPos,
    },
}

/// Rejects any cycle in the gate subgraph.
///
/// Only gates recompute their output from stored inputs, and only gates can
/// be link targets of other gates, so a feedback loop must consist entirely
/// of gates. Iterative depth-first search in position order keeps the
/// reported loop square deterministic.
pub(crate) fn reject_feedback(board: &Board) -> Result<(), LogicFault> {
    const UNSEEN: u8 = 0;
    const OPEN: u8 = 1;
    const CLOSED: u8 = 2;

    let mut marks = vec![UNSEEN; board.squares.len()];
    for &root in board.index.values() {
        if !is_gate(board.square(root).kind) || marks[root.index()] != UNSEEN {
            continue;
        }
        marks[root.index()] = OPEN;
        let mut stack: Vec<(SquareId, usize)> = vec![(root, 0)];
        while let Some(&(id, cursor)) = stack.last() {
            let square = board.square(id);
            if cursor == square.links.len() {
                marks[id.index()] = CLOSED;
                let _ = stack.pop();
                continue;
            }
            let top = stack.len() - 1;
            stack[top].1 += 1;

            let target = square.links[cursor];
            if !is_gate(board.square(target).kind) {
                continue;
            }
            match marks[target.index()] {
                OPEN => {
                    return Err(LogicFault::ChargeOscillation {
                        at: board.square(target).position,
                    });
                }
                UNSEEN => {
                    marks[target.index()] = OPEN;
                    stack.push((target, 0));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn is_gate(kind: TileKind) -> bool {
    matches!(
        kind,
        TileKind::AndGate | TileKind::OrGate | TileKind::NotGate
    )
}

/// Pushes initial charge through every emitting conductor, in position order.
///
/// Incoming values start as "not yet computed"; one cascade per emitter
/// settles the whole network for an acyclic graph.
pub(crate) fn initialize(board: &mut Board, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    let emitters: Vec<SquareId> = board
        .index
        .values()
        .copied()
        .filter(|id| {
            let kind = board.square(*id).kind;
            kind.is_linkable() && kind.descriptor().is_conductor
        })
        .collect();

    let mut budget = PROPAGATION_BUDGET;
    for id in emitters {
        update_outgoing_charge(board, id, &mut budget, out_events)?;
    }
    Ok(())
}

/// Recomputes one emitter's output and cascades the change, with a fresh budget.
pub(crate) fn refresh(
    board: &mut Board,
    source: SquareId,
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    let mut budget = PROPAGATION_BUDGET;
    update_outgoing_charge(board, source, &mut budget, out_events)
}

fn update_outgoing_charge(
    board: &mut Board,
    source: SquareId,
    budget: &mut u32,
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    let mut stack = vec![source];

    while let Some(id) = stack.pop() {
        if *budget == 0 {
            return Err(LogicFault::ChargeOscillation {
                at: board.square(id).position,
            });
        }
        *budget -= 1;

        let value = calculate_charge(board, id);
        let targets = board.square(id).links.clone();
        for target in targets {
            if !store_incoming(board, target, id, value) {
                continue;
            }
            on_charge_changed(board, target, out_events);
            if board.square(target).kind.is_linkable() {
                stack.push(target);
            }
        }
    }

    Ok(())
}

/// Pure per-kind output of an emitting conductor.
pub(crate) fn calculate_charge(board: &Board, id: SquareId) -> bool {
    let square = board.square(id);
    match square.kind {
        TileKind::Switch => square.state == 1,
        TileKind::Button => square.state == 1 || board.is_piece_at(square.position),
        TileKind::AndGate => {
            !square.incoming.is_empty()
                && square.incoming.iter().all(|(_, value)| *value == Some(true))
        }
        TileKind::OrGate => square.receiving_charge(),
        TileKind::NotGate => !square.receiving_charge(),
        // Spikes and barricades consume charge without re-emitting it, and
        // non-conductors never reach this point.
        _ => false,
    }
}

fn store_incoming(board: &mut Board, target: SquareId, sender: SquareId, value: bool) -> bool {
    let square = board.square_mut(target);
    match square
        .incoming
        .iter_mut()
        .find(|(source, _)| *source == sender)
    {
        Some((_, stored)) => {
            if *stored == Some(value) {
                false
            } else {
                *stored = Some(value);
                true
            }
        }
        None => {
            // Links are registered at build time; tolerate a late sender
            // rather than dropping its charge on the floor.
            square.incoming.push((sender, Some(value)));
            true
        }
    }
}

fn on_charge_changed(board: &mut Board, id: SquareId, out_events: &mut Vec<Event>) {
    let (at, kind, receiving) = {
        let square = board.square(id);
        (square.position, square.kind, square.receiving_charge())
    };

    out_events.push(Event::ChargeChanged {
        at,
        charged: receiving,
    });

    if kind == TileKind::Spike {
        let new_state = u8::from(receiving);
        let square = board.square_mut(id);
        if square.state != new_state {
            square.state = new_state;
            out_events.push(Event::SpikeChanged {
                at,
                extended: receiving,
            });
        }
    }
}
