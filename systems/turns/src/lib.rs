#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turn sequencing over an owned board.
//!
//! The [`Sequencer`] owns the board for the lifetime of one loaded level and
//! drives it through the fixed phase cycle: turn start, awaited player
//! input, player move, player landing, enemy turn, level turn, and back to
//! turn start. Every phase after the player's click is deferred through a
//! FIFO queue rather than run synchronously, because each phase's side
//! effects may be animated by the presentation layer; [`Sequencer::tick`]
//! drains exactly one queued phase, and only while the presentation layer's
//! busy probe reports no blocking work in flight. Once a phase starts it
//! runs to completion within that tick.

use std::collections::VecDeque;

use knight_gambit_board::{apply, query, Board, LogicFault};
use knight_gambit_core::{Command, Event, GridPos};
use knight_gambit_system_moves::{is_legal_move, legal_destinations};
use knight_gambit_system_tracks::TrackFault;
use thiserror::Error;

/// One stage of the fixed per-turn cycle.
///
/// `PlayerTurnStart` doubles as the input-await state: the sequencer rests
/// there with an empty queue until a click arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Turn-start hooks have run; highlights are fresh and input is awaited.
    PlayerTurnStart,
    /// The player's piece has relocated and movement hooks have run.
    PlayerMove,
    /// The landing hooks of the player's new square are running.
    PlayerLand,
    /// Enemy pieces are advancing by their movement patterns.
    EnemyTurn,
    /// Periodic square behavior and platform movement are running.
    LevelTurn,
}

/// Level-scoped outcome as observed by the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The level is still being played.
    InProgress,
    /// The player is alive but has no legal move; a restart affordance is
    /// surfaced, nothing is aborted.
    Stuck,
    /// The player reached a finish square.
    Victory,
    /// The player died and the level must restart.
    Defeat,
}

impl Outcome {
    fn is_terminal(self) -> bool {
        matches!(self, Outcome::Victory | Outcome::Defeat)
    }
}

/// Pollable signal that presentation-layer work is still in flight.
///
/// While the probe reports busy, queued phases stay queued and clicks are
/// ignored.
pub trait BusyProbe {
    /// Whether any blocking effect is currently active.
    fn is_busy(&self) -> bool;
}

impl<F> BusyProbe for F
where
    F: Fn() -> bool,
{
    fn is_busy(&self) -> bool {
        self()
    }
}

/// Faults that abort the turn cycle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineFault {
    /// The board's conductor graph failed to settle.
    #[error(transparent)]
    Logic(#[from] LogicFault),
    /// A platform path could not be resolved.
    #[error(transparent)]
    Track(#[from] TrackFault),
}

/// Drives the phase cycle over an exclusively owned board.
#[derive(Debug)]
pub struct Sequencer {
    board: Board,
    phase: Phase,
    pending: VecDeque<Phase>,
    outcome: Outcome,
    highlights: Vec<GridPos>,
    threats: Vec<GridPos>,
}

impl Sequencer {
    /// Takes ownership of a freshly built board and queues the first turn.
    #[must_use]
    pub fn new(board: Board) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(Phase::PlayerTurnStart);
        Self {
            board,
            phase: Phase::PlayerTurnStart,
            pending,
            outcome: Outcome::InProgress,
            highlights: Vec::new(),
            threats: Vec::new(),
        }
    }

    /// The phase most recently entered.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The current level-scoped outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Legal knight destinations computed at the last turn start.
    #[must_use]
    pub fn highlights(&self) -> &[GridPos] {
        &self.highlights
    }

    /// Enemy capture-threat squares computed at the last turn start.
    #[must_use]
    pub fn threats(&self) -> &[GridPos] {
        &self.threats
    }

    /// Read-only access to the owned board for presentation queries.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Whether a click would currently be considered at all.
    #[must_use]
    pub fn awaiting_input(&self) -> bool {
        self.phase == Phase::PlayerTurnStart
            && self.pending.is_empty()
            && !self.outcome.is_terminal()
    }

    /// Drains at most one queued phase, appending the board events it caused.
    ///
    /// Queued phases execute strictly in FIFO order; a busy presentation
    /// layer defers the whole queue untouched.
    pub fn tick(
        &mut self,
        busy: &dyn BusyProbe,
        out_events: &mut Vec<Event>,
    ) -> Result<Outcome, EngineFault> {
        if busy.is_busy() || self.outcome.is_terminal() {
            return Ok(self.outcome);
        }
        let Some(phase) = self.pending.pop_front() else {
            return Ok(self.outcome);
        };
        self.phase = phase;

        let mut events = Vec::new();
        match phase {
            Phase::PlayerTurnStart => self.run_turn_start(&mut events)?,
            Phase::PlayerMove => {
                // Movement hooks already ran when the click relocated the
                // piece; this phase exists so landing resolves one tick
                // later, after any movement animation settles.
                self.pending.push_back(Phase::PlayerLand);
            }
            Phase::PlayerLand => {
                apply(&mut self.board, Command::ResolvePlayerLand, &mut events)?;
                self.pending.push_back(Phase::EnemyTurn);
            }
            Phase::EnemyTurn => {
                apply(&mut self.board, Command::RunEnemyTurn, &mut events)?;
                self.pending.push_back(Phase::LevelTurn);
            }
            Phase::LevelTurn => {
                self.run_level_turn(&mut events)?;
                self.pending.push_back(Phase::PlayerTurnStart);
            }
        }

        self.observe(&events);
        out_events.extend(events);
        Ok(self.outcome)
    }

    /// Considers a "grid cell clicked" input, the only externally triggered
    /// transition. Returns whether the click was accepted.
    ///
    /// Clicks are ignored while the busy probe reports work in flight, while
    /// any phase is queued, and for destinations outside the highlighted set.
    pub fn submit_click(
        &mut self,
        at: GridPos,
        busy: &dyn BusyProbe,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, EngineFault> {
        if busy.is_busy() || !self.awaiting_input() {
            return Ok(false);
        }
        let legal = is_legal_move(
            query::passability(&self.board),
            query::occupancy(&self.board),
            query::player(&self.board),
            at,
        );
        if !legal {
            return Ok(false);
        }

        let mut events = Vec::new();
        apply(&mut self.board, Command::MovePlayer { to: at }, &mut events)?;
        self.observe(&events);
        out_events.extend(events);
        self.pending.push_back(Phase::PlayerMove);
        Ok(true)
    }

    fn run_turn_start(&mut self, events: &mut Vec<Event>) -> Result<(), EngineFault> {
        apply(&mut self.board, Command::BeginPlayerTurn, events)?;
        self.highlights = legal_destinations(
            query::passability(&self.board),
            query::occupancy(&self.board),
            query::player(&self.board),
        );
        self.threats = query::threatened_squares(&self.board);
        if self.highlights.is_empty() && !self.outcome.is_terminal() {
            self.outcome = Outcome::Stuck;
        }
        Ok(())
    }

    fn run_level_turn(&mut self, events: &mut Vec<Event>) -> Result<(), EngineFault> {
        apply(&mut self.board, Command::RunLevelTurn, events)?;

        // The board announces each platform about to advance; answer the
        // requests with resolved paths and walk the platforms in turn.
        let mut advances = Vec::new();
        knight_gambit_system_tracks::handle(events, query::tracks(&self.board), &mut advances)?;
        for command in advances {
            apply(&mut self.board, command, events)?;
        }
        Ok(())
    }

    fn observe(&mut self, events: &[Event]) {
        if self.outcome.is_terminal() {
            return;
        }
        for event in events {
            match event {
                Event::PlayerDied { .. } => self.outcome = Outcome::Defeat,
                Event::LevelFinished { .. } => self.outcome = Outcome::Victory,
                _ => {}
            }
        }
    }
}
