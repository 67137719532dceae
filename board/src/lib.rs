#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative runtime board state for Knight Gambit.
//!
//! A [`Board`] is built once from a validated level and owns the square
//! instance graph, the player piece, the enemy pieces, and the moving
//! platforms for the lifetime of that level. Squares live in an arena
//! addressed by handles, with both the link graph and the track adjacency
//! stored as handles, so cyclic wiring carries no ownership cycles. All
//! mutations flow through [`apply`], which executes a [`Command`] and
//! broadcasts [`Event`] values for systems and the presentation layer.

use std::collections::BTreeMap;

use knight_gambit_core::{
    Command, DeathCause, Direction, EntityKind, Event, GridPos, MovePattern, TileKind,
    KNIGHT_OFFSETS,
};
use knight_gambit_level::Level;
use log::warn;
use thiserror::Error;

mod charge;

pub use charge::LogicFault;

/// Handle of a square within the board's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SquareId(u32);

impl SquareId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Runtime instance of one tile.
#[derive(Clone, Debug)]
struct Square {
    position: GridPos,
    kind: TileKind,
    state: u8,
    variant: u8,
    links: Vec<SquareId>,
    /// Last-known charge pushed by each linking conductor; `None` until the
    /// sender first propagates.
    incoming: Vec<(SquareId, Option<bool>)>,
    /// Cardinal track adjacency, indexed by `Direction::index()`. Purely
    /// positional and distinct from the link graph.
    track_neighbors: [Option<SquareId>; 4],
}

impl Square {
    /// Writes a new discrete state, rejecting values outside the kind's
    /// valid-state set with a warning rather than a crash.
    fn set_state(&mut self, state: u8) -> bool {
        if self.kind.accepts_state(state) {
            self.state = state;
            true
        } else {
            warn!(
                "dropping state write {} to {:?} square at {:?}",
                state, self.kind, self.position
            );
            false
        }
    }

    fn receiving_charge(&self) -> bool {
        self.incoming.iter().any(|(_, value)| *value == Some(true))
    }
}

/// Runtime instance of one enemy piece.
#[derive(Clone, Debug)]
struct Enemy {
    kind: EntityKind,
    position: GridPos,
    facing: Direction,
    state: u8,
}

/// Runtime instance of one moving platform.
#[derive(Clone, Copy, Debug)]
struct Platform {
    position: GridPos,
    direction: Direction,
}

/// Represents the authoritative runtime state of one loaded level.
#[derive(Clone, Debug)]
pub struct Board {
    name: String,
    squares: Vec<Square>,
    index: BTreeMap<GridPos, SquareId>,
    player: GridPos,
    alive: bool,
    enemies: Vec<Enemy>,
    platforms: Vec<Platform>,
}

/// Errors that abort board construction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A tile record references a type id absent from the catalog.
    #[error("tile at {at:?} references unknown tile type id {id}")]
    UnknownTileType {
        /// Position of the offending tile.
        at: GridPos,
        /// The unrecognized type identifier.
        id: u16,
    },
    /// A link target position holds no square; validation was skipped.
    #[error("tile at {at:?} links to {target:?}, which holds no square")]
    DanglingLink {
        /// Position of the linking tile.
        at: GridPos,
        /// The dangling target position.
        target: GridPos,
    },
    /// An entity record references a type id absent from the catalog.
    #[error("entity at {at:?} references unknown entity type id {id}")]
    UnknownEntityType {
        /// Position of the offending entity.
        at: GridPos,
        /// The unrecognized type identifier.
        id: u16,
    },
    /// A platform seed does not rest on a track square.
    #[error("platform at {at:?} does not rest on a track square")]
    PlatformOffTrack {
        /// Position of the offending platform.
        at: GridPos,
    },
    /// The initial charge propagation never settled.
    #[error(transparent)]
    Logic(#[from] LogicFault),
}

impl Board {
    /// Builds the square instance graph and runtime pieces from a level.
    ///
    /// Three passes over the tiles: instantiate squares, wire links and
    /// register incoming-charge sources, then record cardinal track
    /// adjacency. A dangling link target aborts the build; links authored on
    /// a non-linkable kind are dropped with a warning instead. The gate
    /// subgraph is checked for feedback loops, then the charge network is
    /// propagated once before the board is returned.
    pub fn from_level(level: &Level) -> Result<Board, BuildError> {
        let mut squares: Vec<Square> = Vec::with_capacity(level.tiles().len());
        let mut index: BTreeMap<GridPos, SquareId> = BTreeMap::new();

        for (&at, tile) in level.tiles() {
            let kind = tile.kind().ok_or(BuildError::UnknownTileType {
                at,
                id: tile.tile_type.get(),
            })?;
            let id = SquareId(squares.len() as u32);
            squares.push(Square {
                position: at,
                kind,
                state: tile.state,
                variant: tile.variant,
                links: Vec::new(),
                incoming: Vec::new(),
                track_neighbors: [None; 4],
            });
            let _ = index.insert(at, id);
        }

        for (&at, tile) in level.tiles() {
            if tile.links.is_empty() {
                continue;
            }
            let source = index[&at];
            if !squares[source.index()].kind.is_linkable() {
                warn!(
                    "dropping links authored on non-linkable {:?} square at {:?}",
                    squares[source.index()].kind,
                    at
                );
                continue;
            }
            for &target_pos in &tile.links {
                let Some(&target) = index.get(&target_pos) else {
                    return Err(BuildError::DanglingLink {
                        at,
                        target: target_pos,
                    });
                };
                squares[source.index()].links.push(target);
                if squares[target.index()].kind.descriptor().is_conductor {
                    squares[target.index()].incoming.push((source, None));
                }
            }
        }

        for id in index.values().copied().collect::<Vec<_>>() {
            if squares[id.index()].kind != TileKind::Track {
                continue;
            }
            let at = squares[id.index()].position;
            for direction in Direction::ALL {
                let neighbor = index
                    .get(&at.step(direction))
                    .copied()
                    .filter(|other| squares[other.index()].kind == TileKind::Track);
                squares[id.index()].track_neighbors[direction.index() as usize] = neighbor;
            }
        }

        let mut enemies = Vec::with_capacity(level.entities().len());
        for (&at, entity) in level.entities() {
            let kind = entity.kind().ok_or(BuildError::UnknownEntityType {
                at,
                id: entity.entity_type.get(),
            })?;
            enemies.push(Enemy {
                kind,
                position: at,
                facing: entity.facing,
                state: entity.state,
            });
        }

        let mut platforms = Vec::with_capacity(level.platforms().len());
        for (&at, &direction) in level.platforms() {
            let on_track = index
                .get(&at)
                .is_some_and(|id| squares[id.index()].kind == TileKind::Track);
            if !on_track {
                return Err(BuildError::PlatformOffTrack { at });
            }
            platforms.push(Platform {
                position: at,
                direction,
            });
        }

        let mut board = Board {
            name: level.name().to_owned(),
            squares,
            index,
            player: level.start(),
            alive: true,
            enemies,
            platforms,
        };
        charge::reject_feedback(&board)?;
        let mut initial_events = Vec::new();
        charge::initialize(&mut board, &mut initial_events)?;
        Ok(board)
    }

    /// Writes a discrete state to the square at the provided position.
    ///
    /// This is the manual-toggle surface for editors and hosts: values
    /// outside the kind's valid-state set are dropped with a warning, and an
    /// accepted write to an emitting conductor re-propagates its charge.
    /// Returns whether the write was accepted.
    pub fn set_square_state(
        &mut self,
        at: GridPos,
        state: u8,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, LogicFault> {
        let Some(id) = self.square_id_at(at) else {
            warn!("dropping state write to missing square at {at:?}");
            return Ok(false);
        };
        if !self.square_mut(id).set_state(state) {
            return Ok(false);
        }
        let kind = self.square(id).kind;
        if kind.is_linkable() && kind.descriptor().is_conductor {
            charge::refresh(self, id, out_events)?;
        }
        Ok(true)
    }

    fn square(&self, id: SquareId) -> &Square {
        &self.squares[id.index()]
    }

    fn square_mut(&mut self, id: SquareId) -> &mut Square {
        &mut self.squares[id.index()]
    }

    fn square_id_at(&self, at: GridPos) -> Option<SquareId> {
        self.index.get(&at).copied()
    }

    fn platform_at(&self, at: GridPos) -> Option<usize> {
        self.platforms
            .iter()
            .position(|platform| platform.position == at)
    }

    fn is_enemy_at(&self, at: GridPos) -> bool {
        self.enemies.iter().any(|enemy| enemy.position == at)
    }

    /// Whether the player or any enemy stands on the position. Feeds
    /// occupancy-derived button charge.
    fn is_piece_at(&self, at: GridPos) -> bool {
        self.player == at || self.is_enemy_at(at)
    }

    /// Derived passability of the square at the position, if one exists.
    fn is_passable(&self, at: GridPos) -> bool {
        let Some(id) = self.square_id_at(at) else {
            return false;
        };
        let square = self.square(id);
        match square.kind {
            TileKind::Floor
            | TileKind::Finish
            | TileKind::Spike
            | TileKind::Switch
            | TileKind::Button
            | TileKind::Portal => true,
            TileKind::Wall | TileKind::AndGate | TileKind::OrGate | TileKind::NotGate => false,
            TileKind::Barricade => square.receiving_charge(),
            TileKind::Track => self.platform_at(at).is_some(),
            TileKind::CrackedFloor => square.state == 0,
        }
    }
}

/// Applies the provided command to the board, mutating state deterministically.
///
/// Commands applied after the player has died are ignored; the turn
/// sequencer stops pumping once it observes the death event, and anything
/// still queued must not corrupt the terminal state.
pub fn apply(
    board: &mut Board,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    if !board.alive {
        return Ok(());
    }
    match command {
        Command::BeginPlayerTurn => begin_player_turn(board, out_events),
        Command::MovePlayer { to } => move_player(board, to, out_events),
        Command::ResolvePlayerLand => resolve_player_land(board, out_events),
        Command::RunEnemyTurn => run_enemy_turn(board, out_events),
        Command::RunLevelTurn => run_level_turn(board, out_events),
        Command::AdvancePlatform { from, steps } => {
            advance_platform(board, from, &steps, out_events)
        }
    }
}

/// Turn-start hook: re-synchronizes occupancy-derived conductors so the
/// upcoming highlight computation sees settled charge.
fn begin_player_turn(board: &mut Board, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    let buttons: Vec<SquareId> = board
        .index
        .values()
        .copied()
        .filter(|id| board.square(*id).kind == TileKind::Button)
        .collect();
    for id in buttons {
        charge::refresh(board, id, out_events)?;
    }
    Ok(())
}

fn move_player(board: &mut Board, to: GridPos, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    let from = board.player;
    if board.square_id_at(to).is_none() || !board.is_passable(to) || board.is_enemy_at(to) {
        warn!("dropping player move to unreachable square {to:?}");
        return Ok(());
    }

    board.player = to;
    out_events.push(Event::PlayerMoved { from, to });

    // Movement hooks: the departed square reacts to the player stepping off,
    // and occupancy-derived conductors on both ends re-propagate.
    if let Some(from_id) = board.square_id_at(from) {
        if board.square(from_id).kind == TileKind::CrackedFloor
            && board.square(from_id).state == 0
        {
            let _ = board.square_mut(from_id).set_state(1);
            out_events.push(Event::FloorCracked { at: from });
        }
        refresh_button_at(board, from, out_events)?;
    }
    refresh_button_at(board, to, out_events)?;
    Ok(())
}

fn resolve_player_land(board: &mut Board, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    land(board, true, out_events)?;
    check_spike_under_player(board, out_events);
    Ok(())
}

fn land(board: &mut Board, allow_portal: bool, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    let at = board.player;
    let Some(id) = board.square_id_at(at) else {
        return Ok(());
    };
    match board.square(id).kind {
        TileKind::Finish => out_events.push(Event::LevelFinished { at }),
        TileKind::Spike => {
            if board.square(id).state == 1 {
                kill(board, at, DeathCause::Spiked, out_events);
            }
        }
        TileKind::Switch => {
            let next = 1 - board.square(id).state;
            let _ = board.square_mut(id).set_state(next);
            out_events.push(Event::SwitchToggled { at, on: next == 1 });
            charge::refresh(board, id, out_events)?;
        }
        TileKind::Button => charge::refresh(board, id, out_events)?,
        TileKind::Portal => {
            // A portal teleports exactly once per landing; the destination's
            // landing hook runs without re-entering teleportation, so
            // mutually linked portals cannot ping-pong.
            if allow_portal {
                if let Some(&dest_id) = board.square(id).links.first() {
                    let to = board.square(dest_id).position;
                    board.player = to;
                    out_events.push(Event::PlayerTeleported { from: at, to });
                    land(board, false, out_events)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn run_enemy_turn(board: &mut Board, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    for index in 0..board.enemies.len() {
        if !board.alive {
            break;
        }
        let (kind, position, facing) = {
            let enemy = &board.enemies[index];
            (enemy.kind, enemy.position, enemy.facing)
        };
        match kind.descriptor().pattern {
            MovePattern::Patrol => {
                let ahead = position.step(facing);
                if ahead == board.player {
                    relocate_enemy(board, index, ahead, out_events)?;
                    kill(board, ahead, DeathCause::Captured, out_events);
                } else if board.is_passable(ahead) && !board.is_enemy_at(ahead) {
                    relocate_enemy(board, index, ahead, out_events)?;
                } else {
                    let reversed = facing.reverse();
                    board.enemies[index].facing = reversed;
                    out_events.push(Event::EnemyTurned {
                        at: position,
                        facing: reversed,
                    });
                }
            }
            MovePattern::KnightChase => {
                let mut capture = None;
                let mut best: Option<(u32, GridPos)> = None;
                for (dx, dy) in KNIGHT_OFFSETS {
                    let to = position.offset(dx, dy);
                    if to == board.player {
                        capture = Some(to);
                        break;
                    }
                    if !board.is_passable(to) || board.is_enemy_at(to) {
                        continue;
                    }
                    let distance = to.manhattan_distance(board.player);
                    if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                        best = Some((distance, to));
                    }
                }
                if let Some(to) = capture {
                    relocate_enemy(board, index, to, out_events)?;
                    kill(board, to, DeathCause::Captured, out_events);
                } else if let Some((_, to)) = best {
                    relocate_enemy(board, index, to, out_events)?;
                }
            }
        }
    }
    check_spike_under_player(board, out_events);
    Ok(())
}

fn run_level_turn(board: &mut Board, out_events: &mut Vec<Event>) -> Result<(), LogicFault> {
    // Unlinked spikes run on their own clock; spikes with registered charge
    // sources are driven by the network instead.
    for id in board.index.values().copied().collect::<Vec<_>>() {
        let square = board.square(id);
        if square.kind != TileKind::Spike || !square.incoming.is_empty() {
            continue;
        }
        let next = 1 - square.state;
        let at = square.position;
        let _ = board.square_mut(id).set_state(next);
        out_events.push(Event::SpikeChanged {
            at,
            extended: next == 1,
        });
    }

    for platform in &board.platforms {
        out_events.push(Event::PlatformPathNeeded {
            at: platform.position,
            direction: platform.direction,
        });
    }

    check_spike_under_player(board, out_events);
    Ok(())
}

fn advance_platform(
    board: &mut Board,
    from: GridPos,
    steps: &[Direction],
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    let Some(index) = board.platform_at(from) else {
        warn!("dropping platform advance from {from:?}: no platform there");
        return Ok(());
    };
    let Some(&direction) = steps.last() else {
        warn!("dropping empty platform path from {from:?}");
        return Ok(());
    };

    let mut to = from;
    for &step in steps {
        to = to.step(step);
        let on_track = board
            .square_id_at(to)
            .is_some_and(|id| board.square(id).kind == TileKind::Track);
        if !on_track {
            warn!("dropping platform path from {from:?}: {to:?} is not track");
            return Ok(());
        }
    }
    // Platforms advance one at a time within a level turn; a later platform
    // whose resolved stop is already taken stays put this turn.
    if board
        .platform_at(to)
        .is_some_and(|occupant| occupant != index)
    {
        warn!("dropping platform path from {from:?}: {to:?} is already occupied");
        return Ok(());
    }

    board.platforms[index].position = to;
    board.platforms[index].direction = direction;
    if board.player == from {
        // The platform carries whoever rides it.
        board.player = to;
        out_events.push(Event::PlayerMoved { from, to });
    }
    out_events.push(Event::PlatformMoved {
        from,
        to,
        direction,
    });
    Ok(())
}

fn relocate_enemy(
    board: &mut Board,
    index: usize,
    to: GridPos,
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    let from = board.enemies[index].position;
    board.enemies[index].position = to;
    out_events.push(Event::EnemyMoved { from, to });
    refresh_button_at(board, from, out_events)?;
    refresh_button_at(board, to, out_events)
}

fn refresh_button_at(
    board: &mut Board,
    at: GridPos,
    out_events: &mut Vec<Event>,
) -> Result<(), LogicFault> {
    if let Some(id) = board.square_id_at(at) {
        if board.square(id).kind == TileKind::Button {
            charge::refresh(board, id, out_events)?;
        }
    }
    Ok(())
}

fn check_spike_under_player(board: &mut Board, out_events: &mut Vec<Event>) {
    if !board.alive {
        return;
    }
    let extended = board
        .square_id_at(board.player)
        .map(|id| board.square(id))
        .is_some_and(|square| square.kind == TileKind::Spike && square.state == 1);
    if extended {
        kill(board, board.player, DeathCause::Spiked, out_events);
    }
}

fn kill(board: &mut Board, at: GridPos, cause: DeathCause, out_events: &mut Vec<Event>) {
    board.alive = false;
    out_events.push(Event::PlayerDied { at, cause });
}

/// Query functions that provide read-only access to the board state.
pub mod query {
    use super::{Board, MovePattern, TileKind, KNIGHT_OFFSETS};
    use knight_gambit_core::{Direction, EntityKind, GridPos};

    /// Current position of the player piece.
    #[must_use]
    pub fn player(board: &Board) -> GridPos {
        board.player
    }

    /// Whether the player piece is still alive.
    #[must_use]
    pub fn is_alive(board: &Board) -> bool {
        board.alive
    }

    /// Name of the level this board was built from.
    #[must_use]
    pub fn level_name(board: &Board) -> &str {
        &board.name
    }

    /// Captures a read-only passability and jump-blocking view.
    #[must_use]
    pub fn passability(board: &Board) -> PassabilityView<'_> {
        PassabilityView { board }
    }

    /// Captures a read-only enemy occupancy view.
    #[must_use]
    pub fn occupancy(board: &Board) -> OccupancyView<'_> {
        OccupancyView { board }
    }

    /// Captures a read-only view of the track rail network.
    #[must_use]
    pub fn tracks(board: &Board) -> TrackView<'_> {
        TrackView { board }
    }

    /// Snapshots every enemy piece in deterministic order.
    #[must_use]
    pub fn enemies(board: &Board) -> Vec<EnemySnapshot> {
        board
            .enemies
            .iter()
            .map(|enemy| EnemySnapshot {
                kind: enemy.kind,
                at: enemy.position,
                facing: enemy.facing,
                state: enemy.state,
            })
            .collect()
    }

    /// Snapshots every moving platform in deterministic order.
    #[must_use]
    pub fn platforms(board: &Board) -> Vec<PlatformSnapshot> {
        board
            .platforms
            .iter()
            .map(|platform| PlatformSnapshot {
                at: platform.position,
                direction: platform.direction,
            })
            .collect()
    }

    /// Snapshots the square at the provided position, if one exists.
    #[must_use]
    pub fn square(board: &Board, at: GridPos) -> Option<SquareSnapshot> {
        let id = board.square_id_at(at)?;
        let square = board.square(id);
        Some(SquareSnapshot {
            kind: square.kind,
            state: square.state,
            variant: square.variant,
            receiving_charge: square.receiving_charge(),
            passable: board.is_passable(at),
        })
    }

    /// Union of every enemy's capture-threat squares, sorted and deduplicated.
    #[must_use]
    pub fn threatened_squares(board: &Board) -> Vec<GridPos> {
        let mut threats = Vec::new();
        for enemy in &board.enemies {
            match enemy.kind.descriptor().pattern {
                MovePattern::Patrol => {
                    let ahead = enemy.position.step(enemy.facing);
                    if board.square_id_at(ahead).is_some() {
                        threats.push(ahead);
                    }
                }
                MovePattern::KnightChase => {
                    for (dx, dy) in KNIGHT_OFFSETS {
                        let to = enemy.position.offset(dx, dy);
                        if board.is_passable(to) {
                            threats.push(to);
                        }
                    }
                }
            }
        }
        threats.sort_unstable();
        threats.dedup();
        threats
    }

    /// Read-only passability and jump-blocking queries over the square graph.
    #[derive(Clone, Copy, Debug)]
    pub struct PassabilityView<'a> {
        board: &'a Board,
    }

    impl PassabilityView<'_> {
        /// Whether any square exists at the position.
        #[must_use]
        pub fn exists(&self, at: GridPos) -> bool {
            self.board.square_id_at(at).is_some()
        }

        /// Whether the square at the position can currently be entered.
        #[must_use]
        pub fn is_passable(&self, at: GridPos) -> bool {
            self.board.is_passable(at)
        }

        /// Whether the square at the position blocks knight jumps over it.
        #[must_use]
        pub fn blocks_jump(&self, at: GridPos) -> bool {
            self.board
                .square_id_at(at)
                .is_some_and(|id| self.board.square(id).kind.descriptor().blocks_jump)
        }
    }

    /// Read-only enemy occupancy queries.
    #[derive(Clone, Copy, Debug)]
    pub struct OccupancyView<'a> {
        board: &'a Board,
    }

    impl OccupancyView<'_> {
        /// Whether an enemy piece currently stands on the position.
        #[must_use]
        pub fn is_enemy_at(&self, at: GridPos) -> bool {
            self.board.is_enemy_at(at)
        }
    }

    /// Read-only queries over the track rail network.
    #[derive(Clone, Copy, Debug)]
    pub struct TrackView<'a> {
        board: &'a Board,
    }

    impl TrackView<'_> {
        /// Whether a track square exists at the position.
        #[must_use]
        pub fn is_track(&self, at: GridPos) -> bool {
            self.board
                .square_id_at(at)
                .is_some_and(|id| self.board.square(id).kind == TileKind::Track)
        }

        /// Whether the track square at the position is a platform stop.
        #[must_use]
        pub fn is_stop(&self, at: GridPos) -> bool {
            self.board
                .square_id_at(at)
                .is_some_and(|id| {
                    let square = self.board.square(id);
                    square.kind == TileKind::Track && square.state == 0
                })
        }

        /// Cardinal track neighbor of a track square, from the adjacency
        /// recorded at build time.
        #[must_use]
        pub fn track_neighbor(&self, at: GridPos, direction: Direction) -> Option<GridPos> {
            let id = self.board.square_id_at(at)?;
            let neighbor = self.board.square(id).track_neighbors[direction.index() as usize]?;
            Some(self.board.square(neighbor).position)
        }
    }

    /// Immutable representation of one enemy piece.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EnemySnapshot {
        /// Catalog kind of the enemy.
        pub kind: EntityKind,
        /// Square the enemy currently occupies.
        pub at: GridPos,
        /// Facing direction of the enemy.
        pub facing: Direction,
        /// Discrete state of the enemy.
        pub state: u8,
    }

    /// Immutable representation of one moving platform.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PlatformSnapshot {
        /// Track square the platform currently occupies.
        pub at: GridPos,
        /// Current travel direction of the platform.
        pub direction: Direction,
    }

    /// Immutable representation of one square's observable state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SquareSnapshot {
        /// Catalog kind of the square.
        pub kind: TileKind,
        /// Current discrete state.
        pub state: u8,
        /// Cosmetic graphics variant.
        pub variant: u8,
        /// Whether any stored incoming charge is currently true.
        pub receiving_charge: bool,
        /// Whether the square can currently be entered.
        pub passable: bool,
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, query, Board, BuildError, LogicFault};
    use knight_gambit_core::{
        Command, DeathCause, Direction, EntityKind, Event, GridPos, TileKind,
    };
    use knight_gambit_level::{EntityPlacement, Level, Tile};

    fn floor_level(width: i32, height: i32) -> Level {
        let mut level = Level::new("test", GridPos::new(0, 0));
        for y in 0..height {
            for x in 0..width {
                assert!(level.add_tile(GridPos::new(x, y), Tile::of_kind(TileKind::Floor)));
            }
        }
        level
    }

    fn pump(board: &mut Board, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(board, command, &mut events).expect("command applies");
        events
    }

    #[test]
    fn build_wires_links_and_initial_charge() {
        let mut level = floor_level(3, 3);
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind_with_state(TileKind::Switch, 1)));
        assert!(level.add_tile(GridPos::new(3, 1), Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_link(GridPos::new(3, 0), GridPos::new(3, 1)));
        assert!(level.validate().is_ok());

        let board = Board::from_level(&level).expect("board builds");
        let barricade = query::square(&board, GridPos::new(3, 1)).unwrap();
        assert!(barricade.receiving_charge, "switch starts on");
        assert!(barricade.passable, "charged barricade is open");
    }

    #[test]
    fn build_rejects_dangling_links() {
        // The authoring API cannot produce a dangling link, but a parsed
        // document skipped past validation can.
        let document = r#"{
            "name": "dangling",
            "start": [0, 0],
            "tiles": [
                { "tile_type": 0, "position": [0, 0], "state": 0, "variant": 0, "links": [] },
                { "tile_type": 4, "position": [1, 0], "state": 0, "variant": 0, "links": [[9, 9]] }
            ]
        }"#;
        let level = knight_gambit_level::format::parse(document).expect("document parses");
        assert!(level.validate().is_err());
        let error = Board::from_level(&level).expect_err("dangling link aborts the build");
        assert_eq!(
            error,
            BuildError::DanglingLink {
                at: GridPos::new(1, 0),
                target: GridPos::new(9, 9),
            }
        );
    }

    #[test]
    fn and_gate_requires_every_input() {
        let mut level = floor_level(3, 3);
        let switch = GridPos::new(3, 0);
        let button = GridPos::new(3, 1);
        let gate = GridPos::new(3, 2);
        let spike = GridPos::new(4, 2);
        assert!(level.add_tile(switch, Tile::of_kind(TileKind::Switch)));
        assert!(level.add_tile(button, Tile::of_kind(TileKind::Button)));
        assert!(level.add_tile(gate, Tile::of_kind(TileKind::AndGate)));
        assert!(level.add_tile(spike, Tile::of_kind(TileKind::Spike)));
        assert!(level.add_link(switch, gate));
        assert!(level.add_link(button, gate));
        assert!(level.add_link(gate, spike));
        assert!(level.validate().is_ok());

        let mut board = Board::from_level(&level).expect("board builds");
        assert!(!query::square(&board, spike).unwrap().receiving_charge);

        // Player walks onto the switch and toggles it; the unlatched button
        // still holds the AND gate false, so the spike stays retracted.
        let _ = pump(&mut board, Command::MovePlayer { to: switch });
        let events = pump(&mut board, Command::ResolvePlayerLand);
        assert!(events.contains(&Event::SwitchToggled { at: switch, on: true }));
        let snapshot = query::square(&board, spike).unwrap();
        assert!(!snapshot.receiving_charge);
        assert_eq!(snapshot.state, 0, "spike stays retracted");

        // Latch the button on; now every input is true and the spike extends.
        let mut events = Vec::new();
        assert!(board.set_square_state(button, 1, &mut events).unwrap());
        assert!(events.contains(&Event::SpikeChanged {
            at: spike,
            extended: true
        }));
        assert_eq!(query::square(&board, spike).unwrap().state, 1);
    }

    #[test]
    fn gate_defaults_match_their_identities() {
        let mut level = floor_level(2, 2);
        let and_gate = GridPos::new(4, 0);
        let closed = GridPos::new(4, 1);
        let not_gate = GridPos::new(5, 0);
        let open = GridPos::new(5, 1);
        assert!(level.add_tile(and_gate, Tile::of_kind(TileKind::AndGate)));
        assert!(level.add_tile(closed, Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_tile(not_gate, Tile::of_kind(TileKind::NotGate)));
        assert!(level.add_tile(open, Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_link(and_gate, closed));
        assert!(level.add_link(not_gate, open));

        let board = Board::from_level(&level).expect("board builds");
        assert!(
            !query::square(&board, closed).unwrap().passable,
            "AND with no inputs emits false"
        );
        assert!(
            query::square(&board, open).unwrap().passable,
            "NOT with no inputs emits true"
        );
    }

    #[test]
    fn charge_settles_to_the_same_fixed_point_regardless_of_refresh_order() {
        let mut level = floor_level(2, 2);
        let switch = GridPos::new(4, 0);
        let or_gate = GridPos::new(4, 1);
        let not_gate = GridPos::new(4, 2);
        let barricade = GridPos::new(4, 3);
        assert!(level.add_tile(switch, Tile::of_kind_with_state(TileKind::Switch, 1)));
        assert!(level.add_tile(or_gate, Tile::of_kind(TileKind::OrGate)));
        assert!(level.add_tile(not_gate, Tile::of_kind(TileKind::NotGate)));
        assert!(level.add_tile(barricade, Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_link(switch, or_gate));
        assert!(level.add_link(or_gate, not_gate));
        assert!(level.add_link(not_gate, barricade));

        let board = Board::from_level(&level).expect("board builds");
        let settled = |board: &Board| {
            (
                query::square(board, or_gate).unwrap().receiving_charge,
                query::square(board, not_gate).unwrap().receiving_charge,
                query::square(board, barricade).unwrap().receiving_charge,
            )
        };
        assert_eq!(settled(&board), (true, true, false));

        // Re-propagating every emitter again, in any order, changes nothing.
        let mut again = board.clone();
        let mut events = Vec::new();
        for at in [not_gate, or_gate, switch] {
            let state = query::square(&again, at).unwrap().state;
            let _ = again.set_square_state(at, state, &mut events).unwrap();
        }
        assert_eq!(settled(&again), settled(&board));
    }

    #[test]
    fn not_gate_feedback_loop_is_detected() {
        let mut level = floor_level(2, 2);
        let first = GridPos::new(4, 0);
        let second = GridPos::new(4, 1);
        assert!(level.add_tile(first, Tile::of_kind(TileKind::NotGate)));
        assert!(level.add_tile(second, Tile::of_kind(TileKind::NotGate)));
        assert!(level.add_link(first, second));
        assert!(level.add_link(second, first));
        assert!(level.validate().is_ok(), "validation accepts the wiring");

        // An even inverter ring would freeze into an arbitrary latch state
        // rather than oscillate, so it is rejected structurally too.
        assert!(matches!(
            Board::from_level(&level),
            Err(BuildError::Logic(LogicFault::ChargeOscillation { .. }))
        ));
    }

    #[test]
    fn odd_inverter_ring_is_rejected() {
        let mut level = floor_level(2, 2);
        let ring = [GridPos::new(4, 0), GridPos::new(4, 1), GridPos::new(4, 2)];
        for at in ring {
            assert!(level.add_tile(at, Tile::of_kind(TileKind::NotGate)));
        }
        assert!(level.add_link(ring[0], ring[1]));
        assert!(level.add_link(ring[1], ring[2]));
        assert!(level.add_link(ring[2], ring[0]));

        assert!(matches!(
            Board::from_level(&level),
            Err(BuildError::Logic(LogicFault::ChargeOscillation { .. }))
        ));
    }

    #[test]
    fn gate_chains_with_reconvergent_fanout_still_build() {
        // Diamond: switch feeds two gates that both feed the same AND gate.
        // Reconvergence is not feedback and must stay legal.
        let mut level = floor_level(2, 2);
        let switch = GridPos::new(4, 0);
        let left = GridPos::new(4, 1);
        let right = GridPos::new(4, 2);
        let join = GridPos::new(4, 3);
        assert!(level.add_tile(switch, Tile::of_kind_with_state(TileKind::Switch, 1)));
        assert!(level.add_tile(left, Tile::of_kind(TileKind::OrGate)));
        assert!(level.add_tile(right, Tile::of_kind(TileKind::OrGate)));
        assert!(level.add_tile(join, Tile::of_kind(TileKind::AndGate)));
        assert!(level.add_link(switch, left));
        assert!(level.add_link(switch, right));
        assert!(level.add_link(left, join));
        assert!(level.add_link(right, join));

        let board = Board::from_level(&level).expect("board builds");
        assert!(query::square(&board, join).unwrap().receiving_charge);
    }

    #[test]
    fn landing_on_extended_spike_is_fatal() {
        let mut level = floor_level(3, 3);
        let spike = GridPos::new(3, 0);
        assert!(level.add_tile(spike, Tile::of_kind_with_state(TileKind::Spike, 1)));

        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: spike });
        let events = pump(&mut board, Command::ResolvePlayerLand);
        assert!(events.contains(&Event::PlayerDied {
            at: spike,
            cause: DeathCause::Spiked,
        }));
        assert!(!query::is_alive(&board));
    }

    #[test]
    fn unlinked_spike_toggles_each_level_turn_and_impales() {
        let mut level = floor_level(3, 3);
        let spike = GridPos::new(3, 0);
        assert!(level.add_tile(spike, Tile::of_kind(TileKind::Spike)));

        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: spike });
        let _ = pump(&mut board, Command::ResolvePlayerLand);
        assert!(query::is_alive(&board), "retracted spike is safe");

        let events = pump(&mut board, Command::RunLevelTurn);
        assert!(events.contains(&Event::SpikeChanged {
            at: spike,
            extended: true
        }));
        assert!(events.contains(&Event::PlayerDied {
            at: spike,
            cause: DeathCause::Spiked,
        }));
    }

    #[test]
    fn cracked_floor_breaks_after_the_player_leaves() {
        let mut level = floor_level(3, 3);
        let cracked = GridPos::new(3, 0);
        assert!(level.add_tile(cracked, Tile::of_kind(TileKind::CrackedFloor)));

        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: cracked });
        let _ = pump(&mut board, Command::ResolvePlayerLand);
        assert!(query::square(&board, cracked).unwrap().passable);

        let events = pump(&mut board, Command::MovePlayer { to: GridPos::new(0, 0) });
        assert!(events.contains(&Event::FloorCracked { at: cracked }));
        assert!(!query::square(&board, cracked).unwrap().passable);

        let rejected = pump(&mut board, Command::MovePlayer { to: cracked });
        assert!(rejected.is_empty(), "broken floor rejects entry");
        assert_eq!(query::player(&board), GridPos::new(0, 0));
    }

    #[test]
    fn portals_teleport_once_without_ping_pong() {
        let mut level = floor_level(3, 3);
        let near = GridPos::new(3, 0);
        let far = GridPos::new(3, 2);
        assert!(level.add_tile(near, Tile::of_kind(TileKind::Portal)));
        assert!(level.add_tile(far, Tile::of_kind(TileKind::Portal)));
        assert!(level.add_link(near, far));
        assert!(level.add_link(far, near));
        assert!(level.validate().is_ok());

        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: near });
        let events = pump(&mut board, Command::ResolvePlayerLand);
        assert!(events.contains(&Event::PlayerTeleported { from: near, to: far }));
        assert_eq!(query::player(&board), far);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::PlayerTeleported { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn sentinel_patrols_and_reverses_at_obstacles() {
        let mut level = floor_level(3, 1);
        assert!(level.set_entity(
            GridPos::new(1, 0),
            EntityPlacement::of_kind(EntityKind::Sentinel, Direction::East),
        ));
        let mut board = Board::from_level(&level).expect("board builds");

        let events = pump(&mut board, Command::RunEnemyTurn);
        assert!(events.contains(&Event::EnemyMoved {
            from: GridPos::new(1, 0),
            to: GridPos::new(2, 0),
        }));

        let events = pump(&mut board, Command::RunEnemyTurn);
        assert!(events.contains(&Event::EnemyTurned {
            at: GridPos::new(2, 0),
            facing: Direction::West,
        }));
    }

    #[test]
    fn knight_errant_captures_the_player() {
        let mut level = floor_level(5, 5);
        assert!(level.set_start(GridPos::new(2, 2)));
        assert!(level.set_entity(
            GridPos::new(1, 0),
            EntityPlacement::of_kind(EntityKind::KnightErrant, Direction::South),
        ));
        let mut board = Board::from_level(&level).expect("board builds");

        // (1, 0) -> (2, 2) is itself a knight move, so the errant captures.
        let events = pump(&mut board, Command::RunEnemyTurn);
        assert!(events.contains(&Event::PlayerDied {
            at: GridPos::new(2, 2),
            cause: DeathCause::Captured,
        }));
    }

    #[test]
    fn enemy_standing_on_a_button_charges_it() {
        let mut level = floor_level(3, 1);
        let button = GridPos::new(2, 0);
        let barricade = GridPos::new(3, 0);
        assert!(level.remove_tile(button));
        assert!(level.add_tile(button, Tile::of_kind(TileKind::Button)));
        assert!(level.add_tile(barricade, Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_link(button, barricade));
        assert!(level.set_entity(
            GridPos::new(1, 0),
            EntityPlacement::of_kind(EntityKind::Sentinel, Direction::East),
        ));

        let mut board = Board::from_level(&level).expect("board builds");
        assert!(!query::square(&board, barricade).unwrap().passable);

        let events = pump(&mut board, Command::RunEnemyTurn);
        assert!(events.contains(&Event::EnemyMoved {
            from: GridPos::new(1, 0),
            to: button,
        }));
        assert!(query::square(&board, barricade).unwrap().passable);
    }

    #[test]
    fn platform_advance_carries_the_player() {
        let mut level = floor_level(1, 1);
        for x in 1..4 {
            assert!(level.add_tile(
                GridPos::new(x, 0),
                Tile::of_kind_with_state(TileKind::Track, if x == 3 { 0 } else { 1 })
            ));
        }
        assert!(level.set_platform(GridPos::new(1, 0), Direction::East));

        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: GridPos::new(1, 0) });
        assert_eq!(query::player(&board), GridPos::new(1, 0));

        let events = pump(
            &mut board,
            Command::AdvancePlatform {
                from: GridPos::new(1, 0),
                steps: vec![Direction::East, Direction::East],
            },
        );
        assert!(events.contains(&Event::PlatformMoved {
            from: GridPos::new(1, 0),
            to: GridPos::new(3, 0),
            direction: Direction::East,
        }));
        assert_eq!(query::player(&board), GridPos::new(3, 0));
        assert!(
            !query::square(&board, GridPos::new(1, 0)).unwrap().passable,
            "vacated track square closes"
        );
    }

    #[test]
    fn a_platform_never_advances_onto_an_occupied_stop() {
        let mut level = floor_level(1, 1);
        for x in 1..4 {
            assert!(level.add_tile(
                GridPos::new(x, 0),
                Tile::of_kind_with_state(TileKind::Track, if x == 2 { 0 } else { 1 })
            ));
        }
        assert!(level.set_platform(GridPos::new(1, 0), Direction::East));
        assert!(level.set_platform(GridPos::new(3, 0), Direction::West));
        let mut board = Board::from_level(&level).expect("board builds");

        let events = pump(
            &mut board,
            Command::AdvancePlatform {
                from: GridPos::new(1, 0),
                steps: vec![Direction::East],
            },
        );
        assert!(events.contains(&Event::PlatformMoved {
            from: GridPos::new(1, 0),
            to: GridPos::new(2, 0),
            direction: Direction::East,
        }));

        // The second platform resolved the same stop; it stays put.
        let events = pump(
            &mut board,
            Command::AdvancePlatform {
                from: GridPos::new(3, 0),
                steps: vec![Direction::West],
            },
        );
        assert!(events.is_empty());
        let at: Vec<GridPos> = query::platforms(&board)
            .iter()
            .map(|platform| platform.at)
            .collect();
        assert_eq!(at, vec![GridPos::new(2, 0), GridPos::new(3, 0)]);
    }

    #[test]
    fn invalid_state_writes_are_dropped() {
        let level = floor_level(2, 2);
        let mut board = Board::from_level(&level).expect("board builds");
        let mut events = Vec::new();
        assert!(!board
            .set_square_state(GridPos::new(0, 0), 3, &mut events)
            .unwrap());
        assert!(!board
            .set_square_state(GridPos::new(9, 9), 1, &mut events)
            .unwrap());
        assert_eq!(query::square(&board, GridPos::new(0, 0)).unwrap().state, 0);
    }

    #[test]
    fn commands_after_death_are_ignored() {
        let mut level = floor_level(3, 3);
        let spike = GridPos::new(3, 0);
        assert!(level.add_tile(spike, Tile::of_kind_with_state(TileKind::Spike, 1)));
        let mut board = Board::from_level(&level).expect("board builds");
        let _ = pump(&mut board, Command::MovePlayer { to: spike });
        let _ = pump(&mut board, Command::ResolvePlayerLand);
        assert!(!query::is_alive(&board));

        let events = pump(&mut board, Command::RunLevelTurn);
        assert!(events.is_empty());
    }

    #[test]
    fn threatened_squares_union_every_enemy() {
        let mut level = floor_level(5, 5);
        assert!(level.set_entity(
            GridPos::new(0, 2),
            EntityPlacement::of_kind(EntityKind::Sentinel, Direction::East),
        ));
        assert!(level.set_entity(
            GridPos::new(4, 4),
            EntityPlacement::of_kind(EntityKind::KnightErrant, Direction::North),
        ));
        let board = Board::from_level(&level).expect("board builds");

        let threats = query::threatened_squares(&board);
        assert!(threats.contains(&GridPos::new(1, 2)), "sentinel lane");
        assert!(threats.contains(&GridPos::new(3, 2)), "knight reach");
        assert!(threats.contains(&GridPos::new(2, 3)), "knight reach");
        let mut sorted = threats.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, threats, "sorted and deduplicated");
    }
}
