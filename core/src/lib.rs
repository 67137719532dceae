#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Knight Gambit engine.
//!
//! This crate defines the message surface that connects the authoritative
//! board, the pure systems, and the host presentation layer. The turn
//! sequencer and input adapter submit [`Command`] values describing desired
//! mutations, the board executes those commands via its `apply` entry point,
//! and then broadcasts [`Event`] values for systems and the presentation
//! layer to react to deterministically. It also carries the fixed tile and
//! entity catalogs that both the level model and the board consult.

use serde::{Deserialize, Serialize};

/// Position of a square expressed in signed grid coordinates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct GridPos {
    x: i32,
    y: i32,
}

impl GridPos {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate of the position.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical coordinate of the position.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the position displaced by the provided deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Returns the adjacent position one square in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// Computes the Manhattan distance between two positions.
    #[must_use]
    pub const fn manhattan_distance(self, other: GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Cardinal directions used for facing, track travel, and platform motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward decreasing `y`.
    North,
    /// Toward increasing `x`.
    East,
    /// Toward increasing `y`.
    South,
    /// Toward decreasing `x`.
    West,
}

impl Direction {
    /// All four directions in their canonical scan order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Numeric index of the direction, 0 through 3.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Resolves a direction from its numeric index, if in range.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Direction> {
        match index {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    /// Unit displacement of the direction as `(dx, dy)`.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// The direction pointing the opposite way.
    #[must_use]
    pub const fn reverse(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// The two perpendicular directions in their fixed scan order.
    ///
    /// The order is load-bearing: the track path resolver breaks perpendicular
    /// ties by taking the first entry, so North/South travel scans East before
    /// West and East/West travel scans North before South.
    #[must_use]
    pub const fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::North | Direction::South => [Direction::East, Direction::West],
            Direction::East | Direction::West => [Direction::North, Direction::South],
        }
    }
}

/// The eight knight-move offsets in their canonical scan order.
pub const KNIGHT_OFFSETS: [(i32, i32); 8] = [
    (1, -2),
    (2, -1),
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
];

/// Unique identifier of a tile type within the fixed catalog.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileTypeId(u16);

impl TileTypeId {
    /// Creates a new tile type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Unique identifier of an entity type within the fixed catalog.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityTypeId(u16);

impl EntityTypeId {
    /// Creates a new entity type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Closed set of concrete tile behaviors recognized by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileKind {
    /// Plain walkable floor, the only valid start position.
    Floor,
    /// Impassable wall that also blocks knight jumps passing over it.
    Wall,
    /// Landing here completes the level.
    Finish,
    /// Hazard with retracted (0) and extended (1) states.
    Spike,
    /// Conductor whose charge is toggled by the player landing on it.
    Switch,
    /// Conductor that is charged while occupied or latched on (state 1).
    Button,
    /// Gate emitting charge only when every input carries charge.
    AndGate,
    /// Gate emitting charge when any input carries charge.
    OrGate,
    /// Gate emitting charge only while it receives none.
    NotGate,
    /// Physical gate that opens only while receiving charge.
    Barricade,
    /// Rail square traversed by moving platforms; state 0 marks a stop.
    Track,
    /// Teleporter linked to another portal square.
    Portal,
    /// Floor that breaks after the player steps off it.
    CrackedFloor,
}

impl TileKind {
    /// Every tile kind in catalog order.
    pub const ALL: [TileKind; 13] = [
        TileKind::Floor,
        TileKind::Wall,
        TileKind::Finish,
        TileKind::Spike,
        TileKind::Switch,
        TileKind::Button,
        TileKind::AndGate,
        TileKind::OrGate,
        TileKind::NotGate,
        TileKind::Barricade,
        TileKind::Track,
        TileKind::Portal,
        TileKind::CrackedFloor,
    ];

    /// Resolves a tile kind from its catalog identifier, if registered.
    #[must_use]
    pub const fn from_id(id: TileTypeId) -> Option<TileKind> {
        match id.get() {
            0 => Some(TileKind::Floor),
            1 => Some(TileKind::Wall),
            2 => Some(TileKind::Finish),
            3 => Some(TileKind::Spike),
            4 => Some(TileKind::Switch),
            5 => Some(TileKind::Button),
            6 => Some(TileKind::AndGate),
            7 => Some(TileKind::OrGate),
            8 => Some(TileKind::NotGate),
            9 => Some(TileKind::Barricade),
            10 => Some(TileKind::Track),
            11 => Some(TileKind::Portal),
            12 => Some(TileKind::CrackedFloor),
            _ => None,
        }
    }

    /// Catalog identifier of the tile kind.
    #[must_use]
    pub const fn id(self) -> TileTypeId {
        TileTypeId::new(match self {
            TileKind::Floor => 0,
            TileKind::Wall => 1,
            TileKind::Finish => 2,
            TileKind::Spike => 3,
            TileKind::Switch => 4,
            TileKind::Button => 5,
            TileKind::AndGate => 6,
            TileKind::OrGate => 7,
            TileKind::NotGate => 8,
            TileKind::Barricade => 9,
            TileKind::Track => 10,
            TileKind::Portal => 11,
            TileKind::CrackedFloor => 12,
        })
    }

    /// Static catalog descriptor for the tile kind.
    #[must_use]
    pub const fn descriptor(self) -> &'static TileType {
        const CONSUMERS: &[TileKind] = &[
            TileKind::Spike,
            TileKind::AndGate,
            TileKind::OrGate,
            TileKind::NotGate,
            TileKind::Barricade,
        ];
        const TOGGLE_STATES: &[u8] = &[0, 1];

        match self {
            TileKind::Floor => &TileType {
                name: "floor",
                valid_states: &[],
                link_targets: &[],
                is_valid_start_position: true,
                is_conductor: false,
                blocks_jump: false,
            },
            TileKind::Wall => &TileType {
                name: "wall",
                valid_states: &[],
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: false,
                blocks_jump: true,
            },
            TileKind::Finish => &TileType {
                name: "finish",
                valid_states: &[],
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: false,
                blocks_jump: false,
            },
            TileKind::Spike => &TileType {
                name: "spike",
                valid_states: TOGGLE_STATES,
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::Switch => &TileType {
                name: "switch",
                valid_states: TOGGLE_STATES,
                link_targets: CONSUMERS,
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::Button => &TileType {
                name: "button",
                valid_states: TOGGLE_STATES,
                link_targets: CONSUMERS,
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::AndGate => &TileType {
                name: "and gate",
                valid_states: &[],
                link_targets: CONSUMERS,
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::OrGate => &TileType {
                name: "or gate",
                valid_states: &[],
                link_targets: CONSUMERS,
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::NotGate => &TileType {
                name: "not gate",
                valid_states: &[],
                link_targets: CONSUMERS,
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: false,
            },
            TileKind::Barricade => &TileType {
                name: "barricade",
                valid_states: &[],
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: true,
                blocks_jump: true,
            },
            TileKind::Track => &TileType {
                name: "track",
                valid_states: TOGGLE_STATES,
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: false,
                blocks_jump: false,
            },
            TileKind::Portal => &TileType {
                name: "portal",
                valid_states: &[],
                link_targets: &[TileKind::Portal],
                is_valid_start_position: false,
                is_conductor: false,
                blocks_jump: false,
            },
            TileKind::CrackedFloor => &TileType {
                name: "cracked floor",
                valid_states: TOGGLE_STATES,
                link_targets: &[],
                is_valid_start_position: false,
                is_conductor: false,
                blocks_jump: false,
            },
        }
    }

    /// Reports whether the kind may own outgoing links.
    #[must_use]
    pub const fn is_linkable(self) -> bool {
        !self.descriptor().link_targets.is_empty()
    }

    /// Reports whether the provided discrete state is valid for this kind.
    ///
    /// Stateless kinds accept only the zero state.
    #[must_use]
    pub fn accepts_state(self, state: u8) -> bool {
        let states = self.descriptor().valid_states;
        if states.is_empty() {
            state == 0
        } else {
            states.contains(&state)
        }
    }
}

/// Immutable catalog entry describing one tile kind.
#[derive(Debug, PartialEq, Eq)]
pub struct TileType {
    /// Display name of the tile kind.
    pub name: &'static str,
    /// Discrete states the kind may occupy; empty means stateless.
    pub valid_states: &'static [u8],
    /// Tile kinds this kind may link to; empty means not linkable.
    pub link_targets: &'static [TileKind],
    /// Whether the player may start the level on this kind.
    pub is_valid_start_position: bool,
    /// Whether the kind participates in the electrical network.
    pub is_conductor: bool,
    /// Whether the kind blocks knight jumps passing over it.
    pub blocks_jump: bool,
}

/// Closed set of enemy piece behaviors recognized by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Walks one square in its facing direction, reversing when blocked.
    Sentinel,
    /// Enemy knight that jumps toward the player each enemy turn.
    KnightErrant,
}

impl EntityKind {
    /// Every entity kind in catalog order.
    pub const ALL: [EntityKind; 2] = [EntityKind::Sentinel, EntityKind::KnightErrant];

    /// Resolves an entity kind from its catalog identifier, if registered.
    #[must_use]
    pub const fn from_id(id: EntityTypeId) -> Option<EntityKind> {
        match id.get() {
            0 => Some(EntityKind::Sentinel),
            1 => Some(EntityKind::KnightErrant),
            _ => None,
        }
    }

    /// Catalog identifier of the entity kind.
    #[must_use]
    pub const fn id(self) -> EntityTypeId {
        EntityTypeId::new(match self {
            EntityKind::Sentinel => 0,
            EntityKind::KnightErrant => 1,
        })
    }

    /// Static catalog descriptor for the entity kind.
    #[must_use]
    pub const fn descriptor(self) -> &'static EntityType {
        match self {
            EntityKind::Sentinel => &EntityType {
                name: "sentinel",
                pattern: MovePattern::Patrol,
            },
            EntityKind::KnightErrant => &EntityType {
                name: "knight errant",
                pattern: MovePattern::KnightChase,
            },
        }
    }
}

/// Immutable catalog entry describing one enemy piece kind.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityType {
    /// Display name of the entity kind.
    pub name: &'static str,
    /// Movement pattern driving the entity each enemy turn.
    pub pattern: MovePattern,
}

/// Movement pattern descriptor for enemy pieces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MovePattern {
    /// Straight-line patrol that reverses at obstacles.
    Patrol,
    /// Knight jumps chosen greedily toward the player.
    KnightChase,
}

/// Ways the player piece can die.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeathCause {
    /// An extended spike impaled the player.
    Spiked,
    /// An enemy piece captured the player.
    Captured,
}

/// Commands that express all permissible board mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Runs the turn-start hooks on every square and enemy.
    BeginPlayerTurn,
    /// Moves the player to a destination already vetted by the move validator.
    MovePlayer {
        /// Destination square of the knight move.
        to: GridPos,
    },
    /// Runs the landing hook on the square the player now occupies.
    ResolvePlayerLand,
    /// Advances every enemy piece by its movement pattern.
    RunEnemyTurn,
    /// Runs the periodic level-turn hooks on every square and enemy.
    RunLevelTurn,
    /// Walks a platform along a path resolved by the track system.
    AdvancePlatform {
        /// Track square the platform currently occupies.
        from: GridPos,
        /// Unit steps of the resolved path, in travel order.
        steps: Vec<Direction>,
    },
}

/// Events broadcast by the board after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the player moved between two squares.
    PlayerMoved {
        /// Square the player occupied before the move.
        from: GridPos,
        /// Square the player occupies after the move.
        to: GridPos,
    },
    /// Reports that a portal relocated the player.
    PlayerTeleported {
        /// Portal square the player landed on.
        from: GridPos,
        /// Destination portal the player emerged from.
        to: GridPos,
    },
    /// Reports that the player died and the level must restart.
    PlayerDied {
        /// Square where the death occurred.
        at: GridPos,
        /// What killed the player.
        cause: DeathCause,
    },
    /// Reports that the player reached a finish square.
    LevelFinished {
        /// Finish square the player landed on.
        at: GridPos,
    },
    /// Confirms that a switch flipped state.
    SwitchToggled {
        /// Position of the switch.
        at: GridPos,
        /// Whether the switch now emits charge.
        on: bool,
    },
    /// Reports that a conductor's received charge changed, for presentation refresh.
    ChargeChanged {
        /// Position of the conductor.
        at: GridPos,
        /// Whether the conductor is now receiving charge.
        charged: bool,
    },
    /// Reports that a spike extended or retracted.
    SpikeChanged {
        /// Position of the spike.
        at: GridPos,
        /// Whether the spike is now extended.
        extended: bool,
    },
    /// Reports that a cracked floor square broke.
    FloorCracked {
        /// Position of the broken square.
        at: GridPos,
    },
    /// Confirms that an enemy piece moved between two squares.
    EnemyMoved {
        /// Square the enemy occupied before the move.
        from: GridPos,
        /// Square the enemy occupies after the move.
        to: GridPos,
    },
    /// Reports that an enemy reversed its facing instead of moving.
    EnemyTurned {
        /// Square the enemy occupies.
        at: GridPos,
        /// Facing direction after the turn.
        facing: Direction,
    },
    /// Requests a resolved path for a platform about to advance.
    PlatformPathNeeded {
        /// Track square the platform occupies.
        at: GridPos,
        /// Current travel direction of the platform.
        direction: Direction,
    },
    /// Confirms that a platform advanced along its resolved path.
    PlatformMoved {
        /// Track square the platform departed.
        from: GridPos,
        /// Stop square the platform settled on.
        to: GridPos,
        /// Travel direction after the final step.
        direction: Direction,
    },
}

#[cfg(test)]
mod tests {
    use super::{Direction, EntityKind, GridPos, TileKind, TileTypeId, KNIGHT_OFFSETS};
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn grid_pos_round_trips_through_bincode() {
        assert_round_trip(&GridPos::new(-3, 7));
    }

    #[test]
    fn direction_round_trips_through_bincode() {
        for direction in Direction::ALL {
            assert_round_trip(&direction);
        }
    }

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = GridPos::new(-1, 2);
        let destination = GridPos::new(3, -1);
        assert_eq!(origin.manhattan_distance(destination), 7);
        assert_eq!(destination.manhattan_distance(origin), 7);
    }

    #[test]
    fn direction_indices_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_index(direction.index()), Some(direction));
        }
        assert_eq!(Direction::from_index(4), None);
    }

    #[test]
    fn reverse_is_an_involution() {
        for direction in Direction::ALL {
            assert_eq!(direction.reverse().reverse(), direction);
            let (dx, dy) = direction.delta();
            let (rx, ry) = direction.reverse().delta();
            assert_eq!((dx + rx, dy + ry), (0, 0));
        }
    }

    #[test]
    fn perpendicular_scan_order_is_fixed() {
        assert_eq!(
            Direction::North.perpendicular(),
            [Direction::East, Direction::West]
        );
        assert_eq!(
            Direction::West.perpendicular(),
            [Direction::North, Direction::South]
        );
    }

    #[test]
    fn knight_offsets_are_the_eight_l_shapes() {
        assert_eq!(KNIGHT_OFFSETS.len(), 8);
        for (dx, dy) in KNIGHT_OFFSETS {
            let magnitudes = (dx.abs(), dy.abs());
            assert!(magnitudes == (1, 2) || magnitudes == (2, 1));
        }
        let mut unique: Vec<(i32, i32)> = KNIGHT_OFFSETS.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn tile_ids_round_trip_through_catalog() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(TileKind::from_id(TileTypeId::new(999)), None);
    }

    #[test]
    fn entity_ids_round_trip_through_catalog() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_id(kind.id()), Some(kind));
        }
    }

    #[test]
    fn stateless_kinds_accept_only_zero() {
        assert!(TileKind::Floor.accepts_state(0));
        assert!(!TileKind::Floor.accepts_state(1));
        assert!(TileKind::Spike.accepts_state(1));
        assert!(!TileKind::Spike.accepts_state(2));
    }

    #[test]
    fn conductor_flags_match_the_catalog() {
        for kind in [
            TileKind::Spike,
            TileKind::Switch,
            TileKind::Button,
            TileKind::AndGate,
            TileKind::OrGate,
            TileKind::NotGate,
            TileKind::Barricade,
        ] {
            assert!(kind.descriptor().is_conductor, "{kind:?} conducts");
        }
        assert!(!TileKind::Floor.descriptor().is_conductor);
        assert!(!TileKind::Track.descriptor().is_conductor);
    }

    #[test]
    fn only_floor_starts_and_only_walls_and_barricades_block_jumps() {
        for kind in TileKind::ALL {
            let descriptor = kind.descriptor();
            assert_eq!(
                descriptor.is_valid_start_position,
                kind == TileKind::Floor,
                "{kind:?}"
            );
            assert_eq!(
                descriptor.blocks_jump,
                matches!(kind, TileKind::Wall | TileKind::Barricade),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn portals_only_link_to_portals() {
        assert_eq!(
            TileKind::Portal.descriptor().link_targets,
            &[TileKind::Portal]
        );
        assert!(TileKind::Portal.is_linkable());
        assert!(!TileKind::Wall.is_linkable());
    }
}
