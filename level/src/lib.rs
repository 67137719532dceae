#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoring-time level model for Knight Gambit.
//!
//! A [`Level`] describes tile placements, the link graph, enemy placements,
//! and moving-platform seeds, keyed by grid position. It is the input the
//! board crate consumes once per build. Validation collects every authoring
//! mistake rather than stopping at the first, so editors can show the full
//! list; mutation operations preserve the level invariants by rejecting
//! changes that would break them.

use std::collections::BTreeMap;
use std::fmt;

use knight_gambit_core::{Direction, EntityKind, EntityTypeId, GridPos, TileKind, TileTypeId};
use thiserror::Error;

pub mod format;

/// Authoring record for a single tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Catalog identifier of the tile's type.
    pub tile_type: TileTypeId,
    /// Initial discrete state; must be valid for the type.
    pub state: u8,
    /// Cosmetic graphics variant, ignored by the engine logic.
    pub variant: u8,
    /// Grid positions this tile links to, in authoring order.
    pub links: Vec<GridPos>,
}

impl Tile {
    /// Creates a link-free tile record of the provided kind.
    #[must_use]
    pub fn of_kind(kind: TileKind) -> Self {
        Self {
            tile_type: kind.id(),
            state: 0,
            variant: 0,
            links: Vec::new(),
        }
    }

    /// Creates a link-free tile record with an explicit initial state.
    #[must_use]
    pub fn of_kind_with_state(kind: TileKind, state: u8) -> Self {
        Self {
            tile_type: kind.id(),
            state,
            variant: 0,
            links: Vec::new(),
        }
    }

    /// Resolves the tile's kind from the catalog, if registered.
    #[must_use]
    pub fn kind(&self) -> Option<TileKind> {
        TileKind::from_id(self.tile_type)
    }
}

/// Authoring record for a single enemy piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityPlacement {
    /// Catalog identifier of the entity's type.
    pub entity_type: EntityTypeId,
    /// Initial discrete state.
    pub state: u8,
    /// Cosmetic graphics variant, ignored by the engine logic.
    pub variant: u8,
    /// Initial facing direction.
    pub facing: Direction,
}

impl EntityPlacement {
    /// Creates a placement of the provided kind facing the provided direction.
    #[must_use]
    pub fn of_kind(kind: EntityKind, facing: Direction) -> Self {
        Self {
            entity_type: kind.id(),
            state: 0,
            variant: 0,
            facing,
        }
    }

    /// Resolves the entity's kind from the catalog, if registered.
    #[must_use]
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_id(self.entity_type)
    }
}

/// Complete authoring description of one puzzle level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    name: String,
    start: GridPos,
    tiles: BTreeMap<GridPos, Tile>,
    entities: BTreeMap<GridPos, EntityPlacement>,
    platforms: BTreeMap<GridPos, Direction>,
}

impl Level {
    /// Creates an empty level with the provided name and start position.
    ///
    /// The level is not valid until a start tile exists at the start position.
    #[must_use]
    pub fn new(name: impl Into<String>, start: GridPos) -> Self {
        Self {
            name: name.into(),
            start,
            tiles: BTreeMap::new(),
            entities: BTreeMap::new(),
            platforms: BTreeMap::new(),
        }
    }

    /// Display name of the level.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Player start position.
    #[must_use]
    pub const fn start(&self) -> GridPos {
        self.start
    }

    /// Tile placements keyed by grid position, in position order.
    #[must_use]
    pub const fn tiles(&self) -> &BTreeMap<GridPos, Tile> {
        &self.tiles
    }

    /// Enemy placements keyed by grid position, in position order.
    #[must_use]
    pub const fn entities(&self) -> &BTreeMap<GridPos, EntityPlacement> {
        &self.entities
    }

    /// Moving-platform seeds keyed by grid position, in position order.
    #[must_use]
    pub const fn platforms(&self) -> &BTreeMap<GridPos, Direction> {
        &self.platforms
    }

    /// Retrieves the tile at the provided position, if any.
    #[must_use]
    pub fn tile(&self, at: GridPos) -> Option<&Tile> {
        self.tiles.get(&at)
    }

    /// Adds a link-free tile at the provided position.
    ///
    /// Rejects records whose type is unknown, whose state is invalid for the
    /// type, or that already carry links; links are added through
    /// [`Level::add_link`] so each one is checked. Returns whether the tile
    /// was accepted. An existing tile at the position is replaced only when
    /// no other tile links to it with a now-disallowed target kind.
    pub fn add_tile(&mut self, at: GridPos, tile: Tile) -> bool {
        let Some(kind) = tile.kind() else {
            return false;
        };
        if !kind.accepts_state(tile.state) || !tile.links.is_empty() {
            return false;
        }
        let breaks_inbound = self.tiles.iter().any(|(source, record)| {
            record.links.contains(&at)
                && record
                    .kind()
                    .is_some_and(|source_kind| !source_kind.descriptor().link_targets.contains(&kind))
                && *source != at
        });
        if breaks_inbound {
            return false;
        }
        let _ = self.tiles.insert(at, tile);
        true
    }

    /// Removes the tile at the provided position.
    ///
    /// Links targeting the removed position are removed along with it, so
    /// the link graph never dangles. The start tile cannot be removed.
    /// Returns whether a tile was removed.
    pub fn remove_tile(&mut self, at: GridPos) -> bool {
        if at == self.start || self.tiles.remove(&at).is_none() {
            return false;
        }
        for tile in self.tiles.values_mut() {
            tile.links.retain(|target| *target != at);
        }
        let _ = self.entities.remove(&at);
        let _ = self.platforms.remove(&at);
        true
    }

    /// Adds a directed link between two existing tiles.
    ///
    /// Rejects self-links, missing endpoints, duplicate links, and targets
    /// whose kind is not in the source kind's valid-target set. Returns
    /// whether the link was accepted.
    pub fn add_link(&mut self, from: GridPos, to: GridPos) -> bool {
        if from == to {
            return false;
        }
        let Some(target_kind) = self.tiles.get(&to).and_then(Tile::kind) else {
            return false;
        };
        let Some(source) = self.tiles.get_mut(&from) else {
            return false;
        };
        let allowed = source
            .kind()
            .is_some_and(|kind| kind.descriptor().link_targets.contains(&target_kind));
        if !allowed || source.links.contains(&to) {
            return false;
        }
        source.links.push(to);
        true
    }

    /// Removes a directed link between two tiles, returning whether it existed.
    pub fn remove_link(&mut self, from: GridPos, to: GridPos) -> bool {
        let Some(source) = self.tiles.get_mut(&from) else {
            return false;
        };
        let before = source.links.len();
        source.links.retain(|target| *target != to);
        source.links.len() != before
    }

    /// Updates the initial state of the tile at the provided position.
    ///
    /// Rejects states outside the tile kind's valid-state set. Returns
    /// whether the state was accepted.
    pub fn set_state(&mut self, at: GridPos, state: u8) -> bool {
        let Some(tile) = self.tiles.get_mut(&at) else {
            return false;
        };
        if !tile.kind().is_some_and(|kind| kind.accepts_state(state)) {
            return false;
        }
        tile.state = state;
        true
    }

    /// Moves the player start to the provided position.
    ///
    /// Rejects positions without a tile or whose kind is not a valid start.
    pub fn set_start(&mut self, at: GridPos) -> bool {
        let valid = self
            .tiles
            .get(&at)
            .and_then(Tile::kind)
            .is_some_and(|kind| kind.descriptor().is_valid_start_position);
        if valid {
            self.start = at;
        }
        valid
    }

    /// Places an enemy piece at the provided position.
    ///
    /// Rejects placements with an unknown entity type or without an
    /// underlying tile. Returns whether the placement was accepted.
    pub fn set_entity(&mut self, at: GridPos, entity: EntityPlacement) -> bool {
        if entity.kind().is_none() || !self.tiles.contains_key(&at) {
            return false;
        }
        let _ = self.entities.insert(at, entity);
        true
    }

    /// Removes the enemy piece at the provided position, if present.
    pub fn remove_entity(&mut self, at: GridPos) -> bool {
        self.entities.remove(&at).is_some()
    }

    /// Seeds a moving platform at the provided position.
    ///
    /// Rejects positions that do not hold a track tile. Returns whether the
    /// platform was accepted.
    pub fn set_platform(&mut self, at: GridPos, direction: Direction) -> bool {
        let on_track = self
            .tiles
            .get(&at)
            .and_then(Tile::kind)
            .is_some_and(|kind| kind == TileKind::Track);
        if on_track {
            let _ = self.platforms.insert(at, direction);
        }
        on_track
    }

    /// Removes the platform seed at the provided position, if present.
    pub fn remove_platform(&mut self, at: GridPos) -> bool {
        self.platforms.remove(&at).is_some()
    }

    /// Checks every level invariant, collecting all violations.
    ///
    /// Per tile, in order: self-links, missing link targets, link targets of
    /// a disallowed kind, and nonzero initial states outside the kind's
    /// valid-state set. Then the start tile, entity placements, and platform
    /// seeds. Returns `Ok` only when the level is usable as-is.
    pub fn validate(&self) -> Result<(), ValidationReport> {
        let mut issues = Vec::new();

        for (&at, tile) in &self.tiles {
            let Some(kind) = tile.kind() else {
                issues.push(AuthoringError::UnknownTileType {
                    at,
                    id: tile.tile_type,
                });
                continue;
            };
            for &target in &tile.links {
                if target == at {
                    issues.push(AuthoringError::SelfLink { at });
                    continue;
                }
                let Some(target_kind) = self.tiles.get(&target).and_then(Tile::kind) else {
                    issues.push(AuthoringError::MissingLinkTarget { at, target });
                    continue;
                };
                if !kind.descriptor().link_targets.contains(&target_kind) {
                    issues.push(AuthoringError::DisallowedLinkTarget {
                        at,
                        target,
                        source_kind: kind,
                        target_kind,
                    });
                }
            }
            if tile.state != 0 && !kind.accepts_state(tile.state) {
                issues.push(AuthoringError::InvalidState {
                    at,
                    state: tile.state,
                });
            }
        }

        match self.tiles.get(&self.start).map(Tile::kind) {
            None => issues.push(AuthoringError::MissingStartTile { at: self.start }),
            Some(kind) => {
                if !kind.is_some_and(|kind| kind.descriptor().is_valid_start_position) {
                    issues.push(AuthoringError::InvalidStartTile { at: self.start });
                }
            }
        }

        for (&at, entity) in &self.entities {
            if entity.kind().is_none() {
                issues.push(AuthoringError::UnknownEntityType {
                    at,
                    id: entity.entity_type,
                });
            }
            if !self.tiles.contains_key(&at) {
                issues.push(AuthoringError::EntityOffGrid { at });
            }
        }

        for &at in self.platforms.keys() {
            let on_track = self
                .tiles
                .get(&at)
                .and_then(Tile::kind)
                .is_some_and(|kind| kind == TileKind::Track);
            if !on_track {
                issues.push(AuthoringError::PlatformOffTrack { at });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { issues })
        }
    }
}

/// A single authoring mistake, with positional detail.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthoringError {
    /// A tile links to its own position.
    #[error("tile at {at:?} links to itself")]
    SelfLink {
        /// Position of the offending tile.
        at: GridPos,
    },
    /// A tile links to a position without a tile.
    #[error("tile at {at:?} links to missing tile at {target:?}")]
    MissingLinkTarget {
        /// Position of the linking tile.
        at: GridPos,
        /// Dangling target position.
        target: GridPos,
    },
    /// A tile links to a target whose kind is not in its valid-target set.
    #[error("{source_kind:?} at {at:?} may not link to {target_kind:?} at {target:?}")]
    DisallowedLinkTarget {
        /// Position of the linking tile.
        at: GridPos,
        /// Position of the disallowed target.
        target: GridPos,
        /// Kind of the linking tile.
        source_kind: TileKind,
        /// Kind of the disallowed target.
        target_kind: TileKind,
    },
    /// A tile's initial state is outside its kind's valid-state set.
    #[error("tile at {at:?} has invalid initial state {state}")]
    InvalidState {
        /// Position of the offending tile.
        at: GridPos,
        /// The rejected state value.
        state: u8,
    },
    /// A tile record references a type id absent from the catalog.
    #[error("tile at {at:?} references unknown tile type {id:?}")]
    UnknownTileType {
        /// Position of the offending tile.
        at: GridPos,
        /// The unrecognized type identifier.
        id: TileTypeId,
    },
    /// The start position has no tile.
    #[error("start position {at:?} has no tile")]
    MissingStartTile {
        /// The configured start position.
        at: GridPos,
    },
    /// The start position's tile kind is not a valid start.
    #[error("start position {at:?} is not a valid start tile")]
    InvalidStartTile {
        /// The configured start position.
        at: GridPos,
    },
    /// An entity record references a type id absent from the catalog.
    #[error("entity at {at:?} references unknown entity type {id:?}")]
    UnknownEntityType {
        /// Position of the offending entity.
        at: GridPos,
        /// The unrecognized type identifier.
        id: EntityTypeId,
    },
    /// An entity is placed where no tile exists.
    #[error("entity at {at:?} stands on no tile")]
    EntityOffGrid {
        /// Position of the offending entity.
        at: GridPos,
    },
    /// A platform seed is placed on a non-track tile.
    #[error("platform at {at:?} does not rest on a track tile")]
    PlatformOffTrack {
        /// Position of the offending platform.
        at: GridPos,
    },
}

/// Every authoring mistake found by [`Level::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<AuthoringError>,
}

impl ValidationReport {
    /// The collected authoring mistakes, in check order.
    #[must_use]
    pub fn issues(&self) -> &[AuthoringError] {
        &self.issues
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level has {} authoring issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

#[cfg(test)]
mod tests {
    use super::*;
    use knight_gambit_core::{Direction, EntityKind, GridPos, TileKind, TileTypeId};

    fn floor_level() -> Level {
        let mut level = Level::new("test", GridPos::new(0, 0));
        for y in 0..3 {
            for x in 0..3 {
                assert!(level.add_tile(GridPos::new(x, y), Tile::of_kind(TileKind::Floor)));
            }
        }
        level
    }

    #[test]
    fn empty_floor_grid_validates() {
        assert!(floor_level().validate().is_ok());
    }

    #[test]
    fn validate_reports_every_failure() {
        let mut level = floor_level();
        assert!(level.add_tile(GridPos::new(5, 5), Tile::of_kind(TileKind::Switch)));
        assert!(level.add_tile(GridPos::new(6, 5), Tile::of_kind(TileKind::Spike)));
        assert!(level.add_link(GridPos::new(5, 5), GridPos::new(6, 5)));

        // Corrupt the level behind the mutation API's back.
        level.tiles.get_mut(&GridPos::new(5, 5)).unwrap().links = vec![
            GridPos::new(5, 5),  // self-link
            GridPos::new(9, 9),  // dangling
            GridPos::new(0, 0),  // floor is not a conductor consumer
        ];
        level.tiles.get_mut(&GridPos::new(6, 5)).unwrap().state = 7;
        level.start = GridPos::new(6, 5);

        let report = level.validate().unwrap_err();
        let issues = report.issues();
        assert!(issues.contains(&AuthoringError::SelfLink {
            at: GridPos::new(5, 5)
        }));
        assert!(issues.contains(&AuthoringError::MissingLinkTarget {
            at: GridPos::new(5, 5),
            target: GridPos::new(9, 9),
        }));
        assert!(issues.contains(&AuthoringError::DisallowedLinkTarget {
            at: GridPos::new(5, 5),
            target: GridPos::new(0, 0),
            source_kind: TileKind::Switch,
            target_kind: TileKind::Floor,
        }));
        assert!(issues.contains(&AuthoringError::InvalidState {
            at: GridPos::new(6, 5),
            state: 7,
        }));
        assert!(issues.contains(&AuthoringError::InvalidStartTile {
            at: GridPos::new(6, 5)
        }));
        assert_eq!(issues.len(), 5);
    }

    #[test]
    fn validate_rejects_missing_start_tile() {
        let level = Level::new("empty", GridPos::new(0, 0));
        let report = level.validate().unwrap_err();
        assert_eq!(
            report.issues(),
            &[AuthoringError::MissingStartTile {
                at: GridPos::new(0, 0)
            }]
        );
    }

    #[test]
    fn validate_rejects_unknown_tile_type() {
        let mut level = floor_level();
        let _ = level.tiles.insert(
            GridPos::new(4, 4),
            Tile {
                tile_type: TileTypeId::new(250),
                state: 0,
                variant: 0,
                links: Vec::new(),
            },
        );
        let report = level.validate().unwrap_err();
        assert_eq!(
            report.issues(),
            &[AuthoringError::UnknownTileType {
                at: GridPos::new(4, 4),
                id: TileTypeId::new(250),
            }]
        );
    }

    #[test]
    fn add_link_rejects_self_and_disallowed_targets() {
        let mut level = floor_level();
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind(TileKind::Switch)));
        assert!(level.add_tile(GridPos::new(3, 1), Tile::of_kind(TileKind::Barricade)));

        assert!(!level.add_link(GridPos::new(3, 0), GridPos::new(3, 0)));
        assert!(!level.add_link(GridPos::new(3, 0), GridPos::new(8, 8)));
        assert!(!level.add_link(GridPos::new(3, 0), GridPos::new(0, 0)));
        assert!(!level.add_link(GridPos::new(0, 0), GridPos::new(3, 1)));

        assert!(level.add_link(GridPos::new(3, 0), GridPos::new(3, 1)));
        assert!(!level.add_link(GridPos::new(3, 0), GridPos::new(3, 1)), "duplicate");
        assert!(level.validate().is_ok());
    }

    #[test]
    fn remove_tile_cascades_dangling_links() {
        let mut level = floor_level();
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind(TileKind::Switch)));
        assert!(level.add_tile(GridPos::new(3, 1), Tile::of_kind(TileKind::Barricade)));
        assert!(level.add_link(GridPos::new(3, 0), GridPos::new(3, 1)));

        assert!(level.remove_tile(GridPos::new(3, 1)));
        assert!(level.tile(GridPos::new(3, 0)).unwrap().links.is_empty());
        assert!(level.validate().is_ok());
    }

    #[test]
    fn start_tile_cannot_be_removed() {
        let mut level = floor_level();
        assert!(!level.remove_tile(GridPos::new(0, 0)));
        assert!(level.set_start(GridPos::new(1, 1)));
        assert!(level.remove_tile(GridPos::new(0, 0)));
    }

    #[test]
    fn set_state_rejects_out_of_range_values() {
        let mut level = floor_level();
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind(TileKind::Spike)));
        assert!(level.set_state(GridPos::new(3, 0), 1));
        assert!(!level.set_state(GridPos::new(3, 0), 2));
        assert!(!level.set_state(GridPos::new(0, 0), 1), "floor is stateless");
        assert_eq!(level.tile(GridPos::new(3, 0)).unwrap().state, 1);
    }

    #[test]
    fn set_start_requires_a_valid_start_kind() {
        let mut level = floor_level();
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind(TileKind::Wall)));
        assert!(!level.set_start(GridPos::new(3, 0)));
        assert!(!level.set_start(GridPos::new(9, 9)));
        assert!(level.set_start(GridPos::new(2, 2)));
        assert_eq!(level.start(), GridPos::new(2, 2));
    }

    #[test]
    fn platforms_must_rest_on_track() {
        let mut level = floor_level();
        assert!(!level.set_platform(GridPos::new(0, 0), Direction::East));
        assert!(level.add_tile(GridPos::new(3, 0), Tile::of_kind(TileKind::Track)));
        assert!(level.set_platform(GridPos::new(3, 0), Direction::East));
        assert!(level.validate().is_ok());
    }

    #[test]
    fn entities_require_an_underlying_tile() {
        let mut level = floor_level();
        assert!(!level.set_entity(
            GridPos::new(9, 9),
            EntityPlacement::of_kind(EntityKind::Sentinel, Direction::East),
        ));
        assert!(level.set_entity(
            GridPos::new(1, 0),
            EntityPlacement::of_kind(EntityKind::Sentinel, Direction::East),
        ));
        assert!(level.validate().is_ok());
    }
}
