//! Serializable level file format.
//!
//! The on-disk shape is one JSON document holding the level name, the start
//! position, and flat arrays of tile, entity, and platform records. Position
//! maps are rebuilt on parse, so record ordering inside the arrays is not
//! significant; `export` emits records in position order to keep output
//! deterministic.

use knight_gambit_core::{Direction, EntityTypeId, GridPos, TileTypeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EntityPlacement, Level, Tile};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct LevelRecord {
    name: String,
    start: [i32; 2],
    tiles: Vec<TileRecord>,
    #[serde(default)]
    entities: Vec<EntityRecord>,
    #[serde(default)]
    platforms: Vec<PlatformRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct TileRecord {
    tile_type: u16,
    position: [i32; 2],
    state: u8,
    variant: u8,
    links: Vec<[i32; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct EntityRecord {
    entity_type: u16,
    position: [i32; 2],
    state: u8,
    variant: u8,
    facing: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct PlatformRecord {
    position: [i32; 2],
    direction: u8,
}

/// Errors that can occur while parsing a level document.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The document was not valid JSON for the level record shape.
    #[error("could not parse level document: {0}")]
    Json(#[from] serde_json::Error),
    /// Two tile records share the same grid position.
    #[error("duplicate tile record at {at:?}")]
    DuplicateTile {
        /// The repeated position.
        at: GridPos,
    },
    /// Two entity records share the same grid position.
    #[error("duplicate entity record at {at:?}")]
    DuplicateEntity {
        /// The repeated position.
        at: GridPos,
    },
    /// Two platform records share the same grid position.
    #[error("duplicate platform record at {at:?}")]
    DuplicatePlatform {
        /// The repeated position.
        at: GridPos,
    },
    /// A facing or travel direction index was outside 0 through 3.
    #[error("direction index {value} is out of range")]
    InvalidDirection {
        /// The rejected index.
        value: u8,
    },
}

fn encode_pos(pos: GridPos) -> [i32; 2] {
    [pos.x(), pos.y()]
}

fn decode_pos(pair: [i32; 2]) -> GridPos {
    GridPos::new(pair[0], pair[1])
}

fn decode_direction(value: u8) -> Result<Direction, FormatError> {
    Direction::from_index(value).ok_or(FormatError::InvalidDirection { value })
}

/// Serializes a level into its JSON document form.
///
/// Serialization of the record shape cannot fail, so this returns the
/// document directly.
#[must_use]
pub fn export(level: &Level) -> String {
    let record = LevelRecord {
        name: level.name().to_owned(),
        start: encode_pos(level.start()),
        tiles: level
            .tiles()
            .iter()
            .map(|(&at, tile)| TileRecord {
                tile_type: tile.tile_type.get(),
                position: encode_pos(at),
                state: tile.state,
                variant: tile.variant,
                links: tile.links.iter().copied().map(encode_pos).collect(),
            })
            .collect(),
        entities: level
            .entities()
            .iter()
            .map(|(&at, entity)| EntityRecord {
                entity_type: entity.entity_type.get(),
                position: encode_pos(at),
                state: entity.state,
                variant: entity.variant,
                facing: entity.facing.index(),
            })
            .collect(),
        platforms: level
            .platforms()
            .iter()
            .map(|(&at, &direction)| PlatformRecord {
                position: encode_pos(at),
                direction: direction.index(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&record).expect("level record serialization never fails")
}

/// Parses a level from its JSON document form.
///
/// The result is structurally faithful to the document; callers run
/// [`Level::validate`] before building a board from it.
pub fn parse(document: &str) -> Result<Level, FormatError> {
    let record: LevelRecord = serde_json::from_str(document)?;
    let mut level = Level::new(record.name, decode_pos(record.start));

    for tile in record.tiles {
        let at = decode_pos(tile.position);
        let placed = Tile {
            tile_type: TileTypeId::new(tile.tile_type),
            state: tile.state,
            variant: tile.variant,
            links: tile.links.into_iter().map(decode_pos).collect(),
        };
        if level.tiles.insert(at, placed).is_some() {
            return Err(FormatError::DuplicateTile { at });
        }
    }

    for entity in record.entities {
        let at = decode_pos(entity.position);
        let placed = EntityPlacement {
            entity_type: EntityTypeId::new(entity.entity_type),
            state: entity.state,
            variant: entity.variant,
            facing: decode_direction(entity.facing)?,
        };
        if level.entities.insert(at, placed).is_some() {
            return Err(FormatError::DuplicateEntity { at });
        }
    }

    for platform in record.platforms {
        let at = decode_pos(platform.position);
        let direction = decode_direction(platform.direction)?;
        if level.platforms.insert(at, direction).is_some() {
            return Err(FormatError::DuplicatePlatform { at });
        }
    }

    Ok(level)
}
