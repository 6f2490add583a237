//! Read-only snapshot of a tenant's stored grids.

use crate::coord::Coord;
use crate::store::{GridRecord, MapId};
use std::collections::HashMap;

/// Existing grids indexed for anchor matching.
///
/// Grid ids stored more than once across the tenant are dropped from the
/// anchor index; they still occupy their coordinates.
#[derive(Debug, Clone, Default)]
pub struct ExistingGrids {
    anchors: HashMap<String, GridRecord>,
    by_map: HashMap<MapId, HashMap<Coord, String>>,
    total: usize,
}

impl ExistingGrids {
    pub fn from_records(records: impl IntoIterator<Item = GridRecord>) -> Self {
        let mut seen: HashMap<String, Option<GridRecord>> = HashMap::new();
        let mut by_map: HashMap<MapId, HashMap<Coord, String>> = HashMap::new();
        let mut total = 0;

        for record in records {
            total += 1;
            by_map
                .entry(record.map)
                .or_default()
                .insert(record.coord, record.id.clone());
            seen.entry(record.id.clone())
                .and_modify(|slot| *slot = None)
                .or_insert(Some(record));
        }

        let anchors = seen
            .into_iter()
            .filter_map(|(id, record)| record.map(|r| (id, r)))
            .collect();

        Self {
            anchors,
            by_map,
            total,
        }
    }

    /// Returns the record of a grid id stored exactly once.
    pub fn anchor(&self, grid_id: &str) -> Option<&GridRecord> {
        self.anchors.get(grid_id)
    }

    /// Returns the grid id stored at a coordinate of a map.
    pub fn grid_at(&self, map: MapId, coord: Coord) -> Option<&str> {
        self.by_map
            .get(&map)
            .and_then(|coords| coords.get(&coord))
            .map(String::as_str)
    }

    pub fn is_occupied(&self, map: MapId, coord: Coord) -> bool {
        self.grid_at(map, coord).is_some()
    }

    /// Number of unique anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Number of stored grid records.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
