//! Record of what one import wrote.

use crate::coord::{Coord, TileKey};
use crate::store::MapId;
use std::collections::{BTreeMap, BTreeSet};

/// Everything an import created, so it can be removed again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportLedger {
    pub tenant: String,
    /// Maps created by the import
    pub created_maps: Vec<MapId>,
    /// Zoom-0 grids written, with their map
    pub grids: Vec<(MapId, Coord)>,
    /// Pyramid tiles created where none existed, per map
    pub pyramid_tiles: Vec<(MapId, TileKey)>,
    /// Net bytes reported to the quota tracker
    pub quota_bytes: i64,
    /// Bytes charged to the quota per file, recorded once the charge succeeded
    pub charged: BTreeMap<(MapId, TileKey), i64>,
}

impl ImportLedger {
    pub fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created_maps.is_empty() && self.grids.is_empty() && self.pyramid_tiles.is_empty()
    }

    pub fn is_created_map(&self, map: MapId) -> bool {
        self.created_maps.contains(&map)
    }

    /// Maps that received grids, created or not.
    pub fn touched_maps(&self) -> BTreeSet<MapId> {
        self.grids
            .iter()
            .map(|(m, _)| *m)
            .chain(self.created_maps.iter().copied())
            .collect()
    }

    /// Records `bytes` as charged to the quota for one tile file.
    pub fn charge(&mut self, map: MapId, key: TileKey, bytes: i64) {
        *self.charged.entry((map, key)).or_insert(0) += bytes;
        self.quota_bytes += bytes;
    }

    /// Bytes charged for one file; zero when its batch never reached the quota.
    pub fn charged_for(&self, map: MapId, key: &TileKey) -> i64 {
        self.charged.get(&(map, *key)).copied().unwrap_or(0)
    }

    pub fn charged_in_map(&self, map: MapId) -> i64 {
        self.charged
            .range((map, TileKey::new(0, Coord::new(i32::MIN, i32::MIN)))..)
            .take_while(|((m, _), _)| *m == map)
            .map(|(_, bytes)| *bytes)
            .sum()
    }

    /// Grids written into maps that existed before the import.
    pub fn grids_in_existing_maps(&self) -> impl Iterator<Item = &(MapId, Coord)> {
        self.grids.iter().filter(|(m, _)| !self.is_created_map(*m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_map_filter() {
        let mut ledger = ImportLedger::new("t");
        assert!(ledger.is_empty());
        ledger.created_maps.push(7);
        ledger.grids.push((7, Coord::new(0, 0)));
        ledger.grids.push((2, Coord::new(1, 1)));

        let existing: Vec<_> = ledger.grids_in_existing_maps().collect();
        assert_eq!(existing, vec![&(2, Coord::new(1, 1))]);
        assert_eq!(ledger.touched_maps().into_iter().collect::<Vec<_>>(), vec![2, 7]);
    }

    #[test]
    fn test_charges_per_file_and_map() {
        let mut ledger = ImportLedger::new("t");
        let a = TileKey::new(0, Coord::new(-3, 4));
        let b = TileKey::new(2, Coord::new(0, 0));
        ledger.charge(1, a, 100);
        ledger.charge(1, b, -20);
        ledger.charge(1, a, 5);
        ledger.charge(2, a, 7);

        assert_eq!(ledger.charged_for(1, &a), 105);
        assert_eq!(ledger.charged_for(3, &a), 0);
        assert_eq!(ledger.charged_in_map(1), 85);
        assert_eq!(ledger.charged_in_map(2), 7);
        assert_eq!(ledger.quota_bytes, 92);
    }
}
