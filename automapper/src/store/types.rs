//! Persisted record types.

use crate::coord::{Coord, TileKey};
use chrono::{DateTime, Utc};
use std::fmt;

/// Map identifier (auto-incrementing per tenant).
pub type MapId = i64;

/// Tenant identifier.
pub type TenantId = String;

/// A terrain grid placed on a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRecord {
    /// Game-assigned grid id, in string form
    pub id: String,
    pub map: MapId,
    pub coord: Coord,
    pub tenant: TenantId,
    /// When the client should next upload an image for this grid
    pub next_update: Option<DateTime<Utc>>,
}

/// A rendered pyramid tile on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub map: MapId,
    pub coord: Coord,
    pub zoom: u8,
    /// Path relative to the tile root
    pub file_path: String,
    /// Cache-busting timestamp (milliseconds since the epoch)
    pub cache_timestamp: i64,
    pub size_bytes: u64,
    pub tenant: TenantId,
}

impl TileRecord {
    pub fn key(&self) -> TileKey {
        TileKey::new(self.zoom, self.coord)
    }
}

/// Overlay layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    ClaimFloor,
    ClaimOutline,
    VillageFloor,
    VillageOutline,
    VillageSar,
    Province0,
    Province1,
    Province2,
    Province3,
    Province4,
}

impl OverlayKind {
    /// Maps an overlay resource name to its kind.
    pub fn from_resource(name: &str) -> Option<Self> {
        let leaf = name.rsplit('/').next()?;
        let kind = match leaf {
            "cplot-f" => Self::ClaimFloor,
            "cplot-o" => Self::ClaimOutline,
            "vlg-f" => Self::VillageFloor,
            "vlg-o" => Self::VillageOutline,
            "vlg-sar" => Self::VillageSar,
            "prov-0" => Self::Province0,
            "prov-1" => Self::Province1,
            "prov-2" => Self::Province2,
            "prov-3" => Self::Province3,
            "prov-4" => Self::Province4,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An overlay bitmap stored for one grid coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRecord {
    pub map: MapId,
    pub coord: Coord,
    pub kind: OverlayKind,
    pub bitmap: Vec<u8>,
    pub tenant: TenantId,
}

/// A navigable map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    pub id: MapId,
    pub name: String,
    /// Ordering priority; curated maps are positive
    pub priority: i32,
    pub hidden: bool,
    pub tenant: TenantId,
}

/// A marker ready for bulk upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerUpload {
    /// Grid containing the marker
    pub grid_id: String,
    /// Position within the grid (0-99)
    pub x: i32,
    pub y: i32,
    pub name: String,
    /// Icon resource
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_kind_from_resource() {
        assert_eq!(
            OverlayKind::from_resource("gfx/tiles/overlay/cplot-f"),
            Some(OverlayKind::ClaimFloor)
        );
        assert_eq!(
            OverlayKind::from_resource("vlg-sar"),
            Some(OverlayKind::VillageSar)
        );
        assert_eq!(
            OverlayKind::from_resource("gfx/tiles/overlay/prov-4"),
            Some(OverlayKind::Province4)
        );
        assert_eq!(OverlayKind::from_resource("gfx/tiles/overlay/unknown"), None);
    }
}
