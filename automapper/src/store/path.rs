//! Tile path construction.

use super::types::MapId;
use crate::coord::TileKey;
use std::path::{Path, PathBuf};

/// Path of a tile file relative to the tile root.
///
/// ```text
/// tenants/<tenant>/<map>/<zoom>/<x>_<y>.png
/// ```
///
/// # Example
///
/// ```
/// use automapper::coord::{Coord, TileKey};
/// use automapper::store::tile_relative_path;
///
/// let key = TileKey::new(0, Coord::new(-3, 7));
/// assert_eq!(tile_relative_path("t1", 4, &key), "tenants/t1/4/0/-3_7.png");
/// ```
pub fn tile_relative_path(tenant: &str, map: MapId, key: &TileKey) -> String {
    format!(
        "tenants/{}/{}/{}/{}_{}.png",
        tenant, map, key.zoom, key.coord.x, key.coord.y
    )
}

/// Full path of a tile file.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use automapper::coord::{Coord, TileKey};
/// use automapper::store::tile_path;
///
/// let key = TileKey::new(2, Coord::new(1, 1));
/// let path = tile_path(&PathBuf::from("/srv/tiles"), "t1", 4, &key);
/// assert_eq!(path, PathBuf::from("/srv/tiles/tenants/t1/4/2/1_1.png"));
/// ```
pub fn tile_path(root: &Path, tenant: &str, map: MapId, key: &TileKey) -> PathBuf {
    map_directory(root, tenant, map)
        .join(key.zoom.to_string())
        .join(format!("{}_{}.png", key.coord.x, key.coord.y))
}

/// Directory holding every zoom level of a map.
pub fn map_directory(root: &Path, tenant: &str, map: MapId) -> PathBuf {
    tenant_directory(root, tenant).join(map.to_string())
}

pub fn tenant_directory(root: &Path, tenant: &str) -> PathBuf {
    root.join("tenants").join(tenant)
}
