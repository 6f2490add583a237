//! Persistence seams and tile files.
//!
//! The engine reads and writes records only through the traits in this
//! module. Tile images live on disk under a tile root:
//!
//! ```text
//! <root>/tenants/<tenant>/<map>/<zoom>/<x>_<y>.png
//! ```
//!
//! [`MemoryMapStore`] and the other in-memory types back the CLI and tests.

mod error;
mod memory;
mod path;
mod tile_file;
mod traits;
mod types;

pub use error::StoreError;
pub use memory::{MemoryMapStore, MemoryMarkerSink, MemoryQuota, PendingMarkerBuffer};
pub use path::{map_directory, tenant_directory, tile_path, tile_relative_path};
pub use tile_file::{decode_png, encode_png, read_tile_image, remove_tile_file, write_tile_file};
pub use traits::{
    bytes_to_mb, MapStore, MarkerSink, NoPendingMarkers, PendingMarkers, QuotaTracker,
};
pub use types::{
    GridRecord, MapId, MapInfo, MarkerUpload, OverlayKind, OverlayRecord, TenantId, TileRecord,
};
