//! automapper - map import and tile-pyramid engine for a community game
//! automapper.
//!
//! Players export their locally explored terrain as `.hmap` files or stream
//! it live while playing. This library turns that data into a shared,
//! zoomable world map:
//!
//! - [`hmap`] decodes the client's export format
//! - [`merge`] decides whether exported segments extend an existing map,
//!   form a cave layer, or need a new map
//! - [`render`] draws 100×100 terrain tiles
//! - [`pyramid`] composes zoom levels 1-6
//! - [`import`] orchestrates a whole file import
//! - [`live`] places the grid windows streamed by playing clients
//!
//! Records go through the collaborator traits in [`store`]; textures come
//! from a [`texture::TextureSource`].
//!
//! # Example
//!
//! ```ignore
//! use automapper::import::ImportService;
//!
//! let service = ImportService::new(store, textures, quota, markers, tile_root);
//! let outcome = service.import("tenant", bytes, cancel, None).await?;
//! ```

pub mod config;
pub mod coord;
pub mod hmap;
pub mod import;
pub mod live;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod pyramid;
pub mod render;
pub mod store;
pub mod texture;

/// Version of the automapper library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
