//! Decoder for the game client's `.hmap` map export.
//!
//! # Layout
//!
//! ```text
//! "Haven Mapfile 1"   15-byte signature
//! zlib header         2 bytes, validated
//! deflate body        records until an empty type string:
//!     type: cstr | length: i32 LE | payload: [u8; length]
//! ```
//!
//! `grid` records carry one 100×100 terrain grid, `mark` records carry
//! player and object markers. Other record types are counted and ignored.
//!
//! # Example
//!
//! ```ignore
//! use automapper::hmap;
//!
//! let file = hmap::decode(&bytes)?;
//! let (kept, discarded) = file.largest_segments(3);
//! ```

mod decoder;
mod error;
mod reader;
mod types;
mod writer;

pub use decoder::{decode, MAX_BODY_SIZE, SIGNATURE};
pub use error::FormatError;
pub use types::{
    DecodeStats, DecodedGrid, DecodedMarker, HmapFile, Overlay, Segment, Tileset,
    OVERLAY_BITMAP_LEN,
};
pub use writer::HmapWriter;
