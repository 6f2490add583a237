//! Zoom pyramid generation.
//!
//! Zoom 0 holds one rendered tile per grid. Each level above halves the
//! coordinate space with [`Coord::parent`](crate::coord::Coord::parent) and
//! composes a 100×100 tile from the four children below it, up to zoom 6.
//!
//! Composed tiles wait in a [`TileCache`] until their parent consumes them,
//! so memory stays bounded by one level of one chunk.

mod builder;
mod cache;
mod compose;
mod error;

pub use builder::{
    PyramidBuilder, PyramidConfig, PyramidReport, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE,
};
pub use cache::TileCache;
pub use compose::{compose_quadrants, downsample_box_2x};
pub use error::PyramidError;
