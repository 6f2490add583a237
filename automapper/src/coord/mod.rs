//! Grid coordinate types.
//!
//! Maps are addressed in grid units: one coordinate is one 100×100 grid at
//! zoom 0. Pyramid levels halve the coordinate space per level using
//! [`Coord::parent`], which rounds toward negative infinity so that tiles on
//! both sides of the origin aggregate consistently.

mod types;

pub use types::{Coord, TileKey, GRID_PIXELS, GRID_SIZE, MAX_ZOOM, MIN_ZOOM};
