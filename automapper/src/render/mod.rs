//! Terrain rendering of decoded grids.
//!
//! Rendering is pure and CPU-bound; the import pipeline runs it on the
//! blocking pool. Three passes run in order:
//!
//! 1. texture sampling, with gray for missing textures
//! 2. cliff shading from the height field
//! 3. black outlines where higher-indexed terrain borders lower terrain

mod grid;

pub use grid::{render_grid, resolve_textures, CLIFF_SHADE, CLIFF_THRESHOLD, MISSING_TEXTURE};
