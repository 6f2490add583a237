//! Tileset texture lookup.

mod directory;
mod source;

pub use directory::DirectoryTextureSource;
pub use source::{PrefetchProgress, TextureSource};
