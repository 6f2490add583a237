//! PNG tile file helpers.
//!
//! All functions here do blocking I/O or CPU work; async callers run them
//! through `spawn_blocking`.

use crate::coord::GRID_PIXELS;
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use tracing::warn;

/// Encodes an image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Decodes PNG bytes into an RGBA image.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

/// Writes a tile file, creating parent directories.
///
/// Returns the size of the file that was replaced, if any.
pub fn write_tile_file(path: &Path, bytes: &[u8]) -> io::Result<Option<u64>> {
    let previous = fs::metadata(path).ok().map(|m| m.len());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(previous)
}

/// Loads a tile image from disk.
///
/// Missing files yield `None`. Unreadable or wrongly sized files are logged
/// and also yield `None`, so callers draw a transparent quadrant instead.
pub fn read_tile_image(path: &Path) -> Option<RgbaImage> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read tile file");
            return None;
        }
    };
    match decode_png(&bytes) {
        Ok(img) if img.width() == GRID_PIXELS && img.height() == GRID_PIXELS => Some(img),
        Ok(img) => {
            warn!(
                path = %path.display(),
                width = img.width(),
                height = img.height(),
                "Ignoring tile with unexpected dimensions"
            );
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to decode tile file");
            None
        }
    }
}

/// Removes a tile file, returning its size if it existed.
pub fn remove_tile_file(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => {
            fs::remove_file(path)?;
            Ok(Some(meta.len()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
