//! `.hmap` export writer.
//!
//! Produces files in the layout read by [`decode`](super::decode). Used to
//! build fixtures and to re-export filtered segments.

use super::decoder::SIGNATURE;
use super::types::{DecodedGrid, DecodedMarker};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Incrementally builds an export body and compresses it on [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct HmapWriter {
    body: Vec<u8>,
}

impl HmapWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `grid` record.
    ///
    /// Heights are written raw (scheme 3); a grid without heights is written
    /// with a uniform zero height so its overlays stay addressable.
    pub fn add_grid(&mut self, grid: &DecodedGrid) {
        let mut p = Vec::with_capacity(grid.tiles.len() * 5 + 64);
        p.push(grid.version);
        p.extend_from_slice(&grid.grid_id.to_le_bytes());
        p.extend_from_slice(&grid.segment_id.to_le_bytes());
        p.extend_from_slice(&grid.mtime.to_le_bytes());
        p.extend_from_slice(&grid.coord.x.to_le_bytes());
        p.extend_from_slice(&grid.coord.y.to_le_bytes());

        p.extend_from_slice(&(grid.tilesets.len() as u16).to_le_bytes());
        for tileset in &grid.tilesets {
            put_cstr(&mut p, &tileset.resource_name);
            p.extend_from_slice(&tileset.version.to_le_bytes());
            p.push(tileset.priority);
        }

        if grid.tilesets.len() <= 256 {
            p.extend(grid.tiles.iter().map(|&t| t as u8));
        } else {
            for t in &grid.tiles {
                p.extend_from_slice(&t.to_le_bytes());
            }
        }

        match &grid.zmap {
            Some(heights) => {
                p.push(3);
                for h in heights {
                    p.extend_from_slice(&h.to_le_bytes());
                }
            }
            None => {
                p.push(0);
                p.extend_from_slice(&0f32.to_le_bytes());
            }
        }

        for overlay in &grid.overlays {
            put_cstr(&mut p, &overlay.resource_name);
            p.extend_from_slice(&overlay.version.to_le_bytes());
            p.extend_from_slice(&overlay.bitmap);
        }
        p.push(0);

        self.add_raw_record("grid", &p);
    }

    /// Appends a `mark` record.
    pub fn add_marker(&mut self, marker: &DecodedMarker) {
        let mut p = Vec::new();
        match marker {
            DecodedMarker::Player {
                segment_id,
                tile_x,
                tile_y,
                name,
                color,
            } => {
                p.push(b'p');
                p.push(1);
                p.extend_from_slice(&segment_id.to_le_bytes());
                p.extend_from_slice(&tile_x.to_le_bytes());
                p.extend_from_slice(&tile_y.to_le_bytes());
                put_cstr(&mut p, name);
                p.extend_from_slice(color);
            }
            DecodedMarker::Object {
                segment_id,
                tile_x,
                tile_y,
                name,
                object_id,
                resource_name,
                resource_version,
            } => {
                p.push(b's');
                p.push(1);
                p.extend_from_slice(&segment_id.to_le_bytes());
                p.extend_from_slice(&tile_x.to_le_bytes());
                p.extend_from_slice(&tile_y.to_le_bytes());
                put_cstr(&mut p, name);
                p.extend_from_slice(&object_id.to_le_bytes());
                put_cstr(&mut p, resource_name);
                p.extend_from_slice(&resource_version.to_le_bytes());
            }
        }
        self.add_raw_record("mark", &p);
    }

    /// Appends a record with an arbitrary type and payload.
    pub fn add_raw_record(&mut self, kind: &str, payload: &[u8]) {
        put_cstr(&mut self.body, kind);
        self.body
            .extend_from_slice(&(payload.len() as i32).to_le_bytes());
        self.body.extend_from_slice(payload);
    }

    #[cfg(test)]
    pub(crate) fn add_raw_header(&mut self, kind: &str, length: i32) {
        put_cstr(&mut self.body, kind);
        self.body.extend_from_slice(&length.to_le_bytes());
    }

    /// Terminates the record stream and returns the compressed export.
    pub fn finish(mut self) -> Vec<u8> {
        self.body.push(0);
        compress(&self.body)
    }

    #[cfg(test)]
    pub(crate) fn finish_without_terminator(self) -> Vec<u8> {
        compress(&self.body)
    }
}

fn put_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend(s.bytes().filter(|&b| b != 0));
    out.push(0);
}

fn compress(body: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(SIGNATURE.to_vec(), Compression::fast());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(body);
    encoder.finish().unwrap_or_default()
}
