//! `.hmap` stream decoding.

use super::reader::ByteReader;
use super::types::{
    DecodeStats, DecodedGrid, DecodedMarker, HmapFile, Overlay, Tileset, OVERLAY_BITMAP_LEN,
};
use super::FormatError;
use crate::coord::{Coord, GRID_SIZE};
use flate2::read::DeflateDecoder;
use std::io::Read;
use tracing::{debug, trace};

/// Signature at the start of every export.
pub const SIGNATURE: &[u8; 15] = b"Haven Mapfile 1";

/// Upper bound on the decompressed body.
pub const MAX_BODY_SIZE: usize = 1 << 30;

/// Grid record versions sharing the layout decoded here.
const GRID_VERSIONS: std::ops::RangeInclusive<u8> = 1..=4;

/// Marker record version.
const MARKER_VERSION: u8 = 1;

/// Tileset count above which tile indices are stored as u16.
const BYTE_INDEX_LIMIT: usize = 256;

/// A length-framed record from the body.
enum Record<'a> {
    Grid(&'a [u8]),
    Marker(&'a [u8]),
    Unknown(String),
}

impl<'a> Record<'a> {
    fn classify(kind: String, payload: &'a [u8]) -> Self {
        match kind.as_str() {
            "grid" => Record::Grid(payload),
            "mark" => Record::Marker(payload),
            _ => Record::Unknown(kind),
        }
    }
}

/// Decodes a complete export.
///
/// Fails only on a bad signature, a bad compression stream, or broken record
/// framing. Unknown record types, marker kinds and grid versions are skipped
/// and counted in [`HmapFile::stats`].
pub fn decode(data: &[u8]) -> Result<HmapFile, FormatError> {
    let body = decompress(data)?;
    let mut reader = ByteReader::new(&body);
    let mut file = HmapFile::default();

    while !reader.is_empty() {
        let kind = reader.cstr()?;
        if kind.is_empty() {
            break;
        }
        let length = reader.i32()?;
        if length < 0 {
            return Err(FormatError::InvalidLength {
                record: kind,
                length,
            });
        }
        let payload = reader.bytes(length as usize)?;

        match Record::classify(kind, payload) {
            Record::Grid(payload) => match parse_grid(payload, &mut file.stats)? {
                Some(grid) => {
                    file.stats.grids += 1;
                    file.grids.push(grid);
                }
                None => file.stats.skipped_grids += 1,
            },
            Record::Marker(payload) => match parse_marker(payload)? {
                Some(marker) => {
                    file.stats.markers += 1;
                    file.markers.push(marker);
                }
                None => file.stats.skipped_markers += 1,
            },
            Record::Unknown(kind) => {
                trace!(kind = %kind, "Skipping unknown record");
                *file.stats.unknown_records.entry(kind).or_default() += 1;
            }
        }
    }

    debug!(
        grids = file.stats.grids,
        markers = file.stats.markers,
        skipped_grids = file.stats.skipped_grids,
        skipped_markers = file.stats.skipped_markers,
        unknown_records = file.stats.unknown_record_count(),
        "Decoded hmap export"
    );

    Ok(file)
}

/// Checks the signature and zlib header, then inflates the raw deflate body.
fn decompress(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.len() < SIGNATURE.len() || &data[..SIGNATURE.len()] != SIGNATURE {
        return Err(FormatError::BadSignature);
    }
    let compressed = &data[SIGNATURE.len()..];
    if compressed.len() < 2 {
        return Err(FormatError::Truncated {
            offset: SIGNATURE.len(),
            needed: 2,
            available: compressed.len(),
        });
    }

    let (cmf, flg) = (compressed[0], compressed[1]);
    let method_ok = cmf & 0x0F == 8 && cmf >> 4 <= 7;
    let check_ok = (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0;
    let no_dictionary = flg & 0x20 == 0;
    if !(method_ok && check_ok && no_dictionary) {
        return Err(FormatError::BadCompressionHeader(cmf, flg));
    }

    let mut body = Vec::new();
    DeflateDecoder::new(&compressed[2..])
        .take(MAX_BODY_SIZE as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| FormatError::Decompression(e.to_string()))?;
    if body.len() > MAX_BODY_SIZE {
        return Err(FormatError::TooLarge {
            limit: MAX_BODY_SIZE,
        });
    }
    Ok(body)
}

fn parse_grid(payload: &[u8], stats: &mut DecodeStats) -> Result<Option<DecodedGrid>, FormatError> {
    let mut r = ByteReader::new(payload);
    let version = r.u8()?;
    if !GRID_VERSIONS.contains(&version) {
        debug!(version, "Skipping grid with unsupported version");
        return Ok(None);
    }

    let grid_id = r.i64()?;
    let segment_id = r.i64()?;
    let mtime = r.i64()?;
    let coord = Coord::new(r.i32()?, r.i32()?);

    let tileset_count = r.u16()? as usize;
    let mut tilesets = Vec::with_capacity(tileset_count);
    for _ in 0..tileset_count {
        tilesets.push(Tileset {
            resource_name: r.cstr()?,
            version: r.u16()?,
            priority: r.u8()?,
        });
    }

    let mut tiles = Vec::with_capacity(GRID_SIZE);
    if tileset_count <= BYTE_INDEX_LIMIT {
        tiles.extend(r.bytes(GRID_SIZE)?.iter().map(|&b| u16::from(b)));
    } else {
        for _ in 0..GRID_SIZE {
            tiles.push(r.u16()?);
        }
    }

    let zmap = parse_heights(&mut r)?;
    let mut overlays = Vec::new();
    match zmap {
        Some(_) => {
            while !r.is_empty() {
                let resource_name = r.cstr()?;
                if resource_name.is_empty() {
                    break;
                }
                let version = r.u16()?;
                let bitmap = r.bytes(OVERLAY_BITMAP_LEN)?.to_vec();
                overlays.push(Overlay {
                    resource_name,
                    version,
                    bitmap,
                });
            }
        }
        // The height payload length is unknown, so nothing after it can be located.
        None => stats.missing_heights += 1,
    }

    Ok(Some(DecodedGrid {
        version,
        grid_id,
        segment_id,
        mtime,
        coord,
        tilesets,
        tiles,
        zmap,
        overlays,
    }))
}

/// Decodes the height field. An unknown scheme yields `None`.
fn parse_heights(r: &mut ByteReader<'_>) -> Result<Option<Vec<f32>>, FormatError> {
    let scheme = r.u8()?;
    let heights = match scheme {
        0 => vec![r.f32()?; GRID_SIZE],
        1 => {
            let step = r.f32()?;
            r.bytes(GRID_SIZE)?
                .iter()
                .map(|&b| f32::from(b) * step)
                .collect()
        }
        2 => {
            let step = r.f32()?;
            let mut out = Vec::with_capacity(GRID_SIZE);
            for _ in 0..GRID_SIZE {
                out.push(f32::from(r.u16()?) * step);
            }
            out
        }
        3 => {
            let mut out = Vec::with_capacity(GRID_SIZE);
            for _ in 0..GRID_SIZE {
                out.push(r.f32()?);
            }
            out
        }
        other => {
            debug!(scheme = other, "Unknown height scheme, dropping height field");
            return Ok(None);
        }
    };
    Ok(Some(heights))
}

fn parse_marker(payload: &[u8]) -> Result<Option<DecodedMarker>, FormatError> {
    let mut r = ByteReader::new(payload);
    let kind = r.u8()?;
    if kind != b'p' && kind != b's' {
        debug!(kind, "Skipping marker of unknown kind");
        return Ok(None);
    }
    let version = r.u8()?;
    if version != MARKER_VERSION {
        debug!(version, "Skipping marker with unsupported version");
        return Ok(None);
    }

    let segment_id = r.i64()?;
    let tile_x = r.i32()?;
    let tile_y = r.i32()?;
    let name = r.cstr()?;

    let marker = if kind == b'p' {
        let rgba = r.bytes(4)?;
        DecodedMarker::Player {
            segment_id,
            tile_x,
            tile_y,
            name,
            color: [rgba[0], rgba[1], rgba[2], rgba[3]],
        }
    } else {
        DecodedMarker::Object {
            segment_id,
            tile_x,
            tile_y,
            name,
            object_id: r.i64()?,
            resource_name: r.cstr()?,
            resource_version: r.u16()?,
        }
    };
    Ok(Some(marker))
}
