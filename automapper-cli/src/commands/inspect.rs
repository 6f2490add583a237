//! Decode a map export without importing it.

use automapper::hmap::{self, DecodedMarker};
use automapper::import::DEFAULT_MAX_SEGMENTS;
use std::path::Path;

use super::read_input;
use crate::error::CliError;

/// Prints the contents of a `.hmap` file.
pub fn run(path: &Path, max_segments: Option<usize>) -> Result<(), CliError> {
    let data = read_input(path)?;
    let file = hmap::decode(&data)?;
    let stats = &file.stats;

    println!("File: {}", path.display());
    println!("  Grids:          {}", stats.grids);
    println!("  Markers:        {}", stats.markers);
    println!("  Skipped grids:  {}", stats.skipped_grids);
    println!("  Skipped marks:  {}", stats.skipped_markers);
    println!("  No height data: {}", stats.missing_heights);

    if stats.unknown_record_count() > 0 {
        println!("  Unknown records:");
        let mut kinds: Vec<_> = stats.unknown_records.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            println!("    {:<12} {}", kind, count);
        }
    }

    let players = file
        .markers
        .iter()
        .filter(|m| matches!(m, DecodedMarker::Player { .. }))
        .count();
    println!(
        "  Marker kinds:   {} player, {} object",
        players,
        file.markers.len() - players
    );

    let (kept, discarded) = file.largest_segments(max_segments.unwrap_or(DEFAULT_MAX_SEGMENTS));
    println!();
    println!("Segments:");
    for segment in &kept {
        println!("  {:>20}  {:>6} grids  kept", segment.id, segment.len());
    }
    for segment in &discarded {
        println!("  {:>20}  {:>6} grids  discarded", segment.id, segment.len());
    }

    Ok(())
}
