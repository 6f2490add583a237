//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[storage]
; Root directory for rendered tiles. Files are laid out as
;   <tile_root>/tenants/<tenant>/<map>/<zoom>/<x>_<y>.png
tile_root = {}

[textures]
; Directory holding tileset textures as <resource name>.png,
; e.g. gfx/tiles/grass -> <directory>/gfx/tiles/grass.png
directory = {}

[import]
; Largest segments imported from one .hmap file (default: 3)
max_segments = {}
; Concurrent grid render workers (default: 4)
render_workers = {}
; Rendered grids buffered before the writer (default: 50)
queue_capacity = {}
; Grids per database flush (default: 500)
batch_size = {}
; Render tasks spawned per dispatch batch (default: 100)
max_in_flight = {}
; Markers per upload call (default: 500)
marker_batch_size = {}
; Remove written data when an import stops early:
;   never                - keep partial results
;   on_failure           - clean up after errors (default)
;   on_failure_or_cancel - clean up after errors and cancellation
cleanup = {}

[pyramid]
; Base tiles composed together per chunk (default: 10000)
chunk_size = {}

[live]
; Create a new map when a live window matches no known grid (default: true)
allow_new_maps = {}
; Minutes before a client is asked for a fresh grid image (default: 30)
reupload_minutes = {}

[logging]
; Log file, cleared on start
file = {}
"#,
        path_to_string(&config.storage.tile_root),
        path_to_string(&config.textures.directory),
        config.import.max_segments,
        config.import.render_workers,
        config.import.queue_capacity,
        config.import.batch_size,
        config.import.max_in_flight,
        config.import.marker_batch_size,
        config.import.cleanup,
        config.pyramid.chunk_size,
        config.live.allow_new_maps,
        config.live.reupload_minutes,
        path_to_string(&config.logging.file),
    )
}

impl ConfigFile {
    /// Renders the configuration as a commented INI document.
    pub fn to_ini_string(&self) -> String {
        to_config_string(self)
    }
}

fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_has_every_section() {
        let content = to_config_string(&ConfigFile::default());
        for section in [
            "[storage]",
            "[textures]",
            "[import]",
            "[pyramid]",
            "[live]",
            "[logging]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
        assert!(content.contains("cleanup = on_failure\n"));
        assert!(content.contains("allow_new_maps = true"));
    }

    #[test]
    fn test_output_parses_back() {
        let content = to_config_string(&ConfigFile::default());
        let ini = ini::Ini::load_from_str(&content).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();
        assert_eq!(parsed, ConfigFile::default());
    }
}
