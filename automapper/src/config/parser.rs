//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(path) = parse_path(section, "tile_root") {
            config.storage.tile_root = path;
        }
    }

    // [textures] section
    if let Some(section) = ini.section(Some("textures")) {
        if let Some(path) = parse_path(section, "directory") {
            config.textures.directory = path;
        }
    }

    // [import] section
    if let Some(section) = ini.section(Some("import")) {
        let import = &mut config.import;
        parse_positive(section, "import", "max_segments", &mut import.max_segments)?;
        parse_positive(section, "import", "render_workers", &mut import.render_workers)?;
        parse_positive(section, "import", "queue_capacity", &mut import.queue_capacity)?;
        parse_positive(section, "import", "batch_size", &mut import.batch_size)?;
        parse_positive(section, "import", "max_in_flight", &mut import.max_in_flight)?;
        parse_positive(
            section,
            "import",
            "marker_batch_size",
            &mut import.marker_batch_size,
        )?;
        if let Some(v) = section.get("cleanup") {
            import.cleanup = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "import".to_string(),
                key: "cleanup".to_string(),
                value: v.to_string(),
                reason: "must be one of: never, on_failure, on_failure_or_cancel".to_string(),
            })?;
        }
    }

    // [pyramid] section
    if let Some(section) = ini.section(Some("pyramid")) {
        parse_positive(
            section,
            "pyramid",
            "chunk_size",
            &mut config.pyramid.chunk_size,
        )?;
    }

    // [live] section
    if let Some(section) = ini.section(Some("live")) {
        if let Some(v) = section.get("allow_new_maps") {
            config.live.allow_new_maps = parse_bool(v);
        }
        if let Some(v) = section.get("reupload_minutes") {
            config.live.reupload_minutes =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "live".to_string(),
                    key: "reupload_minutes".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer (minutes)".to_string(),
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(path) = parse_path(section, "file") {
            config.logging.file = path;
        }
    }

    Ok(config)
}

/// Reads a non-empty path value, expanding a leading `~/`.
fn parse_path(section: &Properties, key: &str) -> Option<PathBuf> {
    let v = section.get(key)?.trim();
    if v.is_empty() {
        None
    } else {
        Some(expand_tilde(v))
    }
}

/// Overwrites `target` with a positive integer value when the key is set.
fn parse_positive<T>(
    section: &Properties,
    section_name: &str,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(v) = section.get(key) else {
        return Ok(());
    };
    match v.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => {
            *target = parsed;
            Ok(())
        }
        _ => Err(ConfigFileError::InvalidValue {
            section: section_name.to_string(),
            key: key.to_string(),
            value: v.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::CleanupPolicy;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_parse_all_sections() {
        let config = parse(
            r#"
[storage]
tile_root = /srv/tiles

[textures]
directory = /srv/textures

[import]
max_segments = 2
render_workers = 8
queue_capacity = 20
batch_size = 100
max_in_flight = 40
marker_batch_size = 50
cleanup = on_failure_or_cancel

[pyramid]
chunk_size = 2048

[live]
allow_new_maps = no
reupload_minutes = 0

[logging]
file = /var/log/automapper.log
"#,
        )
        .unwrap();

        assert_eq!(config.storage.tile_root, PathBuf::from("/srv/tiles"));
        assert_eq!(config.textures.directory, PathBuf::from("/srv/textures"));
        assert_eq!(config.import.max_segments, 2);
        assert_eq!(config.import.render_workers, 8);
        assert_eq!(config.import.queue_capacity, 20);
        assert_eq!(config.import.batch_size, 100);
        assert_eq!(config.import.max_in_flight, 40);
        assert_eq!(config.import.marker_batch_size, 50);
        assert_eq!(config.import.cleanup, CleanupPolicy::OnFailureOrCancel);
        assert_eq!(config.pyramid.chunk_size, 2048);
        assert!(!config.live.allow_new_maps);
        assert_eq!(config.live.reupload_minutes, 0);
        assert_eq!(config.logging.file, PathBuf::from("/var/log/automapper.log"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = parse("[import]\nrender_workers = 0\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "import");
                assert_eq!(key, "render_workers");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(parse("[pyramid]\nchunk_size = lots\n").is_err());
        assert!(parse("[live]\nreupload_minutes = -3\n").is_err());
    }

    #[test]
    fn test_unknown_cleanup_rejected() {
        let err = parse("[import]\ncleanup = sometimes\n").unwrap_err();
        assert!(err.to_string().contains("import.cleanup"));
    }

    #[test]
    fn test_empty_path_keeps_default() {
        let config = parse("[storage]\ntile_root =\n").unwrap();
        assert_eq!(config.storage.tile_root, ConfigFile::default().storage.tile_root);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
    }
}
