//! Configuration loading for the roomsync CLI.

use anyhow::{Context, Result};
use roomsync_client::ProviderConfig;
use std::path::Path;

/// Room used when no config file is given.
pub const DEFAULT_ROOM: &str = "simulation";

/// Load provider settings from `path`, or defaults when absent.
pub fn load(path: Option<&Path>) -> Result<ProviderConfig> {
    let config = match path {
        Some(path) => ProviderConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ProviderConfig::new(DEFAULT_ROOM),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let config = load(None).unwrap();
        assert_eq!(config.room_id, DEFAULT_ROOM);
        assert_eq!(config.max_batch, 100);
    }

    #[test]
    fn reads_room_and_tuning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomsync.toml");
        std::fs::write(
            &path,
            "[room]\nid = \"city-7\"\n\n[tuning]\nflush_interval_ms = 50\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.room_id, "city-7");
        assert_eq!(config.flush_interval, Duration::from_millis(50));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.toml"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomsync.toml");
        std::fs::write(&path, "[room]\nid = \"x\"\n\n[tuning]\nmax_batch = 0\n").unwrap();

        assert!(load(Some(&path)).is_err());
    }
}
