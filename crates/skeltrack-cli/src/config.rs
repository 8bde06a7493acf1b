//! Configuration – reads `~/.skeltrack/config.toml`.
//!
//! A missing file means defaults.  Environment variables override whatever
//! the file says:
//!
//! | Variable | Config field |
//! |---|---|
//! | `SKELTRACK_CONFIG` | path of the file itself |
//! | `SKELTRACK_CAMERA_FRAME_ID` | `camera_frame_id` |
//! | `SKELTRACK_TICK_RATE_HZ` | `tick_rate_hz` (ignored unless a positive integer) |
//! | `SKELTRACK_MIDDLEWARE_CONFIG` | `middleware_config_path` |

use std::fs;
use std::path::{Path, PathBuf};

use skeltrack_types::{TrackerConfig, TrackerError};

/// Path of the config file: `$SKELTRACK_CONFIG`, else `~/.skeltrack/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SKELTRACK_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".skeltrack").join("config.toml")
}

/// Load the config from [`config_path`] and apply environment overrides.
pub fn load() -> Result<TrackerConfig, TrackerError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Read `path`.  `Ok(None)` when the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<TrackerConfig>, TrackerError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| TrackerError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| TrackerError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `SKELTRACK_*` environment overrides to `cfg`.
pub fn apply_env_overrides(cfg: &mut TrackerConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut TrackerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SKELTRACK_CAMERA_FRAME_ID") {
        cfg.camera_frame_id = v;
    }
    if let Some(v) = lookup("SKELTRACK_TICK_RATE_HZ")
        && let Ok(hz) = v.trim().parse::<u32>()
        && hz > 0
    {
        cfg.tick_rate_hz = hz;
    }
    if let Some(v) = lookup("SKELTRACK_MIDDLEWARE_CONFIG") {
        cfg.middleware_config_path = PathBuf::from(v);
    }
}

/// Write `cfg` to `path`, creating parent directories.
#[cfg(test)]
fn save_to(cfg: &TrackerConfig, path: &Path) -> Result<(), TrackerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| TrackerError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TrackerError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| TrackerError::Config(format!("failed to write {}: {e}", path.display())))
}
