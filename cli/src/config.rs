use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::ffi::OsString;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = resolve_data_dir(std::env::var_os("CRUMB_DATA_DIR"))?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("crumb.db");

        Ok(Config { db_path, data_dir })
    }
}

/// The data directory: `CRUMB_DATA_DIR` when set and non-empty, otherwise
/// the platform data dir.
fn resolve_data_dir(override_dir: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let proj_dirs =
        ProjectDirs::from("", "", "crumb").context("Could not determine home directory")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}
