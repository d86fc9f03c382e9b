//! Named versions: each one remembers which resources were shuffled.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::Catalog;
use crate::{Result, ShufflerError};

/// Name reserved for the untouched game data.
pub const ORIGINAL_VERSION: &str = "original";

pub const ENABLED_RESOURCES_FILE: &str = "enabled_resources.txt";

fn check_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\']);
    if invalid {
        return Err(ShufflerError::InvalidVersionName(name.to_string()));
    }
    Ok(())
}

fn artifact_path(dir: &Path, name: &str) -> Result<PathBuf> {
    check_name(name)?;
    Ok(dir.join(name).join(ENABLED_RESOURCES_FILE))
}

/// Write the enabled resource names as one space-separated line.
pub fn save_enabled_resources(dir: &Path, name: &str, catalog: &Catalog) -> Result<PathBuf> {
    let path = artifact_path(dir, name)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, catalog.enabled_names().join(" "))?;
    info!("Saved enabled resources of version '{name}' to {}", path.display());
    Ok(path)
}

pub fn load_enabled_resources(dir: &Path, name: &str) -> Result<Vec<String>> {
    let path = artifact_path(dir, name)?;
    if !path.is_file() {
        return Err(ShufflerError::MissingVersion(name.to_string()));
    }
    let text = fs::read_to_string(&path)?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

/// Saved versions, `original` first and the rest by name.
pub fn list_versions(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    let mut has_original = false;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ORIGINAL_VERSION {
            has_original = true;
        } else {
            names.push(name);
        }
    }
    names.sort();
    if has_original {
        names.insert(0, ORIGINAL_VERSION.to_string());
    }
    info!("Loaded {} versions", names.len());
    Ok(names)
}
