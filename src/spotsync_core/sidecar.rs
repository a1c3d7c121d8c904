use crate::spotsync_core::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar file extension (lowercase).
/// Sidecars share the base name of their photo and move/upload together with it.
pub const SIDECAR_EXTENSION: &str = "json";

/// Tag metadata stored next to a photo.
///
/// All fields are plain strings; an empty string means the value is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sidecar {
    pub date: String,
    pub airport: String,
    pub registration: String,
    pub aircraft: String,
}

/// Get the sidecar path for a photo: same directory and stem, `.json` extension.
///
/// Example: "/photos/IMG_001.jpg" -> "/photos/IMG_001.json"
pub fn sidecar_path(photo_path: &Path) -> PathBuf {
    photo_path.with_extension(SIDECAR_EXTENSION)
}

/// Get the expected sidecar filename for a photo filename.
///
/// Example: get_sidecar_filename("photo.jpg") -> "photo.json"
pub fn get_sidecar_filename(photo_filename: &str) -> String {
    format!("{}.{}", file_stem(photo_filename), SIDECAR_EXTENSION)
}

/// Check if a file name is a sidecar based on its extension.
pub fn is_sidecar(name: &str) -> bool {
    name.ends_with(&format!(".{}", SIDECAR_EXTENSION))
}

/// Base name of a file with its last extension stripped.
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Read the sidecar for a photo, if one exists.
///
/// An unreadable or malformed sidecar is logged and treated as absent.
pub fn read_sidecar(photo_path: &Path) -> Option<Sidecar> {
    let path = sidecar_path(photo_path);
    if !path.is_file() {
        return None;
    }

    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str::<Sidecar>(&s).map_err(|e| e.to_string()));

    match parsed {
        Ok(sidecar) => Some(sidecar),
        Err(e) => {
            log::warn!("Sidecar read error for {}: {}", path.display(), e);
            None
        }
    }
}

/// Write (or overwrite) the sidecar for a photo and return its path.
pub fn write_sidecar(photo_path: &Path, sidecar: &Sidecar) -> Result<PathBuf> {
    let path = sidecar_path(photo_path);
    let json = serde_json::to_string_pretty(sidecar)?;
    fs::write(&path, json)?;
    log::debug!("Wrote sidecar {}", path.display());
    Ok(path)
}
