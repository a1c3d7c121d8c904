use crate::spotsync_core::error::{Result, SpotsyncError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SHARED_DRIVE_ID: &str = "0AKbbJo0Vmj08Uk9PVA";
pub const DEFAULT_BASE_FOLDER_PATH: &str = "photography/website";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Runtime configuration shared by every subcommand.
///
/// Every field has a default so a missing or partial `spotsync.json` is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shared_drive_id: String,
    /// Slash-separated folder path inside the shared drive that holds the albums.
    pub base_folder_path: String,
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
    pub gallery_output: PathBuf,
    pub thumbnail_width: u32,
    /// Name of the directory, next to the source directory, that receives tagged photos.
    pub tagged_dir_name: String,
    /// Bounding box (width, height) that photos are fitted into for display.
    pub viewport: (u32, u32),
    pub scope: String,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub repo_dir: PathBuf,
    pub remote: String,
    pub branch: String,
    pub message: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            shared_drive_id: DEFAULT_SHARED_DRIVE_ID.to_string(),
            base_folder_path: DEFAULT_BASE_FOLDER_PATH.to_string(),
            client_secret_file: PathBuf::from("client_secret.json"),
            token_file: PathBuf::from("token.json"),
            gallery_output: PathBuf::from("gallery.json"),
            thumbnail_width: 100,
            tagged_dir_name: "tagged_photos".to_string(),
            viewport: (1200, 900),
            scope: DRIVE_SCOPE.to_string(),
            git: GitConfig::default(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            message: "Update gallery".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| SpotsyncError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Base folder path split into its non-empty segments.
    pub fn base_segments(&self) -> Vec<String> {
        split_path(&self.base_folder_path)
    }
}

/// Split a slash-separated drive path into segments, ignoring empty ones.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
