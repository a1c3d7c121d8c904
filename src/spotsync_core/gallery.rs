use crate::spotsync_core::config::Config;
use crate::spotsync_core::drive::{DriveApi, DriveFile};
use crate::spotsync_core::error::Result;
use crate::spotsync_core::folders::resolve_path;
use crate::spotsync_core::sidecar::{get_sidecar_filename, is_sidecar};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// One album (first-level folder under the gallery root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub folder: String,
    pub photos: Vec<GalleryPhoto>,
}

/// A photo entry in the gallery document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryPhoto {
    pub name: String,
    pub id: String,
    pub thumbnail_url: String,
    /// Sidecar contents, or an empty object when the photo has no readable sidecar.
    pub metadata: Map<String, Value>,
}

/// Thumbnail link for a drive file at a fixed width.
pub fn thumbnail_url(file_id: &str, width: u32) -> String {
    format!("https://drive.google.com/thumbnail?id={}&sz=w{}", file_id, width)
}

/// Build the album list for the configured gallery root.
pub fn build_gallery(api: &dyn DriveApi, config: &Config) -> Result<Vec<Album>> {
    let root_id = resolve_path(api, &config.shared_drive_id, &config.base_folder_path)?;
    let folders = api.list_folders(&root_id)?;

    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bar = ProgressBar::new(folders.len() as u64).with_style(bar_style);
    bar.set_message("Listing albums");

    let mut gallery = Vec::with_capacity(folders.len());
    for folder in folders {
        bar.set_message(folder.name.clone());
        let files = api.list_files(&folder.id)?;
        let photos = album_photos(api, &files, config.thumbnail_width);
        log::info!("Album '{}': {} photos", folder.name, photos.len());
        gallery.push(Album {
            folder: folder.name,
            photos,
        });
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(gallery)
}

/// Pair every non-sidecar file in an album listing with its sidecar metadata.
fn album_photos(api: &dyn DriveApi, files: &[DriveFile], width: u32) -> Vec<GalleryPhoto> {
    let (sidecars, photos): (Vec<&DriveFile>, Vec<&DriveFile>) =
        files.iter().partition(|f| is_sidecar(&f.name));

    photos
        .into_iter()
        .map(|photo| {
            let expected = get_sidecar_filename(&photo.name);
            let metadata = sidecars
                .iter()
                .find(|s| s.name == expected)
                .and_then(|s| api.fetch_json(&s.id))
                .and_then(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .unwrap_or_default();

            GalleryPhoto {
                name: photo.name.clone(),
                id: photo.id.clone(),
                thumbnail_url: thumbnail_url(&photo.id, width),
                metadata,
            }
        })
        .collect()
}

/// Write the gallery document as indented JSON.
pub fn write_gallery(path: &Path, gallery: &[Album]) -> Result<()> {
    let json = serde_json::to_string_pretty(gallery)?;
    fs::write(path, json)?;
    Ok(())
}
