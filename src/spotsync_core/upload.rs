use crate::spotsync_core::config::Config;
use crate::spotsync_core::drive::DriveApi;
use crate::spotsync_core::error::{Result, SpotsyncError};
use crate::spotsync_core::folders::ensure_path;
use std::path::PathBuf;

/// A photo and its sidecar bound for one dated album folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub photo: PathBuf,
    pub sidecar: PathBuf,
    /// Capture date, `YYYY-MM-DD`.
    pub date: String,
    /// Airport ICAO code.
    pub location: String,
}

/// Result of a successful upload.
#[derive(Debug)]
pub struct UploadReport {
    pub folder_name: String,
    pub folder_id: String,
    pub photo_id: String,
    pub sidecar_id: String,
}

impl UploadRequest {
    /// Album folder name: `{date}_{icao lowercased}`.
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.date, self.location.to_lowercase())
    }
}

/// Upload the photo and sidecar into `<base path>/<date>_<icao>` and make both public.
///
/// Missing folders along the way are created. Any API failure aborts the upload;
/// nothing is retried.
pub fn upload(api: &dyn DriveApi, config: &Config, request: &UploadRequest) -> Result<UploadReport> {
    for path in [&request.photo, &request.sidecar] {
        if !path.is_file() {
            return Err(SpotsyncError::PathNotFound(path.clone()));
        }
    }

    let folder_name = request.folder_name();
    let mut segments = config.base_segments();
    segments.push(folder_name.clone());
    let folder_id = ensure_path(api, &config.shared_drive_id, segments.as_slice())?;

    let mut ids = Vec::with_capacity(2);
    for path in [&request.photo, &request.sidecar] {
        let file = api.upload_file(path, &folder_id)?;
        api.share_publicly(&file.id)?;
        println!(
            "Uploaded '{}' to folder '{}' with file ID: {}",
            path.display(),
            folder_name,
            file.id
        );
        ids.push(file.id);
    }

    let sidecar_id = ids.pop().unwrap_or_default();
    let photo_id = ids.pop().unwrap_or_default();
    Ok(UploadReport {
        folder_name,
        folder_id,
        photo_id,
        sidecar_id,
    })
}
