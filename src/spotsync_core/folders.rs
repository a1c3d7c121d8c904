use crate::spotsync_core::config::split_path;
use crate::spotsync_core::drive::DriveApi;
use crate::spotsync_core::error::{Result, SpotsyncError};

/// Resolve an existing folder path under `root_id`, one segment at a time.
///
/// Each segment must match a folder name exactly; the first match wins. A missing
/// segment is a [`SpotsyncError::PathResolution`]. Nothing is created.
pub fn resolve_path(api: &dyn DriveApi, root_id: &str, path: &str) -> Result<String> {
    let mut parent_id = root_id.to_string();

    for segment in split_path(path) {
        let folders = api.list_folders(&parent_id)?;
        let found = folders
            .into_iter()
            .find(|f| f.name == segment)
            .ok_or_else(|| SpotsyncError::PathResolution {
                segment: segment.clone(),
                path: path.to_string(),
            })?;
        log::debug!("Resolved '{}' -> {}", segment, found.id);
        parent_id = found.id;
    }

    Ok(parent_id)
}

/// Find the folder `name` under `parent_id`, creating it if there is none.
///
/// Not safe against concurrent callers: two runs that both miss the lookup will
/// both create a folder with the same name.
pub fn find_or_create_folder(api: &dyn DriveApi, name: &str, parent_id: &str) -> Result<String> {
    let existing = api.find_folders(parent_id, name)?;
    if let Some(folder) = existing.into_iter().next() {
        log::debug!("Found folder '{}' ({})", name, folder.id);
        return Ok(folder.id);
    }

    let created = api.create_folder(name, parent_id)?;
    Ok(created.id)
}

/// Walk `segments` from `root_id`, creating any folder that does not exist yet.
pub fn ensure_path<S: AsRef<str>>(api: &dyn DriveApi, root_id: &str, segments: &[S]) -> Result<String> {
    let mut parent_id = root_id.to_string();
    for segment in segments {
        parent_id = find_or_create_folder(api, segment.as_ref(), &parent_id)?;
    }
    Ok(parent_id)
}
