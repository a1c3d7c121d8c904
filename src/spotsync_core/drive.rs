//! Shared-drive access.
//!
//! [`DriveApi`] is the seam between the pipeline and the storage provider: the
//! folder resolver, uploader and gallery builder only ever talk to this trait.
//! [`DriveClient`] implements it against Drive v3 with a bearer token; tests use
//! the generated `MockDriveApi`.

use crate::spotsync_core::auth::AccessToken;
use crate::spotsync_core::error::{Result, SpotsyncError};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs::File;
use std::path::Path;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const GOOGLE_APIS_URL: &str = "https://www.googleapis.com";

/// A file or folder in the drive, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

impl DriveFile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DriveFile {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Operations the pipeline needs from the storage provider.
#[cfg_attr(test, mockall::automock)]
pub trait DriveApi {
    /// All non-trashed folders directly under `parent_id`.
    fn list_folders(&self, parent_id: &str) -> Result<Vec<DriveFile>>;

    /// Non-trashed folders under `parent_id` named exactly `name`.
    fn find_folders(&self, parent_id: &str, name: &str) -> Result<Vec<DriveFile>>;

    /// All non-trashed files and folders directly under `parent_id`.
    fn list_files(&self, parent_id: &str) -> Result<Vec<DriveFile>>;

    /// Create a folder and return it.
    fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile>;

    /// Upload a local file into `parent_id`, keeping its file name.
    fn upload_file(&self, path: &Path, parent_id: &str) -> Result<DriveFile>;

    /// Grant "anyone with the link" read access.
    fn share_publicly(&self, file_id: &str) -> Result<()>;

    /// Download a file and parse it as JSON. `None` when the fetch fails or is not JSON.
    fn fetch_json(&self, file_id: &str) -> Option<Value>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Drive v3 client scoped to one shared drive.
pub struct DriveClient {
    http: Client,
    token: AccessToken,
    drive_id: String,
    files_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new(token: AccessToken, drive_id: impl Into<String>) -> Self {
        Self::with_base_url(token, drive_id, GOOGLE_APIS_URL)
    }

    /// Client against another API host, e.g. a local stand-in.
    pub fn with_base_url(token: AccessToken, drive_id: impl Into<String>, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        DriveClient {
            http: Client::new(),
            token,
            drive_id: drive_id.into(),
            files_url: format!("{}/drive/v3/files", base_url),
            upload_url: format!("{}/upload/drive/v3/files", base_url),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.secret())
    }

    /// Run a files.list query, following pagination.
    fn query(&self, q: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", q.to_string()),
                ("corpora", "drive".to_string()),
                ("driveId", self.drive_id.clone()),
                ("includeItemsFromAllDrives", "true".to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("fields", "nextPageToken,files(id,name)".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response = self.authorized(self.http.get(&self.files_url).query(&params)).send()?;
            let page: FileList = check(response)?.json()?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::debug!("Query `{}` returned {} entries", q, files.len());
        Ok(files)
    }

    /// Open a resumable upload session and return its URI.
    fn start_resumable(&self, name: &str, parent_id: &str, mime: &str, len: u64) -> Result<String> {
        let response = self
            .authorized(self.http.post(&self.upload_url))
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true"), ("fields", "id,name")])
            .header("X-Upload-Content-Type", mime)
            .header("X-Upload-Content-Length", len.to_string())
            .json(&json!({ "name": name, "parents": [parent_id] }))
            .send()?;

        let response = check(response)?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| SpotsyncError::Api {
                status: response.status().as_u16(),
                body: "resumable upload session returned no Location header".to_string(),
            })
    }
}

impl DriveApi for DriveClient {
    fn list_folders(&self, parent_id: &str) -> Result<Vec<DriveFile>> {
        self.query(&format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            escape_query(parent_id),
            FOLDER_MIME_TYPE
        ))
    }

    fn find_folders(&self, parent_id: &str, name: &str) -> Result<Vec<DriveFile>> {
        self.query(&format!(
            "'{}' in parents and name='{}' and mimeType='{}' and trashed=false",
            escape_query(parent_id),
            escape_query(name),
            FOLDER_MIME_TYPE
        ))
    }

    fn list_files(&self, parent_id: &str) -> Result<Vec<DriveFile>> {
        self.query(&format!("'{}' in parents and trashed=false", escape_query(parent_id)))
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile> {
        let response = self
            .authorized(self.http.post(&self.files_url))
            .query(&[("supportsAllDrives", "true"), ("fields", "id,name")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()?;

        let folder: DriveFile = check(response)?.json()?;
        log::info!("Created folder '{}' ({}) under {}", folder.name, folder.id, parent_id);
        Ok(folder)
    }

    fn upload_file(&self, path: &Path, parent_id: &str) -> Result<DriveFile> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SpotsyncError::Argument(format!("not a file path: {}", path.display())))?;
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mime = guess_mime(path);

        let session = self.start_resumable(name, parent_id, mime, len)?;
        let response = self
            .authorized(self.http.put(&session))
            .header(CONTENT_TYPE, mime)
            .body(Body::sized(file, len))
            .send()?;

        let uploaded: DriveFile = check(response)?.json()?;
        log::debug!("Uploaded {} as {}", path.display(), uploaded.id);
        Ok(uploaded)
    }

    fn share_publicly(&self, file_id: &str) -> Result<()> {
        let response = self
            .authorized(self.http.post(format!("{}/{}/permissions", self.files_url, file_id)))
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()?;
        check(response)?;
        Ok(())
    }

    fn fetch_json(&self, file_id: &str) -> Option<Value> {
        let response = self
            .authorized(self.http.get(format!("{}/{}", self.files_url, file_id)))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send();

        match response {
            Ok(r) if r.status().is_success() => match r.json() {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Sidecar {} is not valid JSON: {}", file_id, e);
                    None
                }
            },
            Ok(r) => {
                log::warn!("Fetching sidecar {} returned {}", file_id, r.status());
                None
            }
            Err(e) => {
                log::warn!("Fetching sidecar {} failed: {}", file_id, e);
                None
            }
        }
    }
}

/// Turn a non-success response into an [`SpotsyncError::Api`].
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(SpotsyncError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// MIME type for an upload, from its extension.
pub fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
