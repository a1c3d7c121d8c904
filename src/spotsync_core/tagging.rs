use crate::spotsync_core::error::{Result, SpotsyncError};
use crate::spotsync_core::exif::{MetadataReader, fit_within};
use crate::spotsync_core::sidecar::{Sidecar, read_sidecar, sidecar_path, write_sidecar};
use crate::spotsync_core::upload::UploadRequest;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Photo extensions picked up for tagging (lowercase).
const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// The form values for the photo being tagged.
///
/// Airport, registration and aircraft are upper-cased on every write; the date
/// is stored as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    date: String,
    airport: String,
    registration: String,
    aircraft: String,
}

impl FormFields {
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn airport(&self) -> &str {
        &self.airport
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn aircraft(&self) -> &str {
        &self.aircraft
    }

    pub fn set_date(&mut self, value: &str) {
        self.date = value.to_string();
    }

    pub fn set_airport(&mut self, value: &str) {
        self.airport = value.to_uppercase();
    }

    pub fn set_registration(&mut self, value: &str) {
        self.registration = value.to_uppercase();
    }

    pub fn set_aircraft(&mut self, value: &str) {
        self.aircraft = value.to_uppercase();
    }

    pub fn to_sidecar(&self) -> Sidecar {
        Sidecar {
            date: self.date.clone(),
            airport: self.airport.clone(),
            registration: self.registration.clone(),
            aircraft: self.aircraft.clone(),
        }
    }
}

/// Where the session is in its batch.
///
/// Only the resting states are represented. Saving and skipping are
/// transitions: both move `Loaded(i)` to `Loaded(i + 1)`, or to `Complete`
/// after the last photo. A session that has not loaded its first photo yet
/// reports `Loaded(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loaded(usize),
    Complete,
}

/// What the form shows for the current photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPhoto {
    pub path: PathBuf,
    pub name: String,
    pub position: usize,
    pub total: usize,
    /// Size the photo is displayed at, when its dimensions are known.
    pub display_size: Option<(u32, u32)>,
}

/// Outcome of the upload step of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Failed(String),
}

/// Steps the session delegates to other processes.
pub trait TaskRunner {
    /// Upload a tagged photo and its sidecar.
    fn upload(&mut self, request: &UploadRequest) -> Result<()>;

    /// Regenerate the gallery document.
    fn build_gallery(&mut self) -> Result<()>;

    /// Commit and push the working directory.
    fn publish(&mut self) -> Result<()>;
}

/// A batch tagging session over the photos in one directory.
#[derive(Debug)]
pub struct Session {
    images: Vec<PathBuf>,
    index: usize,
    destination: PathBuf,
    viewport: (u32, u32),
    fields: FormFields,
    failed_uploads: Vec<(String, String)>,
}

impl Session {
    /// Start a session over `source_dir`, moving tagged photos into `destination`.
    ///
    /// The destination directory is created if needed.
    pub fn open(source_dir: &Path, destination: &Path, viewport: (u32, u32)) -> Result<Self> {
        let images = discover_photos(source_dir)?;
        fs::create_dir_all(destination)?;
        log::info!(
            "Tagging {} photos from {} into {}",
            images.len(),
            source_dir.display(),
            destination.display()
        );

        Ok(Session {
            images,
            index: 0,
            destination: destination.to_path_buf(),
            viewport,
            fields: FormFields::default(),
            failed_uploads: Vec::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn state(&self) -> SessionState {
        if self.index < self.images.len() {
            SessionState::Loaded(self.index)
        } else {
            SessionState::Complete
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FormFields {
        &mut self.fields
    }

    /// Photos whose upload failed during this session, with the reason.
    pub fn failed_uploads(&self) -> &[(String, String)] {
        &self.failed_uploads
    }

    fn current_path(&self) -> Option<&PathBuf> {
        self.images.get(self.index)
    }

    /// Load the current photo into the form.
    ///
    /// The embedded capture date wins over the sidecar date; the other fields come
    /// from the sidecar when there is one.
    pub fn load(&mut self, reader: &mut dyn MetadataReader) -> Option<LoadedPhoto> {
        let path = self.current_path()?.clone();
        let sidecar = read_sidecar(&path).unwrap_or_default();
        let embedded = reader.read(&path);

        let mut fields = FormFields::default();
        fields.set_date(embedded.capture_date.as_deref().unwrap_or(&sidecar.date));
        fields.set_airport(&sidecar.airport);
        fields.set_registration(&sidecar.registration);
        fields.set_aircraft(&sidecar.aircraft);
        self.fields = fields;

        Some(LoadedPhoto {
            name: file_name(&path),
            path,
            position: self.index + 1,
            total: self.images.len(),
            display_size: embedded.dimensions.map(|d| fit_within(d, self.viewport)),
        })
    }

    /// Write the sidecar, move photo and sidecar to the destination, upload them and advance.
    ///
    /// Filesystem failures abort the save. An upload failure does not: it is
    /// recorded and returned so the caller can report it.
    pub fn save(&mut self, tasks: &mut dyn TaskRunner) -> Result<UploadOutcome> {
        let photo = self
            .current_path()
            .cloned()
            .ok_or_else(|| SpotsyncError::Argument("no photo is loaded".to_string()))?;
        let sidecar = self.fields.to_sidecar();

        write_sidecar(&photo, &sidecar)?;

        let name = file_name(&photo);
        let moved_photo = self.destination.join(&name);
        move_file(&photo, &moved_photo)?;

        let source_sidecar = sidecar_path(&photo);
        let moved_sidecar = sidecar_path(&moved_photo);
        if source_sidecar.exists() {
            move_file(&source_sidecar, &moved_sidecar)?;
        }

        let request = UploadRequest {
            photo: moved_photo,
            sidecar: moved_sidecar,
            date: sidecar.date,
            location: sidecar.airport,
        };
        let outcome = match tasks.upload(&request) {
            Ok(()) => UploadOutcome::Uploaded,
            Err(e) => {
                log::error!("Upload of {} failed: {}", name, e);
                self.failed_uploads.push((name, e.to_string()));
                UploadOutcome::Failed(e.to_string())
            }
        };

        self.index += 1;
        Ok(outcome)
    }

    /// Leave the current photo untouched and advance.
    pub fn skip(&mut self) {
        if self.index < self.images.len() {
            log::debug!("Skipped {}", self.images[self.index].display());
            self.index += 1;
        }
    }

    /// Regenerate the gallery, then commit and push.
    pub fn complete(&self, tasks: &mut dyn TaskRunner) -> Result<()> {
        tasks.build_gallery()?;
        tasks.publish()
    }
}

/// Tagged photos go to a sibling of the source directory.
///
/// The source is resolved first so that `.` and `..` name their real parent.
pub fn destination_for(source_dir: &Path, tagged_dir_name: &str) -> Result<PathBuf> {
    let resolved = fs::canonicalize(source_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SpotsyncError::PathNotFound(source_dir.to_path_buf()),
        _ => SpotsyncError::Io(e),
    })?;
    let parent = resolved.parent().unwrap_or(&resolved);
    Ok(parent.join(tagged_dir_name))
}

/// JPEG files directly inside `dir`, sorted by file name.
pub fn discover_photos(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(SpotsyncError::PathNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(SpotsyncError::NotADirectory(dir.to_path_buf()));
    }

    let mut photos = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        // Symlinked photos count; `entry.file_type()` would not follow them.
        if entry.path().is_file() && is_photo(entry.path()) {
            photos.push(entry.into_path());
        }
    }
    Ok(photos)
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PHOTO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move a file, falling back to copy + remove when a rename is not possible
/// (e.g. across filesystems).
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        log::debug!("Moved {} -> {}", from.display(), to.display());
        return Ok(());
    }

    fs::copy(from, to)
        .and_then(|_| fs::remove_file(from))
        .map_err(|error| SpotsyncError::MoveFailed {
            source_path: from.to_path_buf(),
            destination: to.to_path_buf(),
            error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotsync_core::exif::EmbeddedMetadata;
    use assert_fs::prelude::*;

    struct StubReader(Option<&'static str>);

    impl MetadataReader for StubReader {
        fn read(&mut self, _path: &Path) -> EmbeddedMetadata {
            EmbeddedMetadata {
                capture_date: self.0.map(str::to_string),
                dimensions: Some((6000, 4000)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingTasks {
        uploads: Vec<UploadRequest>,
        fail_upload: bool,
        fail_gallery: bool,
        steps: Vec<&'static str>,
    }

    impl TaskRunner for RecordingTasks {
        fn upload(&mut self, request: &UploadRequest) -> Result<()> {
            self.uploads.push(request.clone());
            if self.fail_upload {
                return Err(SpotsyncError::Task {
                    step: "upload".to_string(),
                    detail: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }

        fn build_gallery(&mut self) -> Result<()> {
            self.steps.push("gallery");
            if self.fail_gallery {
                return Err(SpotsyncError::Task {
                    step: "gallery".to_string(),
                    detail: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }

        fn publish(&mut self) -> Result<()> {
            self.steps.push("publish");
            Ok(())
        }
    }

    fn source_with(temp: &assert_fs::TempDir, files: &[&str]) -> PathBuf {
        let source = temp.child("incoming");
        source.create_dir_all().unwrap();
        for f in files {
            source.child(f).write_binary(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        }
        source.path().to_path_buf()
    }

    #[test]
    fn test_fields_upper_case_on_write() {
        let mut fields = FormFields::default();
        fields.set_airport("ktpa");
        fields.set_registration("n12345");
        fields.set_aircraft("c172");
        fields.set_date("2024-05-01");
        assert_eq!(fields.airport(), "KTPA");
        assert_eq!(fields.registration(), "N12345");
        assert_eq!(fields.aircraft(), "C172");
        assert_eq!(fields.date(), "2024-05-01");
    }

    #[test]
    fn test_discover_photos_filters_and_sorts() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["c.JPG", "a.jpg", "b.jpeg", "notes.txt", "a.json"]);
        temp.child("incoming/sub").create_dir_all().unwrap();
        temp.child("incoming/sub/d.jpg").touch().unwrap();

        let names: Vec<String> = discover_photos(&source)
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpeg", "c.JPG"]);
    }

    #[test]
    fn test_discover_photos_missing_dir() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(matches!(
            discover_photos(&temp.path().join("nope")),
            Err(SpotsyncError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_destination_is_sibling_of_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &[]);
        let root = temp.path().canonicalize().unwrap();
        assert_eq!(
            destination_for(&source, "tagged_photos").unwrap(),
            root.join("tagged_photos")
        );
        assert_eq!(
            destination_for(&source.join("..").join("incoming"), "tagged_photos").unwrap(),
            root.join("tagged_photos")
        );
    }

    #[test]
    fn test_destination_for_current_dir_is_outside_it() {
        let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
        let destination = destination_for(Path::new("."), "tagged_photos").unwrap();
        assert_eq!(destination.parent(), cwd.parent());
        assert!(!destination.starts_with(&cwd));
    }

    #[test]
    fn test_destination_for_missing_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(matches!(
            destination_for(&temp.path().join("nope"), "tagged_photos"),
            Err(SpotsyncError::PathNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_photos_follows_symlinks() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg"]);
        temp.child("elsewhere.jpg").write_binary(&[0xFF, 0xD8]).unwrap();
        std::os::unix::fs::symlink(temp.path().join("elsewhere.jpg"), source.join("b.jpg"))
            .unwrap();

        let names: Vec<String> = discover_photos(&source)
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_state_walks_through_batch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg", "b.jpg"]);
        let mut session =
            Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        let mut tasks = RecordingTasks::default();

        assert_eq!(session.state(), SessionState::Loaded(0));
        session.load(&mut StubReader(Some("2024-05-01"))).unwrap();
        session.save(&mut tasks).unwrap();
        assert_eq!(session.state(), SessionState::Loaded(1));
        session.skip();
        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.load(&mut StubReader(None)).is_none());
    }

    #[test]
    fn test_embedded_date_wins_over_sidecar_date() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg"]);
        temp.child("incoming/a.json")
            .write_str(r#"{"date": "2023-01-01", "airport": "ktpa", "registration": "N1", "aircraft": "B738"}"#)
            .unwrap();

        let mut session =
            Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        let loaded = session.load(&mut StubReader(Some("2024-05-01"))).unwrap();

        assert_eq!(loaded.name, "a.jpg");
        assert_eq!(loaded.display_size, Some((1200, 800)));
        assert_eq!(session.fields().date(), "2024-05-01");
        assert_eq!(session.fields().airport(), "KTPA");
        assert_eq!(session.fields().aircraft(), "B738");
    }

    #[test]
    fn test_sidecar_date_used_without_embedded_date() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg"]);
        temp.child("incoming/a.json").write_str(r#"{"date": "2023-01-01"}"#).unwrap();

        let mut session =
            Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        session.load(&mut StubReader(None)).unwrap();
        assert_eq!(session.fields().date(), "2023-01-01");
        assert_eq!(session.fields().airport(), "");
    }

    #[test]
    fn test_save_moves_photo_and_sidecar_then_uploads() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg"]);
        let destination = temp.path().join("tagged_photos");

        let mut session = Session::open(&source, &destination, (1200, 900)).unwrap();
        session.load(&mut StubReader(Some("2024-05-01"))).unwrap();
        assert_eq!(session.fields().airport(), "");
        assert_eq!(session.fields().registration(), "");

        session.fields_mut().set_airport("KJFK");
        session.fields_mut().set_registration("N12345");
        session.fields_mut().set_aircraft("C172");

        let mut tasks = RecordingTasks::default();
        let outcome = session.save(&mut tasks).unwrap();
        assert_eq!(outcome, UploadOutcome::Uploaded);

        temp.child("tagged_photos/a.jpg").assert(predicates::path::exists());
        temp.child("incoming/a.jpg").assert(predicates::path::missing());
        temp.child("incoming/a.json").assert(predicates::path::missing());

        let written: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(destination.join("a.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "date": "2024-05-01",
                "airport": "KJFK",
                "registration": "N12345",
                "aircraft": "C172"
            })
        );

        assert_eq!(
            tasks.uploads,
            vec![UploadRequest {
                photo: destination.join("a.jpg"),
                sidecar: destination.join("a.json"),
                date: "2024-05-01".to_string(),
                location: "KJFK".to_string(),
            }]
        );
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn test_failed_upload_is_reported_and_session_advances() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg", "b.jpg"]);

        let mut session =
            Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        session.load(&mut StubReader(Some("2024-05-01"))).unwrap();

        let mut tasks = RecordingTasks {
            fail_upload: true,
            ..Default::default()
        };
        let outcome = session.save(&mut tasks).unwrap();
        assert!(matches!(outcome, UploadOutcome::Failed(_)));
        assert_eq!(session.failed_uploads().len(), 1);
        assert_eq!(session.failed_uploads()[0].0, "a.jpg");
        assert_eq!(session.state(), SessionState::Loaded(1));
    }

    #[test]
    fn test_skip_leaves_files_alone() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &["a.jpg", "b.jpg"]);

        let mut session =
            Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        assert_eq!(session.state(), SessionState::Loaded(0));
        session.skip();
        assert_eq!(session.state(), SessionState::Loaded(1));
        session.skip();
        assert_eq!(session.state(), SessionState::Complete);
        session.skip();
        assert_eq!(session.state(), SessionState::Complete);

        temp.child("incoming/a.jpg").assert(predicates::path::exists());
        temp.child("incoming/a.json").assert(predicates::path::missing());

        let mut tasks = RecordingTasks::default();
        assert!(session.save(&mut tasks).is_err());
        assert!(tasks.uploads.is_empty());
    }

    #[test]
    fn test_complete_stops_at_failing_step() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_with(&temp, &[]);
        let session = Session::open(&source, &temp.path().join("tagged"), (1200, 900)).unwrap();
        assert!(session.is_empty());

        let mut ok = RecordingTasks::default();
        session.complete(&mut ok).unwrap();
        assert_eq!(ok.steps, vec!["gallery", "publish"]);

        let mut failing = RecordingTasks {
            fail_gallery: true,
            ..Default::default()
        };
        let err = session.complete(&mut failing).unwrap_err();
        assert!(err.to_string().starts_with("gallery failed"));
        assert_eq!(failing.steps, vec!["gallery"]);
    }
}
