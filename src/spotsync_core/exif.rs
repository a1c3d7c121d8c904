use crate::spotsync_core::error::{Result, SpotsyncError};
use exiftool::ExifTool;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use time::Date;

/// Date part of an EXIF timestamp ("2024:05:21 12:30:00").
const EXIF_DATE_FORMAT: &[time::format_description::FormatItem] =
    time::macros::format_description!("[year]:[month]:[day]");

/// Date format used in sidecars, folder names and the form.
pub const TAG_DATE_FORMAT: &[time::format_description::FormatItem] =
    time::macros::format_description!("[year]-[month]-[day]");

/// Raw EXIF data from exiftool using flexible Value types for fields that vary.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct RawExifInfo {
    #[serde(default)]
    date_time_original: String,
    #[serde(default)]
    image_width: Option<Value>,
    #[serde(default)]
    image_height: Option<Value>,
}

/// Metadata embedded in a photo that the tagging form cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedMetadata {
    /// Capture date as `YYYY-MM-DD`.
    pub capture_date: Option<String>,
    /// Pixel dimensions (width, height).
    pub dimensions: Option<(u32, u32)>,
}

/// Source of embedded photo metadata.
pub trait MetadataReader {
    /// Read whatever metadata is available. Failures yield empty metadata.
    fn read(&mut self, path: &Path) -> EmbeddedMetadata;
}

/// Metadata reader backed by a long-running exiftool process.
pub struct ExifToolReader {
    exiftool: ExifTool,
}

impl ExifToolReader {
    pub fn new() -> Result<Self> {
        let exiftool = ExifTool::new().map_err(|e| SpotsyncError::Exiftool(e.to_string()))?;
        Ok(ExifToolReader { exiftool })
    }

    fn read_raw(&mut self, path: &Path) -> Result<RawExifInfo> {
        self.exiftool
            .read_metadata(path, &[])
            .map_err(|e| SpotsyncError::MetadataExtraction {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl MetadataReader for ExifToolReader {
    fn read(&mut self, path: &Path) -> EmbeddedMetadata {
        match self.read_raw(path) {
            Ok(raw) => EmbeddedMetadata {
                capture_date: normalize_exif_date(&raw.date_time_original),
                dimensions: raw
                    .image_width
                    .as_ref()
                    .and_then(value_to_u32)
                    .zip(raw.image_height.as_ref().and_then(value_to_u32)),
            },
            Err(e) => {
                log::warn!("{}", e);
                EmbeddedMetadata::default()
            }
        }
    }
}

/// Reader used when exiftool is unavailable: every photo has no embedded metadata.
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read(&mut self, _path: &Path) -> EmbeddedMetadata {
        EmbeddedMetadata::default()
    }
}

/// Convert an EXIF timestamp such as "2024:05:01 10:15:00" into "2024-05-01".
pub fn normalize_exif_date(raw: &str) -> Option<String> {
    let date_part = raw.split_whitespace().next()?;
    let date = Date::parse(date_part, EXIF_DATE_FORMAT).ok()?;
    date.format(TAG_DATE_FORMAT).ok()
}

/// Helper to extract u32 from Value (handles both string and number)
fn value_to_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|i| u32::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scale `(width, height)` down to fit inside `bounds`, preserving aspect ratio.
/// Images already inside the bounds are left alone.
pub fn fit_within(dimensions: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = dimensions;
    let (max_w, max_h) = bounds;
    if w == 0 || h == 0 || (w <= max_w && h <= max_h) {
        return (w, h);
    }

    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    let fitted_w = ((w as f64 * scale).round() as u32).max(1);
    let fitted_h = ((h as f64 * scale).round() as u32).max(1);
    (fitted_w.min(max_w), fitted_h.min(max_h))
}

/// Check if exiftool is available on the system.
pub fn exiftool_available() -> bool {
    std::process::Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
