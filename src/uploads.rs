//! Files queued for a fiber or wireless filing, and the forms sent with them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::backend::{FilePart, FilingSubmission};

/// Largest single file accepted into the queue.
pub const MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files queued")]
    Empty,
    #[error("{0} is already queued")]
    Duplicate(PathBuf),
    #[error("{path} is {size} bytes, above the {max} byte limit")]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilingKind {
    Fiber,
    Wireless,
}

impl FilingKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fiber => "Fiber",
            Self::Wireless => "Wireless",
        }
    }
}

/// Fields shared by both filing kinds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilingCommon {
    pub provider_id: String,
    /// `YYYY-MM`, the end of the reporting period.
    pub filing_period: String,
    pub technology_code: String,
    pub max_download_mbps: u32,
    pub max_upload_mbps: u32,
    pub low_latency: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FiberFilingForm {
    pub common: FilingCommon,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WirelessFilingForm {
    pub common: FilingCommon,
    /// Antenna height above ground, meters.
    pub antenna_height_m: f64,
    /// Coverage radius, kilometers.
    pub coverage_radius_km: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilingForm {
    Fiber(FiberFilingForm),
    Wireless(WirelessFilingForm),
}

impl FilingForm {
    pub fn kind(&self) -> FilingKind {
        match self {
            Self::Fiber(_) => FilingKind::Fiber,
            Self::Wireless(_) => FilingKind::Wireless,
        }
    }

    pub fn common(&self) -> &FilingCommon {
        match self {
            Self::Fiber(form) => &form.common,
            Self::Wireless(form) => &form.common,
        }
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        let common = self.common();
        if common.provider_id.trim().is_empty() {
            return Err(UploadError::MissingField("provider_id"));
        }
        if !is_filing_period(common.filing_period.trim()) {
            return Err(UploadError::InvalidField {
                field: "filing_period",
                reason: "expected YYYY-MM".to_string(),
            });
        }
        if common.technology_code.trim().is_empty() {
            return Err(UploadError::MissingField("technology_code"));
        }
        if let Self::Wireless(form) = self {
            if !(form.antenna_height_m.is_finite() && form.antenna_height_m > 0.0) {
                return Err(UploadError::InvalidField {
                    field: "antenna_height_m",
                    reason: "must be positive".to_string(),
                });
            }
            if !(form.coverage_radius_km.is_finite() && form.coverage_radius_km > 0.0) {
                return Err(UploadError::InvalidField {
                    field: "coverage_radius_km",
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(String, String)> {
        let common = self.common();
        let mut fields = vec![
            ("provider_id".to_string(), common.provider_id.trim().to_string()),
            ("filing_period".to_string(), common.filing_period.trim().to_string()),
            ("technology_code".to_string(), common.technology_code.trim().to_string()),
            ("max_download_mbps".to_string(), common.max_download_mbps.to_string()),
            ("max_upload_mbps".to_string(), common.max_upload_mbps.to_string()),
            ("low_latency".to_string(), common.low_latency.to_string()),
        ];
        if let Self::Wireless(form) = self {
            fields.push(("antenna_height_m".to_string(), form.antenna_height_m.to_string()));
            fields.push(("coverage_radius_km".to_string(), form.coverage_radius_km.to_string()));
        }
        fields
    }
}

fn is_filing_period(value: &str) -> bool {
    let Some((year, month)) = value.split_once('-') else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|ch| ch.is_ascii_digit())
        && month.parse::<u8>().is_ok_and(|month| (1..=12).contains(&month))
}

/// A file waiting to be uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadItem {
    pub id: Uuid,
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

impl UploadItem {
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }
}

/// Files picked for the next filing submission.
#[derive(Debug, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.size_bytes).sum()
    }

    pub fn push_path(&mut self, path: impl Into<PathBuf>) -> Result<Uuid, UploadError> {
        let path = path.into();
        if self.items.iter().any(|item| item.path == path) {
            return Err(UploadError::Duplicate(path));
        }
        let metadata = fs::metadata(&path).map_err(|source| UploadError::Read {
            path: path.clone(),
            source,
        })?;
        if metadata.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                path,
                size: metadata.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let id = Uuid::new_v4();
        self.items.push(UploadItem {
            id,
            path,
            file_name,
            size_bytes: metadata.len(),
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Validate `form` and read every queued file into one submission.
    pub fn build_submission(&self, form: &FilingForm) -> Result<FilingSubmission, UploadError> {
        form.validate()?;
        if self.items.is_empty() {
            return Err(UploadError::Empty);
        }
        let mut submission = FilingSubmission::default();
        for (name, value) in form.fields() {
            submission = submission.field(name, value);
        }
        for item in &self.items {
            let bytes = fs::read(&item.path).map_err(|source| UploadError::Read {
                path: item.path.clone(),
                source,
            })?;
            submission = submission.file(FilePart {
                file_name: item.file_name.clone(),
                content_type: item.content_type().to_string(),
                bytes,
            });
        }
        info!(
            kind = form.kind().label(),
            files = self.items.len(),
            bytes = self.total_bytes(),
            "Prepared filing submission"
        );
        Ok(submission)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => "text/csv",
        "zip" => "application/zip",
        "geojson" => "application/geo+json",
        "json" => "application/json",
        "kml" => "application/vnd.google-earth.kml+xml",
        "gpkg" => "application/geopackage+sqlite3",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber_form() -> FilingForm {
        FilingForm::Fiber(FiberFilingForm {
            common: FilingCommon {
                provider_id: "130077".to_string(),
                filing_period: "2024-06".to_string(),
                technology_code: "50".to_string(),
                max_download_mbps: 1000,
                max_upload_mbps: 1000,
                low_latency: true,
            },
        })
    }

    #[test]
    fn queue_rejects_duplicates_and_removes_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.csv");
        fs::write(&path, "id,lat,lon\n").unwrap();
        let mut queue = UploadQueue::new();

        let id = queue.push_path(&path).unwrap();
        assert!(matches!(queue.push_path(&path), Err(UploadError::Duplicate(_))));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items()[0].file_name, "fabric.csv");
        assert_eq!(queue.items()[0].content_type(), "text/csv");
        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        assert!(queue.is_empty());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = UploadQueue::new();
        assert!(matches!(
            queue.push_path(dir.path().join("nope.zip")),
            Err(UploadError::Read { .. })
        ));
    }

    #[test]
    fn submission_carries_fields_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.zip");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let mut queue = UploadQueue::new();
        queue.push_path(&path).unwrap();

        let submission = queue.build_submission(&fiber_form()).unwrap();
        assert!(
            submission
                .fields
                .contains(&("provider_id".to_string(), "130077".to_string()))
        );
        assert_eq!(submission.files.len(), 1);
        assert_eq!(submission.files[0].bytes, vec![1, 2, 3]);
        assert_eq!(submission.files[0].content_type, "application/zip");
    }

    #[test]
    fn empty_queue_and_bad_forms_are_rejected() {
        let queue = UploadQueue::new();
        assert!(matches!(queue.build_submission(&fiber_form()), Err(UploadError::Empty)));

        let mut form = fiber_form();
        if let FilingForm::Fiber(fiber) = &mut form {
            fiber.common.filing_period = "June 2024".to_string();
        }
        assert!(matches!(
            form.validate(),
            Err(UploadError::InvalidField { field: "filing_period", .. })
        ));

        let wireless = FilingForm::Wireless(WirelessFilingForm {
            common: match fiber_form() {
                FilingForm::Fiber(fiber) => fiber.common,
                FilingForm::Wireless(wireless) => wireless.common,
            },
            antenna_height_m: 30.0,
            coverage_radius_km: 0.0,
        });
        assert!(matches!(
            wireless.validate(),
            Err(UploadError::InvalidField { field: "coverage_radius_km", .. })
        ));
    }
}
