//! Client for the coverage backend REST API.

mod error;
mod multipart;
mod types;

pub use error::BackendError;
pub use multipart::{FilePart, FilingSubmission};
pub use types::{ExportRecord, FileRecord, TaskRuntime, TaskStatus, TaskSummary};

use std::io::Write;

use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::features::ServedRecord;
use crate::http_client::{self, RetryConfig};
use crate::staging::ToggleRecord;
use error::map_status_error;
use types::{MessageResponse, TaskStatusUpdate};

const MAX_SERVED_DATA_BYTES: usize = 64 * 1024 * 1024;
const MAX_GEOJSON_BYTES: usize = 128 * 1024 * 1024;
const MAX_LIST_BYTES: usize = 4 * 1024 * 1024;
const MAX_MESSAGE_BYTES: usize = 256 * 1024;
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
const MAX_EXPORT_BYTES: usize = 512 * 1024 * 1024;

/// Submits staged marker edits.
pub trait MarkerBackend {
    /// `POST /toggle-markers`; returns the server's message.
    fn toggle_markers(&self, records: &[ToggleRecord]) -> Result<String, BackendError>;
}

/// Blocking client; cheap to clone into worker threads.
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: Url,
    session_cookie: Option<String>,
    retry: RetryConfig,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let mut base_url =
            Url::parse(base_url.trim()).map_err(|err| BackendError::InvalidUrl(err.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            session_cookie: None,
            retry: RetryConfig::default(),
        })
    }

    /// Send `cookie` verbatim as the `Cookie` header on every request.
    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie.filter(|value| !value.trim().is_empty());
        self
    }

    /// Cap attempts for idempotent GETs (at least one).
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.retry.max_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Browser page where the user signs in again.
    pub fn login_url(&self) -> String {
        self.endpoint("login")
            .map(String::from)
            .unwrap_or_else(|_| format!("{}login", self.base_url))
    }

    /// Vector tile template handed to the map engine.
    pub fn tile_url_template(&self) -> String {
        format!("{}tiles/{{z}}/{{x}}/{{y}}.pbf", self.base_url)
    }

    pub fn fetch_served_data(&self) -> Result<Vec<ServedRecord>, BackendError> {
        let records: Vec<ServedRecord> = self.get_json("served-data", MAX_SERVED_DATA_BYTES)?;
        info!(count = records.len(), "Fetched served data");
        Ok(records)
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>, BackendError> {
        self.get_json("api/files", MAX_LIST_BYTES)
    }

    pub fn delete_file(&self, id: u64) -> Result<String, BackendError> {
        self.delete(&format!("api/delfiles/{id}"))
    }

    pub fn submit_fiber_form(&self, submission: &FilingSubmission) -> Result<String, BackendError> {
        self.post_multipart("submit-fiber-form", submission)
    }

    pub fn submit_wireless_form(
        &self,
        submission: &FilingSubmission,
    ) -> Result<String, BackendError> {
        self.post_multipart("submit-wireless-form", submission)
    }

    pub fn list_exports(&self) -> Result<Vec<ExportRecord>, BackendError> {
        self.get_json("api/export", MAX_LIST_BYTES)
    }

    /// Stream export `id` into `writer`; returns the byte count.
    pub fn download_export(&self, id: u64, writer: &mut impl Write) -> Result<u64, BackendError> {
        let url = self.endpoint(&format!("api/downloadexport/{id}"))?;
        let response = self.send(self.request("GET", &url).call())?;
        let copied = http_client::copy_response_to_writer(response, writer, MAX_EXPORT_BYTES)?;
        info!(id, bytes = copied, "Downloaded export");
        Ok(copied)
    }

    pub fn delete_export(&self, id: u64) -> Result<String, BackendError> {
        self.delete(&format!("api/delexport/{id}"))
    }

    pub fn list_user_tasks(&self) -> Result<Vec<TaskSummary>, BackendError> {
        self.get_json("api/user-tasks", MAX_LIST_BYTES)
    }

    pub fn update_task_status(&self, id: u64, status: TaskStatus) -> Result<String, BackendError> {
        let url = self.endpoint(&format!("api/update-task-status/{id}"))?;
        let response = self.send(
            self.request("POST", &url)
                .set("Content-Type", "application/json")
                .send_json(TaskStatusUpdate { status }),
        )?;
        read_message(response)
    }

    pub fn estimated_task_runtime(&self, id: u64) -> Result<TaskRuntime, BackendError> {
        self.get_json(&format!("api/estimated-task-runtime/{id}"), MAX_MESSAGE_BYTES)
    }

    /// Fetch a static GeoJSON asset such as `data.geojson`.
    ///
    /// A lone `Feature` is wrapped into a one-element collection.
    pub fn fetch_geojson(&self, path: &str) -> Result<geojson::FeatureCollection, BackendError> {
        let text = self.get_text(path, MAX_GEOJSON_BYTES)?;
        let parsed: geojson::GeoJson = text
            .parse()
            .map_err(|err: geojson::Error| BackendError::Json(err.to_string()))?;
        match parsed {
            geojson::GeoJson::FeatureCollection(collection) => Ok(collection),
            geojson::GeoJson::Feature(feature) => Ok(geojson::FeatureCollection {
                bbox: None,
                features: vec![feature],
                foreign_members: None,
            }),
            geojson::GeoJson::Geometry(_) => Err(BackendError::Json(format!(
                "{path} is a bare geometry, expected features"
            ))),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| BackendError::InvalidUrl(err.to_string()))
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let request = http_client::agent()
            .request(method, url.as_str())
            .set("Accept", "application/json");
        match &self.session_cookie {
            Some(cookie) => request.set("Cookie", cookie),
            None => request,
        }
    }

    fn send(
        &self,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, BackendError> {
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, response)) => {
                let body = http_client::read_response_text(response, MAX_ERROR_BODY_BYTES)
                    .unwrap_or_else(|err| err.to_string());
                Err(map_status_error(code, body))
            }
            Err(ureq::Error::Transport(err)) => Err(BackendError::Transport(err.to_string())),
        }
    }

    fn get_text(&self, path: &str, max_bytes: usize) -> Result<String, BackendError> {
        let url = self.endpoint(path)?;
        http_client::retry_with_backoff(
            self.retry,
            || {
                debug!(%url, "GET");
                let response = self.send(self.request("GET", &url).call())?;
                Ok(http_client::read_response_text(response, max_bytes)?)
            },
            BackendError::is_retryable,
        )
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, max_bytes: usize) -> Result<T, BackendError> {
        let text = self.get_text(path, max_bytes)?;
        serde_json::from_str(&text).map_err(|err| BackendError::Json(format!("{path}: {err}")))
    }

    fn delete(&self, path: &str) -> Result<String, BackendError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.request("DELETE", &url).call())?;
        read_message(response)
    }

    fn post_multipart(
        &self,
        path: &str,
        submission: &FilingSubmission,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(path)?;
        let (content_type, body) = submission.encode();
        info!(
            %url,
            files = submission.files.len(),
            bytes = body.len(),
            "Submitting filing"
        );
        let response = self.send(
            self.request("POST", &url)
                .set("Content-Type", &content_type)
                .send_bytes(&body),
        )?;
        read_message(response)
    }
}

impl MarkerBackend for BackendClient {
    fn toggle_markers(&self, records: &[ToggleRecord]) -> Result<String, BackendError> {
        let url = self.endpoint("toggle-markers")?;
        let response = self.send(
            self.request("POST", &url)
                .set("Content-Type", "application/json")
                .send_json(records),
        )?;
        read_message(response)
    }
}

/// `{message}` when the body carries one, otherwise the trimmed body.
fn read_message(response: ureq::Response) -> Result<String, BackendError> {
    let body = http_client::read_response_text(response, MAX_MESSAGE_BYTES)?;
    let trimmed = body.trim();
    let message = serde_json::from_str::<MessageResponse>(trimmed)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| trimmed.to_string());
    Ok(message)
}
