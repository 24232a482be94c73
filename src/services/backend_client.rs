use std::time::Instant;

use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::Settings;
use crate::schemas::analysis::{AnalysisListResponse, AnalyzeExerciseResponse, RawAnalysis};
use crate::schemas::class::{ClassAnalysesResponse, ClassListResponse, ClassSummary, RawClassInsight};
use crate::schemas::group::GroupingResponse;
use crate::schemas::student::{Student, StudentCreate, StudentListResponse};
use crate::services::upload::ExerciseUpload;

#[derive(Debug, Error)]
pub(crate) enum BackendError {
    #[error("HTTP error! status: {status} ({endpoint}): {detail}")]
    Status { status: StatusCode, endpoint: String, detail: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid response body from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl BackendError {
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    pub(crate) fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Thin typed wrapper over the backend REST API.
///
/// One attempt per call: there is no retry, backoff or timeout layer. Errors
/// are logged here and returned to the caller, which decides how to degrade.
#[derive(Debug, Clone)]
pub(crate) struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pedagogical-radar/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build backend HTTP client")?;

        let base_url = Url::parse(settings.api_base_url()).context("Invalid backend base URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend base URL {base_url} cannot carry a path");
        }

        Ok(Self { client, base_url })
    }

    pub(crate) fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub(crate) async fn list_students(
        &self,
        class_name: Option<&str>,
    ) -> Result<Vec<Student>, BackendError> {
        let mut request = self.request(Method::GET, &["students"])?;
        if let Some(class_name) = class_name.filter(|value| !value.is_empty()) {
            request = request.query(&[("class_name", class_name)]);
        }
        let response: StudentListResponse = self.send_json("/students", request).await?;
        Ok(response.into_students())
    }

    pub(crate) async fn create_student(
        &self,
        name: &str,
        class_name: &str,
    ) -> Result<Student, BackendError> {
        let payload = StudentCreate::new(name, class_name);
        payload.validate().map_err(|err| BackendError::Invalid(err.to_string()))?;

        let request = self.request(Method::POST, &["students"])?.json(&payload);
        self.send_json("/students", request).await
    }

    pub(crate) async fn get_student(&self, student_id: &str) -> Result<Student, BackendError> {
        let endpoint = format!("/students/{student_id}");
        let request = self.request(Method::GET, &["students", student_id])?;
        self.send_json(&endpoint, request).await
    }

    pub(crate) async fn delete_student(&self, student_id: &str) -> Result<(), BackendError> {
        let endpoint = format!("/students/{student_id}");
        let request = self.request(Method::DELETE, &["students", student_id])?;
        self.send(&endpoint, request).await.map(|_| ())
    }

    pub(crate) async fn list_analyses(&self) -> Result<Vec<RawAnalysis>, BackendError> {
        let request = self.request(Method::GET, &["analyses"])?;
        let response: AnalysisListResponse = self.send_json("/analyses", request).await?;
        Ok(response.analyses)
    }

    pub(crate) async fn get_analysis(&self, analysis_id: &str) -> Result<RawAnalysis, BackendError> {
        let endpoint = format!("/analyses/{analysis_id}");
        let request = self.request(Method::GET, &["analyses", analysis_id])?;
        self.send_json(&endpoint, request).await
    }

    /// Multipart upload of an exercise image. `student_id` is only sent when
    /// present; the backend attributes the analysis to that student.
    pub(crate) async fn analyze_exercise(
        &self,
        upload: &ExerciseUpload,
        student_id: Option<&str>,
        subject: &str,
    ) -> Result<AnalyzeExerciseResponse, BackendError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|err| BackendError::Invalid(err.to_string()))?;

        let mut form = Form::new().part("file", part);
        if let Some(student_id) = student_id.filter(|value| !value.is_empty()) {
            form = form.text("student_id", student_id.to_string());
        }
        form = form.text("subject", subject.to_string());

        let request = self.request(Method::POST, &["analyze_exercise"])?.multipart(form);
        self.send_json("/analyze_exercise", request).await
    }

    pub(crate) async fn student_groups(&self) -> Result<GroupingResponse, BackendError> {
        let request = self.request(Method::GET, &["student_groups"])?;
        self.send_json("/student_groups", request).await
    }

    pub(crate) async fn recompute_groups(&self) -> Result<GroupingResponse, BackendError> {
        let request = self.request(Method::POST, &["student_groups", "recompute"])?;
        self.send_json("/student_groups/recompute", request).await
    }

    pub(crate) async fn analyses_by_class(&self) -> Result<ClassAnalysesResponse, BackendError> {
        let request = self.request(Method::GET, &["analyses_by_class"])?;
        self.send_json("/analyses_by_class", request).await
    }

    pub(crate) async fn list_classes(&self) -> Result<Vec<ClassSummary>, BackendError> {
        let request = self.request(Method::GET, &["classes"])?;
        let response: ClassListResponse = self.send_json("/classes", request).await?;
        Ok(response.into_classes())
    }

    pub(crate) async fn class_insights(
        &self,
        class_name: &str,
        force: bool,
    ) -> Result<RawClassInsight, BackendError> {
        let endpoint = format!("/classes/{class_name}");
        let mut request = self.request(Method::GET, &["classes", class_name])?;
        if force {
            request = request.query(&[("force", "true")]);
        }
        self.send_json(&endpoint, request).await
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Invalid(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, BackendError> {
        let url = self.url(segments)?;
        Ok(self.client.request(method, url).header("x-request-id", Uuid::new_v4().to_string()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send(endpoint, request).await?;
        serde_json::from_slice(&body).map_err(|err| {
            let error = BackendError::Decode { endpoint: endpoint.to_string(), reason: err.to_string() };
            tracing::error!(endpoint, error = %error, "API request failed");
            error
        })
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let timer = Instant::now();
        let label = metric_label(endpoint);

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                metrics::counter!("backend_requests_total", "endpoint" => label, "outcome" => "transport_error")
                    .increment(1);
                let error = BackendError::Transport { endpoint: endpoint.to_string(), source };
                tracing::error!(endpoint, error = %error, "API request failed");
                return Err(error);
            }
        };

        let status = response.status();
        let body = response.bytes().await.map_err(|source| {
            let error = BackendError::Transport { endpoint: endpoint.to_string(), source };
            tracing::error!(endpoint, error = %error, "API request failed");
            error
        })?;

        let elapsed = timer.elapsed().as_secs_f64();
        metrics::histogram!("backend_request_duration_seconds", "endpoint" => label.clone())
            .record(elapsed);

        if !status.is_success() {
            metrics::counter!("backend_requests_total", "endpoint" => label, "outcome" => "http_error")
                .increment(1);
            let detail = serde_json::from_slice::<Value>(&body)
                .map(|payload| extract_error_message(&payload))
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
            let error =
                BackendError::Status { status, endpoint: endpoint.to_string(), detail };
            tracing::error!(endpoint, status = status.as_u16(), error = %error, "API request failed");
            return Err(error);
        }

        metrics::counter!("backend_requests_total", "endpoint" => label, "outcome" => "ok").increment(1);
        tracing::debug!(endpoint, status = status.as_u16(), duration_seconds = elapsed, "API request completed");

        Ok(body.to_vec())
    }
}

/// Collapses ids out of paths so metric labels stay bounded.
fn metric_label(endpoint: &str) -> String {
    let mut segments = endpoint.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some(root), Some("recompute")) => format!("/{root}/recompute"),
        (Some(root), Some(_)) => format!("/{root}/:id"),
        (Some(root), None) => format!("/{root}"),
        _ => endpoint.to_string(),
    }
}

fn extract_error_message(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}
