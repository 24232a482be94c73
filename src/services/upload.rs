use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::core::config::Settings;

pub(crate) const SUBJECTS: &[&str] = &[
    "English",
    "Mathematics",
    "General Knowledge",
    "Portuguese",
    "Sciences",
    "History",
    "Geography",
];

pub(crate) const MISSING_SELECTION_MESSAGE: &str = "Please select a student and subject first.";
const NO_EXAMPLES_MESSAGE: &str = "No example images found for this subject.";

#[derive(Debug, Error)]
pub(crate) enum UploadError {
    #[error("{MISSING_SELECTION_MESSAGE}")]
    MissingSelection,
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("{path} is not an accepted image type")]
    NotAnImage { path: String },
    #[error("{path} is {size} bytes; the limit is {limit} bytes")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("{NO_EXAMPLES_MESSAGE}")]
    NoExamples,
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An exercise image ready to be posted as the `file` multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExerciseUpload {
    pub(crate) file_name: String,
    pub(crate) mime_type: String,
    pub(crate) bytes: Vec<u8>,
}

/// Student and subject chosen before a file may be submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UploadSelection {
    pub(crate) student_id: Option<String>,
    pub(crate) subject: Option<String>,
}

impl UploadSelection {
    pub(crate) fn new(student_id: Option<&str>, subject: Option<&str>) -> Self {
        let clean = |value: Option<&str>| {
            value.map(str::trim).filter(|value| !value.is_empty()).map(ToString::to_string)
        };
        Self { student_id: clean(student_id), subject: clean(subject) }
    }

    /// Both halves must be present; the subject must be one the UI offers.
    pub(crate) fn require(&self) -> Result<(&str, &str), UploadError> {
        let (Some(student_id), Some(subject)) = (self.student_id.as_deref(), self.subject.as_deref())
        else {
            return Err(UploadError::MissingSelection);
        };

        Ok((student_id, canonical_subject(subject)?))
    }
}

/// Matches `subject` case-insensitively against [`SUBJECTS`].
pub(crate) fn canonical_subject(subject: &str) -> Result<&'static str, UploadError> {
    let subject = subject.trim();
    SUBJECTS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(subject))
        .ok_or_else(|| UploadError::UnknownSubject(subject.to_string()))
}

/// A relative path made only of plain segments, so joining it cannot leave
/// the directory it is joined onto.
fn is_plain_relative(name: &str) -> bool {
    let path = Path::new(name);
    path.components().next().is_some()
        && path.components().all(|component| matches!(component, Component::Normal(_)))
}

pub(crate) fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Reads an image from disk, enforcing the configured type and size limits.
pub(crate) async fn read_upload(path: &Path, settings: &Settings) -> Result<ExerciseUpload, UploadError> {
    let path_label = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();

    let allowed = settings.upload().allowed_image_extensions.iter().any(|item| *item == extension);
    let mime_type = mime_for_extension(&extension)
        .filter(|_| allowed)
        .ok_or_else(|| UploadError::NotAnImage { path: path_label.clone() })?;

    let limit = settings.upload().max_upload_size_mb.saturating_mul(1024 * 1024);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| UploadError::Io { path: path_label.clone(), source })?;
    if metadata.len() > limit {
        return Err(UploadError::TooLarge { path: path_label, size: metadata.len(), limit });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::Io { path: path_label.clone(), source })?;
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| "upload.jpg".to_string());

    tracing::debug!(file = %path_label, size = bytes.len(), mime = mime_type, "Exercise image loaded");

    Ok(ExerciseUpload { file_name, mime_type: mime_type.to_string(), bytes })
}

/// Example exercise images stored as `<root>/<subject>/index.json` plus the
/// files that index lists.
#[derive(Debug, Clone)]
pub(crate) struct ExampleLibrary {
    root: PathBuf,
}

impl ExampleLibrary {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self { root: PathBuf::from(&settings.upload().examples_dir) }
    }

    pub(crate) async fn list(&self, subject: &str) -> Result<Vec<PathBuf>, UploadError> {
        let dir = self.root.join(canonical_subject(subject)?);
        let index_path = dir.join("index.json");

        let raw = match tokio::fs::read(&index_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::NoExamples);
            }
            Err(source) => {
                return Err(UploadError::Io { path: index_path.display().to_string(), source });
            }
        };

        let names: Vec<String> = match serde_json::from_slice(&raw) {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(path = %index_path.display(), error = %err, "Example index is not a list of file names");
                return Err(UploadError::NoExamples);
            }
        };

        let files: Vec<PathBuf> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| {
                let plain = is_plain_relative(name);
                if !plain && !name.is_empty() {
                    tracing::warn!(path = %index_path.display(), name, "Skipping example outside the subject directory");
                }
                plain
            })
            .map(|name| dir.join(name))
            .collect();

        if files.is_empty() {
            return Err(UploadError::NoExamples);
        }

        Ok(files)
    }

    /// Loads the example named `file_name` from the subject's index.
    pub(crate) async fn load(
        &self,
        subject: &str,
        file_name: &str,
        settings: &Settings,
    ) -> Result<ExerciseUpload, UploadError> {
        let files = self.list(subject).await?;
        let path = files
            .into_iter()
            .find(|path| path.file_name().and_then(|value| value.to_str()) == Some(file_name))
            .ok_or(UploadError::NoExamples)?;

        read_upload(&path, settings).await
    }
}
