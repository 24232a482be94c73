use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) backend: BackendSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) upload: UploadSettings,
    pub(super) report: ReportSettings,
    pub(super) display: DisplaySettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct BackendSettings {
    pub(super) base_url: BaseUrl,
}

#[derive(Debug, Clone)]
pub(crate) struct UploadSettings {
    pub(crate) default_subject: String,
    pub(crate) max_upload_size_mb: u64,
    pub(crate) allowed_image_extensions: Vec<String>,
    pub(crate) examples_dir: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ReportSettings {
    pub(crate) output_dir: String,
}

/// Labels substituted by the normalizer when the backend omits a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DisplaySettings {
    pub(crate) unknown_student: String,
    pub(crate) unknown_subject: String,
    pub(crate) default_class: String,
    pub(crate) notice_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BaseUrl(pub(super) String);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid backend base url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing directory for {field}: {path}")]
    MissingDirectory { field: &'static str, path: String },
}

impl BaseUrl {
    pub(crate) fn parse(value: String) -> Result<Self, ConfigError> {
        let trimmed = value.trim().trim_end_matches('/');
        let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        let host = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or_default();
        if !has_scheme || host.is_empty() {
            return Err(ConfigError::InvalidBaseUrl(value));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            unknown_student: "Unknown Student".to_string(),
            unknown_subject: "Unknown Subject".to_string(),
            default_class: "5th A".to_string(),
            notice_ttl_seconds: 3,
        }
    }
}
