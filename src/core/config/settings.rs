use super::parsing::{
    env_optional, env_or_default, is_supported_image_extension, parse_bool, parse_environment,
    parse_string_list, parse_u64,
};
use super::types::{
    BackendSettings, BaseUrl, ConfigError, DisplaySettings, ReportSettings, RuntimeSettings,
    Settings, TelemetrySettings, UploadSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let base_url = BaseUrl::parse(env_or_default("RADAR_API_BASE_URL", "http://127.0.0.1:8000"))?;

        let environment =
            parse_environment(env_optional("RADAR_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("RADAR_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let default_subject = env_or_default("RADAR_DEFAULT_SUBJECT", "Mathematics");
        let max_upload_size_mb =
            parse_u64("RADAR_MAX_UPLOAD_SIZE_MB", env_or_default("RADAR_MAX_UPLOAD_SIZE_MB", "10"))?;
        let allowed_image_extensions =
            parse_string_list(env_optional("RADAR_ALLOWED_IMAGE_EXTENSIONS"));
        let examples_dir = env_or_default("RADAR_EXAMPLES_DIR", "samples");

        let output_dir = env_or_default("RADAR_REPORT_DIR", ".");

        let defaults = DisplaySettings::default();
        let notice_ttl_seconds =
            parse_u64("RADAR_NOTICE_TTL_SECONDS", env_or_default("RADAR_NOTICE_TTL_SECONDS", "3"))?;
        let display = DisplaySettings {
            unknown_student: env_or_default("RADAR_UNKNOWN_STUDENT_LABEL", &defaults.unknown_student),
            unknown_subject: env_or_default("RADAR_UNKNOWN_SUBJECT_LABEL", &defaults.unknown_subject),
            default_class: env_or_default("RADAR_DEFAULT_CLASS_LABEL", &defaults.default_class),
            notice_ttl_seconds,
        };

        let log_level = env_or_default("LOG_LEVEL", "info");
        let log_json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            backend: BackendSettings { base_url },
            runtime: RuntimeSettings { environment, strict_config },
            upload: UploadSettings {
                default_subject,
                max_upload_size_mb,
                allowed_image_extensions,
                examples_dir,
            },
            report: ReportSettings { output_dir },
            display,
            telemetry: TelemetrySettings { log_level, json: log_json },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn api_base_url(&self) -> &str {
        self.backend.base_url.as_str()
    }

    pub(crate) fn upload(&self) -> &UploadSettings {
        &self.upload
    }

    pub(crate) fn report(&self) -> &ReportSettings {
        &self.report
    }

    pub(crate) fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.allowed_image_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "RADAR_ALLOWED_IMAGE_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.upload.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "RADAR_ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        let max_upload_bytes = self.upload.max_upload_size_mb.checked_mul(1024 * 1024);
        if self.upload.max_upload_size_mb == 0 || max_upload_bytes.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "RADAR_MAX_UPLOAD_SIZE_MB",
                value: self.upload.max_upload_size_mb.to_string(),
            });
        }

        if self.upload.default_subject.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "RADAR_DEFAULT_SUBJECT",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        let examples_dir = std::path::Path::new(&self.upload.examples_dir);
        if !examples_dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                field: "RADAR_EXAMPLES_DIR",
                path: self.upload.examples_dir.clone(),
            });
        }

        let report_dir = std::path::Path::new(&self.report.output_dir);
        if !report_dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                field: "RADAR_REPORT_DIR",
                path: self.report.output_dir.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
impl Settings {
    pub(crate) fn for_backend(base_url: &str) -> Self {
        use super::types::Environment;

        Self {
            backend: BackendSettings {
                base_url: BaseUrl::parse(base_url.to_string()).expect("test base url"),
            },
            runtime: RuntimeSettings { environment: Environment::Test, strict_config: false },
            upload: UploadSettings {
                default_subject: "Mathematics".to_string(),
                max_upload_size_mb: 1,
                allowed_image_extensions: parse_string_list(None),
                examples_dir: "samples".to_string(),
            },
            report: ReportSettings { output_dir: std::env::temp_dir().display().to_string() },
            display: DisplaySettings::default(),
            telemetry: TelemetrySettings { log_level: "debug".to_string(), json: false },
        }
    }
}
