use serde::Deserialize;
use serde_json::Value;

use super::lenient;

/// Analysis as the backend sends it. `data` stays untyped; the normalizer
/// resolves its alternate keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawAnalysis {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) id: Option<String>,
    #[serde(default, alias = "student_name", deserialize_with = "lenient::opt_string")]
    #[serde(rename = "studentName")]
    pub(crate) student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) subject: Option<String>,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub(crate) timestamp: Option<String>,
    #[serde(default)]
    pub(crate) data: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalysisListResponse {
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) analyses: Vec<RawAnalysis>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeExerciseResponse {
    pub(crate) analysis: RawAnalysis,
    #[serde(default)]
    pub(crate) ocr_info: Value,
}
