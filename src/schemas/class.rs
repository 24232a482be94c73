use serde::Deserialize;
use serde_json::Value;

use super::analysis::RawAnalysis;
use super::lenient;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ClassSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub(crate) class_name: String,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub(crate) student_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassListResponse {
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) classes: Vec<ClassSummary>,
}

impl ClassListResponse {
    pub(crate) fn into_classes(self) -> Vec<ClassSummary> {
        self.classes.into_iter().filter(|class| !class.class_name.trim().is_empty()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClassAnalyses {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub(crate) count: Option<u64>,
    #[serde(default)]
    pub(crate) average_error: Value,
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) analyses: Vec<RawAnalysis>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassAnalysesResponse {
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) groups: Vec<RawClassAnalyses>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawInsightRow {
    #[serde(default, rename = "analysisId", deserialize_with = "lenient::opt_string")]
    pub(crate) analysis_id: Option<String>,
    #[serde(default, rename = "studentName", deserialize_with = "lenient::opt_string")]
    pub(crate) student_name: Option<String>,
    #[serde(default, rename = "errorPercentage")]
    pub(crate) error_percentage: Value,
    #[serde(default, rename = "shortRationale", deserialize_with = "lenient::opt_string")]
    pub(crate) short_rationale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClassInsight {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub(crate) student_count: Option<u64>,
    #[serde(default)]
    pub(crate) average_error: Value,
    #[serde(default, rename = "commonErrors", deserialize_with = "lenient::vec_or_default")]
    pub(crate) common_errors: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) suggestions: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) detailed: Vec<RawInsightRow>,
}
