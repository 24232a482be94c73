use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

pub(crate) use crate::schemas::student::Student;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GroupLevel {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl GroupLevel {
    pub(crate) fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Glyph shown next to a group heading.
    pub(crate) fn marker(self) -> &'static str {
        match self {
            Self::High => "[+]",
            Self::Medium => "[~]",
            Self::Low => "[!]",
            Self::Unknown => "[ ]",
        }
    }
}

/// Canonical analysis record, built once by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Analysis {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub(crate) timestamp: Option<OffsetDateTime>,
    pub(crate) data: AnalysisData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalysisData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) image_url: Option<String>,
    #[serde(rename = "detected_text", skip_serializing_if = "Option::is_none")]
    pub(crate) detected_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) main_error: Option<String>,
    pub(crate) error_percentage: f64,
    pub(crate) concepts: Vec<String>,
    pub(crate) suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_feedback: Option<String>,
    pub(crate) insight: AiInsight,
}

/// Fields resolved from `ai_structured`, then `ai_analysis`, then top level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AiInsight {
    pub(crate) main_concept: String,
    pub(crate) specific_error: String,
    pub(crate) is_recurrent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) historical_analysis: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) suggestion_for_teacher: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generated_micro_exercise: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Score {
    pub(crate) correct: Option<f64>,
    pub(crate) total: Option<f64>,
    pub(crate) label: Option<String>,
}

impl Analysis {
    pub(crate) fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupMember {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentGroup {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) level: GroupLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) color: Option<String>,
    pub(crate) description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) criteria: Option<String>,
    pub(crate) students: Vec<GroupMember>,
    pub(crate) common_errors: Vec<String>,
    pub(crate) suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GroupingMeta {
    pub(crate) llm: bool,
    pub(crate) cached: bool,
}

impl GroupingMeta {
    pub(crate) fn mode_label(self) -> &'static str {
        match (self.llm, self.cached) {
            (true, true) => "LLM (cached)",
            (true, false) => "LLM active",
            (false, _) => "Heuristic mode",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Grouping {
    pub(crate) groups: Vec<StudentGroup>,
    pub(crate) meta: GroupingMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassAnalyses {
    pub(crate) class_name: String,
    pub(crate) count: u64,
    pub(crate) average_error: Option<f64>,
    pub(crate) analyses: Vec<Analysis>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsightRow {
    pub(crate) analysis_id: String,
    pub(crate) student_name: String,
    pub(crate) error_percentage: Option<f64>,
    pub(crate) short_rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassInsight {
    pub(crate) class_name: String,
    pub(crate) student_count: u64,
    pub(crate) average_error: Option<f64>,
    pub(crate) common_errors: Vec<String>,
    pub(crate) suggestions: Vec<String>,
    pub(crate) detailed: Vec<InsightRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_label_matches_meta() {
        assert_eq!(GroupingMeta { llm: true, cached: true }.mode_label(), "LLM (cached)");
        assert_eq!(GroupingMeta { llm: true, cached: false }.mode_label(), "LLM active");
        assert_eq!(GroupingMeta { llm: false, cached: true }.mode_label(), "Heuristic mode");
    }

    #[test]
    fn group_level_parses_known_values() {
        assert_eq!(GroupLevel::parse("Medium"), GroupLevel::Medium);
        assert_eq!(GroupLevel::parse(" high "), GroupLevel::High);
        assert_eq!(GroupLevel::parse("stellar"), GroupLevel::Unknown);
    }
}
