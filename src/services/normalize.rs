//! Maps backend payloads onto the canonical records in [`crate::models`].
//!
//! The backend has shipped the same concepts under several keys over time
//! (`ai_structured` vs `ai_analysis`, `id` vs `analysisId`, `class` vs
//! `class_name`). Everything here is pure and never mutates its input; a
//! missing or malformed field degrades to a configured label or zero.

use serde_json::Value;

use crate::core::config::DisplaySettings;
use crate::core::time::parse_timestamp;
use crate::models::{
    AiInsight, Analysis, AnalysisData, ClassAnalyses, ClassInsight, GroupMember, Grouping,
    GroupingMeta, InsightRow, Score, StudentGroup,
};
use crate::schemas::analysis::RawAnalysis;
use crate::schemas::class::{RawClassAnalyses, RawClassInsight, RawInsightRow};
use crate::schemas::group::{GroupingResponse, RawGroupStudentRef, RawStudentGroup};
use crate::schemas::lenient::scalar_to_string;

const UNKNOWN_ERROR: &str = "Unknown Error";
const UNKNOWN_ID: &str = "unknown";

/// The three places a field may live inside `data`, in lookup order.
struct Layers<'a> {
    top: &'a Value,
    structured: Option<&'a Value>,
    analysis: Option<&'a Value>,
}

impl<'a> Layers<'a> {
    fn new(data: &'a Value) -> Self {
        Self {
            top: data,
            structured: data.get("ai_structured").filter(|value| value.is_object()),
            analysis: data.get("ai_analysis").filter(|value| value.is_object()),
        }
    }

    fn top_first<'k>(&self, key: &'k str) -> impl Iterator<Item = &'a Value> + 'k
    where
        'a: 'k,
    {
        [Some(self.top), self.structured, self.analysis]
            .into_iter()
            .flatten()
            .filter_map(move |layer| layer.get(key))
    }

    fn nested_first<'k>(&self, key: &'k str) -> impl Iterator<Item = &'a Value> + 'k
    where
        'a: 'k,
    {
        [self.structured, self.analysis].into_iter().flatten().filter_map(move |layer| layer.get(key))
    }
}

pub(crate) fn normalize_analysis(raw: &RawAnalysis, labels: &DisplaySettings) -> Analysis {
    let layers = Layers::new(&raw.data);
    let main_error = layers.top_first("mainError").find_map(text);

    let main_concept = layers
        .nested_first("mainConcept")
        .find_map(text)
        .or_else(|| main_error.clone())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    let specific_error = layers
        .nested_first("specificError")
        .find_map(text)
        .or_else(|| main_error.clone())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

    let insight = AiInsight {
        main_concept,
        specific_error,
        is_recurrent: layers.nested_first("isRecurrent").any(is_truthy),
        historical_analysis: layers.nested_first("historicalAnalysis").find(|v| is_truthy(v)).cloned(),
        suggestion_for_teacher: layers
            .nested_first("suggestionForTeacher")
            .find(|v| is_truthy(v))
            .cloned(),
        generated_micro_exercise: layers
            .nested_first("generatedMicroExercise")
            .find(|v| is_truthy(v))
            .cloned(),
    };

    let data = AnalysisData {
        image_url: layers.top_first("imageUrl").find_map(text),
        detected_text: layers.top_first("detected_text").find_map(text),
        main_error,
        error_percentage: error_percentage(&layers),
        concepts: layers.top_first("concepts").find_map(string_list).unwrap_or_default(),
        suggestions: layers.top_first("suggestions").find_map(string_list).unwrap_or_default(),
        reasoning: layers.top_first("reasoning").find_map(text),
        score: raw.data.get("score").and_then(score),
        student_feedback: raw.data.get("studentFeedback").and_then(text),
        insight,
    };

    Analysis {
        id: raw.id.clone().unwrap_or_default(),
        student_name: non_empty(raw.student_name.as_deref())
            .unwrap_or_else(|| labels.unknown_student.clone()),
        subject: non_empty(raw.subject.as_deref()).unwrap_or_else(|| labels.unknown_subject.clone()),
        timestamp: raw.timestamp.as_deref().and_then(parse_timestamp),
        data,
    }
}

pub(crate) fn normalize_analyses(raw: &[RawAnalysis], labels: &DisplaySettings) -> Vec<Analysis> {
    raw.iter().map(|item| normalize_analysis(item, labels)).collect()
}

pub(crate) fn normalize_group_member(
    raw: &RawGroupStudentRef,
    labels: &DisplaySettings,
) -> GroupMember {
    GroupMember {
        id: non_empty(raw.id.as_deref())
            .or_else(|| non_empty(raw.analysis_id.as_deref()))
            .unwrap_or_else(|| UNKNOWN_ID.to_string()),
        name: non_empty(raw.student_name.as_deref())
            .or_else(|| non_empty(raw.name.as_deref()))
            .unwrap_or_else(|| labels.unknown_student.clone()),
        class_name: non_empty(raw.class_name.as_deref())
            .or_else(|| non_empty(raw.class.as_deref()))
            .unwrap_or_else(|| labels.default_class.clone()),
        rationale: non_empty(raw.rationale.as_deref()),
    }
}

pub(crate) fn normalize_group(
    raw: &RawStudentGroup,
    index: usize,
    labels: &DisplaySettings,
) -> StudentGroup {
    StudentGroup {
        id: non_empty(raw.id.as_deref()).unwrap_or_else(|| format!("group-{}", index + 1)),
        name: non_empty(raw.name.as_deref()).unwrap_or_else(|| format!("Group {}", index + 1)),
        level: raw.level,
        color: non_empty(raw.color.as_deref()),
        description: raw.description.clone().unwrap_or_default(),
        criteria: non_empty(raw.criteria.as_deref()),
        students: raw.students.iter().map(|member| normalize_group_member(member, labels)).collect(),
        common_errors: strings(&raw.common_errors),
        suggestions: strings(&raw.suggestions),
    }
}

pub(crate) fn normalize_grouping(response: &GroupingResponse, labels: &DisplaySettings) -> Grouping {
    Grouping {
        groups: response
            .groups
            .iter()
            .enumerate()
            .map(|(index, group)| normalize_group(group, index, labels))
            .collect(),
        meta: GroupingMeta {
            llm: response.llm.unwrap_or(false),
            cached: response.cached.unwrap_or(false),
        },
    }
}

pub(crate) fn normalize_class_analyses(
    raw: &RawClassAnalyses,
    labels: &DisplaySettings,
) -> ClassAnalyses {
    let analyses = normalize_analyses(&raw.analyses, labels);
    ClassAnalyses {
        class_name: non_empty(raw.class_name.as_deref())
            .unwrap_or_else(|| labels.default_class.clone()),
        count: raw.count.unwrap_or(analyses.len() as u64),
        average_error: number(&raw.average_error),
        analyses,
    }
}

pub(crate) fn normalize_class_insight(
    raw: &RawClassInsight,
    requested_class: &str,
    labels: &DisplaySettings,
) -> ClassInsight {
    ClassInsight {
        class_name: non_empty(raw.class_name.as_deref())
            .unwrap_or_else(|| requested_class.to_string()),
        student_count: raw.student_count.unwrap_or_default(),
        average_error: number(&raw.average_error),
        common_errors: strings(&raw.common_errors),
        suggestions: strings(&raw.suggestions),
        detailed: raw.detailed.iter().map(|row| insight_row(row, labels)).collect(),
    }
}

fn insight_row(raw: &RawInsightRow, labels: &DisplaySettings) -> InsightRow {
    InsightRow {
        analysis_id: non_empty(raw.analysis_id.as_deref()).unwrap_or_else(|| UNKNOWN_ID.to_string()),
        student_name: non_empty(raw.student_name.as_deref())
            .unwrap_or_else(|| labels.unknown_student.clone()),
        error_percentage: number(&raw.error_percentage),
        short_rationale: non_empty(raw.short_rationale.as_deref()),
    }
}

/// A top-level numeric value wins, even when it is zero; nested values are
/// only consulted when the top level is absent or not a number.
fn error_percentage(layers: &Layers<'_>) -> f64 {
    let value = layers.top_first("errorPercentage").find_map(number).unwrap_or(0.0);
    clamp_percentage(value)
}

pub(crate) fn clamp_percentage(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn text(value: &Value) -> Option<String> {
    scalar_to_string(value).filter(|text| !text.trim().is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty()).map(ToString::to_string)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| strings(items))
}

fn strings(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(text).collect()
}

fn score(value: &Value) -> Option<Score> {
    if !value.is_object() {
        return None;
    }

    Some(Score {
        correct: value.get("correct").and_then(number),
        total: value.get("total").and_then(number),
        label: value.get("label").and_then(text),
    })
}

/// JavaScript truthiness, which the backend contract was written against.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
