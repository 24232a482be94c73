//! Display fragments for the loosely-typed parts of an analysis: teacher
//! suggestions, historical notes and generated micro-exercises.

use serde_json::Value;

use crate::schemas::lenient::scalar_to_string;
use crate::services::normalize::is_truthy;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Text(String),
    List(Vec<String>),
    Code(String),
}

/// Renders any JSON value: scalars as text, arrays as a list (objects inside
/// compact-encoded), objects as pretty JSON. Null renders nothing.
pub(crate) fn render_any(value: &Value) -> Option<Fragment> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Fragment::List(items.iter().map(item_text).collect())),
        Value::Object(_) => Some(Fragment::Code(
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        )),
        scalar => scalar_to_string(scalar).map(Fragment::Text),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Exercise {
    pub(crate) title: Option<String>,
    pub(crate) prompt: Option<String>,
    pub(crate) examples: Vec<String>,
    pub(crate) hints: Option<String>,
    pub(crate) answers: Vec<String>,
}

/// Normalizes a generated micro-exercise payload, which may be one exercise
/// or a list, each either a plain string or an object with loose keys.
pub(crate) fn normalize_exercises(value: &Value) -> Vec<Exercise> {
    if !is_truthy(value) {
        return Vec::new();
    }

    match value {
        Value::Array(items) => items.iter().map(exercise).collect(),
        single => vec![exercise(single)],
    }
}

fn exercise(value: &Value) -> Exercise {
    if let Value::String(text) = value {
        return Exercise { prompt: Some(text.clone()), ..Exercise::default() };
    }

    let title = first_truthy(value, &["title", "name"]).and_then(scalar_to_string);
    let prompt = first_truthy(value, &["prompt", "sentence", "question", "description", "text"])
        .and_then(scalar_to_string);

    let examples = first_truthy(value, &["examples", "example", "samples"])
        .and_then(Value::as_array)
        .map(|items| items.iter().map(item_text).collect())
        .unwrap_or_default();

    let hints = first_truthy(value, &["hints", "tips"]).map(|hints| match hints {
        Value::Array(items) => items.iter().map(item_text).collect::<Vec<_>>().join("\n"),
        other => item_text(other),
    });

    let answers = match first_truthy(value, &["answer", "solution", "solutions", "answers"]) {
        Some(Value::Array(items)) => items.iter().map(item_text).collect(),
        Some(other) => vec![item_text(other)],
        None => Vec::new(),
    };

    Exercise { title, prompt, examples, hints, answers }
}

fn first_truthy<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| value.get(*key)).find(|candidate| is_truthy(candidate))
}

fn item_text(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => value.to_string(),
        Value::Null => "null".to_string(),
        scalar => scalar_to_string(scalar).unwrap_or_default(),
    }
}

/// Cuts `text` to `max_chars` characters with a trailing ellipsis unless it
/// is expanded or already short enough.
pub(crate) fn collapse_text(text: &str, max_chars: usize, expanded: bool) -> String {
    if expanded || text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push(ELLIPSIS);
    cut
}
