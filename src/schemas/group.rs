use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use crate::models::GroupLevel;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawGroupStudentRef {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) id: Option<String>,
    #[serde(default, rename = "analysisId", deserialize_with = "lenient::opt_string")]
    pub(crate) analysis_id: Option<String>,
    #[serde(default, rename = "studentName", deserialize_with = "lenient::opt_string")]
    pub(crate) student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) name: Option<String>,
    #[serde(default, rename = "class", deserialize_with = "lenient::opt_string")]
    pub(crate) class: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) rationale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawStudentGroup {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::group_level")]
    pub(crate) level: GroupLevel,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) color: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub(crate) criteria: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) students: Vec<RawGroupStudentRef>,
    #[serde(default, rename = "commonErrors", deserialize_with = "lenient::vec_or_default")]
    pub(crate) common_errors: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) suggestions: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GroupingResponse {
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) groups: Vec<RawStudentGroup>,
    #[serde(default)]
    pub(crate) llm: Option<bool>,
    #[serde(default)]
    pub(crate) cached: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_level_does_not_fail_payload() {
        let response: GroupingResponse = serde_json::from_value(json!({
            "groups": [{"id": "g", "level": "stellar", "students": [{"analysisId": 9}]}],
            "llm": true
        }))
        .unwrap();
        assert_eq!(response.groups[0].level, GroupLevel::Unknown);
        assert_eq!(response.groups[0].students[0].analysis_id.as_deref(), Some("9"));
        assert_eq!(response.cached, None);
    }

    #[test]
    fn null_or_numeric_level_keeps_the_groups() {
        let response: GroupingResponse = serde_json::from_value(json!({
            "groups": [
                {"id": "g1", "level": null, "students": []},
                {"id": "g2", "level": 3, "students": []},
                {"id": "g3", "level": "LOW", "students": []}
            ],
            "llm": true
        }))
        .unwrap();

        let levels: Vec<GroupLevel> = response.groups.iter().map(|group| group.level).collect();
        assert_eq!(levels, vec![GroupLevel::Unknown, GroupLevel::Unknown, GroupLevel::Low]);
        assert_eq!(response.llm, Some(true));
    }
}
