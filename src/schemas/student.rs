use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lenient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Student {
    #[serde(default, deserialize_with = "lenient::string")]
    pub(crate) id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub(crate) name: String,
    #[serde(default, alias = "class", deserialize_with = "lenient::string")]
    pub(crate) class_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentListResponse {
    #[serde(default, deserialize_with = "lenient::vec_or_default")]
    pub(crate) students: Vec<Student>,
}

impl StudentListResponse {
    /// Roster entries the backend sent without an id cannot be addressed
    /// later, so they are skipped.
    pub(crate) fn into_students(self) -> Vec<Student> {
        let total = self.students.len();
        let students: Vec<Student> =
            self.students.into_iter().filter(|student| !student.id.trim().is_empty()).collect();
        if students.len() < total {
            tracing::warn!(skipped = total - students.len(), "Ignoring students without an id");
        }
        students
    }
}

#[derive(Debug, Serialize, Validate)]
pub(crate) struct StudentCreate {
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub(crate) name: String,
    #[validate(length(min = 1, max = 100, message = "class_name must not be empty"))]
    pub(crate) class_name: String,
}

impl StudentCreate {
    pub(crate) fn new(name: &str, class_name: &str) -> Self {
        Self { name: name.trim().to_string(), class_name: class_name.trim().to_string() }
    }
}
