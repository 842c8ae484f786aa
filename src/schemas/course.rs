use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentCourseItem {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) test_count: i64,
}
