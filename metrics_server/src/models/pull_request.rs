//! pull_requests — A code review opened by a team member.

use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub pr_id: String,
    pub team: String,
    pub author: String,
    pub created_at: NaiveDateTime,
    pub merged_at: Option<NaiveDateTime>,
    pub lines_added: Option<i32>,
    pub lines_removed: Option<i32>,
    pub review_time_hours: Option<f32>,
    pub status: String,
}
