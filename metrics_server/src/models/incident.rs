//! incidents — A production incident attributed to a team's service.

use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct Incident {
    pub incident_id: String,
    pub team: String,
    pub service: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub severity: String,
    pub resolved_by: Option<String>,
    pub root_cause: Option<String>,
}
