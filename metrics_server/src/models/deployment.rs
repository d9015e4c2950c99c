//! deployments — One release of a service by a team.

use chrono::NaiveDateTime;

/// Status value counted as a successful deployment.
pub const SUCCESS_STATUS: &str = "success";

#[derive(Debug, Clone)]
pub struct Deployment {
    pub deployment_id: String,
    pub team: String,
    pub service: String,
    pub timestamp: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: String,
    pub environment: String,
    pub commit_hash: String,
}

impl Deployment {
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}
