use chrono::{DateTime, Utc};

use super::User;
use crate::model::Project;

/// Principal-bearing context every check is evaluated against.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
    pub project: Project,
    /// Reference time for release/expiration filtering
    pub request_time: DateTime<Utc>,
    pub request_id: Option<String>,
    pub remote_addr: Option<String>,
}

impl RequestContext {
    pub fn new(user: User, project: Project) -> Self {
        Self { user, project, request_time: Utc::now(), request_id: None, remote_addr: None }
    }

    pub fn with_request_time(mut self, at: DateTime<Utc>) -> Self {
        self.request_time = at;
        self
    }

    pub fn with_request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn corr(&self) -> &str { self.request_id.as_deref().unwrap_or("-") }
}
