use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::{AuditEventId, PrincipalId};
use crate::domains::auth::models::{Principal, Role};

/// Security-relevant actions. Serialized as snake_case tags (`login_failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    LoginFailed,
    Logout,
    UserCreated,
    UserPromotedToAdmin,
    AdminPermissionsUpdated,
    UserDeleted,
    TermsAccepted,
    RoleChanged,
    ServiceRequestApproved,
    ServiceRequestRejected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserPromotedToAdmin => "user_promoted_to_admin",
            AuditAction::AdminPermissionsUpdated => "admin_permissions_updated",
            AuditAction::UserDeleted => "user_deleted",
            AuditAction::TermsAccepted => "terms_accepted",
            AuditAction::RoleChanged => "role_changed",
            AuditAction::ServiceRequestApproved => "service_request_approved",
            AuditAction::ServiceRequestRejected => "service_request_rejected",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.trim().to_string())).ok()
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who did it. Failed logins have no user id, only the attempted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSubject {
    pub user_id: Option<PrincipalId>,
    pub username: String,
    pub role: Role,
}

impl AuditSubject {
    pub fn anonymous(attempted: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: None,
            username: attempted.into(),
            role,
        }
    }
}

impl From<&Principal> for AuditSubject {
    fn from(principal: &Principal) -> Self {
        Self {
            user_id: Some(principal.id),
            username: principal.username.clone(),
            role: principal.role(),
        }
    }
}

/// An event before the sink stamps it with id, sequence and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub subject: AuditSubject,
    pub action: AuditAction,
    pub details: serde_json::Value,
}

impl NewAuditEvent {
    pub fn new(subject: impl Into<AuditSubject>, action: AuditAction) -> Self {
        Self {
            subject: subject.into(),
            action,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub sequence: u64,
    #[serde(default)]
    pub user_id: Option<PrincipalId>,
    pub username: String,
    pub role: Role,
    pub action: AuditAction,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Returned by `append`; identifies the stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditHandle {
    pub id: AuditEventId,
    pub sequence: u64,
}

/// Filter for [`super::AuditLogSink::query`]. All fields are optional and
/// combine with AND.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub user_id: Option<PrincipalId>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.user_id.map_or(true, |id| event.user_id == Some(id))
            && self.action.map_or(true, |action| event.action == action)
            && self.since.map_or(true, |since| event.timestamp >= since)
    }
}
