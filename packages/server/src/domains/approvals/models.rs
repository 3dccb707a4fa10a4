use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::{AdminCapability, PrincipalId, ServiceRequestId};
use crate::domains::auth::models::Role;

/// What a neutral principal is applying to become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Merchant,
    Agent,
}

impl ServiceKind {
    pub fn role(&self) -> Role {
        match self {
            ServiceKind::Merchant => Role::Merchant,
            ServiceKind::Agent => Role::Agent,
        }
    }

    /// Capability needed to decide a request of this kind.
    pub fn capability(&self) -> AdminCapability {
        match self {
            ServiceKind::Merchant => AdminCapability::AcceptMerchants,
            ServiceKind::Agent => AdminCapability::AcceptAgents,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Merchant => f.write_str("merchant"),
            ServiceKind::Agent => f.write_str("agent"),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merchant" => Ok(ServiceKind::Merchant),
            "agent" => Ok(ServiceKind::Agent),
            other => Err(format!("unknown service type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RequestDecision {
    Pending,
    #[serde(rename_all = "camelCase")]
    Approved {
        decided_by: PrincipalId,
        decided_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Rejected {
        decided_by: PrincipalId,
        decided_at: DateTime<Utc>,
        rejection_reason: String,
    },
}

impl RequestDecision {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestDecision::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestDecision::Pending => "pending",
            RequestDecision::Approved { .. } => "approved",
            RequestDecision::Rejected { .. } => "rejected",
        }
    }
}

/// Form input for a new service request.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct ServiceApplication {
    pub kind: ServiceKind,
    pub business_name: String,
    pub business_type: String,
    #[builder(default)]
    pub description: String,
    #[builder(default, setter(strip_option))]
    pub business_address: Option<String>,
    #[builder(default)]
    pub document_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: ServiceRequestId,
    pub requester_id: PrincipalId,
    pub requester_name: String,
    pub kind: ServiceKind,
    pub business_name: String,
    pub business_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_address: Option<String>,
    #[serde(default)]
    pub document_links: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub decision: RequestDecision,
}
