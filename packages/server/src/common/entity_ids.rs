//! Typed ID definitions for all domain entities.
//!
//! ```rust
//! use backoffice_core::common::{AuditEventId, PrincipalId};
//!
//! let principal_id = PrincipalId::new();
//! let event_id = AuditEventId::new();
//! // let wrong: AuditEventId = principal_id; // compile error
//! # let _ = (principal_id, event_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for principals (end users, merchants, agents, admins).
pub struct PrincipalEntity;

/// Marker type for audit log entries.
pub struct AuditEventEntity;

/// Marker type for notification center entries.
pub struct NotificationEntity;

/// Marker type for merchant/agent service requests.
pub struct ServiceRequestEntity;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type PrincipalId = Id<PrincipalEntity>;

pub type AuditEventId = Id<AuditEventEntity>;

pub type NotificationId = Id<NotificationEntity>;

pub type ServiceRequestId = Id<ServiceRequestEntity>;
