pub mod models;
pub mod sink;

pub use models::{AuditAction, AuditEvent, AuditHandle, AuditQuery, AuditSubject, NewAuditEvent};
pub use sink::{AuditLogSink, KeepLatest, Unbounded};
