pub mod models;
pub mod queue;

pub use models::{RequestDecision, ServiceApplication, ServiceKind, ServiceRequest};
pub use queue::{ApprovalError, ApprovalQueue, DecisionFilter};
