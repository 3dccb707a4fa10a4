// Business domains
pub mod approvals;
pub mod audit;
pub mod auth;
pub mod currency;
pub mod notifications;
