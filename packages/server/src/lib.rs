// AfriPay back office - auth core
//
// Identity, session and authorization core for the back-office product:
// OTP and password logins, role-scoped route access, session expiry and an
// append-only audit log, all over an injected key/value store.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
