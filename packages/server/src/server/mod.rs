pub mod middleware;
pub mod routes;

pub use middleware::{authorize, authorize_with, Access};
pub use routes::{Route, RouteGuard};
