//! Kernel module - infrastructure seams and dependency wiring.

pub mod backoffice_kernel;
pub mod deps;
pub mod store;
pub mod test_dependencies;
pub mod traits;

pub use backoffice_kernel::BackofficeKernel;
pub use deps::{BackofficeDeps, LoggingOtpSender, SystemClock, TwilioAdapter};
pub use store::{FileStateStore, MemoryStateStore, StateKey, StoreError, Versioned};
pub use test_dependencies::TestDependencies;
pub use traits::*;
