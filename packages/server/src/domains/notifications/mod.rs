pub mod center;
pub mod models;

pub use center::NotificationCenter;
pub use models::{Notice, NoticeKind, Notification};
