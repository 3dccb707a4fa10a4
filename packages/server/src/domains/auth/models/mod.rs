pub mod identifier;
pub mod principal;

pub use identifier::*;
pub use principal::*;
