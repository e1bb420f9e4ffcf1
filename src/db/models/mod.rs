//! Database models split into domain-specific modules.

pub mod travel;
pub mod user;

pub use travel::*;
pub use user::*;
