//! Core types for Dirgate

mod status;
mod user;

pub use status::*;
pub use user::*;
