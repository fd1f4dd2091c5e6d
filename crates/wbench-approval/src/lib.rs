//! The human-in-the-loop approval gate (C5).

pub mod error;
pub mod gate;

pub use error::ApprovalError;
pub use gate::{ApprovalGate, RuleParsingScopeGuard};
