//! E2E test harness for ctx-store.
//!
//! Every step opens a fresh [`ctx_store::ContextStore`] on the shared root,
//! the way independent hook processes would. Some builders and variants
//! are only used by a subset of scenarios.

#![allow(dead_code)]

pub mod clock;
pub mod runner;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::{Assertion, ErrorMatch, Field};
pub use scenario::Scenario;
