//! Application services orchestrating cache and origin.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod route;
