//! CLI command implementations.

pub mod common;
pub mod partition;
pub mod plan;
pub mod sweep;
pub mod version;
