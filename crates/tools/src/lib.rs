//! Tool catalog, approval policy and executor for the tldw agent.
//!
//! - [`catalog`]: the tools offered to the model and the name → capability map
//! - [`tiers`]: which capabilities need a human before they run
//! - [`remote`]: the HTTP bridge to the native tool collaborator

pub mod catalog;
pub mod remote;
pub mod tiers;

pub use catalog::{catalog_names, map_tool_name, tool_definitions};
pub use remote::RemoteToolExecutor;
pub use tiers::{should_auto_approve, tier_for};
