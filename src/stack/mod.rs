//! Stack management module
//!
//! Branch metadata, the dependency graph built from it, and the engines that
//! replay branches onto their parents:
//! - `store`: the on-disk branch database
//! - `graph`: parent/child relationships rooted at trunk
//! - `rebase`: restack, continue and abort
//! - `move_engine`: reparenting a subtree
//! - `manager` / `cleanup`: tracking, remote status and pruning

pub mod cleanup;
pub mod graph;
pub mod manager;
pub mod metadata;
pub mod move_engine;
pub mod rebase;
pub mod restack_state;
pub mod store;

pub use graph::DependencyGraph;
pub use manager::{RefreshSummary, StackManager};
pub use metadata::{BranchMetadata, PullRequestMetadata};
pub use move_engine::MoveEngine;
pub use rebase::{AbortOutcome, RestackEngine, RestackOutcome};
pub use restack_state::{RestackState, RestackStateFile, WorkUnit};
pub use store::BranchStore;
