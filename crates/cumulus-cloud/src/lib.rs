//! Cumulus cloud abstraction
//!
//! Provider-independent pieces of a deployment: the [`CloudProvider`] trait,
//! planned [`Action`]s, the [`DependencyGraph`] that orders them, retry
//! policy and the local state file.
//!
//! ```text
//! Stack ──declare──▶ ResourceSet ──plan──▶ Plan ──apply──▶ ApplyResult
//!                        │                   │
//!                        └── DependencyGraph ┘   StateManager (.cumulus/)
//! ```

pub mod action;
pub mod error;
pub mod graph;
pub mod provider;
pub mod retry;
pub mod state;

pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, SKIPPED_REASON};
pub use error::{CloudError, Result};
pub use graph::DependencyGraph;
pub use provider::{
    AuthStatus, CloudProvider, ResourceConfig, ResourceSet, RetryConfig, resource_key, split_key,
};
pub use retry::with_retry;
pub use state::{
    GlobalState, ProviderState, ResourceState, ResourceStatus, STATE_DIR, StateLock, StateManager,
};
