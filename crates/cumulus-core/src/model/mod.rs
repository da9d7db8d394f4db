//! Stack model
//!
//! A `Stack` is the full declaration of one deployment: resource group,
//! storage, network, load balancer, scale set, autoscale and the application
//! container. Every section has defaults derived from the stack name.

mod app;
mod compute;
mod network;
mod storage;

pub use app::*;
pub use compute::*;
pub use network::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default Azure region
pub const DEFAULT_LOCATION: &str = "northeurope";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub location: String,
    /// Subscription used for ARM IDs; resolved from `az account show` when unset
    pub subscription_id: Option<String>,
    pub resource_group: String,
    pub tags: BTreeMap<String, String>,
    pub storage: StorageSpec,
    pub network: NetworkSpec,
    pub security: SecurityGroupSpec,
    pub load_balancer: LoadBalancerSpec,
    pub scale_set: ScaleSetSpec,
    pub autoscale: AutoscaleSpec,
    pub app: AppSpec,
}

impl Stack {
    /// Stack with every section at its default
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            location: DEFAULT_LOCATION.to_string(),
            subscription_id: None,
            resource_group: format!("{}-rg", name),
            tags: BTreeMap::new(),
            storage: StorageSpec::for_stack(&name),
            network: NetworkSpec::for_stack(&name),
            security: SecurityGroupSpec::for_stack(&name),
            load_balancer: LoadBalancerSpec::for_stack(&name),
            scale_set: ScaleSetSpec::for_stack(&name),
            autoscale: AutoscaleSpec::for_stack(&name),
            app: AppSpec::for_stack(&name),
            name,
        }
    }
}
