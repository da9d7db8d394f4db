//! Azure provider for Cumulus
//!
//! Implements [`cumulus_cloud::CloudProvider`] for a VM scale set stack:
//! resource group, storage account with an SMB share, virtual network,
//! network security group, public Standard load balancer, the scale set and
//! its CPU autoscale setting.
//!
//! # Requirements
//!
//! - `az` CLI must be installed and logged in (`az login`)
//! - The subscription is taken from the stack or from `az account show`
//!
//! # Example
//!
//! ```ignore
//! use cumulus_cloud::CloudProvider;
//! use cumulus_cloud_azure::AzureProvider;
//!
//! let stack = cumulus_core::load_stack(path)?;
//! let provider = AzureProvider::new(stack);
//!
//! let desired = provider.desired();
//! let plan = provider.plan(&desired).await?;
//! let result = provider.apply(&plan).await?;
//! ```

pub mod az;
pub mod boot_script;
pub mod error;
pub mod ids;
pub mod provider;
pub mod resources;

pub use az::{AzCli, ScaleSetRequest};
pub use boot_script::{BootScript, BootScriptParams, shell_quote, shell_word};
pub use error::{AzureError, Result};
pub use ids::{IdScope, ResourceId};
pub use provider::{AzureProvider, Outputs, output_keys, resource_type_for_arm};
pub use resources::{PROVIDER, StackResources, public_ip_key, security_rule_id, types};
