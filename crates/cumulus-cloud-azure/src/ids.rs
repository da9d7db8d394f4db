//! Azure Resource Manager IDs
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]`

use crate::error::{AzureError, Result};
use std::fmt;

pub const NETWORK: &str = "Microsoft.Network";
pub const COMPUTE: &str = "Microsoft.Compute";
pub const STORAGE: &str = "Microsoft.Storage";
pub const INSIGHTS: &str = "microsoft.insights";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription: String,
    pub resource_group: String,
    /// Provider namespace, absent for the resource group itself
    pub namespace: Option<String>,
    /// `(type, name)` pairs from the top-level resource down to the child
    pub segments: Vec<(String, String)>,
}

impl ResourceId {
    pub fn group(subscription: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            resource_group: resource_group.into(),
            namespace: None,
            segments: Vec::new(),
        }
    }

    /// Top-level resource in `namespace`
    pub fn resource(
        subscription: &str,
        resource_group: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            segments: vec![(resource_type.to_string(), name.to_string())],
            ..Self::group(subscription, resource_group)
        }
    }

    /// Child resource below this one
    pub fn child(mut self, resource_type: &str, name: &str) -> Self {
        self.segments
            .push((resource_type.to_string(), name.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|(_, name)| name.as_str())
            .unwrap_or(&self.resource_group)
    }

    /// ARM type, e.g. `Microsoft.Network/loadBalancers/probes`
    pub fn arm_type(&self) -> Option<String> {
        let namespace = self.namespace.as_ref()?;
        let types: Vec<&str> = self.segments.iter().map(|(t, _)| t.as_str()).collect();
        Some(format!("{}/{}", namespace, types.join("/")))
    }

    pub fn parse(id: &str) -> Result<Self> {
        let invalid = || AzureError::InvalidResourceId(id.to_string());
        let parts: Vec<&str> = id.trim_matches('/').split('/').collect();

        if parts.len() < 4
            || !parts[0].eq_ignore_ascii_case("subscriptions")
            || !parts[2].eq_ignore_ascii_case("resourceGroups")
        {
            return Err(invalid());
        }

        let mut resource_id = Self::group(parts[1], parts[3]);
        let rest = &parts[4..];
        if rest.is_empty() {
            return Ok(resource_id);
        }

        if rest.len() < 4 || !rest[0].eq_ignore_ascii_case("providers") || rest.len() % 2 != 0 {
            return Err(invalid());
        }
        resource_id.namespace = Some(rest[1].to_string());
        resource_id.segments = rest[2..]
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        if resource_id
            .segments
            .iter()
            .any(|(t, n)| t.is_empty() || n.is_empty())
        {
            return Err(invalid());
        }
        Ok(resource_id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription, self.resource_group
        )?;
        if let Some(namespace) = &self.namespace {
            write!(f, "/providers/{}", namespace)?;
            for (resource_type, name) in &self.segments {
                write!(f, "/{}/{}", resource_type, name)?;
            }
        }
        Ok(())
    }
}

/// ID builders scoped to one subscription and resource group
#[derive(Debug, Clone)]
pub struct IdScope {
    pub subscription: String,
    pub resource_group: String,
}

impl IdScope {
    pub fn new(subscription: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            resource_group: resource_group.into(),
        }
    }

    fn network(&self, resource_type: &str, name: &str) -> ResourceId {
        ResourceId::resource(
            &self.subscription,
            &self.resource_group,
            NETWORK,
            resource_type,
            name,
        )
    }

    pub fn group(&self) -> ResourceId {
        ResourceId::group(&self.subscription, &self.resource_group)
    }

    pub fn storage_account(&self, account: &str) -> ResourceId {
        ResourceId::resource(
            &self.subscription,
            &self.resource_group,
            STORAGE,
            "storageAccounts",
            account,
        )
    }

    pub fn virtual_network(&self, vnet: &str) -> ResourceId {
        self.network("virtualNetworks", vnet)
    }

    pub fn subnet(&self, vnet: &str, subnet: &str) -> ResourceId {
        self.virtual_network(vnet).child("subnets", subnet)
    }

    pub fn security_group(&self, nsg: &str) -> ResourceId {
        self.network("networkSecurityGroups", nsg)
    }

    pub fn public_ip(&self, name: &str) -> ResourceId {
        self.network("publicIPAddresses", name)
    }

    pub fn load_balancer(&self, lb: &str) -> ResourceId {
        self.network("loadBalancers", lb)
    }

    pub fn frontend_ip_config(&self, lb: &str, frontend: &str) -> ResourceId {
        self.load_balancer(lb)
            .child("frontendIPConfigurations", frontend)
    }

    pub fn backend_pool(&self, lb: &str, pool: &str) -> ResourceId {
        self.load_balancer(lb).child("backendAddressPools", pool)
    }

    pub fn probe(&self, lb: &str, probe: &str) -> ResourceId {
        self.load_balancer(lb).child("probes", probe)
    }

    pub fn scale_set(&self, vmss: &str) -> ResourceId {
        ResourceId::resource(
            &self.subscription,
            &self.resource_group,
            COMPUTE,
            "virtualMachineScaleSets",
            vmss,
        )
    }

    pub fn autoscale_setting(&self, name: &str) -> ResourceId {
        ResourceId::resource(
            &self.subscription,
            &self.resource_group,
            INSIGHTS,
            "autoscalesettings",
            name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> IdScope {
        IdScope::new("0000-1111", "nextcloud-rg")
    }

    #[test]
    fn test_backend_pool_id() {
        assert_eq!(
            scope().backend_pool("nextcloud-lb", "BackEndPools").to_string(),
            "/subscriptions/0000-1111/resourceGroups/nextcloud-rg/providers/Microsoft.Network/loadBalancers/nextcloud-lb/backendAddressPools/BackEndPools"
        );
    }

    #[test]
    fn test_probe_and_frontend_ids() {
        assert!(
            scope()
                .probe("nextcloud-lb", "probe-lb")
                .to_string()
                .ends_with("/loadBalancers/nextcloud-lb/probes/probe-lb")
        );
        assert!(
            scope()
                .frontend_ip_config("nextcloud-lb", "FrontendIPConfig")
                .to_string()
                .ends_with("/loadBalancers/nextcloud-lb/frontendIPConfigurations/FrontendIPConfig")
        );
    }

    #[test]
    fn test_parse_child_resource() {
        let raw = scope().subnet("nextcloud-vnet", "nextcloud-subnet").to_string();
        let id = ResourceId::parse(&raw).unwrap();

        assert_eq!(id.subscription, "0000-1111");
        assert_eq!(id.resource_group, "nextcloud-rg");
        assert_eq!(id.namespace.as_deref(), Some(NETWORK));
        assert_eq!(id.name(), "nextcloud-subnet");
        assert_eq!(
            id.arm_type().as_deref(),
            Some("Microsoft.Network/virtualNetworks/subnets")
        );
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn test_parse_group_id() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg").unwrap();
        assert_eq!(id, ResourceId::group("s", "rg"));
        assert_eq!(id.name(), "rg");
        assert_eq!(id.arm_type(), None);
    }

    #[test]
    fn test_parse_is_case_insensitive_on_keywords() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Compute/virtualMachineScaleSets/vmss",
        )
        .unwrap();
        assert_eq!(id.name(), "vmss");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert!(ResourceId::parse("/subscriptions/s").is_err());
        assert!(
            ResourceId::parse(
                "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/loadBalancers"
            )
            .is_err()
        );
        assert!(ResourceId::parse("/tenants/t/resourceGroups/rg").is_err());
    }
}
