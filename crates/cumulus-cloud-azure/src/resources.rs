//! Resource declarations
//!
//! Turns a [`Stack`] into the [`ResourceSet`] the provider plans against.
//! Load balancer probes and rules, subnets, NSG rules and the file share are
//! declared as resources of their own because `az` creates them one by one.

use cumulus_cloud::{ResourceConfig, ResourceSet, resource_key};
use cumulus_core::Stack;
use serde_json::json;

pub const PROVIDER: &str = "azure";

pub mod types {
    pub const RESOURCE_GROUP: &str = "resource-group";
    pub const STORAGE_ACCOUNT: &str = "storage-account";
    pub const FILE_SHARE: &str = "file-share";
    pub const VIRTUAL_NETWORK: &str = "virtual-network";
    pub const SECURITY_GROUP: &str = "network-security-group";
    pub const SECURITY_RULE: &str = "security-rule";
    pub const SUBNET: &str = "subnet";
    pub const PUBLIC_IP: &str = "public-ip";
    pub const LOAD_BALANCER: &str = "load-balancer";
    pub const LB_PROBE: &str = "lb-probe";
    pub const LB_RULE: &str = "lb-rule";
    pub const SCALE_SET: &str = "vm-scale-set";
    pub const AUTOSCALE: &str = "autoscale-setting";
}

use types::*;

/// Resource ID of a security rule: rules are scoped to their NSG
pub fn security_rule_id(nsg: &str, rule: &str) -> String {
    format!("{}/{}", nsg, rule)
}

pub struct StackResources;

impl StackResources {
    /// Every resource of the stack with its dependencies
    pub fn declare(stack: &Stack) -> ResourceSet {
        let mut set = ResourceSet::new();
        let rg = stack.resource_group.as_str();
        let storage = &stack.storage;
        let network = &stack.network;
        let nsg = &stack.security;
        let lb = &stack.load_balancer;
        let vmss = &stack.scale_set;

        set.add(resource(
            RESOURCE_GROUP,
            rg,
            json!({ "location": stack.location, "tags": stack.tags }),
        ));

        set.add(
            resource(
                STORAGE_ACCOUNT,
                &storage.account_name,
                json!({ "sku": storage.sku, "kind": storage.kind }),
            )
            .depends_on(RESOURCE_GROUP, rg),
        );
        set.add(
            resource(
                FILE_SHARE,
                &storage.share_name,
                json!({ "account": storage.account_name, "quota_gb": storage.share_quota_gb }),
            )
            .depends_on(STORAGE_ACCOUNT, &storage.account_name),
        );

        set.add(
            resource(
                VIRTUAL_NETWORK,
                &network.vnet_name,
                json!({ "address_space": network.address_space }),
            )
            .depends_on(RESOURCE_GROUP, rg),
        );

        set.add(
            resource(SECURITY_GROUP, &nsg.name, json!({})).depends_on(RESOURCE_GROUP, rg),
        );
        for rule in &nsg.rules {
            set.add(
                resource(
                    SECURITY_RULE,
                    &security_rule_id(&nsg.name, &rule.name),
                    json!({
                        "priority": rule.priority,
                        "direction": rule.direction.as_str(),
                        "access": rule.access.as_str(),
                        "protocol": rule.protocol.as_str(),
                        "destination_ports": rule
                            .destination_ports
                            .iter()
                            .map(|p| p.to_string())
                            .collect::<Vec<_>>(),
                        "source_address_prefix": rule.source_address_prefix,
                    }),
                )
                .depends_on(SECURITY_GROUP, &nsg.name),
            );
        }

        set.add(
            resource(
                SUBNET,
                &network.subnet_name,
                json!({
                    "vnet": network.vnet_name,
                    "prefix": network.subnet_prefix,
                    "nsg": nsg.name,
                }),
            )
            .depends_on(VIRTUAL_NETWORK, &network.vnet_name)
            .depends_on(SECURITY_GROUP, &nsg.name),
        );

        set.add(
            resource(
                PUBLIC_IP,
                &lb.public_ip_name,
                json!({ "sku": lb.sku, "allocation": "Static" }),
            )
            .depends_on(RESOURCE_GROUP, rg),
        );

        set.add(
            resource(
                LOAD_BALANCER,
                &lb.name,
                json!({
                    "sku": lb.sku,
                    "frontend": lb.frontend_name,
                    "backend_pool": lb.backend_pool_name,
                    "public_ip": lb.public_ip_name,
                }),
            )
            .depends_on(PUBLIC_IP, &lb.public_ip_name),
        );
        set.add(
            resource(
                LB_PROBE,
                &lb.probe.name,
                json!({
                    "load_balancer": lb.name,
                    "protocol": lb.probe.protocol.as_str(),
                    "port": lb.probe.port,
                    "path": lb.probe.request_path,
                    "interval": lb.probe.interval_seconds,
                    "count": lb.probe.number_of_probes,
                }),
            )
            .depends_on(LOAD_BALANCER, &lb.name),
        );
        set.add(
            resource(
                LB_RULE,
                &lb.rule.name,
                json!({
                    "load_balancer": lb.name,
                    "protocol": lb.rule.protocol.as_str(),
                    "frontend_port": lb.rule.frontend_port,
                    "backend_port": lb.rule.backend_port,
                    "idle_timeout": lb.rule.idle_timeout_minutes,
                    "probe": lb.probe.name,
                }),
            )
            .depends_on(LOAD_BALANCER, &lb.name)
            .depends_on(LB_PROBE, &lb.probe.name),
        );

        set.add(
            resource(
                SCALE_SET,
                &vmss.name,
                json!({
                    "vm_size": vmss.vm_size,
                    "capacity": vmss.capacity,
                    "image": vmss.image.urn(),
                    "upgrade_mode": vmss.upgrade_mode.as_str(),
                    "boot_delivery": vmss.boot_delivery.as_str(),
                    "app_image": stack.app.image,
                }),
            )
            .depends_on(SUBNET, &network.subnet_name)
            .depends_on(LB_RULE, &lb.rule.name)
            .depends_on(STORAGE_ACCOUNT, &storage.account_name)
            .depends_on(FILE_SHARE, &storage.share_name),
        );

        let autoscale = &stack.autoscale;
        set.add(
            resource(
                AUTOSCALE,
                &autoscale.name,
                json!({
                    "profile": autoscale.profile_name,
                    "minimum": autoscale.minimum,
                    "maximum": autoscale.maximum,
                    "default": autoscale.default,
                    "enabled": autoscale.enabled,
                    "rules": autoscale.rules.len(),
                }),
            )
            .depends_on(SCALE_SET, &vmss.name),
        );

        set
    }
}

fn resource(resource_type: &str, id: &str, config: serde_json::Value) -> ResourceConfig {
    ResourceConfig::new(resource_type, id, PROVIDER, config)
}

/// Key of the public IP resource, whose address feeds the boot script
pub fn public_ip_key(stack: &Stack) -> String {
    resource_key(PUBLIC_IP, &stack.load_balancer.public_ip_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_cloud::DependencyGraph;

    fn deps(set: &ResourceSet, key: &str) -> Vec<String> {
        set.get_key(key).unwrap().depends_on.clone()
    }

    #[test]
    fn test_declares_every_resource() {
        let set = StackResources::declare(&Stack::new("nextcloud"));

        assert_eq!(set.len(), 14);
        assert_eq!(set.by_type(SECURITY_RULE).len(), 2);
        assert!(set.get(SECURITY_RULE, "nextcloud-nsg/deny-all").is_some());
        assert!(set.get(LB_PROBE, "probe-lb").is_some());
        assert!(set.get(AUTOSCALE, "nextcloud-autoscale").is_some());
    }

    #[test]
    fn test_dependencies_match_reference_graph() {
        let set = StackResources::declare(&Stack::new("nextcloud"));

        assert_eq!(
            deps(&set, "subnet:nextcloud-subnet"),
            vec![
                "virtual-network:nextcloud-vnet",
                "network-security-group:nextcloud-nsg"
            ]
        );
        let vmss = deps(&set, "vm-scale-set:nextcloud-vmss");
        assert!(vmss.contains(&"lb-rule:rulelb".to_string()));
        assert!(vmss.contains(&"storage-account:nextcloudstorage".to_string()));
        assert_eq!(
            deps(&set, "autoscale-setting:nextcloud-autoscale"),
            vec!["vm-scale-set:nextcloud-vmss"]
        );
    }

    #[test]
    fn test_graph_orders_scale_set_last() {
        let set = StackResources::declare(&Stack::new("nextcloud"));
        let graph = DependencyGraph::from_resources(&set).unwrap();
        let levels = graph.levels();

        assert_eq!(levels[0], vec!["resource-group:nextcloud-rg".to_string()]);
        assert_eq!(
            levels.last().unwrap(),
            &vec!["autoscale-setting:nextcloud-autoscale".to_string()]
        );
        let order = graph.creation_order();
        let pos = |k: &str| order.iter().position(|o| o == k).unwrap();
        assert!(pos("lb-probe:probe-lb") < pos("lb-rule:rulelb"));
        assert!(pos("file-share:nextcloud") < pos("vm-scale-set:nextcloud-vmss"));
    }

    #[test]
    fn test_extra_rules_become_resources() {
        let mut stack = Stack::new("nextcloud");
        stack.security.rules.push(cumulus_core::SecurityRuleSpec::inbound(
            "allow-https",
            110,
            cumulus_core::Access::Allow,
            vec![cumulus_core::PortRange::Single(443)],
        ));

        let set = StackResources::declare(&stack);
        assert_eq!(set.len(), 15);
    }
}
