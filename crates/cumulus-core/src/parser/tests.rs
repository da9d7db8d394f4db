use super::*;
use crate::model::{
    Access, BootDelivery, ComparisonOperator, Direction, PortRange, ProbeProtocol, ScaleDirection,
    UpgradeMode,
};

#[test]
fn test_empty_stack_uses_defaults() {
    let kdl = r#"
        stack "nextcloud"
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    assert_eq!(stack, Stack::new("nextcloud"));
}

#[test]
fn test_default_name_without_stack_node() {
    let stack = parse_kdl_string("", "fallback".to_string()).unwrap();
    assert_eq!(stack.name, "fallback");
    assert_eq!(stack.resource_group, "fallback-rg");
}

#[test]
fn test_parse_stack_fields() {
    let kdl = r#"
        stack "shop" {
            location "westeurope"
            subscription "00000000-0000-0000-0000-000000000001"
            resource-group "shop-prod"
        }
        tags {
            owner "ops"
            env "prod"
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    assert_eq!(stack.name, "shop");
    assert_eq!(stack.location, "westeurope");
    assert_eq!(
        stack.subscription_id.as_deref(),
        Some("00000000-0000-0000-0000-000000000001")
    );
    assert_eq!(stack.resource_group, "shop-prod");
    assert_eq!(stack.tags.get("owner"), Some(&"ops".to_string()));
    assert_eq!(stack.tags.len(), 2);
}

#[test]
fn test_empty_subscription_is_unset() {
    let kdl = r#"
        stack "shop" {
            subscription ""
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    assert!(stack.subscription_id.is_none());
}

#[test]
fn test_parse_storage_and_network() {
    let kdl = r#"
        stack "nextcloud"
        storage "ncfiles01" {
            sku "Standard_ZRS"
            share "files" quota=2048
        }
        network {
            vnet "nc-vnet" address-space="10.10.0.0/16"
            subnet "nc-subnet" prefix="10.10.4.0/22"
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    assert_eq!(stack.storage.account_name, "ncfiles01");
    assert_eq!(stack.storage.sku, "Standard_ZRS");
    assert_eq!(stack.storage.kind, "StorageV2");
    assert_eq!(stack.storage.share_name, "files");
    assert_eq!(stack.storage.share_quota_gb, Some(2048));
    assert_eq!(stack.network.vnet_name, "nc-vnet");
    assert_eq!(stack.network.address_space, "10.10.0.0/16");
    assert_eq!(stack.network.subnet_name, "nc-subnet");
    assert_eq!(stack.network.subnet_prefix, "10.10.4.0/22");
}

#[test]
fn test_parse_security_group_replaces_rules() {
    let kdl = r#"
        stack "nextcloud"
        security-group "web-nsg" {
            rule "allow-web" priority=110 access="allow" protocol="tcp" {
                ports 80 443 "8000-8080"
                source "Internet"
            }
            rule "deny-all" priority=4000 access="deny" {
                ports "*"
            }
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    let nsg = &stack.security;
    assert_eq!(nsg.name, "web-nsg");
    assert_eq!(nsg.rules.len(), 2);

    let allow = &nsg.rules[0];
    assert_eq!(allow.name, "allow-web");
    assert_eq!(allow.priority, 110);
    assert_eq!(allow.access, Access::Allow);
    assert_eq!(allow.direction, Direction::Inbound);
    assert_eq!(
        allow.destination_ports,
        vec![
            PortRange::Single(80),
            PortRange::Single(443),
            PortRange::Range(8000, 8080)
        ]
    );
    assert_eq!(allow.source_address_prefix, "Internet");

    assert_eq!(nsg.rules[1].access, Access::Deny);
    assert_eq!(nsg.rules[1].destination_ports, vec![PortRange::Any]);
}

#[test]
fn test_rule_without_priority_is_rejected() {
    let kdl = r#"
        security-group {
            rule "allow-http" access="allow"
        }
    "#;

    let err = parse_kdl_string(kdl, "x".to_string()).unwrap_err();
    assert!(err.to_string().contains("requires a priority"));
}

#[test]
fn test_unknown_access_is_rejected() {
    let kdl = r#"
        security-group {
            rule "maybe" priority=100 access="maybe"
        }
    "#;

    let err = parse_kdl_string(kdl, "x".to_string()).unwrap_err();
    assert!(err.to_string().contains("unknown rule access"));
}

#[test]
fn test_out_of_range_port_is_rejected() {
    let kdl = r#"
        security-group {
            rule "big" priority=100 {
                ports 70000
            }
        }
    "#;

    assert!(parse_kdl_string(kdl, "x".to_string()).is_err());
}

#[test]
fn test_parse_load_balancer() {
    let kdl = r#"
        stack "nextcloud"
        load-balancer "edge-lb" {
            public-ip "edge-pip"
            backend-pool "pool"
            probe "health" protocol="tcp" port=8080 interval=5 count=3
            rule "http" frontend-port=80 backend-port=8080 idle-timeout=4 floating-ip=#true
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    let lb = &stack.load_balancer;
    assert_eq!(lb.name, "edge-lb");
    assert_eq!(lb.public_ip_name, "edge-pip");
    assert_eq!(lb.backend_pool_name, "pool");
    assert_eq!(lb.frontend_name, "FrontendIPConfig");
    assert_eq!(lb.probe.name, "health");
    assert_eq!(lb.probe.protocol, ProbeProtocol::Tcp);
    assert_eq!(lb.probe.port, 8080);
    assert_eq!(lb.probe.interval_seconds, 5);
    assert_eq!(lb.probe.number_of_probes, 3);
    assert_eq!(lb.probe.probe_threshold, 1);
    assert_eq!(lb.rule.frontend_port, 80);
    assert_eq!(lb.rule.backend_port, 8080);
    assert_eq!(lb.rule.idle_timeout_minutes, 4);
    assert!(lb.rule.enable_floating_ip);
}

#[test]
fn test_parse_scale_set() {
    let kdl = r#"
        stack "nextcloud"
        scale-set "nc-vmss" {
            vm-size "Standard_B2s"
            capacity 2
            upgrade-mode "manual"
            admin-user "ops"
            admin-password "s3cret-Passw0rd"
            image publisher="Canonical" offer="ubuntu-24_04-lts" sku="server" version="24.04.202410010"
            data-disk lun=0 size=256
            data-disk lun=1 size=512 type="Premium_LRS"
            nic "nc-nic" ip-config="nc-ip"
            boot "extension"
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    let vmss = &stack.scale_set;
    assert_eq!(vmss.name, "nc-vmss");
    assert_eq!(vmss.vm_size, "Standard_B2s");
    assert_eq!(vmss.capacity, 2);
    assert_eq!(vmss.upgrade_mode, UpgradeMode::Manual);
    assert_eq!(vmss.admin_username, "ops");
    assert_eq!(vmss.admin_password.as_deref(), Some("s3cret-Passw0rd"));
    assert_eq!(vmss.image.version, "24.04.202410010");
    assert_eq!(vmss.data_disks.len(), 2);
    assert_eq!(vmss.data_disks[1].storage_type, "Premium_LRS");
    assert_eq!(vmss.data_disks[0].storage_type, "Standard_LRS");
    assert_eq!(vmss.nic_name, "nc-nic");
    assert_eq!(vmss.ip_config_name, "nc-ip");
    assert_eq!(vmss.boot_delivery, BootDelivery::Extension);
}

#[test]
fn test_snake_case_names_are_accepted() {
    let kdl = r#"
        scale_set {
            vm_size "Standard_D2s_v5"
            admin_user "ops"
        }
    "#;

    let stack = parse_kdl_string(kdl, "x".to_string()).unwrap();
    assert_eq!(stack.scale_set.vm_size, "Standard_D2s_v5");
    assert_eq!(stack.scale_set.admin_username, "ops");
}

#[test]
fn test_parse_autoscale() {
    let kdl = r#"
        stack "nextcloud"
        autoscale {
            capacity min=2 max=10 default=3
            scale-out threshold=80 cooldown=10
            scale-in threshold=20.5 window=10
            rule direction="out" metric="Network In Total" operator=">=" threshold=1000000 statistic="sum"
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    let autoscale = &stack.autoscale;
    assert_eq!(autoscale.minimum, 2);
    assert_eq!(autoscale.maximum, 10);
    assert_eq!(autoscale.default, 3);
    assert_eq!(autoscale.rules.len(), 3);

    let out = &autoscale.rules[0];
    assert_eq!(out.direction, ScaleDirection::Increase);
    assert_eq!(out.operator, ComparisonOperator::GreaterThan);
    assert_eq!(out.threshold, 80.0);
    assert_eq!(out.cooldown_minutes, 10);

    let scale_in = &autoscale.rules[1];
    assert_eq!(scale_in.direction, ScaleDirection::Decrease);
    assert_eq!(scale_in.threshold, 20.5);
    assert_eq!(scale_in.time_window_minutes, 10);

    let network = &autoscale.rules[2];
    assert_eq!(network.metric_name, "Network In Total");
    assert_eq!(network.operator, ComparisonOperator::GreaterThanOrEqual);
}

#[test]
fn test_scale_rule_requires_threshold() {
    let kdl = r#"
        autoscale {
            scale-out cooldown=5
        }
    "#;

    assert!(parse_kdl_string(kdl, "x".to_string()).is_err());
}

#[test]
fn test_parse_app() {
    let kdl = r#"
        stack "nextcloud"
        app "nextcloud:31.0.0-apache" {
            port host=8080 container=80
            mount "/srv/share" options="dir_mode=0770,file_mode=0660"
            volume "html" "/var/www/html"
            volume "data" "/var/www/html/data"
            env {
                NEXTCLOUD_TRUSTED_DOMAINS "cloud.example.com"
                PHP_MEMORY_LIMIT "1G"
                WORKERS 4
            }
            trusted-proxies #false
        }
    "#;

    let stack = parse_kdl_string(kdl, "unused".to_string()).unwrap();
    let app = &stack.app;
    assert_eq!(app.image, "nextcloud:31.0.0-apache");
    assert_eq!(app.host_port, 8080);
    assert_eq!(app.container_port, 80);
    assert_eq!(app.mount_point, "/srv/share");
    assert_eq!(app.mount_options, "dir_mode=0770,file_mode=0660");
    assert_eq!(app.volumes.len(), 2);
    assert_eq!(app.volumes[0].sub_dir, "html");
    assert_eq!(app.env.get("PHP_MEMORY_LIMIT"), Some(&"1G".to_string()));
    assert_eq!(app.env.get("WORKERS"), Some(&"4".to_string()));
    assert!(!app.trusted_proxies_from_public_ip);
}

#[test]
fn test_volume_requires_two_arguments() {
    let kdl = r#"
        app {
            volume "data"
        }
    "#;

    assert!(parse_kdl_string(kdl, "x".to_string()).is_err());
}

#[test]
fn test_apply_document_overrides_single_fields() {
    let base = r#"
        stack "nextcloud"
        scale-set {
            vm-size "Standard_DS2_v2"
            capacity 1
        }
    "#;
    let overlay: KdlDocument = r#"
        scale-set {
            vm-size "Standard_B2ms"
        }
    "#
    .parse()
    .unwrap();

    let mut stack = parse_kdl_string(base, "x".to_string()).unwrap();
    apply_document(&mut stack, &overlay).unwrap();

    assert_eq!(stack.scale_set.vm_size, "Standard_B2ms");
    assert_eq!(stack.scale_set.capacity, 1);
    assert_eq!(stack.scale_set.name, "nextcloud-vmss");
}

#[test]
fn test_unknown_nodes_are_skipped() {
    let kdl = r#"
        stack "nextcloud"
        dashboard "ignored"
    "#;

    assert!(parse_kdl_string(kdl, "x".to_string()).is_ok());
}

#[test]
fn test_parse_kdl_file_uses_directory_name() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("intranet");
    std::fs::create_dir(&project).unwrap();
    let path = project.join("stack.kdl");
    std::fs::write(&path, "network { subnet \"apps\" }").unwrap();

    let stack = parse_kdl_file(&path).unwrap();
    assert_eq!(stack.name, "intranet");
    assert_eq!(stack.network.subnet_name, "apps");
}

#[test]
fn test_settings_run_together_on_one_line_are_rejected() {
    let kdl = "stack \"n\"\nscale-set { vm-size \"Standard_B2s\" capacity 2 }\n";

    let err = parse_kdl_string(kdl, "x".to_string()).unwrap_err();
    assert!(matches!(err, StackError::InvalidConfig(_)));
    assert!(err.to_string().contains("'vm-size' takes at most 1 argument(s)"));
}

#[test]
fn test_settings_separated_by_semicolon() {
    let kdl = "stack \"n\"\nscale-set { vm-size \"Standard_B2s\"; capacity 2 }\n";

    let stack = parse_kdl_string(kdl, "x".to_string()).unwrap();
    assert_eq!(stack.scale_set.vm_size, "Standard_B2s");
    assert_eq!(stack.scale_set.capacity, 2);
}

#[test]
fn test_unknown_property_is_rejected() {
    let kdl = r#"
        load-balancer {
            probe "health" port=80 timeout=5
        }
    "#;

    let err = parse_kdl_string(kdl, "x".to_string()).unwrap_err();
    assert!(err.to_string().contains("unknown property 'timeout'"));
}

#[test]
fn test_snake_case_properties_are_accepted() {
    let kdl = r#"
        load-balancer {
            rule "http" frontend_port=8080 backend_port=80
        }
    "#;

    let stack = parse_kdl_string(kdl, "x".to_string()).unwrap();
    assert_eq!(stack.load_balancer.rule.frontend_port, 8080);
    assert_eq!(stack.load_balancer.rule.backend_port, 80);
}
