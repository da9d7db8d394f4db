//! `scale-set` and `autoscale` nodes

use super::{
    arg_string, check_entries, children, non_empty, normalize, parse_keyword, prop, prop_int,
    prop_string, to_float, value_bool, value_int, value_string,
};
use crate::error::{Result, StackError};
use crate::model::{
    AutoscaleSpec, BootDelivery, ComparisonOperator, DataDiskSpec, MetricStatistic,
    ScaleDirection, ScaleRuleSpec, ScaleSetSpec, UpgradeMode,
};
use kdl::KdlNode;

pub fn apply_scale_set(node: &KdlNode, vmss: &mut ScaleSetSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(name) = arg_string(node) {
        vmss.name = name;
    }

    let mut data_disks = Vec::new();
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "vm-size" | "sku" => {
                if let Some(size) = value_string(child)? {
                    vmss.vm_size = size;
                }
            }
            "tier" => {
                if let Some(tier) = value_string(child)? {
                    vmss.tier = tier;
                }
            }
            "capacity" => {
                if let Some(capacity) = value_int(child, "capacity")? {
                    vmss.capacity = capacity;
                }
            }
            "upgrade-mode" | "upgrade-policy" => {
                if let Some(mode) = value_string(child)? {
                    vmss.upgrade_mode = parse_keyword(&mode, "upgrade mode", UpgradeMode::parse)?;
                }
            }
            "computer-name-prefix" => {
                if let Some(prefix) = value_string(child)? {
                    vmss.computer_name_prefix = prefix;
                }
            }
            "admin-user" | "admin-username" => {
                if let Some(user) = value_string(child)? {
                    vmss.admin_username = user;
                }
            }
            "admin-password" => {
                vmss.admin_password = non_empty(value_string(child)?);
            }
            "ssh-key" | "ssh-public-key" => {
                vmss.ssh_public_key = non_empty(value_string(child)?);
            }
            "image" => {
                check_entries(child, 0, &["publisher", "offer", "sku", "version"])?;
                if let Some(publisher) = prop_string(child, "publisher") {
                    vmss.image.publisher = publisher;
                }
                if let Some(offer) = prop_string(child, "offer") {
                    vmss.image.offer = offer;
                }
                if let Some(sku) = prop_string(child, "sku") {
                    vmss.image.sku = sku;
                }
                if let Some(version) = prop_string(child, "version") {
                    vmss.image.version = version;
                }
            }
            "os-disk" => {
                if let Some(disk_type) = value_string(child)? {
                    vmss.os_disk_type = disk_type;
                }
            }
            "data-disk" => {
                check_entries(child, 0, &["lun", "size", "type"])?;
                let mut disk = DataDiskSpec::default();
                if let Some(lun) = prop_int(child, "lun", "data disk lun")? {
                    disk.lun = lun;
                }
                if let Some(size) = prop_int(child, "size", "data disk size")? {
                    disk.size_gb = size;
                }
                if let Some(storage_type) = prop_string(child, "type") {
                    disk.storage_type = storage_type;
                }
                data_disks.push(disk);
            }
            "nic" => {
                check_entries(child, 1, &["ip-config"])?;
                if let Some(name) = arg_string(child) {
                    vmss.nic_name = name;
                }
                if let Some(ip_config) = prop_string(child, "ip-config") {
                    vmss.ip_config_name = ip_config;
                }
            }
            "boot" | "boot-delivery" => {
                if let Some(delivery) = value_string(child)? {
                    vmss.boot_delivery =
                        parse_keyword(&delivery, "boot delivery", BootDelivery::parse)?;
                }
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown scale-set field");
            }
        }
    }

    if !data_disks.is_empty() {
        vmss.data_disks = data_disks;
    }
    Ok(())
}

/// autoscale "name" { capacity min=1 max=5 default=2; scale-out threshold=75; scale-in threshold=25 }
///
/// Any `scale-out`, `scale-in` or `rule` child replaces the default rule list.
pub fn apply_autoscale(node: &KdlNode, autoscale: &mut AutoscaleSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(name) = arg_string(node) {
        autoscale.name = name;
    }

    let mut rules = Vec::new();
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "profile" => {
                if let Some(profile) = value_string(child)? {
                    autoscale.profile_name = profile;
                }
            }
            "capacity" => {
                check_entries(child, 0, &["min", "max", "default"])?;
                if let Some(min) = prop_int(child, "min", "autoscale minimum")? {
                    autoscale.minimum = min;
                }
                if let Some(max) = prop_int(child, "max", "autoscale maximum")? {
                    autoscale.maximum = max;
                }
                if let Some(default) = prop_int(child, "default", "autoscale default")? {
                    autoscale.default = default;
                }
            }
            "enabled" => {
                if let Some(enabled) = value_bool(child)? {
                    autoscale.enabled = enabled;
                }
            }
            "scale-out" => {
                check_entries(child, 0, &SCALE_RULE_PROPS)?;
                let mut rule = ScaleRuleSpec::scale_out(0.0);
                apply_scale_rule(child, &mut rule)?;
                rules.push(rule);
            }
            "scale-in" => {
                check_entries(child, 0, &SCALE_RULE_PROPS)?;
                let mut rule = ScaleRuleSpec::scale_in(0.0);
                apply_scale_rule(child, &mut rule)?;
                rules.push(rule);
            }
            "rule" => {
                check_entries(child, 0, &SCALE_RULE_PROPS_WITH_DIRECTION)?;
                let direction = prop_string(child, "direction").ok_or_else(|| {
                    StackError::InvalidConfig("autoscale rule requires a direction".to_string())
                })?;
                let mut rule =
                    match parse_keyword(&direction, "scale direction", ScaleDirection::parse)? {
                        ScaleDirection::Increase => ScaleRuleSpec::scale_out(0.0),
                        ScaleDirection::Decrease => ScaleRuleSpec::scale_in(0.0),
                    };
                apply_scale_rule(child, &mut rule)?;
                rules.push(rule);
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown autoscale field");
            }
        }
    }

    if !rules.is_empty() {
        autoscale.rules = rules;
    }
    Ok(())
}

const SCALE_RULE_PROPS: [&str; 9] = [
    "threshold",
    "metric",
    "operator",
    "statistic",
    "aggregation",
    "grain",
    "window",
    "change",
    "cooldown",
];

const SCALE_RULE_PROPS_WITH_DIRECTION: [&str; 10] = [
    "threshold",
    "metric",
    "operator",
    "statistic",
    "aggregation",
    "grain",
    "window",
    "change",
    "cooldown",
    "direction",
];

fn apply_scale_rule(node: &KdlNode, rule: &mut ScaleRuleSpec) -> Result<()> {
    rule.threshold = prop(node, "threshold").and_then(to_float).ok_or_else(|| {
        StackError::InvalidConfig(format!(
            "autoscale rule '{}' requires a numeric threshold",
            node.name().value()
        ))
    })?;

    if let Some(metric) = prop_string(node, "metric") {
        rule.metric_name = metric;
    }
    if let Some(operator) = prop_string(node, "operator") {
        rule.operator = parse_keyword(&operator, "comparison operator", ComparisonOperator::parse)?;
    }
    if let Some(statistic) = prop_string(node, "statistic") {
        rule.statistic = parse_keyword(&statistic, "metric statistic", MetricStatistic::parse)?;
    }
    if let Some(aggregation) = prop_string(node, "aggregation") {
        rule.time_aggregation =
            parse_keyword(&aggregation, "time aggregation", MetricStatistic::parse)?;
    }
    if let Some(grain) = prop_int(node, "grain", "time grain")? {
        rule.time_grain_minutes = grain;
    }
    if let Some(window) = prop_int(node, "window", "time window")? {
        rule.time_window_minutes = window;
    }
    if let Some(count) = prop_int(node, "change", "change count")? {
        rule.change_count = count;
    }
    if let Some(cooldown) = prop_int(node, "cooldown", "cooldown")? {
        rule.cooldown_minutes = cooldown;
    }
    Ok(())
}
