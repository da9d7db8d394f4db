//! `security-group` and `load-balancer` nodes

use super::{
    arg_string, args, check_entries, children, normalize, parse_keyword, prop, prop_bool, prop_int,
    prop_string, to_int, value_string,
};
use crate::error::{Result, StackError};
use crate::model::{
    Access, Direction, LbRuleSpec, LoadBalancerSpec, LoadDistribution, PortRange, ProbeProtocol,
    ProbeSpec, RuleProtocol, SecurityGroupSpec, SecurityRuleSpec, TransportProtocol,
};
use kdl::{KdlNode, KdlValue};

/// security-group "name" { rule "allow-http" priority=100 access="allow" { ports 80 22 } }
///
/// Any `rule` child replaces the default rule list as a whole.
pub fn apply_security_group(node: &KdlNode, security: &mut SecurityGroupSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(name) = arg_string(node) {
        security.name = name;
    }

    let mut rules = Vec::new();
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "rule" => rules.push(parse_rule(child)?),
            other => {
                tracing::debug!(node = other, "Ignoring unknown security-group field");
            }
        }
    }

    if !rules.is_empty() {
        security.rules = rules;
    }
    Ok(())
}

fn parse_rule(node: &KdlNode) -> Result<SecurityRuleSpec> {
    check_entries(node, 1, &["priority", "access", "direction", "protocol"])?;
    let name = arg_string(node)
        .ok_or_else(|| StackError::InvalidConfig("security rule requires a name".to_string()))?;
    let priority = prop_int(node, "priority", "rule priority")?.ok_or_else(|| {
        StackError::InvalidConfig(format!("security rule '{}' requires a priority", name))
    })?;
    let access = match prop_string(node, "access") {
        Some(a) => parse_keyword(&a, "rule access", Access::parse)?,
        None => Access::Allow,
    };

    let mut rule = SecurityRuleSpec::inbound(name, priority, access, vec![PortRange::Any]);

    if let Some(direction) = prop_string(node, "direction") {
        rule.direction = parse_keyword(&direction, "rule direction", Direction::parse)?;
    }
    if let Some(protocol) = prop_string(node, "protocol") {
        rule.protocol = parse_keyword(&protocol, "rule protocol", RuleProtocol::parse)?;
    }

    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "ports" | "destination-ports" => {
                check_entries(child, usize::MAX, &[])?;
                rule.destination_ports = args(child)
                    .map(parse_port)
                    .collect::<Result<Vec<_>>>()?;
            }
            "source" | "source-address" => {
                if let Some(prefix) = value_string(child)? {
                    rule.source_address_prefix = prefix;
                }
            }
            "destination" | "destination-address" => {
                if let Some(prefix) = value_string(child)? {
                    rule.destination_address_prefix = prefix;
                }
            }
            "source-ports" => {
                if let Some(range) = value_string(child)? {
                    rule.source_port_range = range;
                }
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown rule field");
            }
        }
    }

    Ok(rule)
}

/// Ports may be written as integers (`80`) or strings (`"*"`, `"8000-8080"`)
fn parse_port(value: &KdlValue) -> Result<PortRange> {
    if value.as_integer().is_some() {
        return to_int(value, "port").map(PortRange::Single);
    }
    value
        .as_string()
        .and_then(PortRange::parse)
        .ok_or_else(|| StackError::InvalidConfig(format!("invalid port: {:?}", value)))
}

pub fn apply_load_balancer(node: &KdlNode, lb: &mut LoadBalancerSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(name) = arg_string(node) {
        lb.name = name;
    }

    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "sku" => {
                if let Some(sku) = value_string(child)? {
                    lb.sku = sku;
                }
            }
            "public-ip" => {
                if let Some(name) = value_string(child)? {
                    lb.public_ip_name = name;
                }
            }
            "frontend" => {
                if let Some(name) = value_string(child)? {
                    lb.frontend_name = name;
                }
            }
            "backend-pool" => {
                if let Some(name) = value_string(child)? {
                    lb.backend_pool_name = name;
                }
            }
            "probe" => apply_probe(child, &mut lb.probe)?,
            "rule" => apply_lb_rule(child, &mut lb.rule)?,
            other => {
                tracing::debug!(node = other, "Ignoring unknown load-balancer field");
            }
        }
    }
    Ok(())
}

/// probe "probe-lb" protocol="http" port=80 path="/" interval=15 count=2 threshold=1
fn apply_probe(node: &KdlNode, probe: &mut ProbeSpec) -> Result<()> {
    check_entries(
        node,
        1,
        &["protocol", "port", "path", "interval", "count", "threshold"],
    )?;
    if let Some(name) = arg_string(node) {
        probe.name = name;
    }
    if let Some(protocol) = prop_string(node, "protocol") {
        probe.protocol = parse_keyword(&protocol, "probe protocol", ProbeProtocol::parse)?;
    }
    if let Some(port) = prop_int(node, "port", "probe port")? {
        probe.port = port;
    }
    if let Some(path) = prop_string(node, "path") {
        probe.request_path = path;
    }
    if let Some(interval) = prop_int(node, "interval", "probe interval")? {
        probe.interval_seconds = interval;
    }
    if let Some(count) = prop_int(node, "count", "probe count")? {
        probe.number_of_probes = count;
    }
    if let Some(threshold) = prop_int(node, "threshold", "probe threshold")? {
        probe.probe_threshold = threshold;
    }
    Ok(())
}

/// rule "rulelb" protocol="tcp" frontend-port=80 backend-port=80 idle-timeout=15
fn apply_lb_rule(node: &KdlNode, rule: &mut LbRuleSpec) -> Result<()> {
    check_entries(
        node,
        1,
        &[
            "protocol",
            "frontend-port",
            "backend-port",
            "port",
            "idle-timeout",
            "floating-ip",
            "distribution",
        ],
    )?;
    if let Some(name) = arg_string(node) {
        rule.name = name;
    }
    if let Some(protocol) = prop_string(node, "protocol") {
        rule.protocol = parse_keyword(&protocol, "rule protocol", TransportProtocol::parse)?;
    }
    if let Some(port) = prop_int(node, "frontend-port", "frontend port")? {
        rule.frontend_port = port;
    }
    if let Some(port) = prop_int(node, "backend-port", "backend port")? {
        rule.backend_port = port;
    }
    if let Some(port) = prop_int::<u16>(node, "port", "rule port")? {
        rule.frontend_port = port;
        rule.backend_port = port;
    }
    if let Some(minutes) = prop_int(node, "idle-timeout", "idle timeout")? {
        rule.idle_timeout_minutes = minutes;
    }
    if let Some(floating) = prop_bool(node, "floating-ip") {
        rule.enable_floating_ip = floating;
    }
    if let Some(distribution) = prop(node, "distribution").and_then(|v| v.as_string()) {
        rule.load_distribution =
            parse_keyword(distribution, "load distribution", LoadDistribution::parse)?;
    }
    Ok(())
}
