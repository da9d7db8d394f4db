//! Stack validation
//!
//! Collects every violation instead of stopping at the first one, so a single
//! `cumulus validate` run reports everything that would make Azure reject the
//! deployment (or make it misbehave once running).

use crate::error::{Result, StackError};
use crate::model::Stack;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;

const MAX_AUTOSCALE_INSTANCES: u32 = 1000;
const MIN_PROBE_INTERVAL_SECONDS: u32 = 5;

impl Stack {
    /// Validate the declaration; credentials are not required here
    pub fn validate(&self) -> Result<()> {
        into_result(self.violations())
    }

    /// Validate for deployment: additionally requires admin credentials
    pub fn validate_for_apply(&self) -> Result<()> {
        let mut violations = self.violations();
        if self.scale_set.admin_password.is_none() && self.scale_set.ssh_public_key.is_none() {
            violations.push(format!(
                "scale set '{}' needs an admin password or an SSH public key",
                self.scale_set.name
            ));
        }
        into_result(violations)
    }

    /// Every violation found in the stack
    pub fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        self.check_storage(&mut v);
        self.check_network(&mut v);
        self.check_security(&mut v);
        self.check_load_balancer(&mut v);
        self.check_scaling(&mut v);
        self.check_app(&mut v);
        v
    }

    fn check_storage(&self, v: &mut Vec<String>) {
        let account = &self.storage.account_name;
        if !(3..=24).contains(&account.len())
            || !account
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            v.push(format!(
                "storage account name '{}' must be 3-24 lowercase letters and digits",
                account
            ));
        }

        if !is_valid_share_name(&self.storage.share_name) {
            v.push(format!(
                "share name '{}' must be 3-63 lowercase letters, digits and single hyphens, starting and ending with a letter or digit",
                self.storage.share_name
            ));
        }
    }

    fn check_network(&self, v: &mut Vec<String>) {
        let space = match Ipv4Cidr::parse(&self.network.address_space) {
            Some(c) => Some(c),
            None => {
                v.push(format!(
                    "address space '{}' is not an IPv4 CIDR",
                    self.network.address_space
                ));
                None
            }
        };

        match Ipv4Cidr::parse(&self.network.subnet_prefix) {
            None => v.push(format!(
                "subnet prefix '{}' is not an IPv4 CIDR",
                self.network.subnet_prefix
            )),
            Some(subnet) => {
                if let Some(space) = space
                    && !space.contains(&subnet)
                {
                    v.push(format!(
                        "subnet prefix {} is outside the address space {}",
                        self.network.subnet_prefix, self.network.address_space
                    ));
                }
            }
        }
    }

    fn check_security(&self, v: &mut Vec<String>) {
        let mut names = HashSet::new();
        let mut priorities = HashSet::new();

        for rule in &self.security.rules {
            if !names.insert(rule.name.as_str()) {
                v.push(format!("duplicate security rule name '{}'", rule.name));
            }
            if !(100..=4096).contains(&rule.priority) {
                v.push(format!(
                    "security rule '{}' priority {} is outside 100..=4096",
                    rule.name, rule.priority
                ));
            }
            if !priorities.insert((rule.direction, rule.priority)) {
                v.push(format!(
                    "security rule '{}' reuses {} priority {}",
                    rule.name,
                    rule.direction.as_str().to_lowercase(),
                    rule.priority
                ));
            }
            if rule.destination_ports.is_empty() {
                v.push(format!("security rule '{}' has no destination ports", rule.name));
            }
            for port in &rule.destination_ports {
                if !port.is_valid() {
                    v.push(format!(
                        "security rule '{}' port '{}' is outside 1..=65535",
                        rule.name, port
                    ));
                }
            }
        }
    }

    fn check_load_balancer(&self, v: &mut Vec<String>) {
        let lb = &self.load_balancer;

        if !self.security.allows_inbound(lb.rule.backend_port) {
            v.push(format!(
                "backend port {} is not allowed by any inbound rule ahead of a deny rule",
                lb.rule.backend_port
            ));
        }
        if lb.probe.port != lb.rule.backend_port {
            v.push(format!(
                "probe port {} differs from backend port {}",
                lb.probe.port, lb.rule.backend_port
            ));
        }
        if lb.probe.interval_seconds < MIN_PROBE_INTERVAL_SECONDS {
            v.push(format!(
                "probe interval {}s is below {}s",
                lb.probe.interval_seconds, MIN_PROBE_INTERVAL_SECONDS
            ));
        }
        if !(4..=30).contains(&lb.rule.idle_timeout_minutes) {
            v.push(format!(
                "idle timeout {} minutes is outside 4..=30",
                lb.rule.idle_timeout_minutes
            ));
        }
    }

    fn check_scaling(&self, v: &mut Vec<String>) {
        if self.scale_set.capacity < 1 {
            v.push("scale set capacity must be at least 1".to_string());
        }

        let a = &self.autoscale;
        if !(a.minimum <= a.default && a.default <= a.maximum) {
            v.push(format!(
                "autoscale capacity must satisfy minimum <= default <= maximum (got {} / {} / {})",
                a.minimum, a.default, a.maximum
            ));
        }
        if a.maximum > MAX_AUTOSCALE_INSTANCES {
            v.push(format!(
                "autoscale maximum {} exceeds {}",
                a.maximum, MAX_AUTOSCALE_INSTANCES
            ));
        }

        for rule in &a.rules {
            if rule.change_count == 0 {
                v.push(format!(
                    "autoscale {} rule must change the count by at least 1",
                    rule.direction.as_str().to_lowercase()
                ));
            }
        }

        if let (Some(out), Some(inn)) = (a.scale_out_threshold(), a.scale_in_threshold())
            && out <= inn
        {
            v.push(format!(
                "scale-out threshold {} must be greater than scale-in threshold {}",
                out, inn
            ));
        }
    }

    fn check_app(&self, v: &mut Vec<String>) {
        let app = &self.app;

        if app.host_port != self.load_balancer.rule.backend_port {
            v.push(format!(
                "app host port {} differs from load balancer backend port {}",
                app.host_port, self.load_balancer.rule.backend_port
            ));
        }
        if !app.mount_point.starts_with('/') {
            v.push(format!("mount point '{}' must be absolute", app.mount_point));
        }

        // These end up as words of the boot script's shell commands
        for (what, value) in [
            ("mount point", &app.mount_point),
            ("mount options", &app.mount_options),
            ("app image", &app.image),
            ("restart policy", &app.restart),
            ("docker release", &app.docker_release),
        ] {
            if !is_plain_word(value) {
                v.push(format!(
                    "{} '{}' may only contain letters, digits and {}",
                    what, value, PLAIN_WORD_PUNCTUATION
                ));
            }
        }
        for key in app.env.keys() {
            if !is_env_name(key) {
                v.push(format!(
                    "environment variable name '{}' must be letters, digits and '_', not starting with a digit",
                    key
                ));
            }
        }

        for volume in &app.volumes {
            for (what, value) in [
                ("volume sub-directory", &volume.sub_dir),
                ("volume container path", &volume.container_path),
            ] {
                if !is_plain_word(value) {
                    v.push(format!(
                        "{} '{}' may only contain letters, digits and {}",
                        what, value, PLAIN_WORD_PUNCTUATION
                    ));
                }
            }

            let path = Path::new(&volume.sub_dir);
            if volume.sub_dir.is_empty()
                || path.is_absolute()
                || path.components().any(|c| c.as_os_str() == "..")
            {
                v.push(format!(
                    "volume sub-directory '{}' must be relative to the mount point",
                    volume.sub_dir
                ));
            }
            if !volume.container_path.starts_with('/') {
                v.push(format!(
                    "volume container path '{}' must be absolute",
                    volume.container_path
                ));
            }
        }
    }
}

fn into_result(violations: Vec<String>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(StackError::Validation(violations))
    }
}

const PLAIN_WORD_PUNCTUATION: &str = "_@%+=:,./-";

/// Non-empty and free of whitespace and shell metacharacters
fn is_plain_word(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PLAIN_WORD_PUNCTUATION.contains(c))
}

fn is_env_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_share_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
        && !name.contains("--")
}

/// IPv4 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = s.trim().split_once('/')?;
        let addr: Ipv4Addr = addr.parse().ok()?;
        let prefix_len: u8 = prefix.parse().ok()?;
        (prefix_len <= 32).then_some(Self { addr, prefix_len })
    }

    fn mask(prefix_len: u8) -> u32 {
        match prefix_len {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n)),
        }
    }

    pub fn network(&self) -> u32 {
        u32::from(self.addr) & Self::mask(self.prefix_len)
    }

    /// `other` lies entirely inside this network
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_len >= self.prefix_len
            && (u32::from(other.addr) & Self::mask(self.prefix_len)) == self.network()
    }
}
