//! Virtual network, security group and load balancer definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual network with a single subnet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub vnet_name: String,
    /// Address space of the vnet (CIDR)
    pub address_space: String,
    pub subnet_name: String,
    /// Subnet prefix (CIDR), must sit inside `address_space`
    pub subnet_prefix: String,
}

impl NetworkSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            vnet_name: format!("{}-vnet", name),
            address_space: "10.0.0.0/16".to_string(),
            subnet_name: format!("{}-subnet", name),
            subnet_prefix: "10.0.1.0/24".to_string(),
        }
    }
}

/// Network security group attached to both the subnet and the scale set NIC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub rules: Vec<SecurityRuleSpec>,
}

impl SecurityGroupSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            name: format!("{}-nsg", name),
            rules: vec![
                SecurityRuleSpec::inbound(
                    "allow-http",
                    100,
                    Access::Allow,
                    vec![
                        PortRange::Single(80),
                        PortRange::Single(22),
                        PortRange::Single(3389),
                    ],
                ),
                SecurityRuleSpec::inbound("deny-all", 200, Access::Deny, vec![PortRange::Any]),
            ],
        }
    }

    /// Whether inbound traffic to `port` is allowed once rule priorities are applied
    pub fn allows_inbound(&self, port: u16) -> bool {
        let mut inbound: Vec<&SecurityRuleSpec> = self
            .rules
            .iter()
            .filter(|r| r.direction == Direction::Inbound && r.covers_port(port))
            .collect();
        inbound.sort_by_key(|r| r.priority);

        inbound
            .first()
            .map(|r| r.access == Access::Allow)
            .unwrap_or(false)
    }
}

/// One rule of a network security group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRuleSpec {
    pub name: String,
    /// 100..=4096, lower wins
    pub priority: u16,
    pub direction: Direction,
    pub access: Access,
    pub protocol: RuleProtocol,
    pub source_port_range: String,
    pub destination_ports: Vec<PortRange>,
    pub source_address_prefix: String,
    pub destination_address_prefix: String,
}

impl SecurityRuleSpec {
    pub fn inbound(
        name: impl Into<String>,
        priority: u16,
        access: Access,
        destination_ports: Vec<PortRange>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            direction: Direction::Inbound,
            access,
            protocol: RuleProtocol::Any,
            source_port_range: "*".to_string(),
            destination_ports,
            source_address_prefix: "*".to_string(),
            destination_address_prefix: "*".to_string(),
        }
    }

    pub fn covers_port(&self, port: u16) -> bool {
        self.destination_ports.iter().any(|p| p.contains(port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inbound" | "in" => Some(Self::Inbound),
            "outbound" | "out" => Some(Self::Outbound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "Inbound",
            Self::Outbound => "Outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// Protocol matched by a security rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleProtocol {
    Any,
    Tcp,
    Udp,
    Icmp,
}

impl RuleProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "*" | "any" => Some(Self::Any),
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "icmp" => Some(Self::Icmp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "*",
            Self::Tcp => "Tcp",
            Self::Udp => "Udp",
            Self::Icmp => "Icmp",
        }
    }
}

/// Destination port selector of a security rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortRange {
    Any,
    Single(u16),
    Range(u16, u16),
}

impl PortRange {
    /// Parse `*`, `443` or `8000-8080`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == "*" {
            return Some(Self::Any);
        }
        if let Some((lo, hi)) = s.split_once('-') {
            let lo = lo.trim().parse::<u16>().ok()?;
            let hi = hi.trim().parse::<u16>().ok()?;
            return Some(Self::Range(lo, hi));
        }
        s.parse::<u16>().ok().map(Self::Single)
    }

    pub fn contains(&self, port: u16) -> bool {
        match *self {
            Self::Any => true,
            Self::Single(p) => p == port,
            Self::Range(lo, hi) => (lo..=hi).contains(&port),
        }
    }

    /// Bounds are within 1..=65535 and ordered
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Any => true,
            Self::Single(p) => p != 0,
            Self::Range(lo, hi) => lo != 0 && lo <= hi,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Single(p) => write!(f, "{}", p),
            Self::Range(lo, hi) => write!(f, "{}-{}", lo, hi),
        }
    }
}

/// Standard load balancer fronting the scale set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub sku: String,
    /// Static public IP bound to the frontend
    pub public_ip_name: String,
    pub frontend_name: String,
    pub backend_pool_name: String,
    pub probe: ProbeSpec,
    pub rule: LbRuleSpec,
}

impl LoadBalancerSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            name: format!("{}-lb", name),
            sku: "Standard".to_string(),
            public_ip_name: format!("{}-pip", name),
            frontend_name: "FrontendIPConfig".to_string(),
            backend_pool_name: "BackEndPools".to_string(),
            probe: ProbeSpec::default(),
            rule: LbRuleSpec::default(),
        }
    }
}

/// Health probe deciding backend pool membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    pub protocol: ProbeProtocol,
    pub port: u16,
    /// Only meaningful for HTTP(S) probes
    pub request_path: String,
    pub interval_seconds: u32,
    pub number_of_probes: u32,
    pub probe_threshold: u32,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            name: "probe-lb".to_string(),
            protocol: ProbeProtocol::Http,
            port: 80,
            request_path: "/".to_string(),
            interval_seconds: 15,
            number_of_probes: 2,
            probe_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeProtocol {
    Http,
    Https,
    Tcp,
}

impl ProbeProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "Http",
            Self::Https => "Https",
            Self::Tcp => "Tcp",
        }
    }
}

/// Load-balancing rule from the frontend to the backend pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbRuleSpec {
    pub name: String,
    pub protocol: TransportProtocol,
    pub frontend_port: u16,
    pub backend_port: u16,
    pub idle_timeout_minutes: u32,
    pub enable_floating_ip: bool,
    pub load_distribution: LoadDistribution,
}

impl Default for LbRuleSpec {
    fn default() -> Self {
        Self {
            name: "rulelb".to_string(),
            protocol: TransportProtocol::Tcp,
            frontend_port: 80,
            backend_port: 80,
            idle_timeout_minutes: 15,
            enable_floating_ip: false,
            load_distribution: LoadDistribution::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    All,
}

impl TransportProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "Tcp",
            Self::Udp => "Udp",
            Self::All => "All",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadDistribution {
    Default,
    SourceIp,
    SourceIpProtocol,
}

impl LoadDistribution {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "sourceip" | "source-ip" => Some(Self::SourceIp),
            "sourceipprotocol" | "source-ip-protocol" => Some(Self::SourceIpProtocol),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::SourceIp => "SourceIP",
            Self::SourceIpProtocol => "SourceIPProtocol",
        }
    }
}
