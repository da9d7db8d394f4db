//! Scale set and autoscale definitions

use serde::{Deserialize, Serialize};

/// VM scale set running the application container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSetSpec {
    pub name: String,
    /// VM SKU, e.g. `Standard_DS2_v2`
    pub vm_size: String,
    pub tier: String,
    /// Initial instance count
    pub capacity: u32,
    pub upgrade_mode: UpgradeMode,
    pub computer_name_prefix: String,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub ssh_public_key: Option<String>,
    pub image: ImageSpec,
    pub os_disk_type: String,
    pub data_disks: Vec<DataDiskSpec>,
    pub nic_name: String,
    pub ip_config_name: String,
    /// How the boot script reaches the instances
    pub boot_delivery: BootDelivery,
}

impl ScaleSetSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            name: format!("{}-vmss", name),
            vm_size: "Standard_DS2_v2".to_string(),
            tier: "Standard".to_string(),
            capacity: 1,
            upgrade_mode: UpgradeMode::Automatic,
            computer_name_prefix: format!("{}vm-", name),
            admin_username: "adminuser".to_string(),
            admin_password: None,
            ssh_public_key: None,
            image: ImageSpec::default(),
            os_disk_type: "Standard_LRS".to_string(),
            data_disks: vec![DataDiskSpec::default()],
            nic_name: format!("{}-nic", name),
            ip_config_name: format!("{}-ipconfig", name),
            boot_delivery: BootDelivery::CustomData,
        }
    }
}

/// Marketplace image reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

impl ImageSpec {
    /// URN form accepted by `az vmss create --image`
    pub fn urn(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.publisher, self.offer, self.sku, self.version
        )
    }
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            publisher: "Canonical".to_string(),
            offer: "ubuntu-24_04-lts".to_string(),
            sku: "server".to_string(),
            version: "latest".to_string(),
        }
    }
}

/// Empty managed data disk attached to every instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDiskSpec {
    pub lun: u32,
    pub size_gb: u32,
    pub storage_type: String,
}

impl Default for DataDiskSpec {
    fn default() -> Self {
        Self {
            lun: 0,
            size_gb: 1024,
            storage_type: "Standard_LRS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeMode {
    Automatic,
    Manual,
    Rolling,
}

impl UpgradeMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "automatic" => Some(Self::Automatic),
            "manual" => Some(Self::Manual),
            "rolling" => Some(Self::Rolling),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "Automatic",
            Self::Manual => "Manual",
            Self::Rolling => "Rolling",
        }
    }
}

/// Delivery channel of the boot script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootDelivery {
    /// Base64 instance custom data, run by cloud-init on first boot
    CustomData,
    /// Linux CustomScript extension
    Extension,
}

impl BootDelivery {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "custom-data" | "custom_data" | "customdata" => Some(Self::CustomData),
            "extension" | "custom-script" => Some(Self::Extension),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomData => "custom-data",
            Self::Extension => "extension",
        }
    }
}

/// Autoscale setting targeting the scale set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscaleSpec {
    pub name: String,
    pub profile_name: String,
    pub minimum: u32,
    pub maximum: u32,
    pub default: u32,
    pub enabled: bool,
    pub rules: Vec<ScaleRuleSpec>,
}

impl AutoscaleSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            name: format!("{}-autoscale", name),
            profile_name: "autoscale-cpu".to_string(),
            minimum: 1,
            maximum: 5,
            default: 2,
            enabled: true,
            rules: vec![ScaleRuleSpec::scale_out(75.0), ScaleRuleSpec::scale_in(25.0)],
        }
    }

    /// Lowest threshold that triggers a scale-out
    pub fn scale_out_threshold(&self) -> Option<f64> {
        self.rules
            .iter()
            .filter(|r| r.direction == ScaleDirection::Increase)
            .map(|r| r.threshold)
            .reduce(f64::min)
    }

    /// Highest threshold that triggers a scale-in
    pub fn scale_in_threshold(&self) -> Option<f64> {
        self.rules
            .iter()
            .filter(|r| r.direction == ScaleDirection::Decrease)
            .map(|r| r.threshold)
            .reduce(f64::max)
    }
}

/// Metric-threshold scale rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRuleSpec {
    pub metric_name: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub statistic: MetricStatistic,
    pub time_aggregation: MetricStatistic,
    pub time_grain_minutes: u32,
    pub time_window_minutes: u32,
    pub direction: ScaleDirection,
    pub change_count: u32,
    pub cooldown_minutes: u32,
}

impl ScaleRuleSpec {
    fn cpu(operator: ComparisonOperator, threshold: f64, direction: ScaleDirection) -> Self {
        Self {
            metric_name: "Percentage CPU".to_string(),
            operator,
            threshold,
            statistic: MetricStatistic::Average,
            time_aggregation: MetricStatistic::Average,
            time_grain_minutes: 1,
            time_window_minutes: 5,
            direction,
            change_count: 1,
            cooldown_minutes: 5,
        }
    }

    /// Add one instance when average CPU rises above `threshold`
    pub fn scale_out(threshold: f64) -> Self {
        Self::cpu(
            ComparisonOperator::GreaterThan,
            threshold,
            ScaleDirection::Increase,
        )
    }

    /// Remove one instance when average CPU drops below `threshold`
    pub fn scale_in(threshold: f64) -> Self {
        Self::cpu(
            ComparisonOperator::LessThan,
            threshold,
            ScaleDirection::Decrease,
        )
    }
}

/// ISO 8601 duration for a whole number of minutes (`PT5M`)
pub fn iso_minutes(minutes: u32) -> String {
    format!("PT{}M", minutes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ComparisonOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            ">" | "gt" | "greaterthan" => Some(Self::GreaterThan),
            ">=" | "ge" | "greaterthanorequal" => Some(Self::GreaterThanOrEqual),
            "<" | "lt" | "lessthan" => Some(Self::LessThan),
            "<=" | "le" | "lessthanorequal" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => "GreaterThan",
            Self::GreaterThanOrEqual => "GreaterThanOrEqual",
            Self::LessThan => "LessThan",
            Self::LessThanOrEqual => "LessThanOrEqual",
        }
    }

    /// Symbol used by `az monitor autoscale rule create --condition`
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricStatistic {
    Average,
    Min,
    Max,
    Sum,
}

impl MetricStatistic {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "average" | "avg" => Some(Self::Average),
            "min" | "minimum" => Some(Self::Min),
            "max" | "maximum" => Some(Self::Max),
            "sum" | "total" => Some(Self::Sum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Sum => "Sum",
        }
    }

    /// Lowercase aggregation keyword used in `--condition`
    pub fn condition_keyword(&self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "total",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleDirection {
    Increase,
    Decrease,
}

impl ScaleDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "increase" | "out" => Some(Self::Increase),
            "decrease" | "in" => Some(Self::Decrease),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increase => "Increase",
            Self::Decrease => "Decrease",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_autoscale_thresholds() {
        let autoscale = AutoscaleSpec::for_stack("nextcloud");
        assert_eq!(autoscale.scale_out_threshold(), Some(75.0));
        assert_eq!(autoscale.scale_in_threshold(), Some(25.0));
    }

    #[test]
    fn test_image_urn() {
        assert_eq!(
            ImageSpec::default().urn(),
            "Canonical:ubuntu-24_04-lts:server:latest"
        );
    }

    #[test]
    fn test_iso_minutes() {
        assert_eq!(iso_minutes(5), "PT5M");
    }
}
