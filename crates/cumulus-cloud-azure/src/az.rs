//! `az` CLI wrapper
//!
//! Every operation is a single `az ... --output json` invocation. Argument
//! lists are built by plain functions so they can be checked without the CLI.

use crate::error::{AzureError, Result};
use cumulus_cloud::{RetryConfig, with_retry};
use cumulus_core::{
    AutoscaleSpec, LoadBalancerSpec, NetworkSpec, ScaleRuleSpec, ScaleSetSpec, SecurityRuleSpec,
    StorageSpec,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::Stdio;
use tokio::process::Command;

pub const CUSTOM_SCRIPT_PUBLISHER: &str = "Microsoft.Azure.Extensions";
pub const CUSTOM_SCRIPT_NAME: &str = "CustomScript";
pub const CUSTOM_SCRIPT_VERSION: &str = "2.1";

/// Azure CLI wrapper
#[derive(Debug, Clone)]
pub struct AzCli {
    program: String,
    subscription: Option<String>,
    retry: RetryConfig,
}

impl AzCli {
    pub fn new(subscription: Option<String>) -> Self {
        Self {
            program: "az".to_string(),
            subscription,
            retry: RetryConfig::default(),
        }
    }

    /// Use a different executable (e.g. a pinned install)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// Run an az command and return stdout, retrying transient failures
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let command = args
            .iter()
            .take_while(|a| !a.starts_with('-'))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        with_retry(&self.retry, &command, AzureError::is_transient, || {
            self.run_once(args, &command)
        })
        .await
    }

    async fn run_once(&self, args: &[String], command: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.arg("--output").arg("json");
        if let Some(subscription) = &self.subscription {
            cmd.arg("--subscription").arg(subscription);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, redact_args(args));

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AzureError::AzNotFound
            } else {
                AzureError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed {
                command: command.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub async fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        let output = self.run(args).await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn run_list<T: DeserializeOwned>(&self, args: &[String]) -> Result<Vec<T>> {
        let output = self.run(args).await?;
        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&output)?)
    }

    // Account and resource group

    pub async fn account_show(&self) -> Result<AccountInfo> {
        self.run_json(&strings(&["account", "show"])).await
    }

    pub async fn group_exists(&self, group: &str) -> Result<bool> {
        self.run_json(&strings(&["group", "exists", "--name", group]))
            .await
    }

    pub async fn group_create(
        &self,
        group: &str,
        location: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.run(&group_create_args(group, location, tags)).await?;
        Ok(())
    }

    /// Starts deletion of the group and everything in it; does not wait
    pub async fn group_delete(&self, group: &str) -> Result<()> {
        self.run(&strings(&["group", "delete", "--name", group, "--yes", "--no-wait"]))
            .await?;
        Ok(())
    }

    pub async fn resource_list(&self, group: &str) -> Result<Vec<ArmResource>> {
        self.run_list(&strings(&["resource", "list", "--resource-group", group]))
            .await
    }

    pub async fn resource_delete(&self, id: &str) -> Result<()> {
        self.run(&strings(&["resource", "delete", "--ids", id])).await?;
        Ok(())
    }

    // Storage

    pub async fn storage_account_create(
        &self,
        group: &str,
        location: &str,
        storage: &StorageSpec,
    ) -> Result<()> {
        self.run(&storage_account_create_args(group, location, storage))
            .await?;
        Ok(())
    }

    /// First access key of the account
    pub async fn storage_account_key(&self, group: &str, account: &str) -> Result<String> {
        let keys: Vec<StorageKey> = self
            .run_list(&strings(&[
                "storage",
                "account",
                "keys",
                "list",
                "--resource-group",
                group,
                "--account-name",
                account,
            ]))
            .await?;

        keys.into_iter()
            .next()
            .map(|k| k.value)
            .ok_or_else(|| AzureError::UnexpectedOutput(format!("keys of {}", account)))
    }

    pub async fn share_create(&self, group: &str, storage: &StorageSpec) -> Result<()> {
        self.run(&share_create_args(group, storage)).await?;
        Ok(())
    }

    pub async fn share_list(&self, group: &str, account: &str) -> Result<Vec<NamedResource>> {
        self.run_list(&strings(&[
            "storage",
            "share-rm",
            "list",
            "--resource-group",
            group,
            "--storage-account",
            account,
        ]))
        .await
    }

    // Network

    pub async fn vnet_create(
        &self,
        group: &str,
        location: &str,
        network: &NetworkSpec,
    ) -> Result<()> {
        self.run(&strings(&[
            "network",
            "vnet",
            "create",
            "--resource-group",
            group,
            "--name",
            &network.vnet_name,
            "--location",
            location,
            "--address-prefixes",
            &network.address_space,
        ]))
        .await?;
        Ok(())
    }

    pub async fn subnet_create(&self, group: &str, network: &NetworkSpec, nsg: &str) -> Result<()> {
        self.run(&subnet_create_args(group, network, nsg)).await?;
        Ok(())
    }

    pub async fn subnet_list(&self, group: &str, vnet: &str) -> Result<Vec<NamedResource>> {
        self.run_list(&strings(&[
            "network",
            "vnet",
            "subnet",
            "list",
            "--resource-group",
            group,
            "--vnet-name",
            vnet,
        ]))
        .await
    }

    pub async fn nsg_create(&self, group: &str, location: &str, nsg: &str) -> Result<()> {
        self.run(&strings(&[
            "network",
            "nsg",
            "create",
            "--resource-group",
            group,
            "--name",
            nsg,
            "--location",
            location,
        ]))
        .await?;
        Ok(())
    }

    pub async fn nsg_rule_create(
        &self,
        group: &str,
        nsg: &str,
        rule: &SecurityRuleSpec,
    ) -> Result<()> {
        self.run(&nsg_rule_create_args(group, nsg, rule)).await?;
        Ok(())
    }

    pub async fn nsg_rule_list(&self, group: &str, nsg: &str) -> Result<Vec<NamedResource>> {
        self.run_list(&strings(&[
            "network",
            "nsg",
            "rule",
            "list",
            "--resource-group",
            group,
            "--nsg-name",
            nsg,
        ]))
        .await
    }

    pub async fn public_ip_create(
        &self,
        group: &str,
        location: &str,
        lb: &LoadBalancerSpec,
    ) -> Result<()> {
        self.run(&strings(&[
            "network",
            "public-ip",
            "create",
            "--resource-group",
            group,
            "--name",
            &lb.public_ip_name,
            "--location",
            location,
            "--sku",
            &lb.sku,
            "--allocation-method",
            "Static",
        ]))
        .await?;
        Ok(())
    }

    /// Allocated address of a public IP
    pub async fn public_ip_address(&self, group: &str, name: &str) -> Result<String> {
        let info: PublicIpInfo = self
            .run_json(&strings(&[
                "network",
                "public-ip",
                "show",
                "--resource-group",
                group,
                "--name",
                name,
            ]))
            .await?;
        info.ip_address
            .ok_or_else(|| AzureError::MissingOutput(format!("address of public IP {}", name)))
    }

    pub async fn lb_create(
        &self,
        group: &str,
        location: &str,
        lb: &LoadBalancerSpec,
    ) -> Result<()> {
        self.run(&lb_create_args(group, location, lb)).await?;
        Ok(())
    }

    pub async fn lb_probe_create(&self, group: &str, lb: &LoadBalancerSpec) -> Result<()> {
        self.run(&lb_probe_create_args(group, lb)).await?;
        Ok(())
    }

    pub async fn lb_probe_list(&self, group: &str, lb: &str) -> Result<Vec<NamedResource>> {
        self.run_list(&strings(&[
            "network",
            "lb",
            "probe",
            "list",
            "--resource-group",
            group,
            "--lb-name",
            lb,
        ]))
        .await
    }

    pub async fn lb_rule_create(&self, group: &str, lb: &LoadBalancerSpec) -> Result<()> {
        self.run(&lb_rule_create_args(group, lb)).await?;
        Ok(())
    }

    pub async fn lb_rule_list(&self, group: &str, lb: &str) -> Result<Vec<NamedResource>> {
        self.run_list(&strings(&[
            "network",
            "lb",
            "rule",
            "list",
            "--resource-group",
            group,
            "--lb-name",
            lb,
        ]))
        .await
    }

    /// Delete a child of a network resource (`vnet subnet`, `nsg rule`, `lb probe`, `lb rule`)
    pub async fn network_child_delete(
        &self,
        group: &str,
        kind: &[&str],
        parent_flag: &str,
        parent: &str,
        name: &str,
    ) -> Result<()> {
        let mut args = strings(&["network"]);
        args.extend(strings(kind));
        args.extend(strings(&[
            "delete",
            "--resource-group",
            group,
            parent_flag,
            parent,
            "--name",
            name,
        ]));
        self.run(&args).await?;
        Ok(())
    }

    pub async fn share_delete(&self, group: &str, account: &str, share: &str) -> Result<()> {
        self.run(&strings(&[
            "storage",
            "share-rm",
            "delete",
            "--resource-group",
            group,
            "--storage-account",
            account,
            "--name",
            share,
            "--yes",
        ]))
        .await?;
        Ok(())
    }

    // Compute

    /// Create the scale set; `custom_data` is passed through a temp file
    pub async fn vmss_create(&self, request: &ScaleSetRequest<'_>) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("cumulus-custom-data-")
            .suffix(".sh")
            .tempfile()?;
        if let Some(script) = request.custom_data {
            file.write_all(script.as_bytes())?;
            file.flush()?;
        }
        let path = file.path().to_string_lossy().to_string();
        let custom_data = request.custom_data.map(|_| path.as_str());

        self.run(&vmss_create_args(request, custom_data)).await?;
        Ok(())
    }

    /// Install the boot script through the Linux CustomScript extension
    pub async fn vmss_extension_set(
        &self,
        group: &str,
        vmss: &str,
        script_base64: &str,
    ) -> Result<()> {
        self.run(&vmss_extension_args(group, vmss, script_base64)?)
            .await?;
        Ok(())
    }

    // Autoscale

    pub async fn autoscale_create(
        &self,
        group: &str,
        autoscale: &AutoscaleSpec,
        target_id: &str,
    ) -> Result<()> {
        self.run(&autoscale_create_args(group, autoscale, target_id))
            .await?;
        Ok(())
    }

    pub async fn autoscale_rule_create(
        &self,
        group: &str,
        autoscale: &str,
        rule: &ScaleRuleSpec,
    ) -> Result<()> {
        self.run(&autoscale_rule_args(group, autoscale, rule)).await?;
        Ok(())
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

pub fn group_create_args(
    group: &str,
    location: &str,
    tags: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut args = strings(&["group", "create", "--name", group, "--location", location]);
    if !tags.is_empty() {
        args.push("--tags".to_string());
        args.extend(tags.iter().map(|(k, v)| format!("{}={}", k, v)));
    }
    args
}

pub fn storage_account_create_args(
    group: &str,
    location: &str,
    storage: &StorageSpec,
) -> Vec<String> {
    strings(&[
        "storage",
        "account",
        "create",
        "--resource-group",
        group,
        "--name",
        &storage.account_name,
        "--location",
        location,
        "--sku",
        &storage.sku,
        "--kind",
        &storage.kind,
    ])
}

pub fn share_create_args(group: &str, storage: &StorageSpec) -> Vec<String> {
    let mut args = strings(&[
        "storage",
        "share-rm",
        "create",
        "--resource-group",
        group,
        "--storage-account",
        &storage.account_name,
        "--name",
        &storage.share_name,
    ]);
    if let Some(quota) = storage.share_quota_gb {
        push(&mut args, "--quota", quota);
    }
    args
}

pub fn subnet_create_args(group: &str, network: &NetworkSpec, nsg: &str) -> Vec<String> {
    strings(&[
        "network",
        "vnet",
        "subnet",
        "create",
        "--resource-group",
        group,
        "--vnet-name",
        &network.vnet_name,
        "--name",
        &network.subnet_name,
        "--address-prefixes",
        &network.subnet_prefix,
        "--network-security-group",
        nsg,
    ])
}

pub fn nsg_rule_create_args(group: &str, nsg: &str, rule: &SecurityRuleSpec) -> Vec<String> {
    let mut args = strings(&[
        "network",
        "nsg",
        "rule",
        "create",
        "--resource-group",
        group,
        "--nsg-name",
        nsg,
        "--name",
        &rule.name,
    ]);
    push(&mut args, "--priority", rule.priority);
    push(&mut args, "--direction", rule.direction.as_str());
    push(&mut args, "--access", rule.access.as_str());
    push(&mut args, "--protocol", rule.protocol.as_str());
    push(&mut args, "--source-address-prefixes", &rule.source_address_prefix);
    push(&mut args, "--source-port-ranges", &rule.source_port_range);
    push(
        &mut args,
        "--destination-address-prefixes",
        &rule.destination_address_prefix,
    );
    args.push("--destination-port-ranges".to_string());
    args.extend(rule.destination_ports.iter().map(|p| p.to_string()));
    args
}

pub fn lb_create_args(group: &str, location: &str, lb: &LoadBalancerSpec) -> Vec<String> {
    strings(&[
        "network",
        "lb",
        "create",
        "--resource-group",
        group,
        "--name",
        &lb.name,
        "--location",
        location,
        "--sku",
        &lb.sku,
        "--public-ip-address",
        &lb.public_ip_name,
        "--frontend-ip-name",
        &lb.frontend_name,
        "--backend-pool-name",
        &lb.backend_pool_name,
    ])
}

pub fn lb_probe_create_args(group: &str, lb: &LoadBalancerSpec) -> Vec<String> {
    let probe = &lb.probe;
    let mut args = strings(&[
        "network",
        "lb",
        "probe",
        "create",
        "--resource-group",
        group,
        "--lb-name",
        &lb.name,
        "--name",
        &probe.name,
    ]);
    push(&mut args, "--protocol", probe.protocol.as_str());
    push(&mut args, "--port", probe.port);
    if probe.protocol != cumulus_core::ProbeProtocol::Tcp {
        push(&mut args, "--path", &probe.request_path);
    }
    push(&mut args, "--interval", probe.interval_seconds);
    push(&mut args, "--number-of-probes", probe.number_of_probes);
    push(&mut args, "--probe-threshold", probe.probe_threshold);
    args
}

pub fn lb_rule_create_args(group: &str, lb: &LoadBalancerSpec) -> Vec<String> {
    let rule = &lb.rule;
    let mut args = strings(&[
        "network",
        "lb",
        "rule",
        "create",
        "--resource-group",
        group,
        "--lb-name",
        &lb.name,
        "--name",
        &rule.name,
    ]);
    push(&mut args, "--protocol", rule.protocol.as_str());
    push(&mut args, "--frontend-port", rule.frontend_port);
    push(&mut args, "--backend-port", rule.backend_port);
    push(&mut args, "--frontend-ip-name", &lb.frontend_name);
    push(&mut args, "--backend-pool-name", &lb.backend_pool_name);
    push(&mut args, "--probe-name", &lb.probe.name);
    push(&mut args, "--idle-timeout", rule.idle_timeout_minutes);
    push(&mut args, "--floating-ip", rule.enable_floating_ip);
    push(&mut args, "--load-distribution", rule.load_distribution.as_str());
    args
}

/// Inputs of `az vmss create`
#[derive(Debug, Clone)]
pub struct ScaleSetRequest<'a> {
    pub group: &'a str,
    pub location: &'a str,
    pub scale_set: &'a ScaleSetSpec,
    pub subnet_id: &'a str,
    pub load_balancer: &'a str,
    pub backend_pool: &'a str,
    pub nsg: &'a str,
    /// Boot script as plain text (az encodes it)
    pub custom_data: Option<&'a str>,
}

pub fn vmss_create_args(
    request: &ScaleSetRequest<'_>,
    custom_data_file: Option<&str>,
) -> Vec<String> {
    let vmss = request.scale_set;
    let mut args = strings(&[
        "vmss",
        "create",
        "--resource-group",
        request.group,
        "--name",
        &vmss.name,
        "--location",
        request.location,
        "--orchestration-mode",
        "Uniform",
    ]);
    push(&mut args, "--image", vmss.image.urn());
    push(&mut args, "--vm-sku", &vmss.vm_size);
    push(&mut args, "--instance-count", vmss.capacity);
    push(&mut args, "--upgrade-policy-mode", vmss.upgrade_mode.as_str());
    push(&mut args, "--computer-name-prefix", &vmss.computer_name_prefix);
    push(&mut args, "--admin-username", &vmss.admin_username);

    match (&vmss.admin_password, &vmss.ssh_public_key) {
        (Some(password), key) => {
            push(&mut args, "--admin-password", password);
            if let Some(key) = key {
                push(&mut args, "--ssh-key-values", key);
                push(&mut args, "--authentication-type", "all");
            } else {
                push(&mut args, "--authentication-type", "password");
            }
        }
        (None, Some(key)) => {
            push(&mut args, "--ssh-key-values", key);
            push(&mut args, "--authentication-type", "ssh");
        }
        (None, None) => {}
    }

    push(&mut args, "--subnet", request.subnet_id);
    push(&mut args, "--lb", request.load_balancer);
    push(&mut args, "--backend-pool-name", request.backend_pool);
    push(&mut args, "--nsg", request.nsg);
    push(&mut args, "--public-ip-address", "");

    if !vmss.data_disks.is_empty() {
        args.push("--data-disk-sizes-gb".to_string());
        args.extend(vmss.data_disks.iter().map(|d| d.size_gb.to_string()));
    }
    args.push("--storage-sku".to_string());
    args.push(format!("os={}", vmss.os_disk_type));
    args.extend(
        vmss.data_disks
            .iter()
            .map(|d| format!("{}={}", d.lun, d.storage_type)),
    );

    if let Some(path) = custom_data_file {
        push(&mut args, "--custom-data", path);
    }
    args
}

pub fn vmss_extension_args(group: &str, vmss: &str, script_base64: &str) -> Result<Vec<String>> {
    let settings = serde_json::to_string(&serde_json::json!({ "script": script_base64 }))?;
    Ok(strings(&[
        "vmss",
        "extension",
        "set",
        "--resource-group",
        group,
        "--vmss-name",
        vmss,
        "--name",
        CUSTOM_SCRIPT_NAME,
        "--publisher",
        CUSTOM_SCRIPT_PUBLISHER,
        "--version",
        CUSTOM_SCRIPT_VERSION,
        "--protected-settings",
        &settings,
    ]))
}

pub fn autoscale_create_args(
    group: &str,
    autoscale: &AutoscaleSpec,
    target_id: &str,
) -> Vec<String> {
    let mut args = strings(&[
        "monitor",
        "autoscale",
        "create",
        "--resource-group",
        group,
        "--name",
        &autoscale.name,
        "--resource",
        target_id,
    ]);
    push(&mut args, "--min-count", autoscale.minimum);
    push(&mut args, "--max-count", autoscale.maximum);
    push(&mut args, "--count", autoscale.default);
    if !autoscale.enabled {
        push(&mut args, "--disabled", true);
    }
    args
}

/// `--condition "Percentage CPU > 75 avg 5m"` and friends
pub fn autoscale_rule_args(group: &str, autoscale: &str, rule: &ScaleRuleSpec) -> Vec<String> {
    let condition = format!(
        "{} {} {} {} {}m",
        rule.metric_name,
        rule.operator.symbol(),
        rule.threshold,
        rule.time_aggregation.condition_keyword(),
        rule.time_window_minutes
    );
    let scale = match rule.direction {
        cumulus_core::ScaleDirection::Increase => format!("out {}", rule.change_count),
        cumulus_core::ScaleDirection::Decrease => format!("in {}", rule.change_count),
    };
    let mut args = strings(&[
        "monitor",
        "autoscale",
        "rule",
        "create",
        "--resource-group",
        group,
        "--autoscale-name",
        autoscale,
    ]);
    push(&mut args, "--condition", condition);
    push(&mut args, "--scale", scale);
    push(&mut args, "--cooldown", rule.cooldown_minutes);
    push(
        &mut args,
        "--timegrain",
        format!(
            "{} {}m",
            rule.statistic.condition_keyword(),
            rule.time_grain_minutes
        ),
    );
    args
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUser {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Entry of `az resource list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "provisioningState", default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Any az list entry where only the name and ID matter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "provisioningState", default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageKey {
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PublicIpInfo {
    #[serde(rename = "ipAddress", default)]
    ip_address: Option<String>,
}

/// Flags whose value carries a secret
const SECRET_FLAGS: &[&str] = &["--admin-password", "--protected-settings", "--account-key"];

/// Command line for logging, with secret flag values masked
fn redact_args(args: &[String]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("***");
            mask_next = false;
        } else {
            out.push(arg.as_str());
            mask_next = SECRET_FLAGS.contains(&arg.as_str());
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_core::Stack;

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_redact_args_masks_secrets() {
        let args = strings(&[
            "vmss",
            "create",
            "--name",
            "nextcloud-vmss",
            "--admin-password",
            "s3cret-Passw0rd",
            "--protected-settings",
            "{\"script\":\"IyEvYmluL2Jhc2g=\"}",
        ]);

        let line = redact_args(&args);
        assert_eq!(
            line,
            "vmss create --name nextcloud-vmss --admin-password *** --protected-settings ***"
        );
        assert!(!line.contains("s3cret"));
    }

    #[test]
    fn test_nsg_rule_args_list_every_port() {
        let stack = Stack::new("nextcloud");
        let args = nsg_rule_create_args("rg", "nextcloud-nsg", &stack.security.rules[0]);

        assert_eq!(flag_value(&args, "--priority"), Some("100"));
        assert_eq!(flag_value(&args, "--access"), Some("Allow"));
        assert_eq!(flag_value(&args, "--protocol"), Some("*"));
        let ports: Vec<&str> = args
            .iter()
            .skip_while(|a| *a != "--destination-port-ranges")
            .skip(1)
            .map(String::as_str)
            .collect();
        assert_eq!(ports, vec!["80", "22", "3389"]);
    }

    #[test]
    fn test_probe_and_rule_args() {
        let stack = Stack::new("nextcloud");
        let probe = lb_probe_create_args("rg", &stack.load_balancer);
        assert_eq!(flag_value(&probe, "--protocol"), Some("Http"));
        assert_eq!(flag_value(&probe, "--path"), Some("/"));
        assert_eq!(flag_value(&probe, "--interval"), Some("15"));

        let rule = lb_rule_create_args("rg", &stack.load_balancer);
        assert_eq!(flag_value(&rule, "--probe-name"), Some("probe-lb"));
        assert_eq!(flag_value(&rule, "--backend-pool-name"), Some("BackEndPools"));
        assert_eq!(flag_value(&rule, "--idle-timeout"), Some("15"));
        assert_eq!(flag_value(&rule, "--floating-ip"), Some("false"));
    }

    #[test]
    fn test_vmss_args() {
        let mut stack = Stack::new("nextcloud");
        stack.scale_set.ssh_public_key = Some("ssh-ed25519 AAAA".to_string());
        let request = ScaleSetRequest {
            group: "nextcloud-rg",
            location: "northeurope",
            scale_set: &stack.scale_set,
            subnet_id: "/subscriptions/s/resourceGroups/nextcloud-rg/providers/Microsoft.Network/virtualNetworks/v/subnets/s",
            load_balancer: "nextcloud-lb",
            backend_pool: "BackEndPools",
            nsg: "nextcloud-nsg",
            custom_data: Some("#!/bin/bash"),
        };

        let args = vmss_create_args(&request, Some("/tmp/boot.sh"));
        assert_eq!(
            flag_value(&args, "--image"),
            Some("Canonical:ubuntu-24_04-lts:server:latest")
        );
        assert_eq!(flag_value(&args, "--vm-sku"), Some("Standard_DS2_v2"));
        assert_eq!(flag_value(&args, "--authentication-type"), Some("ssh"));
        assert_eq!(flag_value(&args, "--data-disk-sizes-gb"), Some("1024"));
        assert_eq!(flag_value(&args, "--custom-data"), Some("/tmp/boot.sh"));
        assert!(args.contains(&"0=Standard_LRS".to_string()));
        assert!(!args.contains(&"--admin-password".to_string()));
    }

    #[test]
    fn test_extension_args_carry_script() {
        let args = vmss_extension_args("rg", "vmss", "IyEvYmluL2Jhc2g=").unwrap();
        assert_eq!(flag_value(&args, "--publisher"), Some(CUSTOM_SCRIPT_PUBLISHER));
        assert_eq!(
            flag_value(&args, "--protected-settings"),
            Some(r#"{"script":"IyEvYmluL2Jhc2g="}"#)
        );
    }

    #[test]
    fn test_autoscale_rule_condition() {
        let stack = Stack::new("nextcloud");
        let out = autoscale_rule_args("rg", "nextcloud-autoscale", &stack.autoscale.rules[0]);
        let inn = autoscale_rule_args("rg", "nextcloud-autoscale", &stack.autoscale.rules[1]);

        assert_eq!(flag_value(&out, "--condition"), Some("Percentage CPU > 75 avg 5m"));
        assert_eq!(flag_value(&out, "--scale"), Some("out 1"));
        assert_eq!(flag_value(&out, "--cooldown"), Some("5"));
        assert_eq!(flag_value(&out, "--timegrain"), Some("avg 1m"));
        assert_eq!(flag_value(&inn, "--condition"), Some("Percentage CPU < 25 avg 5m"));
        assert_eq!(flag_value(&inn, "--scale"), Some("in 1"));
    }

    #[test]
    fn test_group_tags() {
        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), "prod".to_string());
        let args = group_create_args("rg", "northeurope", &tags);
        assert_eq!(flag_value(&args, "--tags"), Some("env=prod"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let az = AzCli::new(None)
            .with_program("cumulus-definitely-not-installed-az")
            .with_retry(RetryConfig::none());
        let err = az.account_show().await.unwrap_err();
        assert!(matches!(err, AzureError::AzNotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_parses_json_and_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("az");
        std::fs::write(
            &fake,
            "#!/bin/sh\nif [ \"$1\" = \"account\" ]; then\n  echo '{\"id\":\"sub-1\",\"name\":\"Dev\"}'\nelse\n  echo 'ERROR: (ResourceGroupNotFound) missing' >&2\n  exit 1\nfi\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let az = AzCli::new(None)
            .with_program(fake.to_string_lossy())
            .with_retry(RetryConfig::none());

        let account = az.account_show().await.unwrap();
        assert_eq!(account.id, "sub-1");

        match az.resource_list("rg").await.unwrap_err() {
            AzureError::CommandFailed { command, stderr } => {
                assert_eq!(command, "resource list");
                assert!(stderr.contains("ResourceGroupNotFound"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
