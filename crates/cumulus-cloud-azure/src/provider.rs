//! Azure provider implementation

use crate::az::{AzCli, ScaleSetRequest};
use crate::boot_script::{BootScript, BootScriptParams};
use crate::error::{AzureError, Result};
use crate::ids::IdScope;
use crate::resources::{PROVIDER, StackResources, security_rule_id, types::*};
use async_trait::async_trait;
use cumulus_cloud::{
    Action, ActionType, ApplyResult, AuthStatus, CloudProvider, DependencyGraph, GlobalState,
    Plan, ProviderState, ResourceSet, ResourceState, ResourceStatus, StateManager, resource_key,
    split_key,
};
use cumulus_core::{BootDelivery, Stack};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output keys captured while applying
pub mod output_keys {
    pub const STORAGE_KEY: &str = "storage_key";
    pub const PUBLIC_IP: &str = "public_ip";
    pub const SUBSCRIPTION: &str = "subscription";

    /// ARM ID of a resource, by resource key
    pub fn id_of(key: &str) -> String {
        format!("id:{}", key)
    }
}

/// Values that only exist once resources are created
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    values: BTreeMap<String, String>,
}

impl Outputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, String)>) {
        self.values.extend(values);
    }

    /// Values safe to print and persist (the storage key is left out)
    pub fn public(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != output_keys::STORAGE_KEY)
    }
}

/// What a successful creation reports back
#[derive(Debug, Default)]
struct Created {
    message: String,
    resource_id: String,
    outputs: Vec<(String, String)>,
}

/// Resource types in the order they are torn down
const DELETE_ORDER: &[&str] = &[
    AUTOSCALE,
    SCALE_SET,
    LB_RULE,
    LB_PROBE,
    LOAD_BALANCER,
    PUBLIC_IP,
    SUBNET,
    SECURITY_RULE,
    SECURITY_GROUP,
    VIRTUAL_NETWORK,
    FILE_SHARE,
    STORAGE_ACCOUNT,
    RESOURCE_GROUP,
];

/// ARM types listed by `az resource list`, mapped to our resource types
const ARM_TYPES: &[(&str, &str)] = &[
    ("Microsoft.Storage/storageAccounts", STORAGE_ACCOUNT),
    ("Microsoft.Network/virtualNetworks", VIRTUAL_NETWORK),
    ("Microsoft.Network/networkSecurityGroups", SECURITY_GROUP),
    ("Microsoft.Network/publicIPAddresses", PUBLIC_IP),
    ("Microsoft.Network/loadBalancers", LOAD_BALANCER),
    ("Microsoft.Compute/virtualMachineScaleSets", SCALE_SET),
    ("microsoft.insights/autoscalesettings", AUTOSCALE),
];

pub fn resource_type_for_arm(arm_type: &str) -> Option<&'static str> {
    ARM_TYPES
        .iter()
        .find(|(arm, _)| arm.eq_ignore_ascii_case(arm_type))
        .map(|(_, ours)| *ours)
}

fn delete_rank(resource_type: &str) -> usize {
    DELETE_ORDER
        .iter()
        .position(|t| *t == resource_type)
        .unwrap_or(DELETE_ORDER.len())
}

fn human_type(resource_type: &str) -> String {
    resource_type.replace('-', " ")
}

/// Azure provider for one stack
pub struct AzureProvider {
    stack: Stack,
    az: AzCli,
    state: Option<StateManager>,
    prune: bool,
}

impl AzureProvider {
    pub fn new(stack: Stack) -> Self {
        let az = AzCli::new(stack.subscription_id.clone());
        Self {
            stack,
            az,
            state: None,
            prune: false,
        }
    }

    pub fn with_az(mut self, az: AzCli) -> Self {
        self.az = az;
        self
    }

    /// Record applied resources in a local state file
    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    /// Plan deletions for resources in the group that are no longer declared
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn desired(&self) -> ResourceSet {
        StackResources::declare(&self.stack)
    }

    /// Build the plan from a desired set and an observed state
    pub fn diff(
        &self,
        desired: &ResourceSet,
        current: &ProviderState,
    ) -> cumulus_cloud::Result<Plan> {
        let graph = DependencyGraph::from_resources(desired)?;
        let mut actions = Vec::new();

        if self.prune {
            let mut stale: Vec<(&String, &ResourceState)> = current
                .iter()
                .filter(|(key, _)| desired.get_key(key).is_none())
                .collect();
            stale.sort_by_key(|(key, state)| (delete_rank(&state.resource_type), key.to_string()));

            for (key, state) in stale {
                let (resource_type, id) =
                    split_key(key).unwrap_or((state.resource_type.as_str(), key.as_str()));
                actions.push(Action::new(
                    ActionType::Delete,
                    resource_type,
                    id,
                    format!("Delete {} {} (no longer declared)", human_type(resource_type), id),
                ));
            }
        } else {
            for key in current.resources.keys() {
                if desired.get_key(key).is_none() {
                    debug!(key = %key, "Resource exists but is not declared (not pruning)");
                }
            }
        }

        for key in graph.creation_order() {
            let Some(resource) = desired.get_key(&key) else {
                continue;
            };
            let (action_type, description) = if current.contains(&key) {
                (
                    ActionType::NoOp,
                    format!("{} {} exists", human_type(&resource.resource_type), resource.id),
                )
            } else {
                (
                    ActionType::Create,
                    format!("Create {} {}", human_type(&resource.resource_type), resource.id),
                )
            };
            actions.push(
                Action::new(action_type, &resource.resource_type, &resource.id, description)
                    .with_config(resource.config.clone())
                    .with_depends_on(resource.depends_on.clone()),
            );
        }

        Ok(Plan::new(actions))
    }

    async fn scope(&self) -> Result<IdScope> {
        let subscription = match &self.stack.subscription_id {
            Some(id) => id.clone(),
            None => self.az.account_show().await?.id,
        };
        Ok(IdScope::new(subscription, &self.stack.resource_group))
    }

    async fn storage_key(&self, outputs: &Outputs) -> Result<String> {
        match outputs.get(output_keys::STORAGE_KEY) {
            Some(key) => Ok(key.to_string()),
            None => {
                self.az
                    .storage_account_key(
                        &self.stack.resource_group,
                        &self.stack.storage.account_name,
                    )
                    .await
            }
        }
    }

    async fn public_ip(&self, outputs: &Outputs) -> Result<String> {
        match outputs.get(output_keys::PUBLIC_IP) {
            Some(ip) => Ok(ip.to_string()),
            None => {
                self.az
                    .public_ip_address(
                        &self.stack.resource_group,
                        &self.stack.load_balancer.public_ip_name,
                    )
                    .await
            }
        }
    }

    /// Render the boot script once the storage key and public IP are known
    pub async fn boot_script(&self, outputs: &Outputs) -> Result<BootScript> {
        let key = self.storage_key(outputs).await?;
        let public_ip = if self.stack.app.trusted_proxies_from_public_ip {
            Some(self.public_ip(outputs).await?)
        } else {
            None
        };
        BootScript::render(&BootScriptParams::from_stack(&self.stack, key, public_ip))
    }

    #[tracing::instrument(skip(self, action, scope, outputs), fields(key = %action.id))]
    async fn create(&self, action: &Action, scope: &IdScope, outputs: &Outputs) -> Result<Created> {
        let stack = &self.stack;
        let rg = stack.resource_group.as_str();
        let location = stack.location.as_str();
        let az = &self.az;
        let mut created = Created::default();

        match action.resource_type.as_str() {
            RESOURCE_GROUP => {
                az.group_create(rg, location, &stack.tags).await?;
                created.resource_id = scope.group().to_string();
            }
            STORAGE_ACCOUNT => {
                az.storage_account_create(rg, location, &stack.storage).await?;
                let key = az
                    .storage_account_key(rg, &stack.storage.account_name)
                    .await?;
                created
                    .outputs
                    .push((output_keys::STORAGE_KEY.to_string(), key));
                created.resource_id = scope
                    .storage_account(&stack.storage.account_name)
                    .to_string();
            }
            FILE_SHARE => {
                az.share_create(rg, &stack.storage).await?;
                created.resource_id = format!(
                    "{}/fileServices/default/shares/{}",
                    scope.storage_account(&stack.storage.account_name),
                    stack.storage.share_name
                );
            }
            VIRTUAL_NETWORK => {
                az.vnet_create(rg, location, &stack.network).await?;
                created.resource_id = scope.virtual_network(&stack.network.vnet_name).to_string();
            }
            SECURITY_GROUP => {
                az.nsg_create(rg, location, &stack.security.name).await?;
                created.resource_id = scope.security_group(&stack.security.name).to_string();
            }
            SECURITY_RULE => {
                let rule = stack
                    .security
                    .rules
                    .iter()
                    .find(|r| security_rule_id(&stack.security.name, &r.name) == action.resource_id)
                    .ok_or_else(|| AzureError::UnknownResource(action.id.clone()))?;
                az.nsg_rule_create(rg, &stack.security.name, rule).await?;
                created.resource_id = scope
                    .security_group(&stack.security.name)
                    .child("securityRules", &rule.name)
                    .to_string();
            }
            SUBNET => {
                az.subnet_create(rg, &stack.network, &stack.security.name)
                    .await?;
                created.resource_id = scope
                    .subnet(&stack.network.vnet_name, &stack.network.subnet_name)
                    .to_string();
            }
            PUBLIC_IP => {
                az.public_ip_create(rg, location, &stack.load_balancer)
                    .await?;
                let ip = az
                    .public_ip_address(rg, &stack.load_balancer.public_ip_name)
                    .await?;
                created.message = format!("address {}", ip);
                created.outputs.push((output_keys::PUBLIC_IP.to_string(), ip));
                created.resource_id = scope
                    .public_ip(&stack.load_balancer.public_ip_name)
                    .to_string();
            }
            LOAD_BALANCER => {
                az.lb_create(rg, location, &stack.load_balancer).await?;
                created.resource_id = scope.load_balancer(&stack.load_balancer.name).to_string();
            }
            LB_PROBE => {
                az.lb_probe_create(rg, &stack.load_balancer).await?;
                created.resource_id = scope
                    .probe(&stack.load_balancer.name, &stack.load_balancer.probe.name)
                    .to_string();
            }
            LB_RULE => {
                az.lb_rule_create(rg, &stack.load_balancer).await?;
                created.resource_id = scope
                    .load_balancer(&stack.load_balancer.name)
                    .child("loadBalancingRules", &stack.load_balancer.rule.name)
                    .to_string();
            }
            SCALE_SET => {
                let script = self.boot_script(outputs).await?;
                let subnet_id = scope
                    .subnet(&stack.network.vnet_name, &stack.network.subnet_name)
                    .to_string();
                let delivery = stack.scale_set.boot_delivery;
                let request = ScaleSetRequest {
                    group: rg,
                    location,
                    scale_set: &stack.scale_set,
                    subnet_id: &subnet_id,
                    load_balancer: &stack.load_balancer.name,
                    backend_pool: &stack.load_balancer.backend_pool_name,
                    nsg: &stack.security.name,
                    custom_data: match delivery {
                        BootDelivery::CustomData => Some(script.as_str()),
                        BootDelivery::Extension => None,
                    },
                };
                az.vmss_create(&request).await?;
                if delivery == BootDelivery::Extension {
                    az.vmss_extension_set(rg, &stack.scale_set.name, &script.custom_data())
                        .await?;
                }
                created.message = format!("boot script delivered as {}", delivery.as_str());
                created.resource_id = scope.scale_set(&stack.scale_set.name).to_string();
            }
            AUTOSCALE => {
                let target = scope.scale_set(&stack.scale_set.name).to_string();
                az.autoscale_create(rg, &stack.autoscale, &target).await?;
                for rule in &stack.autoscale.rules {
                    az.autoscale_rule_create(rg, &stack.autoscale.name, rule)
                        .await?;
                }
                created.message = format!("{} rules", stack.autoscale.rules.len());
                created.resource_id = scope.autoscale_setting(&stack.autoscale.name).to_string();
            }
            _ => return Err(AzureError::UnknownResource(action.id.clone())),
        }

        created
            .outputs
            .push((output_keys::id_of(&action.id), created.resource_id.clone()));
        if created.message.is_empty() {
            created.message = "created".to_string();
        }
        Ok(created)
    }

    async fn delete(&self, resource_type: &str, id: &str) -> Result<()> {
        let stack = &self.stack;
        let rg = stack.resource_group.as_str();
        let az = &self.az;

        match resource_type {
            RESOURCE_GROUP => az.group_delete(id).await,
            SECURITY_RULE => {
                let (nsg, rule) = id
                    .split_once('/')
                    .ok_or_else(|| AzureError::UnknownResource(resource_key(resource_type, id)))?;
                az.network_child_delete(rg, &["nsg", "rule"], "--nsg-name", nsg, rule)
                    .await
            }
            SUBNET => {
                az.network_child_delete(
                    rg,
                    &["vnet", "subnet"],
                    "--vnet-name",
                    &stack.network.vnet_name,
                    id,
                )
                .await
            }
            LB_PROBE => {
                az.network_child_delete(
                    rg,
                    &["lb", "probe"],
                    "--lb-name",
                    &stack.load_balancer.name,
                    id,
                )
                .await
            }
            LB_RULE => {
                az.network_child_delete(
                    rg,
                    &["lb", "rule"],
                    "--lb-name",
                    &stack.load_balancer.name,
                    id,
                )
                .await
            }
            FILE_SHARE => az.share_delete(rg, &stack.storage.account_name, id).await,
            _ => {
                let scope = self.scope().await?;
                let arm_id = match resource_type {
                    STORAGE_ACCOUNT => scope.storage_account(id),
                    VIRTUAL_NETWORK => scope.virtual_network(id),
                    SECURITY_GROUP => scope.security_group(id),
                    PUBLIC_IP => scope.public_ip(id),
                    LOAD_BALANCER => scope.load_balancer(id),
                    SCALE_SET => scope.scale_set(id),
                    AUTOSCALE => scope.autoscale_setting(id),
                    _ => {
                        return Err(AzureError::UnknownResource(resource_key(resource_type, id)));
                    }
                };
                az.resource_delete(&arm_id.to_string()).await
            }
        }
    }

    async fn load_global(&self) -> cumulus_cloud::Result<Option<GlobalState>> {
        match &self.state {
            Some(manager) => Ok(Some(manager.load().await?)),
            None => Ok(None),
        }
    }

    async fn save_global(&self, global: &Option<GlobalState>) -> cumulus_cloud::Result<()> {
        if let (Some(manager), Some(state)) = (&self.state, global) {
            manager.save(state).await?;
        }
        Ok(())
    }

    fn state_key(key: &str) -> String {
        format!("{}:{}", PROVIDER, key)
    }

    async fn observe(&self) -> Result<ProviderState> {
        let rg = &self.stack.resource_group;
        let mut state = ProviderState::new();

        if !self.az.group_exists(rg).await? {
            debug!(resource_group = %rg, "Resource group does not exist");
            return Ok(state);
        }
        state.add(
            resource_key(RESOURCE_GROUP, rg),
            ResourceState::new(rg.clone(), RESOURCE_GROUP).with_status(ResourceStatus::Succeeded),
        );

        for resource in self.az.resource_list(rg).await? {
            let Some(resource_type) = resource_type_for_arm(&resource.resource_type) else {
                debug!(
                    arm_type = %resource.resource_type,
                    name = %resource.name,
                    "Skipping unmanaged resource type"
                );
                continue;
            };
            let status = resource
                .provisioning_state
                .as_deref()
                .map(ResourceStatus::from_provisioning_state)
                .unwrap_or(ResourceStatus::Unknown);
            let mut entry = ResourceState::new(resource.id, resource_type).with_status(status);
            if let Some(location) = resource.location {
                entry.set_attribute("location", serde_json::json!(location));
            }
            state.add(resource_key(resource_type, &resource.name), entry);
        }

        self.observe_children(&mut state).await?;
        Ok(state)
    }

    /// Child resources do not show up in `az resource list`
    async fn observe_children(&self, state: &mut ProviderState) -> Result<()> {
        let stack = &self.stack;
        let rg = &stack.resource_group;

        let mut children: Vec<(&str, String, Option<String>)> = Vec::new();

        if state.contains(&resource_key(STORAGE_ACCOUNT, &stack.storage.account_name)) {
            for share in self.az.share_list(rg, &stack.storage.account_name).await? {
                children.push((FILE_SHARE, share.name, share.id));
            }
        }
        if state.contains(&resource_key(VIRTUAL_NETWORK, &stack.network.vnet_name)) {
            for subnet in self.az.subnet_list(rg, &stack.network.vnet_name).await? {
                children.push((SUBNET, subnet.name, subnet.id));
            }
        }
        if state.contains(&resource_key(SECURITY_GROUP, &stack.security.name)) {
            for rule in self.az.nsg_rule_list(rg, &stack.security.name).await? {
                children.push((
                    SECURITY_RULE,
                    security_rule_id(&stack.security.name, &rule.name),
                    rule.id,
                ));
            }
        }
        if state.contains(&resource_key(LOAD_BALANCER, &stack.load_balancer.name)) {
            for probe in self.az.lb_probe_list(rg, &stack.load_balancer.name).await? {
                children.push((LB_PROBE, probe.name, probe.id));
            }
            for rule in self.az.lb_rule_list(rg, &stack.load_balancer.name).await? {
                children.push((LB_RULE, rule.name, rule.id));
            }
        }

        for (resource_type, name, id) in children {
            let key = resource_key(resource_type, &name);
            state.add(
                key,
                ResourceState::new(id.unwrap_or(name), resource_type)
                    .with_status(ResourceStatus::Succeeded),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for AzureProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn display_name(&self) -> &str {
        "Microsoft Azure"
    }

    async fn check_auth(&self) -> cumulus_cloud::Result<AuthStatus> {
        match self.az.account_show().await {
            Ok(account) => {
                let user = account
                    .user
                    .map(|u| format!(" as {}", u.name))
                    .unwrap_or_default();
                Ok(AuthStatus::ok(format!("{} ({}){}", account.name, account.id, user)))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn get_state(&self) -> cumulus_cloud::Result<ProviderState> {
        Ok(self.observe().await?)
    }

    async fn plan(&self, desired: &ResourceSet) -> cumulus_cloud::Result<Plan> {
        let current = self.get_state().await?;
        self.diff(desired, &current)
    }

    async fn apply(&self, plan: &Plan) -> cumulus_cloud::Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();

        let lock = match &self.state {
            Some(manager) => Some(manager.acquire_lock().await?),
            None => None,
        };
        let mut global = self.load_global().await?;
        if let Some(state) = global.as_mut() {
            state.stack = Some(self.stack.name.clone());
        }

        let scope = self.scope().await?;
        let mut outputs = Outputs::default();
        outputs.insert(output_keys::SUBSCRIPTION, scope.subscription.clone());
        let mut failed = false;

        // Deletions are planned dependents-first and run one at a time
        for action in plan.actions_by_type(ActionType::Delete) {
            if failed {
                result.add_skipped(action.id.clone());
                continue;
            }
            info!("Deleting {}", action.id);
            match self.delete(&action.resource_type, &action.resource_id).await {
                Ok(()) => {
                    result.add_success(action.id.clone(), "deleted".to_string());
                    if let Some(state) = global.as_mut() {
                        state.remove_resource(&Self::state_key(&action.id));
                    }
                    self.save_global(&global).await?;
                }
                Err(e) => {
                    failed = true;
                    result.add_failure(action.id.clone(), e.to_string());
                }
            }
        }

        let creations: Vec<&Action> = plan
            .actions
            .iter()
            .filter(|a| matches!(a.action_type, ActionType::Create | ActionType::Update))
            .collect();
        let by_key: HashMap<&str, &Action> =
            creations.iter().map(|a| (a.id.as_str(), *a)).collect();
        let graph = DependencyGraph::from_actions(creations.iter().copied())?;

        for (index, wave) in graph.levels().iter().enumerate() {
            if failed {
                for key in wave {
                    result.add_skipped(key.clone());
                }
                continue;
            }

            info!(wave = index + 1, resources = wave.len(), "Applying wave");
            let actions: Vec<&Action> = wave
                .iter()
                .filter_map(|k| by_key.get(k.as_str()).copied())
                .collect();
            let results = join_all(
                actions
                    .iter()
                    .map(|action| self.create(action, &scope, &outputs)),
            )
            .await;

            for (action, outcome) in actions.iter().zip(results) {
                match outcome {
                    Ok(created) => {
                        if let Some(state) = global.as_mut() {
                            state.set_resource(
                                Self::state_key(&action.id),
                                ResourceState::new(&created.resource_id, &action.resource_type)
                                    .with_status(ResourceStatus::Succeeded),
                            );
                        }
                        self.save_global(&global).await?;
                        result.add_success(action.id.clone(), created.message);
                        outputs.extend(created.outputs);
                    }
                    Err(e) => {
                        warn!(key = %action.id, error = %e, "Creation failed");
                        failed = true;
                        result.add_failure(action.id.clone(), e.to_string());
                    }
                }
            }
        }

        if !failed
            && self.stack.app.trusted_proxies_from_public_ip
            && outputs.get(output_keys::PUBLIC_IP).is_none()
            && let Ok(ip) = self.public_ip(&outputs).await
        {
            outputs.insert(output_keys::PUBLIC_IP, ip);
        }

        for (key, value) in outputs.public() {
            result.add_output(key.clone(), value.clone());
            if let Some(state) = global.as_mut() {
                state.set_output(key.clone(), value.clone());
            }
        }
        self.save_global(&global).await?;

        if let Some(lock) = lock {
            lock.release().await?;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn destroy(&self, resource_key: &str) -> cumulus_cloud::Result<()> {
        let (resource_type, id) = split_key(resource_key).ok_or_else(|| {
            cumulus_cloud::CloudError::InvalidConfig(format!(
                "expected a type:id key, got {}",
                resource_key
            ))
        })?;
        self.delete(resource_type, id).await?;

        if let Some(manager) = &self.state {
            let lock = manager.acquire_lock().await?;
            let mut state = manager.load().await?;
            state.remove_resource(&Self::state_key(resource_key));
            manager.save(&state).await?;
            lock.release().await?;
        }
        Ok(())
    }

    async fn destroy_all(&self) -> cumulus_cloud::Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();
        let rg = &self.stack.resource_group;
        let key = resource_key(RESOURCE_GROUP, rg);

        if !self.az.group_exists(rg).await.map_err(cumulus_cloud::CloudError::from)? {
            result.add_success(key, "resource group does not exist".to_string());
            result.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }

        match self.az.group_delete(rg).await {
            Ok(()) => {
                result.add_success(key, "deletion started".to_string());
                if let Some(manager) = &self.state {
                    let lock = manager.acquire_lock().await?;
                    let mut state = manager.load().await?;
                    state.clear_provider(PROVIDER);
                    manager.save(&state).await?;
                    lock.release().await?;
                }
            }
            Err(e) => result.add_failure(key, e.to_string()),
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}
