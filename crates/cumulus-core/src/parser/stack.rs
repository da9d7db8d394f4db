//! `stack`, `tags`, `storage` and `network` nodes

use super::{
    arg_string, check_entries, children, non_empty, normalize, prop_int, prop_string, value_int,
    value_string,
};
use crate::error::Result;
use crate::model::{NetworkSpec, Stack, StorageSpec};
use kdl::KdlNode;
use std::collections::BTreeMap;

/// stack "name" { location "..." subscription "..." resource-group "..." }
pub fn apply_stack(node: &KdlNode, stack: &mut Stack) -> Result<()> {
    check_entries(node, 1, &[])?;
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "location" | "region" => {
                if let Some(location) = value_string(child)? {
                    stack.location = location;
                }
            }
            "subscription" | "subscription-id" => {
                stack.subscription_id = non_empty(value_string(child)?);
            }
            "resource-group" => {
                if let Some(group) = value_string(child)? {
                    stack.resource_group = group;
                }
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown stack field");
            }
        }
    }
    Ok(())
}

/// tags { owner "ops" }
pub fn apply_tags(node: &KdlNode, tags: &mut BTreeMap<String, String>) -> Result<()> {
    check_entries(node, 0, &[])?;
    for child in children(node) {
        if let Some(value) = value_string(child)? {
            tags.insert(child.name().value().to_string(), value);
        }
    }
    Ok(())
}

pub fn apply_storage(node: &KdlNode, storage: &mut StorageSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(account) = arg_string(node) {
        storage.account_name = account;
    }

    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "account" | "account-name" => {
                if let Some(account) = value_string(child)? {
                    storage.account_name = account;
                }
            }
            "sku" => {
                if let Some(sku) = value_string(child)? {
                    storage.sku = sku;
                }
            }
            "kind" => {
                if let Some(kind) = value_string(child)? {
                    storage.kind = kind;
                }
            }
            "share" => {
                check_entries(child, 1, &["quota"])?;
                if let Some(share) = arg_string(child) {
                    storage.share_name = share;
                }
                if let Some(quota) = prop_int(child, "quota", "share quota")? {
                    storage.share_quota_gb = Some(quota);
                }
            }
            "quota" => {
                storage.share_quota_gb = value_int(child, "share quota")?;
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown storage field");
            }
        }
    }
    Ok(())
}

pub fn apply_network(node: &KdlNode, network: &mut NetworkSpec) -> Result<()> {
    check_entries(node, 0, &[])?;
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "vnet" => {
                check_entries(child, 1, &["address-space"])?;
                if let Some(name) = arg_string(child) {
                    network.vnet_name = name;
                }
                if let Some(space) = prop_string(child, "address-space") {
                    network.address_space = space;
                }
            }
            "address-space" => {
                if let Some(space) = value_string(child)? {
                    network.address_space = space;
                }
            }
            "subnet" => {
                check_entries(child, 1, &["prefix"])?;
                if let Some(name) = arg_string(child) {
                    network.subnet_name = name;
                }
                if let Some(prefix) = prop_string(child, "prefix") {
                    network.subnet_prefix = prefix;
                }
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown network field");
            }
        }
    }
    Ok(())
}
