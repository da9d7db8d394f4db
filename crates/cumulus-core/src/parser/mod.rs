//! KDL parser
//!
//! Parses stack files into a [`Stack`]. Each top-level section is handled by its
//! own module and is applied on top of the defaults, so a section may be
//! partial and a later document (e.g. `stack.local.kdl`) can override single
//! fields.

mod app;
mod compute;
mod network;
mod stack;

use crate::error::{Result, StackError};
use crate::model::Stack;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::Path;

/// Parse a stack file
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Stack> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = default_stack_name(path.as_ref());
    parse_kdl_string(&content, name)
}

/// Parse a KDL string; `default_name` is used when the document has no `stack` node
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Stack> {
    let doc: KdlDocument = content.parse()?;

    let name = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "stack")
        .and_then(arg_str)
        .map(str::to_string)
        .unwrap_or(default_name);

    let mut stack = Stack::new(name);
    apply_document(&mut stack, &doc)?;
    Ok(stack)
}

/// Apply every section of `doc` on top of an existing stack
pub fn apply_document(stack: &mut Stack, doc: &KdlDocument) -> Result<()> {
    for node in doc.nodes() {
        match normalize(node.name().value()).as_str() {
            "stack" => stack::apply_stack(node, stack)?,
            "tags" => stack::apply_tags(node, &mut stack.tags)?,
            "storage" => stack::apply_storage(node, &mut stack.storage)?,
            "network" => stack::apply_network(node, &mut stack.network)?,
            "security-group" => network::apply_security_group(node, &mut stack.security)?,
            "load-balancer" => network::apply_load_balancer(node, &mut stack.load_balancer)?,
            "scale-set" => compute::apply_scale_set(node, &mut stack.scale_set)?,
            "autoscale" => compute::apply_autoscale(node, &mut stack.autoscale)?,
            "app" => app::apply_app(node, &mut stack.app)?,
            other => {
                tracing::debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }
    Ok(())
}

pub(crate) fn default_stack_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("stack")
        .to_string()
}

/// Node names accept both kebab-case and snake_case
pub(crate) fn normalize(name: &str) -> String {
    name.replace('_', "-")
}

pub(crate) fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes().iter())
}

/// Positional arguments of a node
pub(crate) fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// Reject positional arguments beyond `max_args` and properties outside `props`
///
/// KDL folds `a 1 b 2` on one line into a single node, so surplus entries
/// usually mean a missing `;` between settings.
pub(crate) fn check_entries(node: &KdlNode, max_args: usize, props: &[&str]) -> Result<()> {
    let name = node.name().value();
    let mut positional = 0;
    for entry in node.entries() {
        match entry.name() {
            None => positional += 1,
            Some(key) => {
                let key = normalize(key.value());
                if !props.contains(&key.as_str()) {
                    return Err(StackError::InvalidConfig(format!(
                        "'{}' has an unknown property '{}'",
                        name, key
                    )));
                }
            }
        }
    }
    if positional > max_args {
        return Err(StackError::InvalidConfig(format!(
            "'{}' takes at most {} argument(s) but has {} (separate settings on one line with ';')",
            name, max_args, positional
        )));
    }
    Ok(())
}

/// Single-valued setting such as `vm-size "Standard_B2s"`
pub(crate) fn value_string(node: &KdlNode) -> Result<Option<String>> {
    check_entries(node, 1, &[])?;
    Ok(arg_string(node))
}

pub(crate) fn value_int<T: TryFrom<i128>>(node: &KdlNode, what: &str) -> Result<Option<T>> {
    check_entries(node, 1, &[])?;
    arg_int(node, what)
}

pub(crate) fn value_bool(node: &KdlNode) -> Result<Option<bool>> {
    check_entries(node, 1, &[])?;
    Ok(args(node).next().and_then(|v| v.as_bool()))
}

pub(crate) fn arg_str(node: &KdlNode) -> Option<&str> {
    args(node).next().and_then(|v| v.as_string())
}

pub(crate) fn arg_string(node: &KdlNode) -> Option<String> {
    arg_str(node).map(str::to_string)
}

pub(crate) fn prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    let snake = key.replace('-', "_");
    node.entries()
        .iter()
        .find(|e| {
            e.name()
                .map(|n| n.value() == key || n.value() == snake)
                .unwrap_or(false)
        })
        .map(|e| e.value())
}

pub(crate) fn prop_string(node: &KdlNode, key: &str) -> Option<String> {
    prop(node, key)
        .and_then(|v| v.as_string())
        .map(str::to_string)
}

pub(crate) fn prop_bool(node: &KdlNode, key: &str) -> Option<bool> {
    prop(node, key).and_then(|v| v.as_bool())
}

pub(crate) fn to_int<T: TryFrom<i128>>(value: &KdlValue, what: &str) -> Result<T> {
    let raw = value
        .as_integer()
        .ok_or_else(|| StackError::InvalidConfig(format!("{} must be an integer", what)))?;
    T::try_from(raw)
        .map_err(|_| StackError::InvalidConfig(format!("{} is out of range: {}", what, raw)))
}

pub(crate) fn arg_int<T: TryFrom<i128>>(node: &KdlNode, what: &str) -> Result<Option<T>> {
    args(node).next().map(|v| to_int(v, what)).transpose()
}

pub(crate) fn prop_int<T: TryFrom<i128>>(
    node: &KdlNode,
    key: &str,
    what: &str,
) -> Result<Option<T>> {
    prop(node, key).map(|v| to_int(v, what)).transpose()
}

pub(crate) fn to_float(value: &KdlValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

/// Parse an enum keyword, naming the field in the error
pub(crate) fn parse_keyword<T>(value: &str, what: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| StackError::InvalidConfig(format!("unknown {}: '{}'", what, value)))
}

/// Non-empty string argument; empty strings (e.g. an unset template variable) count as unset
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests;
