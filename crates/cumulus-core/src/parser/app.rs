//! `app` node

use super::{
    arg_int, arg_string, args, check_entries, children, normalize, prop_int, prop_string,
    value_bool, value_string,
};
use crate::error::{Result, StackError};
use crate::model::{AppSpec, VolumeSpec};
use kdl::KdlNode;

/// app "nextcloud:30.0.4-apache" { port 80; mount "/mnt/nextcloud"; volume "data" "/var/www/html/data" }
pub fn apply_app(node: &KdlNode, app: &mut AppSpec) -> Result<()> {
    check_entries(node, 1, &[])?;
    if let Some(image) = arg_string(node) {
        app.image = image;
    }

    let mut volumes = Vec::new();
    for child in children(node) {
        match normalize(child.name().value()).as_str() {
            "image" => {
                if let Some(image) = value_string(child)? {
                    app.image = image;
                }
            }
            "port" => {
                // port 80 | port host=8080 container=80
                check_entries(child, 1, &["host", "container"])?;
                if let Some(port) = arg_int(child, "port")? {
                    app.host_port = port;
                    app.container_port = port;
                }
                if let Some(host) = prop_int(child, "host", "host port")? {
                    app.host_port = host;
                }
                if let Some(container) = prop_int(child, "container", "container port")? {
                    app.container_port = container;
                }
            }
            "mount" => {
                check_entries(child, 1, &["options"])?;
                if let Some(mount_point) = arg_string(child) {
                    app.mount_point = mount_point;
                }
                if let Some(options) = prop_string(child, "options") {
                    app.mount_options = options;
                }
            }
            "volume" => {
                check_entries(child, 2, &[])?;
                let mut parts = args(child).filter_map(|v| v.as_string());
                match (parts.next(), parts.next()) {
                    (Some(sub_dir), Some(path)) => volumes.push(VolumeSpec::new(sub_dir, path)),
                    _ => {
                        return Err(StackError::InvalidConfig(
                            "volume requires a sub-directory and a container path".to_string(),
                        ));
                    }
                }
            }
            "env" => {
                check_entries(child, 0, &[])?;
                for var in children(child) {
                    check_entries(var, 1, &[])?;
                    let value = args(var)
                        .next()
                        .and_then(|v| {
                            v.as_string()
                                .map(str::to_string)
                                .or_else(|| v.as_integer().map(|i| i.to_string()))
                                .or_else(|| v.as_bool().map(|b| b.to_string()))
                        })
                        .unwrap_or_default();
                    app.env.insert(var.name().value().to_string(), value);
                }
            }
            "trusted-proxies" => {
                if let Some(enabled) = value_bool(child)? {
                    app.trusted_proxies_from_public_ip = enabled;
                }
            }
            "restart" => {
                if let Some(restart) = value_string(child)? {
                    app.restart = restart;
                }
            }
            "docker-release" => {
                if let Some(release) = value_string(child)? {
                    app.docker_release = release;
                }
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown app field");
            }
        }
    }

    if !volumes.is_empty() {
        app.volumes = volumes;
    }
    Ok(())
}
