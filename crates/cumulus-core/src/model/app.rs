//! Application container started by the boot script

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Container launched on every instance after the share is mounted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    /// Where the file share is mounted on the instance
    pub mount_point: String,
    pub volumes: Vec<VolumeSpec>,
    pub env: BTreeMap<String, String>,
    /// Pass the load balancer's public IP as `TRUSTED_PROXIES`
    pub trusted_proxies_from_public_ip: bool,
    pub restart: String,
    pub mount_options: String,
    /// Ubuntu release name of the Docker apt repository
    pub docker_release: String,
}

impl AppSpec {
    pub fn for_stack(name: &str) -> Self {
        Self {
            image: "nextcloud:30.0.4-apache".to_string(),
            host_port: 80,
            container_port: 80,
            mount_point: format!("/mnt/{}", name),
            volumes: vec![
                VolumeSpec::new("nextcloud", "/var/www/html"),
                VolumeSpec::new("custom_apps", "/var/www/html/custom_apps"),
                VolumeSpec::new("config", "/var/www/html/config"),
                VolumeSpec::new("data", "/var/www/html/data"),
            ],
            env: BTreeMap::new(),
            trusted_proxies_from_public_ip: true,
            restart: "always".to_string(),
            mount_options: "dir_mode=0777,file_mode=0777,serverino,nosharesock,actimeo=30"
                .to_string(),
            docker_release: "focal".to_string(),
        }
    }
}

/// Bind mount of a share sub-directory into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Directory relative to the mount point
    pub sub_dir: String,
    pub container_path: String,
}

impl VolumeSpec {
    pub fn new(sub_dir: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            sub_dir: sub_dir.into(),
            container_path: container_path.into(),
        }
    }
}
