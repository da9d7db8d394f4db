//! Instance boot script
//!
//! Installs Docker, mounts the Azure Files share over CIFS and starts the
//! application container with its data directories on the share. Rendered
//! from a built-in Tera template and shipped as base64 custom data (or through
//! the CustomScript extension).

use crate::error::{AzureError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cumulus_core::{Stack, VolumeSpec};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "boot.sh";

const BOOT_TEMPLATE: &str = r#"#!/bin/bash
export DEBIAN_FRONTEND=noninteractive

apt-get update
apt-get install -y apt-transport-https ca-certificates curl software-properties-common cifs-utils
curl -fsSL https://download.docker.com/linux/ubuntu/gpg | apt-key add -
add-apt-repository -y {{ apt_repository | shell_quote }}
apt-get update
apt-get install -y docker-ce

mkdir -p {{ mount_point | shell_word }}

if [ ! -d "/etc/smbcredentials" ]; then
    mkdir /etc/smbcredentials
fi
if [ ! -f {{ credentials_file | shell_word }} ]; then
    echo "username={{ storage_account }}" >> {{ credentials_file | shell_word }}
    echo "password={{ storage_key }}" >> {{ credentials_file | shell_word }}
fi
chmod 600 {{ credentials_file | shell_word }}

if ! grep -qF {{ fstab_match | shell_quote }} /etc/fstab; then
    echo {{ fstab_entry | shell_quote }} >> /etc/fstab
fi
mount -t cifs {{ share_path | shell_word }} {{ mount_point | shell_word }} -o {{ cifs_options | shell_word }}
{% for dir in volume_dirs %}
mkdir -p {{ dir | shell_word }}{% endfor %}

docker run --init --restart {{ restart | shell_word }} -d -p {{ host_port }}:{{ container_port }}{% if trusted_proxy %} -e TRUSTED_PROXIES={{ trusted_proxy | shell_quote }}{% endif %}{% for key, value in env %} -e {{ key | shell_word }}={{ value | shell_quote }}{% endfor %}{% for bind in volume_binds %} -v {{ bind | shell_word }}{% endfor %} {{ image | shell_word }}
"#;

/// Everything the boot script needs to know
#[derive(Debug, Clone, Serialize)]
pub struct BootScriptParams {
    pub storage_account: String,
    pub storage_key: String,
    pub share_name: String,
    pub share_path: String,
    pub mount_point: String,
    pub mount_options: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub volumes: Vec<VolumeSpec>,
    pub env: BTreeMap<String, String>,
    /// Public address passed as `TRUSTED_PROXIES`
    pub trusted_proxy: Option<String>,
    pub restart: String,
    pub docker_release: String,
}

impl BootScriptParams {
    /// Derive params from the same stack the storage resources are declared from
    pub fn from_stack(
        stack: &Stack,
        storage_key: impl Into<String>,
        public_ip: Option<String>,
    ) -> Self {
        let app = &stack.app;
        Self {
            storage_account: stack.storage.account_name.clone(),
            storage_key: storage_key.into(),
            share_name: stack.storage.share_name.clone(),
            share_path: stack.storage.share_path(),
            mount_point: app.mount_point.trim_end_matches('/').to_string(),
            mount_options: app.mount_options.clone(),
            image: app.image.clone(),
            host_port: app.host_port,
            container_port: app.container_port,
            volumes: app.volumes.clone(),
            env: app.env.clone(),
            trusted_proxy: public_ip.filter(|_| app.trusted_proxies_from_public_ip),
            restart: app.restart.clone(),
            docker_release: app.docker_release.clone(),
        }
    }

    pub fn credentials_file(&self) -> String {
        format!("/etc/smbcredentials/{}.cred", self.storage_account)
    }

    fn cifs_options(&self) -> String {
        format!(
            "credentials={},{}",
            self.credentials_file(),
            self.mount_options
        )
    }

    fn volume_dir(&self, volume: &VolumeSpec) -> String {
        format!("{}/{}", self.mount_point, volume.sub_dir)
    }

    /// Extra values the template interpolates as single shell words
    fn derived(&self) -> BTreeMap<&'static str, tera::Value> {
        let fstab_match = format!("{} {}", self.share_path, self.mount_point);
        let volume_dirs: Vec<String> = self.volumes.iter().map(|v| self.volume_dir(v)).collect();
        let volume_binds: Vec<String> = self
            .volumes
            .iter()
            .map(|v| format!("{}:{}", self.volume_dir(v), v.container_path))
            .collect();

        BTreeMap::from([
            ("credentials_file", self.credentials_file().into()),
            ("cifs_options", self.cifs_options().into()),
            (
                "fstab_entry",
                format!("{} cifs nofail,{}", fstab_match, self.cifs_options()).into(),
            ),
            ("fstab_match", fstab_match.into()),
            (
                "apt_repository",
                format!(
                    "deb [arch=amd64] https://download.docker.com/linux/ubuntu {} stable",
                    self.docker_release
                )
                .into(),
            ),
            ("volume_dirs", volume_dirs.into()),
            ("volume_binds", volume_binds.into()),
        ])
    }
}

/// A rendered boot script
#[derive(Debug, Clone)]
pub struct BootScript {
    content: String,
    storage_key: String,
}

impl BootScript {
    pub fn render(params: &BootScriptParams) -> Result<Self> {
        let mut tera = Tera::default();
        tera.register_filter("shell_quote", shell_quote_filter);
        tera.register_filter("shell_word", shell_word_filter);
        tera.add_raw_template(TEMPLATE_NAME, BOOT_TEMPLATE)
            .map_err(|e| AzureError::Template(e.to_string()))?;

        let mut context =
            Context::from_serialize(params).map_err(|e| AzureError::Template(e.to_string()))?;
        for (key, value) in params.derived() {
            context.insert(key, &value);
        }

        let content = tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| AzureError::Template(e.to_string()))?;

        Ok(Self {
            content,
            storage_key: params.storage_key.clone(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Base64 (standard alphabet, padded) for `customData`
    pub fn custom_data(&self) -> String {
        STANDARD.encode(self.content.as_bytes())
    }

    /// Script with the storage key masked, safe to print
    pub fn redacted(&self) -> String {
        if self.storage_key.is_empty() {
            return self.content.clone();
        }
        self.content.replace(&self.storage_key, "***")
    }
}

/// Single-quote a value for the shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Leave a value bare when the shell would read it as one literal word, quote it otherwise
pub fn shell_word(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if plain {
        value.to_string()
    } else {
        shell_quote(value)
    }
}

fn filter_input(value: &tera::Value) -> String {
    match value {
        tera::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn shell_quote_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(shell_quote(&filter_input(value))))
}

fn shell_word_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(shell_word(&filter_input(value))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "c2VjcmV0a2V5+/==";

    fn render_default() -> BootScript {
        let stack = Stack::new("nextcloud");
        let params = BootScriptParams::from_stack(&stack, KEY, Some("20.1.2.3".to_string()));
        BootScript::render(&params).unwrap()
    }

    fn line_of(script: &str, needle: &str) -> usize {
        script
            .lines()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("no line containing '{}'", needle))
    }

    #[test]
    fn test_script_references_declared_storage() {
        let script = render_default();
        let s = script.as_str();

        assert!(s.contains(
            "echo \"username=nextcloudstorage\" >> /etc/smbcredentials/nextcloudstorage.cred"
        ));
        assert!(s.contains(&format!("echo \"password={}\"", KEY)));
        assert!(s.contains(
            "//nextcloudstorage.file.core.windows.net/nextcloud /mnt/nextcloud cifs nofail,credentials=/etc/smbcredentials/nextcloudstorage.cred,dir_mode=0777,file_mode=0777,serverino,nosharesock,actimeo=30"
        ));
    }

    #[test]
    fn test_steps_run_in_order() {
        let script = render_default();
        let s = script.as_str();

        let install = line_of(s, "apt-get install -y docker-ce");
        let mkdir = line_of(s, "mkdir -p /mnt/nextcloud");
        let creds = line_of(s, "chmod 600");
        let fstab = line_of(s, ">> /etc/fstab");
        let mount = line_of(s, "mount -t cifs");
        let run = line_of(s, "docker run");

        assert!(install < mkdir);
        assert!(mkdir < creds);
        assert!(creds < fstab);
        assert!(fstab < mount);
        assert!(mount < run);
    }

    #[test]
    fn test_docker_run_line() {
        let script = render_default();
        let run = script
            .as_str()
            .lines()
            .find(|l| l.starts_with("docker run"))
            .unwrap();

        assert_eq!(
            run,
            "docker run --init --restart always -d -p 80:80 -e TRUSTED_PROXIES='20.1.2.3' \
             -v /mnt/nextcloud/nextcloud:/var/www/html \
             -v /mnt/nextcloud/custom_apps:/var/www/html/custom_apps \
             -v /mnt/nextcloud/config:/var/www/html/config \
             -v /mnt/nextcloud/data:/var/www/html/data nextcloud:30.0.4-apache"
        );
    }

    #[test]
    fn test_env_values_are_quoted() {
        let mut stack = Stack::new("nextcloud");
        stack.app.env.insert("ADMIN_NAME".to_string(), "it's me".to_string());
        stack.app.trusted_proxies_from_public_ip = false;

        let params = BootScriptParams::from_stack(&stack, KEY, Some("20.1.2.3".to_string()));
        let script = BootScript::render(&params).unwrap();

        assert!(script.as_str().contains(r"-e ADMIN_NAME='it'\''s me'"));
        assert!(!script.as_str().contains("TRUSTED_PROXIES"));
    }

    #[test]
    fn test_custom_data_is_base64_of_script() {
        let script = render_default();
        let decoded = STANDARD.decode(script.custom_data()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), script.as_str());
    }

    #[test]
    fn test_redacted_hides_storage_key() {
        let script = render_default();
        let redacted = script.redacted();

        assert!(!redacted.contains(KEY));
        assert!(redacted.contains("password=***"));
    }

    #[test]
    fn test_fstab_entry_is_guarded() {
        let script = render_default();
        assert!(script.as_str().contains(
            "if ! grep -qF '//nextcloudstorage.file.core.windows.net/nextcloud /mnt/nextcloud' /etc/fstab; then"
        ));
    }

    #[test]
    fn test_mount_point_with_space_stays_one_word() {
        let mut stack = Stack::new("nextcloud");
        stack.app.mount_point = "/mnt/next cloud; touch /pwned".to_string();

        let params = BootScriptParams::from_stack(&stack, KEY, None);
        let script = BootScript::render(&params).unwrap();
        let s = script.as_str();

        assert!(s.contains("mkdir -p '/mnt/next cloud; touch /pwned'\n"));
        assert!(s.contains(
            "mount -t cifs //nextcloudstorage.file.core.windows.net/nextcloud '/mnt/next cloud; touch /pwned' -o"
        ));
        assert!(s.contains(" -v '/mnt/next cloud; touch /pwned/data:/var/www/html/data' "));
        assert!(!s.lines().any(|l| l.trim_start().starts_with("touch")));
    }

    #[test]
    fn test_shell_word() {
        assert_eq!(shell_word("/mnt/nextcloud"), "/mnt/nextcloud");
        assert_eq!(shell_word("nextcloud:30.0.4-apache"), "nextcloud:30.0.4-apache");
        assert_eq!(shell_word("dir_mode=0777,file_mode=0777"), "dir_mode=0777,file_mode=0777");
        assert_eq!(shell_word("a b"), "'a b'");
        assert_eq!(shell_word("$(id)"), "'$(id)'");
        assert_eq!(shell_word(""), "''");
    }
}
