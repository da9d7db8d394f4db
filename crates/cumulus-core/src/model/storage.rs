//! Storage account and file share

use serde::{Deserialize, Serialize};

/// Storage account holding the SMB share mounted by every instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Globally unique account name (3-24 lowercase letters and digits)
    pub account_name: String,

    /// Replication SKU, e.g. `Standard_LRS`
    pub sku: String,

    /// Account kind, e.g. `StorageV2`
    pub kind: String,

    /// File share name
    pub share_name: String,

    /// Share quota in GiB (provider default when unset)
    pub share_quota_gb: Option<u32>,
}

impl StorageSpec {
    pub fn for_stack(name: &str) -> Self {
        let account: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self {
            account_name: format!("{}storage", account),
            sku: "Standard_LRS".to_string(),
            kind: "StorageV2".to_string(),
            share_name: name.to_ascii_lowercase(),
            share_quota_gb: None,
        }
    }

    /// SMB host serving the share
    pub fn file_endpoint(&self) -> String {
        format!("{}.file.core.windows.net", self.account_name)
    }

    /// UNC-style path used by `mount -t cifs` and fstab
    pub fn share_path(&self) -> String {
        format!("//{}/{}", self.file_endpoint(), self.share_name)
    }
}
