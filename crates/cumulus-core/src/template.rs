//! Template expansion
//!
//! Stack files are rendered with Tera before they are parsed, so secrets and
//! per-environment values can come from the environment or a `.env` file:
//!
//! ```kdl
//! scale-set {
//!     admin-password "{{ CUMULUS_ADMIN_PASSWORD }}"
//! }
//! ```

use crate::error::{Result, StackError};
use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Only these environment variables are visible to templates
pub const ALLOWED_ENV_PREFIXES: &[&str] = &["CUMULUS_", "AZURE_", "ARM_"];

pub type Variables = HashMap<String, serde_json::Value>;

pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Add environment variables whose names start with an allowed prefix
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;

        for (key, value) in std::env::vars() {
            if ALLOWED_ENV_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }

        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// Add every `KEY=VALUE` line of a `.env` file (no prefix filter)
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(env_file_path).map_err(|e| StackError::IoError {
            path: env_file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = strip_quotes(value.trim());
                self.context
                    .insert(key, &serde_json::Value::String(value.to_string()));
                count += 1;
            }
        }

        info!(
            env_file = %env_file_path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(())
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| StackError::InvalidConfig(extract_tera_error_detail(&e)))
    }

    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.tera
            .render_str(&content, &self.context)
            .map_err(|e| StackError::TemplateError {
                file: path.to_path_buf(),
                message: extract_tera_error_detail(&e),
            })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Tera wraps the useful message (e.g. the missing variable) in its source chain
fn extract_tera_error_detail(error: &tera::Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_variable() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("REGION", serde_json::json!("westeurope"));

        let rendered = processor
            .render_str(r#"stack "a" { location "{{ REGION }}" }"#)
            .unwrap();
        assert_eq!(rendered, r#"stack "a" { location "westeurope" }"#);
    }

    #[test]
    fn test_missing_variable_names_it() {
        let mut processor = TemplateProcessor::new();
        let err = processor.render_str("{{ NOT_SET }}").unwrap_err();
        assert!(err.to_string().contains("NOT_SET"));
    }

    #[test]
    fn test_env_prefix_filter() {
        temp_env::with_vars(
            [
                ("CUMULUS_TEST_SECRET", Some("hunter2")),
                ("UNRELATED_TEST_SECRET", Some("nope")),
            ],
            || {
                let mut processor = TemplateProcessor::new();
                processor.add_env_variables();

                assert_eq!(
                    processor.render_str("{{ CUMULUS_TEST_SECRET }}").unwrap(),
                    "hunter2"
                );
                assert!(processor.render_str("{{ UNRELATED_TEST_SECRET }}").is_err());
            },
        );
    }

    #[test]
    fn test_env_file_variables() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(
            &env_file,
            "# comment\nADMIN_PASSWORD=\"quoted value\"\nexport SSH_KEY='ssh-ed25519 AAAA'\n\n",
        )
        .unwrap();

        let mut processor = TemplateProcessor::new();
        processor.add_env_file_variables(&env_file).unwrap();

        assert_eq!(
            processor.render_str("{{ ADMIN_PASSWORD }}").unwrap(),
            "quoted value"
        );
        assert_eq!(
            processor.render_str("{{ SSH_KEY }}").unwrap(),
            "ssh-ed25519 AAAA"
        );
    }
}
