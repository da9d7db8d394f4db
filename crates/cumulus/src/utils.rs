use anyhow::Context;
use colored::Colorize;
use cumulus_cloud::{ApplyResult, CloudProvider, SKIPPED_REASON, STATE_DIR, StateManager};
use cumulus_core::Stack;
use std::path::{Path, PathBuf};

/// `--stack` wins, then the usual discovery
pub fn resolve_stack_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Ok(path),
        Some(path) => anyhow::bail!("stack file not found: {}", path.display()),
        None => Ok(cumulus_config::find_stack_file()?),
    }
}

/// Load the stack with local overrides applied
pub fn load(path: &Path) -> anyhow::Result<Stack> {
    cumulus_core::load_stack_with_overrides(path)
        .with_context(|| format!("failed to load {}", path.display()))
}

/// Directory that holds `.cumulus/` for this stack file
pub fn project_root(stack_path: &Path) -> PathBuf {
    let parent = stack_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    match parent.file_name() {
        Some(name) if name == STATE_DIR => parent
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        _ => parent.to_path_buf(),
    }
}

pub fn state_manager(stack_path: &Path) -> StateManager {
    StateManager::new(project_root(stack_path))
}

/// Fail early with a readable message when `az` is missing or logged out
pub async fn ensure_authenticated(provider: &dyn CloudProvider) -> anyhow::Result<()> {
    println!("{}", format!("Checking {} credentials...", provider.display_name()).blue());
    let auth = provider.check_auth().await?;

    if !auth.authenticated {
        eprintln!("{}", "✗ Not authenticated".red().bold());
        if let Some(error) = &auth.error {
            eprintln!("  {}", error);
        }
        eprintln!();
        eprintln!("Run {} and try again", "az login".cyan());
        anyhow::bail!("{} authentication failed", provider.name());
    }

    if let Some(account) = &auth.account_info {
        println!("  ✓ {}", account);
    }
    Ok(())
}

pub fn print_apply_result(result: &ApplyResult) {
    println!();
    for success in &result.succeeded {
        println!("  {} {} ({})", "✓".green(), success.action_id.cyan(), success.message);
    }
    for failure in &result.failed {
        let error = failure.error.as_deref().unwrap_or("unknown error");
        if error == SKIPPED_REASON {
            println!("  {} {} ({})", "-".dimmed(), failure.action_id, error.dimmed());
        } else {
            println!("  {} {}: {}", "✗".red(), failure.action_id.cyan(), error.red());
        }
    }
    println!();
    println!(
        "{} succeeded, {} failed in {:.1}s",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms as f64 / 1000.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_is_stack_directory() {
        assert_eq!(
            project_root(Path::new("/work/app/stack.kdl")),
            PathBuf::from("/work/app")
        );
        assert_eq!(project_root(Path::new("stack.kdl")), PathBuf::from("."));
    }

    #[test]
    fn test_project_root_skips_state_dir() {
        assert_eq!(
            project_root(Path::new("/work/app/.cumulus/stack.kdl")),
            PathBuf::from("/work/app")
        );
    }

    #[test]
    fn test_missing_explicit_stack_is_an_error() {
        let err = resolve_stack_path(Some(PathBuf::from("/nonexistent/stack.kdl"))).unwrap_err();
        assert!(err.to_string().contains("stack file not found"));
    }
}
