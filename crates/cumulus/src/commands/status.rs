use crate::utils;
use colored::Colorize;
use cumulus_cloud::ResourceStatus;
use std::path::Path;

pub async fn handle(stack_path: &Path) -> anyhow::Result<()> {
    let manager = utils::state_manager(stack_path);
    let state = manager.load().await?;

    println!("State file: {}", manager.state_path().display().to_string().cyan());
    if state.resources.is_empty() {
        println!("{}", "No resources recorded. Run `cumulus up --yes` first.".yellow());
        return Ok(());
    }

    if let Some(stack) = &state.stack {
        println!("Stack: {}", stack.cyan());
    }
    println!("Updated: {}", state.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    for (key, resource) in &state.resources {
        let status = match resource.status {
            ResourceStatus::Succeeded => resource.status.to_string().green(),
            ResourceStatus::Failed => resource.status.to_string().red(),
            _ => resource.status.to_string().yellow(),
        };
        println!("  {} [{}]", key.cyan(), status);
        println!("      {}", resource.id.dimmed());
    }

    if !state.outputs.is_empty() {
        println!();
        println!("Outputs:");
        for (key, value) in &state.outputs {
            println!("  {} = {}", key, value);
        }
    }
    Ok(())
}
