use crate::progress::Spinner;
use crate::utils;
use colored::Colorize;
use cumulus_cloud::CloudProvider;
use cumulus_cloud_azure::AzureProvider;
use cumulus_core::Stack;
use std::path::Path;

pub async fn handle(stack: Stack, stack_path: &Path, yes: bool) -> anyhow::Result<()> {
    let group = stack.resource_group.clone();
    println!("{}", format!("Tearing down stack {}...", stack.name).yellow());
    println!("Resource group: {}", group.cyan());

    if !yes {
        println!();
        println!(
            "{}",
            format!("Warning: this deletes {} and every resource in it.", group).yellow()
        );
        println!("Re-run with --yes to continue");
        return Ok(());
    }

    let provider = AzureProvider::new(stack).with_state(utils::state_manager(stack_path));
    utils::ensure_authenticated(&provider).await?;

    let spinner = Spinner::new(&format!("Deleting {}", group));
    let result = match provider.destroy_all().await {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_error(&e.to_string());
            return Err(e.into());
        }
    };

    if result.is_success() {
        spinner.finish_success("Deletion requested");
    } else {
        spinner.finish_error("deletion failed");
    }
    utils::print_apply_result(&result);

    if !result.is_success() {
        anyhow::bail!("failed to delete {}", group);
    }
    Ok(())
}
