use crate::commands::plan::print_plan;
use crate::progress::Spinner;
use crate::utils;
use colored::Colorize;
use cumulus_cloud::CloudProvider;
use cumulus_cloud_azure::{AzureProvider, output_keys};
use cumulus_core::Stack;
use std::path::Path;

pub async fn handle(stack: Stack, stack_path: &Path, yes: bool, prune: bool) -> anyhow::Result<()> {
    println!("{}", format!("Deploying stack {}...", stack.name).green());
    stack.validate_for_apply()?;

    let provider = AzureProvider::new(stack)
        .with_prune(prune)
        .with_state(utils::state_manager(stack_path));
    utils::ensure_authenticated(&provider).await?;

    let plan = provider.plan(&provider.desired()).await?;
    print_plan(&plan);

    if !plan.has_changes {
        println!();
        println!("{}", "✓ Everything is up to date".green());
        return Ok(());
    }

    if !yes {
        println!();
        println!("{}", "Nothing was changed.".yellow());
        println!("Re-run with --yes to apply this plan");
        return Ok(());
    }

    println!();
    let spinner = Spinner::new(&format!(
        "Applying {} changes",
        plan.changes().count()
    ));
    let result = match provider.apply(&plan).await {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_error(&e.to_string());
            return Err(e.into());
        }
    };

    if result.is_success() {
        spinner.finish_success("Apply complete");
    } else {
        spinner.finish_error("some resources were not created");
    }
    utils::print_apply_result(&result);

    if let Some(ip) = result.outputs.get(output_keys::PUBLIC_IP) {
        println!();
        println!(
            "Application: {}",
            format!("http://{}:{}", ip, provider.stack().load_balancer.rule.frontend_port).cyan()
        );
    }

    if !result.is_success() {
        anyhow::bail!("{} resources failed", result.failed.len());
    }
    Ok(())
}
