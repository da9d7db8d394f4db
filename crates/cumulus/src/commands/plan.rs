use crate::utils;
use colored::Colorize;
use cumulus_cloud::{ActionType, CloudProvider, Plan};
use cumulus_cloud_azure::AzureProvider;
use cumulus_core::Stack;

pub async fn handle(stack: Stack, prune: bool, json: bool) -> anyhow::Result<()> {
    let provider = AzureProvider::new(stack).with_prune(prune);

    if !json {
        utils::ensure_authenticated(&provider).await?;
        println!(
            "{}",
            format!("Reading resource group {}...", provider.stack().resource_group).blue()
        );
    }

    let plan = provider.plan(&provider.desired()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_plan(&plan);
    Ok(())
}

/// Print actions in dependency order followed by the summary
pub fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        let line = format!("  {} {}", action.action_type.symbol(), action.id);
        let line = match action.action_type {
            ActionType::Create => line.green(),
            ActionType::Update => line.yellow(),
            ActionType::Delete => line.red(),
            ActionType::NoOp => line.dimmed(),
        };
        println!("{}", line);
        if action.action_type != ActionType::NoOp {
            println!("      {}", action.description.dimmed());
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}
