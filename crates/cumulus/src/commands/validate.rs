use colored::Colorize;
use std::path::Path;

pub fn handle(stack_path: &Path) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());
    println!("Stack file: {}", stack_path.display().to_string().cyan());

    let stack = match cumulus_core::load_stack_with_overrides(stack_path) {
        Ok(stack) => stack,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Stack configuration is invalid".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", "✓ Stack configuration is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Stack: {} ({})", stack.name.cyan(), stack.location);
    println!("  Resource group: {}", stack.resource_group);
    let quota = stack
        .storage
        .share_quota_gb
        .map(|gb| format!(" ({} GB)", gb))
        .unwrap_or_default();
    println!(
        "  Storage: {} / share {}{}",
        stack.storage.account_name, stack.storage.share_name, quota
    );
    println!(
        "  Network: {} {} / {} {}",
        stack.network.vnet_name,
        stack.network.address_space,
        stack.network.subnet_name,
        stack.network.subnet_prefix
    );
    println!(
        "  Security group: {} ({} rules)",
        stack.security.name,
        stack.security.rules.len()
    );
    for rule in &stack.security.rules {
        let ports: Vec<String> = rule.destination_ports.iter().map(|p| p.to_string()).collect();
        println!(
            "    - {} {} {} ports {}",
            rule.priority,
            rule.name.cyan(),
            rule.access.as_str(),
            ports.join(",")
        );
    }
    println!(
        "  Load balancer: {} ({} -> {})",
        stack.load_balancer.name,
        stack.load_balancer.rule.frontend_port,
        stack.load_balancer.rule.backend_port
    );
    println!(
        "  Scale set: {} ({} x {}, {})",
        stack.scale_set.name,
        stack.scale_set.capacity,
        stack.scale_set.vm_size,
        stack.scale_set.image.urn()
    );
    println!(
        "  Autoscale: {}..{} (default {}), {} rules",
        stack.autoscale.minimum,
        stack.autoscale.maximum,
        stack.autoscale.default,
        stack.autoscale.rules.len()
    );
    println!(
        "  App: {} on port {}, boot script via {}",
        stack.app.image.cyan(),
        stack.app.host_port,
        stack.scale_set.boot_delivery.as_str()
    );

    if let Err(e) = stack.validate_for_apply() {
        println!();
        println!("{}", "⚠ The stack cannot be deployed as is:".yellow());
        println!("  {}", e);
    }

    Ok(())
}
