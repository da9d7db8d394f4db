use colored::Colorize;
use cumulus_cloud::DependencyGraph;
use cumulus_cloud_azure::StackResources;
use cumulus_core::Stack;

pub fn handle(stack: &Stack) -> anyhow::Result<()> {
    let resources = StackResources::declare(stack);
    let graph = DependencyGraph::from_resources(&resources)?;

    println!(
        "{}",
        format!("{} resources in {} waves", graph.len(), graph.levels().len()).bold()
    );
    for (index, wave) in graph.levels().iter().enumerate() {
        println!();
        println!("{}", format!("Wave {}", index + 1).blue().bold());
        for key in wave {
            let deps = graph
                .dependencies(key)
                .filter(|d| !d.is_empty())
                .map(|d| d.iter().cloned().collect::<Vec<_>>().join(", "))
                .map(|d| format!(" <- {}", d))
                .unwrap_or_default();
            println!("  {}{}", key.cyan(), deps.dimmed());
        }
    }
    Ok(())
}
