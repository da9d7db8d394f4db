mod commands;
mod progress;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cumulus")]
#[command(about = "Declare, plan and deploy an Azure VM scale set stack", long_about = None)]
struct Cli {
    /// Stack file (default: stack.kdl discovered from the current directory)
    #[arg(long, global = true, env = "CUMULUS_STACK_PATH")]
    stack: Option<PathBuf>,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the stack file
    Validate,
    /// Show what `up` would change
    Plan {
        /// Delete resources in the group that are no longer declared
        #[arg(long)]
        prune: bool,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the stack in Azure
    Up {
        /// Apply without stopping at the plan
        #[arg(short, long)]
        yes: bool,
        /// Delete resources in the group that are no longer declared
        #[arg(long)]
        prune: bool,
    },
    /// Delete the resource group and everything in it
    Down {
        /// Confirm deletion
        #[arg(short, long)]
        yes: bool,
    },
    /// Render the instance boot script
    Script {
        /// Storage account key to embed (placeholder when omitted)
        #[arg(long, env = "AZURE_STORAGE_KEY", hide_env_values = true)]
        storage_key: Option<String>,
        /// Public IP passed to the container as TRUSTED_PROXIES
        #[arg(long)]
        public_ip: Option<String>,
        /// Print base64 custom data instead of the script
        #[arg(long)]
        base64: bool,
        /// Do not mask the storage key
        #[arg(long)]
        reveal: bool,
    },
    /// Show resources grouped into creation waves
    Graph,
    /// Show resources recorded in the local state file
    Status,
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let mut filter = EnvFilter::from_default_env();
    if verbose {
        filter = filter.add_directive(tracing::Level::DEBUG.into());
    }
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Version does not need a stack file
    if matches!(cli.command, Commands::Version) {
        println!("cumulus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let stack_path = utils::resolve_stack_path(cli.stack)?;
    tracing::debug!(path = %stack_path.display(), "Using stack file");

    match cli.command {
        Commands::Validate => commands::validate::handle(&stack_path)?,
        Commands::Plan { prune, json } => {
            let stack = utils::load(&stack_path)?;
            commands::plan::handle(stack, prune, json).await?;
        }
        Commands::Up { yes, prune } => {
            let stack = utils::load(&stack_path)?;
            commands::up::handle(stack, &stack_path, yes, prune).await?;
        }
        Commands::Down { yes } => {
            let stack = utils::load(&stack_path)?;
            commands::down::handle(stack, &stack_path, yes).await?;
        }
        Commands::Script {
            storage_key,
            public_ip,
            base64,
            reveal,
        } => {
            let stack = utils::load(&stack_path)?;
            commands::script::handle(&stack, storage_key, public_ip, base64, reveal)?;
        }
        Commands::Graph => {
            let stack = utils::load(&stack_path)?;
            commands::graph::handle(&stack)?;
        }
        Commands::Status => commands::status::handle(&stack_path).await?,
        Commands::Version => unreachable!("Version is handled before loading the stack"),
    }

    Ok(())
}
