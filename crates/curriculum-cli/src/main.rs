mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, order::OrderSubcommand, upload::UploadArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "curriculum",
    about = "Reorder course curriculum and replace lecture content from the command line",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .curriculum/)
    #[arg(long, global = true, env = "CURRICULUM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, show and validate .curriculum/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Show and change the order of sections or section items
    Order {
        #[command(subcommand)]
        subcommand: OrderSubcommand,
    },

    /// Upload new content for an item, replacing what it points at
    Upload(UploadArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Upload(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Order { subcommand } => cmd::order::run(&root, subcommand, cli.json),
        Commands::Upload(args) => cmd::upload::run(&root, args, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
