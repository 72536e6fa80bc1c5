use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use mindnet::config_cli::{self, ConfigCommands};
use mindnet::memory_cli::{self, MemoryCommands};
use mindnet::mindmap_cli::{self, MindmapCommands};
use mindnet::{observability, Config, Failure, MemoryService};

#[derive(Parser)]
#[command(name = "mindnet")]
#[command(about = "Per-identity associative memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: ~/.mindnet/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results and failures as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Memory(MemoryCommands),
    /// Mindmap file tools
    #[command(subcommand)]
    Mindmap(MindmapCommands),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let failure = Failure::from_error(&err);
            tracing::debug!("{err:?}");
            if json {
                println!("{}", failure.render(true));
            } else {
                eprintln!("{}", failure.render(false));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    observability::init_logging(observability::effective_level(&config.log_level, cli.verbose))?;

    match cli.command {
        Commands::Memory(cmd) => {
            let service = MemoryService::from_config(&config);
            memory_cli::handle_command(cmd, &service, cli.json).await
        }
        Commands::Mindmap(cmd) => mindmap_cli::handle_command(cmd, cli.json),
        Commands::Config(cmd) => config_cli::handle_command(cmd, &config),
    }
}
