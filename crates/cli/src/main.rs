//! tldw agent CLI: the main entry point.
//!
//! Commands:
//! - `run`: Run a coding task, approving writes and commands as they come up
//! - `tools`: List the tools offered to the model and their approval tier
//! - `config`: Show, locate, or validate the configuration file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tldw-agent",
    about = "tldw agent — tool-calling coding agent backed by tldw_server",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task with the agent
    Run {
        /// What the agent should do
        task: String,

        /// Workspace the tools operate on
        #[arg(short, long, default_value = "default")]
        workspace: String,

        /// Override the model
        #[arg(short, long)]
        model: Option<String>,

        /// Override the step budget
        #[arg(long)]
        max_steps: Option<u32>,

        /// Run file and git writes without asking
        #[arg(long)]
        auto_approve_writes: bool,

        /// Run commands without asking
        #[arg(long)]
        auto_approve_exec: bool,
    },

    /// List available tools
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            task,
            workspace,
            model,
            max_steps,
            auto_approve_writes,
            auto_approve_exec,
        } => {
            let options = commands::run::RunOptions {
                task,
                workspace,
                model,
                max_steps,
                auto_approve_writes,
                auto_approve_exec,
            };
            commands::run::run(options).await?
        }
        Commands::Tools => commands::tools::run(),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
