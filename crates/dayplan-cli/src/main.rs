use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dayplan", version, about = "Dayplan scheduling CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule habits and backlog projects
    Run(commands::run::RunArgs),
    /// Show the windows active on a date
    Windows(commands::windows::WindowsArgs),
    /// Check whether a habit is due on a date
    Due(commands::due::DueArgs),
    /// List placed instances
    Instances(commands::instances::InstancesArgs),
    /// Update a placed instance
    Instance {
        #[command(subcommand)]
        action: commands::instance::InstanceAction,
    },
    /// Import windows, projects, tasks, habits and skills from JSON
    Import(commands::import::ImportArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DAYPLAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Windows(args) => commands::windows::run(args),
        Commands::Due(args) => commands::due::run(args),
        Commands::Instances(args) => commands::instances::run(args),
        Commands::Instance { action } => commands::instance::run(action),
        Commands::Import(args) => commands::import::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
