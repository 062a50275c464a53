//! waw sync CLI
//!
//! Runs the profile/model sync daemon and edits the local profile.
//!
//! # Commands
//!
//! - `run` - Sync periodically until Ctrl-C
//! - `once` - Run one profile cycle and one model cycle
//! - `status` - Show marker, model hash and local profile
//! - `profile show|set|delete` - Manage the local profile

mod commands;
mod error;
mod settings;

use clap::{Parser, Subcommand};
use settings::Settings;
use tracing_subscriber::EnvFilter;

/// Keeps the local waw profile and model in sync with the cloud.
#[derive(Parser)]
#[command(name = "waw-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync periodically until interrupted
    Run,

    /// Run one profile cycle and one model cycle
    Once,

    /// Show sync marker, model hash and local profile
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the local profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the local profile as JSON
    Show,

    /// Create or update the local profile
    Set {
        /// User ID (generated if omitted and no profile exists)
        #[arg(long)]
        id: Option<String>,

        /// Full name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// Delete the local profile
    Delete {
        /// Also delete the profile on the remote
        #[arg(long)]
        remote: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run => commands::run::run(&cli.settings)?,
        Commands::Once => commands::once::run(&cli.settings)?,
        Commands::Status { format } => commands::status::run(&cli.settings, &format)?,
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(&cli.settings)?,
            ProfileAction::Set {
                id,
                name,
                email,
                phone,
            } => commands::profile::set(
                &cli.settings,
                commands::profile::ProfileEdit {
                    id,
                    name,
                    email,
                    phone,
                },
            )?,
            ProfileAction::Delete { remote } => commands::profile::delete(&cli.settings, remote)?,
        },
    }

    Ok(())
}
