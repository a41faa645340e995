use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pin")]
#[command(author, version, about = "Manage package pins and check which versions they allow", long_about = None)]
struct Cli {
    /// Pin store file (default: $PINNING_STORE_PATH or the user data directory)
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pin a package
    Add {
        /// Package identifier
        package_id: String,
        /// Source the pin applies to
        #[arg(long, required_unless_present = "installed", conflicts_with = "installed")]
        source: Option<String>,
        /// Pin the installed package instead of a source
        #[arg(long)]
        installed: bool,
        /// Block every update
        #[arg(long, conflicts_with = "gate")]
        blocking: bool,
        /// Only allow versions matching this gate, e.g. "1.2.*" or ">=1.0, <2.0"
        #[arg(long = "version", value_name = "GATE")]
        gate: Option<String>,
        /// Replace a different existing pin
        #[arg(long)]
        force: bool,
    },
    /// Remove pins for a package
    Remove {
        /// Package identifier
        package_id: String,
        /// Only remove the pin for this source ("*" for the installed package)
        #[arg(long)]
        source: Option<String>,
    },
    /// List pins
    List {
        /// Only list pins for this source
        #[arg(long)]
        source: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove all pins
    Reset {
        /// Only reset pins for this source
        #[arg(long)]
        source: Option<String>,
        /// Actually remove the pins instead of listing them
        #[arg(long)]
        force: bool,
    },
    /// Show the latest version the pins allow
    Check {
        /// Package identifier
        package_id: String,
        /// Source offering the available versions
        #[arg(long)]
        source: String,
        /// Currently installed version, if any
        #[arg(long, value_name = "VERSION")]
        installed_version: Option<String>,
        /// Channel of the installed and available versions
        #[arg(long, default_value = "")]
        channel: String,
        /// Available versions
        #[arg(long, value_name = "VERSION", num_args = 1.., required = true)]
        available: Vec<String>,
    },
}

fn main() -> Result<()> {
    pinning_core::logging::init_tracing("warn");

    let cli = Cli::parse();
    let store = cli.store.as_deref();

    match cli.command {
        Commands::Add {
            package_id,
            source,
            installed,
            blocking,
            gate,
            force,
        } => commands::cmd_add(
            store,
            &package_id,
            source.as_deref(),
            installed,
            blocking,
            gate.as_deref(),
            force,
        ),
        Commands::Remove { package_id, source } => {
            commands::cmd_remove(store, &package_id, source.as_deref())
        }
        Commands::List { source, json } => commands::cmd_list(store, source.as_deref(), json),
        Commands::Reset { source, force } => commands::cmd_reset(store, source.as_deref(), force),
        Commands::Check {
            package_id,
            source,
            installed_version,
            channel,
            available,
        } => commands::cmd_check(
            store,
            &package_id,
            &source,
            installed_version.as_deref(),
            &channel,
            &available,
        ),
    }
}
