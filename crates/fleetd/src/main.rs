//! fleetd: the fleet inventory and pool tool.
//!
//! One binary over the redb-backed inventory:
//! - Import and export inventory documents
//! - Resolve a node's effective configuration
//! - Show node provisioning status
//! - Reserve, release and query pool nodes
//!
//! # Usage
//!
//! ```text
//! fleetd --data-dir /var/lib/fleet import cluster.json
//! fleetd resolve node01
//! fleetd reserve --count 2 --where arch=x86_64 --where memory=>=64 --owner alice
//! fleetd release --owner alice --nodes node01,node02
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,fleetd=debug,fleet=debug";

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet inventory and resource pool")]
struct Cli {
    /// Path to fleet.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding fleet.redb; overrides `[store] path`.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an inventory document (JSON) into the store.
    Import {
        /// Document to read; `-` for stdin.
        file: PathBuf,
    },

    /// Print the stored inventory as JSON.
    Export {
        /// Kinds to export, e.g. `node,group` or `-site`.
        #[arg(long)]
        types: Option<String>,
    },

    /// Print a node's effective configuration.
    Resolve { node: String },

    /// Print a node's provisioning status.
    Status { node: String },

    /// Reserve free nodes from the pool.
    Reserve {
        /// Number of nodes.
        #[arg(long, default_value = "1")]
        count: usize,

        /// Criterion `key=expr`, e.g. `memory=>=64`. Repeatable.
        #[arg(long = "where", value_name = "KEY=EXPR")]
        criteria: Vec<String>,

        #[arg(long)]
        owner: String,

        /// Instance id to record instead of a generated one.
        #[arg(long)]
        instance: Option<String>,
    },

    /// Return reserved nodes to the pool.
    Release {
        #[arg(long)]
        owner: String,

        /// Comma-separated node names.
        #[arg(long, value_delimiter = ',', required_unless_present = "all")]
        nodes: Vec<String>,

        /// Release every node held by the owner.
        #[arg(long, conflicts_with = "nodes")]
        all: bool,
    },

    /// List nodes held by an owner.
    Query {
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let ctx = commands::Context::load(cli.config.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Command::Import { file } => commands::import(&ctx, &file),
        Command::Export { types } => commands::export(&ctx, types.as_deref()),
        Command::Resolve { node } => commands::resolve(&ctx, &node),
        Command::Status { node } => commands::status(&ctx, &node),
        Command::Reserve {
            count,
            criteria,
            owner,
            instance,
        } => commands::reserve(&ctx, count, &criteria, &owner, instance).await,
        Command::Release { owner, nodes, all } => {
            commands::release(&ctx, &owner, &nodes, all).await
        }
        Command::Query { owner } => commands::query(&ctx, &owner).await,
    }
}
