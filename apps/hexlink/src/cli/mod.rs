//! # Hexlink CLI Module
//!
//! This module implements the CLI interface for Hexlink.
//!
//! ## Available Commands
//!
//! - `ingest` - Ingest JSON files
//! - `get` - Fetch an object by id
//! - `by-type` / `by-value` / `by-predicate` - Queries
//! - `traverse` - Multi-hop traversal from an id or a value
//! - `delete` - Remove an object
//! - `status` - Show store counts
//! - `server` - Start the HTTP server

mod commands;

use clap::{ArgGroup, Parser, Subcommand};
use hexlink_core::{AuditLevel, HexlinkError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Hexlink - linked JSON graph store
///
/// Stores arbitrary JSON objects in a hexastore and links them through the
/// property values they share.
#[derive(Parser, Debug)]
#[command(name = "hexlink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Store folder (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// TOML store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Audit level: none, basic or high (overrides the config file)
    #[arg(long, global = true)]
    pub audit: Option<AuditLevel>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest files of JSON objects (concatenated, NDJSON or arrays)
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Fetch an object by id
    Get {
        id: String,
        /// Per-type filters as JSON
        #[arg(long)]
        filter: Option<String>,
    },

    /// Find every object of a declared type
    ByType {
        object_type: String,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Find objects holding a value that starts with the term
    ByValue {
        term: String,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Find objects with a property path (leading '.' matches any prefix)
    ByPredicate {
        path: String,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Walk linked objects through a sequence of types
    #[command(group(ArgGroup::new("start").required(true).args(["id", "value"])))]
    Traverse {
        /// Start from this object
        #[arg(long)]
        id: Option<String>,

        /// Start from every object holding a value with this prefix
        #[arg(long)]
        value: Option<String>,

        /// Comma-separated declared types, starting with the start's type
        #[arg(long, value_delimiter = ',', required = true)]
        spec: Vec<String>,

        #[arg(long)]
        filter: Option<String>,
    },

    /// Remove an object and its links
    Delete { id: String },

    /// Show store counts
    Status,

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), HexlinkError> {
    let config = resolve_config(cli.config.as_deref(), cli.database, cli.audit)?;

    match cli.command {
        Some(Commands::Ingest { files }) => cmd_ingest(config, &files),
        Some(Commands::Get { id, filter }) => cmd_get(config, &id, filter.as_deref()),
        Some(Commands::ByType {
            object_type,
            filter,
        }) => cmd_query(config, Lookup::Type(object_type), filter.as_deref()),
        Some(Commands::ByValue { term, filter }) => {
            cmd_query(config, Lookup::Value(term), filter.as_deref())
        }
        Some(Commands::ByPredicate { path, filter }) => {
            cmd_query(config, Lookup::Predicate(path), filter.as_deref())
        }
        Some(Commands::Traverse {
            id,
            value,
            spec,
            filter,
        }) => cmd_traverse(config, id, value, spec, filter.as_deref()),
        Some(Commands::Delete { id }) => cmd_delete(config, &id),
        Some(Commands::Server { host, port }) => cmd_server(config, &host, port).await,
        Some(Commands::Status) | None => cmd_status(config),
    }
}
