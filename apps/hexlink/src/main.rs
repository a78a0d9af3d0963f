//! # Hexlink - Linked JSON Graph Store
//!
//! The main binary for the Hexlink hexastore engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for ingest, queries and traversals
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/hexlink (THE BINARY)         │
//! │                                              │
//! │   ┌─────────────┐        ┌─────────────┐     │
//! │   │    CLI      │        │  HTTP API   │     │
//! │   │   (clap)    │        │   (axum)    │     │
//! │   └──────┬──────┘        └──────┬──────┘     │
//! │          └───────────┬──────────┘            │
//! │                      ▼                       │
//! │              ┌──────────────┐                │
//! │              │ hexlink-core │                │
//! │              │ (THE ENGINE) │                │
//! │              └──────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! hexlink server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! hexlink ingest students.json groups.json
//! hexlink traverse --id S1 --spec StudentPersonal,TeachingGroup
//! hexlink status
//! ```

use clap::Parser;
use hexlink::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // HEXLINK_LOG_FORMAT=json enables machine-parseable output. Logs go to
    // stderr so command results on stdout stay pipeable.
    let log_format = std::env::var("HEXLINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    eprintln!(
        r#"
  ██╗  ██╗███████╗██╗  ██╗██╗     ██╗███╗   ██╗██╗  ██╗
  ██║  ██║██╔════╝╚██╗██╔╝██║     ██║████╗  ██║██║ ██╔╝
  ███████║█████╗   ╚███╔╝ ██║     ██║██╔██╗ ██║█████╔╝
  ██╔══██║██╔══╝   ██╔██╗ ██║     ██║██║╚██╗██║██╔═██╗
  ██║  ██║███████╗██╔╝ ██╗███████╗██║██║ ╚████║██║  ██╗
  ╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝╚══════╝╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝

  Linked JSON Graph Store v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
