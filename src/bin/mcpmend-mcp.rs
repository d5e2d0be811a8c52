//! mcpmend MCP Server Binary
//! JSON-RPC server that lets an assistant diagnose and repair its own MCP manifest.
//!
//! ## Usage
//! The server communicates via stdio, reading JSON-RPC requests from stdin
//! and writing responses to stdout. Logs go to stderr (`RUST_LOG` to adjust).
//!
//! ```bash
//! mcpmend-mcp
//! ```
//!
//! ## Available Tools
//!
//! - `diagnose_config` - Analyze the manifest
//! - `check_server_status` - Launch readiness of each server
//! - `repair_syntax` - Repair JSON syntax, backing up first
//! - `probe_dependencies` / `probe_ports` - Environment checks
//! - `full_report` - Everything above, summarized
//! - `suggest_fixes` - Remediation playbooks

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcpmend::config::MendConfig;
use mcpmend::mcp::McpServer;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpmend=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match MendConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ignoring settings file: {:#}", e);
            MendConfig::default()
        }
    };

    let server = McpServer::with_config(config);

    if let Err(e) = server.run() {
        eprintln!("MCP server error: {}", e);
        std::process::exit(1);
    }
}
