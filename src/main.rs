use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::config::ConfigAction;
use commands::Context;
use mcpmend::output::OutputFormat;

/// mcpmend - MCP manifest doctor & repair tool
/// Diagnoses the launch manifest of MCP tool servers, probes the host and
/// repairs broken JSON.
#[derive(Parser)]
#[command(name = "mcpmend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: String,

    /// Path to the mcpmend settings file (default: ./.mcpmend.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Path to the MCP manifest (default: the desktop host's claude_desktop_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the manifest for syntax and entry problems
    Diagnose,

    /// Check whether each configured server is likely to start
    Status {
        /// Only check this server
        server: Option<String>,
    },

    /// Repair JSON syntax errors in the manifest
    Repair {
        /// Do not back up the manifest (the manifest is then left untouched)
        #[arg(long)]
        no_backup: bool,
    },

    /// Check that the runtimes MCP servers need are installed
    Deps,

    /// Check whether ports are already taken
    Ports {
        /// Ports to check (default: the configured list)
        ports: Vec<u16>,
    },

    /// Run every check and summarize overall health
    Report {
        /// Skip scanning the host's log files
        #[arg(long)]
        no_logs: bool,
    },

    /// Show remediation steps for a category of problem
    Fixes {
        /// config_syntax, dependency_missing, port_conflict, permission_error,
        /// server_crash, general (issue type names are accepted too)
        issue_type: Option<String>,
    },

    /// Settings file management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create a default .mcpmend.toml settings file
    Init {
        /// Force overwrite existing settings
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the settings file
    Validate,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpmend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let format = OutputFormat::from_str(&cli.format);
    let is_json = format == OutputFormat::Json;

    if !is_json {
        println!("{}", "⚡ mcpmend".bold().cyan());
        println!("{}", "MCP manifest doctor & repair".dimmed());
        println!();
    }

    let result = match cli.command {
        Commands::Config { action } => {
            let config_action = match action {
                ConfigCommands::Init { force } => ConfigAction::Init { force },
                ConfigCommands::Validate => ConfigAction::Validate,
            };
            commands::config::run(config_action, cli.settings.as_deref(), format)
        }
        command => Context::load(cli.settings.as_deref(), cli.config, format).and_then(|ctx| {
            match command {
                Commands::Diagnose => commands::diagnose::run(&ctx),
                Commands::Status { server } => commands::status::run(&ctx, server.as_deref()),
                Commands::Repair { no_backup } => commands::repair::run(&ctx, !no_backup),
                Commands::Deps => commands::deps::run(&ctx),
                Commands::Ports { ports } => commands::ports::run(&ctx, ports),
                Commands::Report { no_logs } => commands::report::run(&ctx, !no_logs),
                Commands::Fixes { issue_type } => commands::fixes::run(&ctx, issue_type.as_deref()),
                Commands::Config { .. } => unreachable!("handled above"),
            }
        }),
    };

    if let Err(e) = result {
        if is_json {
            let error_output = serde_json::json!({
                "success": false,
                "error": format!("{:#}", e),
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            eprintln!("{}", serde_json::to_string_pretty(&error_output).unwrap_or_default());
        } else {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
        }

        let code = e
            .downcast_ref::<mcpmend::MendError>()
            .map(|err| err.exit_code())
            .unwrap_or(1);
        std::process::exit(code);
    }
}
