//! Settings commands for mcpmend
//! Provides `mcpmend config init` and `mcpmend config validate` subcommands.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use mcpmend::config::{MendConfig, SETTINGS_FILE};
use mcpmend::output::{MendOutput, OutputFormat};

/// Config subcommand action
#[derive(Debug, Clone)]
pub enum ConfigAction {
    Init { force: bool },
    Validate,
}

/// Run the config command against `settings` (or `.mcpmend.toml`)
pub fn run(action: ConfigAction, settings: Option<&Path>, format: OutputFormat) -> Result<()> {
    let path = settings.unwrap_or_else(|| Path::new(SETTINGS_FILE));
    match action {
        ConfigAction::Init { force } => run_init(path, force, format),
        ConfigAction::Validate => run_validate(path, format),
    }
}

/// Create a default settings file
fn run_init(path: &Path, force: bool, format: OutputFormat) -> Result<()> {
    let shown = path.display().to_string();

    if path.exists() && !force {
        if format == OutputFormat::Json {
            let output = MendOutput::new("config init")
                .with_success(false)
                .with_data(serde_json::json!({
                    "error": "Settings file already exists",
                    "path": shown,
                    "hint": "Use --force to overwrite"
                }));
            println!("{}", output.to_json()?);
        } else {
            println!("{} {} already exists", "Error:".red().bold(), shown.cyan());
            println!("Use {} to overwrite.", "--force".cyan());
        }
        return Ok(());
    }

    let config = MendConfig::create_default(path)?;

    if format == OutputFormat::Json {
        let output = MendOutput::new("config init")
            .with_success(true)
            .with_data(serde_json::json!({
                "path": shown,
                "created": true,
                "config": {
                    "probes": {
                        "timeout_seconds": config.probes.timeout_seconds,
                        "max_concurrency": config.probes.max_concurrency,
                        "ports": config.probes.ports,
                        "dependencies": config.probes.dependencies.len()
                    }
                }
            }));
        println!("{}", output.to_json()?);
    } else {
        println!("{} Created {}", "✓".green().bold(), shown.cyan());
        println!();
        println!("You can customize:");
        println!("  • {} - Manifest location", "[manifest]".cyan());
        println!("  • {} - Timeouts, ports and dependencies", "[probes]".cyan());
        println!("  • {} - Log directory and scan limits", "[logs]".cyan());
        println!("  • {} - Disable or re-rank issue types", "[checks]".cyan());
    }

    Ok(())
}

/// Validate the settings file
fn run_validate(path: &Path, format: OutputFormat) -> Result<()> {
    let shown = path.display().to_string();

    if !path.exists() {
        if format == OutputFormat::Json {
            let output = MendOutput::new("config validate")
                .with_success(false)
                .with_data(serde_json::json!({
                    "error": "Settings file not found",
                    "path": shown,
                    "hint": "Run `mcpmend config init` to create one"
                }));
            println!("{}", output.to_json()?);
        } else {
            println!("{} {} not found", "Error:".red().bold(), shown.cyan());
            println!("Run {} to create one.", "mcpmend config init".cyan());
        }
        return Ok(());
    }

    // load_from parses and validates
    let config = match MendConfig::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            if format == OutputFormat::Json {
                let output = MendOutput::new("config validate")
                    .with_success(false)
                    .with_data(serde_json::json!({
                        "path": shown,
                        "valid": false,
                        "error": format!("{:#}", e)
                    }));
                println!("{}", output.to_json()?);
            } else {
                println!("{} {} has errors", "✗".red().bold(), shown.cyan());
                println!("  {:#}", e);
            }
            std::process::exit(1);
        }
    };

    if format == OutputFormat::Json {
        let output = MendOutput::new("config validate")
            .with_success(true)
            .with_data(serde_json::json!({
                "path": shown,
                "valid": true,
                "disabled_checks": config.checks.disabled.len(),
                "severity_overrides": config.checks.severity_overrides.len()
            }));
        println!("{}", output.to_json()?);
    } else {
        println!("{} {} is valid", "✓".green().bold(), shown.cyan());
        println!();

        if !config.checks.disabled.is_empty() {
            let disabled: Vec<&str> = config.checks.disabled.iter().map(|t| t.as_str()).collect();
            println!(
                "  {} disabled checks: {}",
                disabled.len(),
                disabled.join(", ").dimmed()
            );
        }

        if !config.checks.severity_overrides.is_empty() {
            println!(
                "  {} severity overrides",
                config.checks.severity_overrides.len()
            );
        }

        if let Some(ref manifest) = config.manifest.path {
            println!("  {} Manifest: {}", "→".cyan(), manifest.display());
        }
    }

    Ok(())
}
