use anyhow::Result;
use colored::Colorize;

use mcpmend::checks::servers::{self, ServerState, StatusReport};
use mcpmend::output::MendOutput;
use mcpmend::utils::block_on;

use super::{print_header, Context};

pub fn run(ctx: &Context, only: Option<&str>) -> Result<()> {
    let path = ctx.manifest_path();
    let pool = ctx.pool();
    let report = block_on(servers::check_manifest_servers(&path, only, ctx.probe(), &pool))??;

    if let Some(name) = only {
        if report.servers.is_empty() {
            anyhow::bail!("No server named '{}' in {}", name, path.display());
        }
    }

    if ctx.is_json() {
        let output = MendOutput::new("status")
            .with_success(report.summary.failed == 0)
            .with_payload(&report)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&report);
    }

    if report.summary.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn output_text(report: &StatusReport) {
    print_header("Server Status");

    if report.servers.is_empty() {
        println!("{}", "No servers configured".dimmed());
        return;
    }

    for (name, result) in &report.servers {
        let (icon, label) = match result.status {
            ServerState::Ready => ("✓".green(), "ready".green()),
            ServerState::AssumedOk => ("✓".green(), "assumed ok".green()),
            ServerState::Failed => ("✗".red(), "failed".red()),
            ServerState::Unknown => ("?".blue(), "unknown".blue()),
            ServerState::Error => ("⚠".yellow(), "error".yellow()),
        };

        println!("{} {} {}", icon, name.bold(), format!("({})", label).dimmed());
        if let Some(ref command) = result.command {
            println!("  {} {}", command.cyan(), result.args.join(" ").dimmed());
        }
        if !result.message.is_empty() {
            println!("  {}", result.message.dimmed());
        }
        for issue in &result.issues {
            println!("  {} {}", "→".cyan(), issue);
        }
    }

    println!();
    println!(
        "{}: {} total, {} running, {} failed, {} unknown",
        "Summary".bold(),
        report.summary.total,
        report.summary.running.to_string().green(),
        report.summary.failed.to_string().red(),
        report.summary.unknown.to_string().blue()
    );
}
