use anyhow::Result;
use colored::Colorize;

use mcpmend::checks::dependencies::{self, DependencyReport};
use mcpmend::output::{print_list, MendOutput};
use mcpmend::utils::block_on;

use super::{print_header, Context};

pub fn run(ctx: &Context) -> Result<()> {
    let pool = ctx.pool();
    let report = block_on(dependencies::probe_dependencies(
        &ctx.config.probes.dependencies,
        ctx.probe(),
        &pool,
    ))?;

    if ctx.is_json() {
        let output = MendOutput::new("deps")
            .with_success(report.summary.all_required)
            .with_payload(&report)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&report);
    }

    if !report.summary.all_required {
        std::process::exit(1);
    }

    Ok(())
}

fn output_text(report: &DependencyReport) {
    print_header("Dependencies");

    for (name, dep) in &report.dependencies {
        if dep.is_installed() {
            let version = dep.version.as_deref().unwrap_or("unknown version");
            println!("{} {} {}", "✓".green(), name.bold(), version.dimmed());
            if let Some(ref command) = dep.command {
                println!("  {} {}", "via".dimmed(), command.cyan());
            }
        } else if dep.required {
            println!("{} {} {}", "✗".red(), name.bold(), "(missing, required)".red());
        } else {
            println!("{} {} {}", "⚠".yellow(), name.bold(), "(missing)".yellow());
        }

        if let Some(ref note) = dep.note {
            println!("  {}", note.dimmed());
        }
        if let Some(ref fix) = dep.fix {
            println!("  {} {}", "Fix:".cyan(), fix);
        }
    }

    if !report.summary.missing_critical.is_empty() {
        println!();
        println!(
            "{} missing required: {}",
            "✗".red(),
            report.summary.missing_critical.join(", ")
        );
    }

    print_list("Recommendations", &report.summary.recommendations);
}
