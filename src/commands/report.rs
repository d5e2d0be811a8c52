use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use mcpmend::output::{print_list, MendOutput};
use mcpmend::report::{self, FullReport, OverallStatus, Section};
use mcpmend::utils::block_on;

use super::{print_header, Context};

pub fn run(ctx: &Context, include_logs: bool) -> Result<()> {
    let path = ctx.manifest_path();

    let spinner = (!ctx.is_json()).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Running checks...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let report = block_on(report::full_report(&path, include_logs, &ctx.config, ctx.probe()));

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = report?;
    let has_critical = report.summary.critical_issues > 0;

    if ctx.is_json() {
        let output = MendOutput::new("report")
            .with_success(!has_critical)
            .with_payload(&report)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&report);
    }

    if has_critical {
        std::process::exit(1);
    }

    Ok(())
}

fn section_line<T>(name: &str, section: &Section<T>, describe: impl Fn(&T) -> String) {
    match section {
        Section::Ready(value) => println!("{} {} {}", "✓".green(), name.bold(), describe(value).dimmed()),
        Section::Unavailable { reason } => {
            println!("{} {} {}", "?".blue(), name.bold(), format!("unavailable: {}", reason).dimmed())
        }
    }
}

fn output_text(report: &FullReport) {
    print_header("MCP Health Report");

    let sections = &report.sections;
    section_line("Configuration", &sections.configuration, |c| {
        format!("{} servers, {} issues", c.server_count, c.issues.len())
    });
    section_line("Dependencies", &sections.dependencies, |d| {
        if d.summary.missing_critical.is_empty() {
            "all required installed".to_string()
        } else {
            format!("missing {}", d.summary.missing_critical.join(", "))
        }
    });
    section_line("Servers", &sections.server_status, |s| {
        format!(
            "{} running, {} failed, {} unknown",
            s.summary.running, s.summary.failed, s.summary.unknown
        )
    });
    section_line("Ports", &sections.port_conflicts, |p| {
        format!("{} checked, {} in use", p.ports.len(), p.conflicts.len())
    });
    if let Some(ref logs) = sections.log_analysis {
        section_line("Logs", logs, |l| {
            if l.logs_found {
                format!("{} error lines matched", l.patterns.total())
            } else {
                "no log files found".to_string()
            }
        });
    }

    let summary = &report.summary;
    let status = match summary.overall_status {
        OverallStatus::Healthy => "healthy".green().bold(),
        OverallStatus::MinorIssues => "minor issues".yellow().bold(),
        OverallStatus::NeedsAttention => "needs attention".red().bold(),
    };

    println!();
    println!(
        "{}: {} ({} critical, {} warnings)",
        "Overall".bold(),
        status,
        summary.critical_issues.to_string().red(),
        summary.warnings.to_string().yellow()
    );

    print_list("Next steps", &summary.next_steps);
    print_list("Recommendations", &summary.recommendations);

    if summary.critical_issues == 0 && summary.warnings == 0 {
        println!();
        println!("{}", "MCP setup is healthy! ✨".green().bold());
    }
}
