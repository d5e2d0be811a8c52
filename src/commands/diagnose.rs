use anyhow::Result;
use colored::Colorize;

use mcpmend::checks::{self, DiagnosticReport};
use mcpmend::output::{print_issue, print_list, MendOutput};

use super::{print_header, Context};

pub fn run(ctx: &Context) -> Result<()> {
    let path = ctx.manifest_path();
    let probe = ctx.probe();
    let report = checks::diagnose(&path, &ctx.config, probe.as_ref());
    let has_critical = report.critical_count() > 0;

    if ctx.is_json() {
        output_json(&report)?;
    } else {
        output_text(&report);
    }

    if has_critical {
        std::process::exit(1);
    }

    Ok(())
}

fn output_text(report: &DiagnosticReport) {
    print_header("Manifest Diagnosis");

    println!("  Path:    {}", report.config_path.cyan());
    let exists = if report.exists { "yes".green() } else { "no".red() };
    let valid = if report.valid { "yes".green() } else { "no".red() };
    println!("  Exists:  {}", exists);
    println!("  Valid:   {}", valid);
    println!("  Servers: {}", report.server_count);
    println!();

    if report.issues.is_empty() {
        println!("{} No issues found", "✓".green());
    }
    for issue in &report.issues {
        print_issue(issue);
    }

    println!();
    println!(
        "{}: {} critical, {} warnings",
        "Summary".bold(),
        report.critical_count().to_string().red(),
        report.warning_count().to_string().yellow()
    );

    print_list("Recommendations", &report.recommendations);
}

fn output_json(report: &DiagnosticReport) -> Result<()> {
    let output = MendOutput::new("diagnose")
        .with_success(report.critical_count() == 0)
        .with_issues(report.issues.clone())
        .with_payload(report)?;

    println!("{}", output.to_json()?);
    Ok(())
}
