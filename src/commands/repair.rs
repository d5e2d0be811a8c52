use anyhow::Result;
use colored::Colorize;

use mcpmend::output::MendOutput;
use mcpmend::repair::{self, RepairResult};

use super::{print_header, Context};

pub fn run(ctx: &Context, create_backup: bool) -> Result<()> {
    let path = ctx.manifest_path();
    let result = repair::apply_repair(&path, create_backup);

    if ctx.is_json() {
        let output = MendOutput::new("repair")
            .with_success(result.success)
            .with_payload(&result)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&result);
    }

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn output_text(result: &RepairResult) {
    print_header("Syntax Repair");
    println!("  Path: {}", result.config_path.cyan());
    println!();

    if result.success && result.fixes_applied.is_empty() {
        println!("{} Manifest already parses, nothing to repair", "✓".green());
        return;
    }

    for fix in &result.fixes_applied {
        println!("  {} {}", "→".cyan(), fix);
    }

    if let Some(ref backup) = result.backup_path {
        println!();
        println!("{} Backup written to {}", "✓".green(), backup.cyan());
    }

    for error in &result.errors {
        println!("{} {}", "✗".red(), error);
    }

    println!();
    if result.success {
        println!("{}", "Manifest repaired! ✨".green().bold());
    } else if !result.fixes_applied.is_empty() && !result.backup_created {
        println!(
            "{} Run {} without {} to write the repaired manifest.",
            "→".cyan(),
            "mcpmend repair".cyan(),
            "--no-backup".cyan()
        );
    }
}
