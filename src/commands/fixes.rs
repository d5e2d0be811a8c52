use anyhow::Result;
use colored::Colorize;

use mcpmend::fixes::{self, FixSuggestions};
use mcpmend::output::MendOutput;

use super::{print_header, Context};

pub fn run(ctx: &Context, issue_type: Option<&str>) -> Result<()> {
    let suggestions = fixes::suggest_fixes(issue_type);

    if ctx.is_json() {
        let output = MendOutput::new("fixes").with_payload(&suggestions)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&suggestions);
    }

    Ok(())
}

fn output_text(suggestions: &FixSuggestions) {
    print_header(&format!("Fixes: {}", suggestions.issue_type));

    for playbook in &suggestions.fixes {
        println!("{} {}", "●".cyan(), playbook.issue.bold());
        println!("  {}", playbook.solution);
        for (i, step) in playbook.steps.iter().enumerate() {
            println!("    {}. {}", i + 1, step);
        }
        if let Some(ref preventive) = playbook.preventive {
            println!("  {} {}", "Prevent:".dimmed(), preventive.dimmed());
        }
        println!();
    }
}
