use anyhow::Result;
use colored::Colorize;

use mcpmend::checks::ports::{self, PortReport};
use mcpmend::checks::ProbeStatus;
use mcpmend::output::{print_list, MendOutput};
use mcpmend::utils::block_on;

use super::{print_header, Context};

pub fn run(ctx: &Context, requested: Vec<u16>) -> Result<()> {
    if requested.contains(&0) {
        anyhow::bail!("Port 0 is not a valid port to check");
    }
    let requested = if requested.is_empty() {
        ctx.config.probes.ports.clone()
    } else {
        requested
    };

    let pool = ctx.pool();
    let report = block_on(ports::probe_ports(&requested, ctx.probe(), &pool))?;

    if ctx.is_json() {
        let output = MendOutput::new("ports")
            .with_success(report.conflicts.is_empty())
            .with_payload(&report)?;
        println!("{}", output.to_json()?);
    } else {
        output_text(&report);
    }

    Ok(())
}

fn output_text(report: &PortReport) {
    print_header("Ports");

    for (port, status) in &report.ports {
        let line = match status.status {
            ProbeStatus::InUse => format!("{} {} {}", "✗".red(), port, "in use".red()),
            _ => format!("{} {} {}", "✓".green(), port, "available".green()),
        };
        println!("{}", line);
        if let Some(ref details) = status.details {
            for detail in details.lines().filter(|l| !l.trim().is_empty()) {
                println!("  {}", detail.dimmed());
            }
        }
    }

    print_list("Recommendations", &report.recommendations);
}
