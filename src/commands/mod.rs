pub mod config;
pub mod deps;
pub mod diagnose;
pub mod fixes;
pub mod ports;
pub mod repair;
pub mod report;
pub mod status;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mcpmend::config::MendConfig;
use mcpmend::output::OutputFormat;
use mcpmend::probe::{HostProbe, ProbePool, SystemProbe};

/// Shared state for every tool subcommand
pub struct Context {
    pub config: MendConfig,
    pub format: OutputFormat,
    manifest: Option<PathBuf>,
}

impl Context {
    pub fn load(settings: Option<&Path>, manifest: Option<PathBuf>, format: OutputFormat) -> Result<Self> {
        let config = MendConfig::load_or_default(settings)?;
        Ok(Self {
            config,
            format,
            manifest,
        })
    }

    /// A path given on the command line is used as is, even when missing
    pub fn manifest_path(&self) -> PathBuf {
        match self.manifest {
            Some(ref path) => path.clone(),
            None => self.config.manifest_path(None),
        }
    }

    pub fn probe(&self) -> Arc<dyn HostProbe> {
        Arc::new(SystemProbe::from_settings(&self.config.probes))
    }

    pub fn pool(&self) -> ProbePool {
        ProbePool::from_settings(&self.config.probes)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// Print a section header in the shared text layout
pub fn print_header(title: &str) {
    use colored::Colorize;

    println!("{}", title.bold().cyan());
    println!("{}", "═".repeat(50).dimmed());
    println!();
}
