//! Host probing.
//!
//! Every question about the machine (is this command on the search path,
//! what version does it report, is this port taken) goes through
//! [`HostProbe`]. [`SystemProbe`] asks the real host; tests substitute a fake.
//! [`ProbePool`] runs probes on the blocking pool under a shared permit count
//! and a per-probe timeout.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::ProbeSettings;
use crate::error::{MendError, Result};
use crate::utils::{run_with_deadline, ProcessOutcome};

/// Occupancy of a local TCP port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortState {
    Available,
    /// Bound by another process; `owner` is whatever `lsof`/`netstat` said
    InUse { owner: Option<String> },
}

/// Capability to inspect the host
pub trait HostProbe: Send + Sync {
    /// Locate `command` on the search path
    fn resolve_command(&self, command: &str) -> Result<PathBuf>;

    /// Run `command --version` and return the first non-empty output line
    fn command_version(&self, command: &str) -> Result<String>;

    fn port_status(&self, port: u16) -> Result<PortState>;
}

/// Probe backed by the real host
#[derive(Debug, Clone)]
pub struct SystemProbe {
    timeout: Duration,
}

impl SystemProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.timeout())
    }

    #[cfg(not(windows))]
    fn port_owner(&self, port: u16) -> Option<String> {
        let target = format!(":{}", port);
        let outcome = run_with_deadline("lsof", &["-nP", "-i", &target], self.timeout);
        let trimmed = outcome.stdout()?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    #[cfg(windows)]
    fn port_owner(&self, port: u16) -> Option<String> {
        let needle = format!(":{}", port);
        let outcome = run_with_deadline("netstat", &["-ano"], self.timeout);
        outcome
            .stdout()?
            .lines()
            .map(str::trim)
            .find(|line| {
                line.split_whitespace()
                    .nth(1)
                    .map_or(false, |local| local.ends_with(&needle))
            })
            .map(|line| line.to_string())
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::from_settings(&ProbeSettings::default())
    }
}

impl HostProbe for SystemProbe {
    fn resolve_command(&self, command: &str) -> Result<PathBuf> {
        which::which(command)
            .map_err(|e| MendError::probe_unavailable(format!("resolve {}", command), e.to_string()))
    }

    fn command_version(&self, command: &str) -> Result<String> {
        let probe = format!("{} --version", command);
        match run_with_deadline(command, &["--version"], self.timeout) {
            ProcessOutcome::Exited {
                status,
                stdout,
                stderr,
            } if status.success() => {
                // Older Python builds print their version on stderr
                first_line(&stdout)
                    .or_else(|| first_line(&stderr))
                    .ok_or_else(|| MendError::probe_unavailable(probe, "no version output"))
            }
            ProcessOutcome::Exited { status, .. } => Err(MendError::probe_unavailable(
                probe,
                format!("exited with {}", status),
            )),
            ProcessOutcome::TimedOut => Err(MendError::probe_unavailable(
                probe,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
            ProcessOutcome::NotStarted(e) => Err(MendError::probe_unavailable(probe, e)),
        }
    }

    fn port_status(&self, port: u16) -> Result<PortState> {
        match TcpListener::bind(("0.0.0.0", port)) {
            Ok(listener) => {
                drop(listener);
                Ok(PortState::Available)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                debug!(port, "port is bound by another process");
                Ok(PortState::InUse {
                    owner: self.port_owner(port),
                })
            }
            Err(e) => Err(MendError::probe_unavailable(
                format!("port {}", port),
                e.to_string(),
            )),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}

/// Bounded executor for blocking probes
#[derive(Debug, Clone)]
pub struct ProbePool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl ProbePool {
    pub fn new(max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.max_concurrency, settings.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `job` on the blocking pool once a permit is free.
    ///
    /// The timeout starts when the permit is granted. A timed-out or panicked
    /// job comes back as [`MendError::ProbeUnavailable`].
    pub async fn run<T, F>(&self, label: impl Into<String>, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let label = label.into();
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MendError::probe_unavailable(label.clone(), "probe pool closed"))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_error)) => {
                debug!(probe = %label, error = %join_error, "probe task failed");
                Err(MendError::probe_unavailable(
                    label,
                    format!("probe task failed: {}", join_error),
                ))
            }
            Err(_) => {
                debug!(probe = %label, "probe timed out");
                Err(MendError::probe_unavailable(
                    label,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                ))
            }
        }
    }
}
