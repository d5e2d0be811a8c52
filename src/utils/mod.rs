//! Process and runtime helpers shared by the probes and the tool handlers.

use std::future::Future;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Grace period for blocking probe threads when a request runtime shuts down
pub const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How an external process run ended
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Exited on its own; output decoded lossily
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    /// Still running at the deadline; killed and reaped
    TimedOut,
    /// Could not be spawned or waited on
    NotStarted(String),
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessOutcome::Exited { status, .. } if status.success())
    }

    /// Stdout of a process that exited, whatever its status
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ProcessOutcome::Exited { stdout, .. } => Some(stdout),
            _ => None,
        }
    }
}

#[cfg(windows)]
fn spawn(program: &str, args: &[&str]) -> std::io::Result<Child> {
    // cmd.exe resolves the .cmd/.bat shims npm installs
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    Command::new("cmd")
        .args(["/C", &line])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

#[cfg(not(windows))]
fn spawn(program: &str, args: &[&str]) -> std::io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Run `program` with `args`, killing it once `deadline` passes
pub fn run_with_deadline(program: &str, args: &[&str], deadline: Duration) -> ProcessOutcome {
    let mut child = match spawn(program, args) {
        Ok(child) => child,
        Err(e) => return ProcessOutcome::NotStarted(format!("failed to start '{}': {}", program, e)),
    };

    match child.wait_timeout(deadline) {
        Ok(Some(status)) => ProcessOutcome::Exited {
            status,
            stdout: drain(child.stdout.take()),
            stderr: drain(child.stderr.take()),
        },
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            ProcessOutcome::TimedOut
        }
        Err(e) => ProcessOutcome::NotStarted(format!("failed to wait for '{}': {}", program, e)),
    }
}

/// Drive `future` to completion on a runtime that lives for this request only
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    // Probes that outlived their timeout are still bounded by their own deadline
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    Ok(output)
}
