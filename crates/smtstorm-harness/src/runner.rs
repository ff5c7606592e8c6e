//! Child-process execution with a wall-clock timeout.
//!
//! Each run executes in a fresh child process (the same binary re-invoked
//! with `--in-child`): a solver crash or runaway loop takes down the child,
//! never the driver.  The parent polls, enforces the timeout with a kill,
//! and classifies the exit status.

use log::debug;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

/// Classified outcome of one child run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    /// The run found a solver error; `message` is the child's stderr.
    Error { message: String },
    /// The child died abnormally (signal or panic).
    Crash { message: String },
    /// The wall clock won.
    Timeout,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::Error { .. } => 1,
            RunStatus::Timeout => 124,
            RunStatus::Crash { .. } => 134,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Error { .. } => "error",
            RunStatus::Crash { .. } => "crash",
            RunStatus::Timeout => "timeout",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            RunStatus::Error { message } | RunStatus::Crash { message } => Some(message),
            _ => None,
        }
    }
}

fn classify(status: ExitStatus, stderr_path: &Path) -> RunStatus {
    let message = fs::read_to_string(stderr_path)
        .unwrap_or_default()
        .trim()
        .to_string();
    if status.success() {
        return RunStatus::Ok;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let message = if message.is_empty() {
                format!("killed by signal {}", signal)
            } else {
                message
            };
            return RunStatus::Crash { message };
        }
    }
    match status.code() {
        Some(1) => RunStatus::Error {
            message: if message.is_empty() {
                "unknown error".to_string()
            } else {
                message
            },
        },
        code => RunStatus::Crash {
            message: if message.is_empty() {
                format!("abnormal exit ({:?})", code)
            } else {
                message
            },
        },
    }
}

/// Re-invoke this binary with `args`, redirecting output, killing it after
/// `timeout`.
pub fn run_forked(
    args: &[String],
    timeout: Option<Duration>,
    stdout_path: &Path,
    stderr_path: &Path,
) -> io::Result<RunStatus> {
    let exe = std::env::current_exe()?;
    debug!("forking {:?} {:?}", exe, args);
    let mut child = Command::new(exe)
        .args(args)
        .stdout(File::create(stdout_path)?)
        .stderr(File::create(stderr_path)?)
        .spawn()?;

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(classify(status, stderr_path));
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                child.kill()?;
                let _ = child.wait()?;
                return Ok(RunStatus::Timeout);
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_contract() {
        assert_eq!(RunStatus::Ok.exit_code(), 0);
        assert_eq!(
            RunStatus::Error {
                message: String::new()
            }
            .exit_code(),
            1
        );
        assert_eq!(RunStatus::Timeout.exit_code(), 124);
        assert_eq!(
            RunStatus::Crash {
                message: String::new()
            }
            .exit_code(),
            134
        );
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RunStatus::Ok.kind(), "ok");
        assert_eq!(RunStatus::Timeout.kind(), "timeout");
    }
}
