//! Time-bounded execution of external tools.
//!
//! Telemetry and IPMI tools occasionally hang (a wedged BMC, a GPU
//! driver reset in progress). [`run_with_timeout`] guarantees the caller
//! gets control back by the deadline: stdout and stderr are drained on
//! helper threads so a chatty child cannot block on a full pipe, and a
//! child still running at the deadline is killed and reaped.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from launching or supervising a tool.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("failed waiting on {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished tool.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit status plus the first non-empty stderr line, for logs.
    pub fn failure_detail(&self) -> String {
        match self.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(line) => format!("{}: {}", self.status, line),
            None => self.status.to_string(),
        }
    }
}

/// Run `program args...`, giving up after `timeout`.
pub fn run_with_timeout<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => CommandError::NotFound {
                program: program.to_string(),
            },
            _ => CommandError::Spawn {
                program: program.to_string(),
                source,
            },
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    // An unrepresentable deadline means no deadline
    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }

        let now = Instant::now();
        let remaining = deadline.map(|d| d.saturating_duration_since(now));
        if remaining.is_some_and(|r| r.is_zero()) {
            // Readers are left detached: a grandchild may still hold the pipes
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError::TimedOut {
                program: program.to_string(),
                after: timeout,
            });
        }
        thread::sleep(remaining.map_or(POLL_INTERVAL, |r| POLL_INTERVAL.min(r)));
    };

    Ok(CommandOutput {
        status,
        stdout: stdout.map(collect).unwrap_or_default(),
        stderr: stderr.map(collect).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

// =============================================================================
// PATH lookup
// =============================================================================

/// Resolve `program` the way the shell would.
///
/// Names containing a path separator are checked as given; bare names
/// are searched on `PATH`.
pub fn locate_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

/// Whether the process has the privileges `ipmitool raw` needs.
#[cfg(unix)]
pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    true
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_status() {
        let output = run_with_timeout("sh", &["-c", "echo 45.0"], Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "45.0");
    }

    #[test]
    fn test_nonzero_exit_reported_with_stderr() {
        let output = run_with_timeout(
            "sh",
            &["-c", "echo 'Unable to establish IPMI session' >&2; exit 1"],
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!output.success());
        assert!(output.failure_detail().contains("Unable to establish IPMI session"));
    }

    #[test]
    fn test_hung_child_is_killed_at_deadline() {
        let start = Instant::now();
        let result = run_with_timeout("sh", &["-c", "exec sleep 30"], Duration::from_millis(200));
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let output = run_with_timeout("sh", &["-c", "echo ok"], Duration::MAX).unwrap();
        assert_eq!(output.stdout.trim(), "ok");
    }

    #[test]
    fn test_missing_program() {
        let result = run_with_timeout(
            "definitely-not-a-real-tool-4029",
            &[] as &[&str],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(CommandError::NotFound { .. })));
    }

    #[test]
    fn test_locate_program() {
        assert!(locate_program("sh").is_some());
        assert!(locate_program("/bin/sh").is_some());
        assert!(locate_program("definitely-not-a-real-tool-4029").is_none());
    }
}
