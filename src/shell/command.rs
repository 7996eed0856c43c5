//! Shell command execution with output capture and timeout.

use crate::error::{CairnError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the command succeeded (exit code 0).
    pub success: bool,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<std::path::PathBuf>,

    /// Environment variables (merged with the system environment).
    pub env: HashMap<String, String>,

    /// Kill the child and fail when it runs longer than this.
    pub timeout: Option<Duration>,
}

/// Execute a shell command, capturing stdout and stderr.
///
/// A non-zero exit is reported through `CommandResult::success`, not as an
/// error; only spawn failures and timeout expiry return `Err`. A timed-out
/// child is killed and reported as [`CairnError::Command`] carrying whatever
/// output was captured before the deadline.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();

    let shell = detect_shell();
    let mut cmd = Command::new(&shell);
    cmd.arg(shell_flag());
    cmd.arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| CairnError::Command {
        command: command.to_string(),
        code: None,
        output: format!("failed to spawn: {}", e),
    })?;

    // Drain the pipes on threads so a chatty child can't deadlock against
    // a full pipe buffer while we wait on it.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_handle = thread::spawn(move || read_to_string(&mut stdout_pipe));
    let stderr_handle = thread::spawn(move || read_to_string(&mut stderr_pipe));

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if let Some(timeout) = options.timeout {
                    if start.elapsed() >= timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        let stdout = stdout_handle.join().unwrap_or_default();
                        let stderr = stderr_handle.join().unwrap_or_default();
                        return Err(CairnError::Command {
                            command: command.to_string(),
                            code: None,
                            output: format!(
                                "timed out after {:.1}s\n{}{}",
                                timeout.as_secs_f64(),
                                stdout,
                                stderr
                            ),
                        });
                    }
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    let duration = start.elapsed();

    Ok(CommandResult {
        exit_code: status.code(),
        stdout,
        stderr,
        duration,
        success: status.success(),
    })
}

/// Execute a command with captured output and no extra options.
pub fn execute_quiet(command: &str, cwd: Option<&Path>) -> Result<CommandResult> {
    let options = CommandOptions {
        cwd: cwd.map(|p| p.to_path_buf()),
        ..Default::default()
    };
    execute(command, &options)
}

fn read_to_string(pipe: &mut Option<impl Read>) -> String {
    let mut buffer = String::new();
    if let Some(pipe) = pipe {
        let _ = pipe.read_to_string(&mut buffer);
    }
    buffer
}

/// The shell used to run commands.
fn detect_shell() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        "/bin/sh".to_string()
    }
}

fn shell_flag() -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else {
        "-c"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_successful_command() {
        let result = execute("echo hello", &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn execute_failing_command_is_not_an_error() {
        let result = execute("exit 3", &CommandOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn execute_captures_stderr() {
        let cmd = if cfg!(target_os = "windows") {
            "echo oops 1>&2"
        } else {
            "echo oops >&2"
        };
        let result = execute(cmd, &CommandOptions::default()).unwrap();
        assert!(result.stderr.contains("oops"));
    }

    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("MY_VAR".to_string(), "my_value".to_string());

        let cmd = if cfg!(target_os = "windows") {
            "echo %MY_VAR%"
        } else {
            "echo $MY_VAR"
        };
        let result = execute(cmd, &options).unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let cmd = if cfg!(target_os = "windows") { "cd" } else { "pwd" };
        let result = execute(cmd, &options).unwrap();

        assert!(result.success);
    }

    #[test]
    fn timeout_kills_and_reports_failure() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let err = execute("sleep 5", &options).unwrap_err();

        match err {
            CairnError::Command { output, .. } => assert!(output.contains("timed out")),
            other => panic!("expected command error, got {:?}", other),
        }
    }

    #[test]
    fn fast_command_beats_timeout() {
        let options = CommandOptions {
            timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let result = execute("echo quick", &options).unwrap();
        assert!(result.success);
    }

    #[test]
    fn execute_quiet_captures_silently() {
        let result = execute_quiet("echo hello", None).unwrap();
        assert!(result.success);
        assert!(result.stdout.contains("hello"));
    }
}
