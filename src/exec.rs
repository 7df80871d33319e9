//! External process execution, including the elevated-privilege collaborator
//! used for `sudo` entries.
use anyhow::{Context, Result, bail};
use std::process::{Command, Output, Stdio};

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output (empty for interactive runs).
    pub stdout: String,
    /// Captured standard error (empty for interactive runs).
    pub stderr: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Execute a command and return the result, bailing on non-zero exit.
fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    if !result.success {
        bail!(
            "{label} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr.trim()
        );
    }
    Ok(result)
}

/// Run a command and return its output. Fails if the command exits non-zero.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or exits non-zero.
pub fn run(program: &str, args: &[&str]) -> Result<ExecResult> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    execute_checked(cmd, program)
}

/// Run a command with stdio inherited from this process and block until it
/// exits, so that an operator can answer prompts (e.g. a `sudo` password).
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or exits non-zero.
pub fn run_interactive(program: &str, args: &[&str]) -> Result<ExecResult> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to execute: {program}"))?;
    if !status.success() {
        bail!(
            "{program} {} failed (exit {})",
            args.join(" "),
            status.code().unwrap_or(-1)
        );
    }
    Ok(ExecResult {
        stdout: String::new(),
        stderr: String::new(),
        success: true,
        code: status.code(),
    })
}

/// Check if a program is available on PATH.
#[must_use]
pub fn which(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Abstraction over process execution so that elevated operations can be
/// exercised in tests without a real `sudo`.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command interactively (inherited stdio) and wait for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started or exits non-zero.
    fn run_interactive(&self, program: &str, args: &[String]) -> Result<ExecResult>;

    /// Check whether `program` is on PATH.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] that spawns real processes.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_interactive(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_interactive(program, &args)
    }

    fn which(&self, program: &str) -> bool {
        which(program)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn run_echo() {
        let result = run("echo", &["hello"]).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn run_failure() {
        let result = run("false", &[]);
        assert!(result.is_err(), "non-zero exit should produce an error");
    }

    #[cfg(unix)]
    #[test]
    fn run_interactive_reports_exit_code() {
        let err = run_interactive("false", &[]).unwrap_err();
        assert!(err.to_string().contains("exit 1"), "{err}");
        assert!(run_interactive("true", &[]).unwrap().success);
    }

    #[test]
    fn which_missing_program() {
        assert!(
            !which("this-program-does-not-exist-12345"),
            "non-existent program should not be found"
        );
    }

    #[test]
    fn system_executor_which_matches_free_fn() {
        let exec = SystemExecutor;
        assert_eq!(
            exec.which("this-program-does-not-exist-12345"),
            which("this-program-does-not-exist-12345")
        );
    }
}
