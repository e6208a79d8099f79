use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command with extra environment and capture its output. A non-zero
/// exit is not an error here; callers decide what it means.
pub fn run_capture(cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Captured> {
    let output = Command::new(cmd)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    Ok(Captured {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Whether `cmd` resolves to an executable on `PATH`.
pub fn on_path(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}
