//! Thin wrapper around shelling out to `git`.
//!
//! Grounded on `utils/git/src/branch.rs` and `ghost_commits.rs`: every
//! operation is a `git` subprocess invocation whose stdout is parsed; errors
//! surface the subprocess's stderr rather than leaking a raw exit code.

use std::path::Path;
use std::process::Stdio;

use forge_error::Error;
use tokio::process::Command;

/// Run `git <args>` in `dir`, returning trimmed stdout on success.
pub async fn run_git(dir: &Path, args: &[&str]) -> Result<String, Error> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| forge_error::normalize(&format!("spawning git {args:?}"), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::invalid_operation(format!(
            "git {args:?} failed: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run `git <args>`, returning its stdout lines (skipping blanks).
pub async fn run_git_lines(dir: &Path, args: &[&str]) -> Result<Vec<String>, Error> {
    let stdout = run_git(dir, args).await?;
    Ok(stdout
        .lines()
        .map(str::to_string)
        .filter(|l| !l.is_empty())
        .collect())
}

/// Committer identity used for snapshot commits, so the repository does not
/// depend on the user's global `git config` being present.
pub const GIT_ENV: &[(&str, &str)] = &[
    ("GIT_AUTHOR_NAME", "forge-engine"),
    ("GIT_AUTHOR_EMAIL", "forge-engine@localhost"),
    ("GIT_COMMITTER_NAME", "forge-engine"),
    ("GIT_COMMITTER_EMAIL", "forge-engine@localhost"),
];

pub async fn run_git_with_identity(dir: &Path, args: &[&str]) -> Result<String, Error> {
    let mut command = Command::new("git");
    command
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in GIT_ENV {
        command.env(k, v);
    }
    let output = command
        .output()
        .await
        .map_err(|e| forge_error::normalize(&format!("spawning git {args:?}"), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::invalid_operation(format!(
            "git {args:?} failed: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
