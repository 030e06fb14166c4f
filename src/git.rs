//! Git plumbing for repository ingestion.
//!
//! Shells out to the `git` binary via `tokio::process`, each invocation
//! bounded by a timeout. [`sync_repository`] is best-effort: failures are
//! logged and ingestion proceeds against whatever is on disk.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

async fn run_git(args: &[&str], cwd: Option<&Path>, timeout: Duration) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .with_context(|| format!("'git {}' timed out after {:?}", args[0], timeout))?
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", args[0]))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args[0], stderr.trim());
    }
    Ok(())
}

pub async fn clone(repo_url: &str, dest: &Path, timeout: Duration) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    let dest_str = dest.to_string_lossy();
    run_git(&["clone", repo_url, &dest_str], None, timeout).await
}

pub async fn checkout(repo_dir: &Path, branch: &str, timeout: Duration) -> Result<()> {
    run_git(&["checkout", branch], Some(repo_dir), timeout).await
}

pub async fn pull(repo_dir: &Path, timeout: Duration) -> Result<()> {
    run_git(&["pull"], Some(repo_dir), timeout).await
}

/// Clone `repo_url` into `dest` if absent, then check out `branch` (if
/// given) and pull. Never fails.
pub async fn sync_repository(repo_url: &str, dest: &Path, branch: Option<&str>, timeout: Duration) {
    if !dest.exists() {
        info!(repo_url, dest = %dest.display(), "cloning repository");
        if let Err(e) = clone(repo_url, dest, timeout).await {
            warn!(repo_url, error = %format!("{:#}", e), "clone failed");
            return;
        }
    }

    if let Some(branch) = branch.filter(|b| !b.is_empty()) {
        if let Err(e) = checkout(dest, branch, timeout).await {
            warn!(branch, error = %format!("{:#}", e), "checkout failed, continuing");
        }
    }

    if let Err(e) = pull(dest, timeout).await {
        warn!(dest = %dest.display(), error = %format!("{:#}", e), "pull failed, continuing");
    }
}
