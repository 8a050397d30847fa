//! Updating the CLI from its Git checkout.

use anyhow::{Context as _, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use team51_config::is_dev_install;
use team51_core::CommandOutcome;
use tokio::process::Command;
use tracing::{error, info};

use super::Context;

/// Nearest ancestor of `start` (inclusive) that is a Git checkout.
fn find_checkout(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn install_dir(ctx: &Context) -> Result<PathBuf> {
    if let Some(dir) = ctx.settings.install_dir().filter(|d| d.join(".git").exists()) {
        return Ok(dir);
    }
    let exe = std::env::current_exe().context("failed to locate the running binary")?;
    find_checkout(&exe).ok_or_else(|| anyhow!("could not find the Git checkout this binary was built from; set install_dir in the config"))
}

async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to run git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(dir = %dir.display(), stderr = %stderr, "git failed");
        bail!("git {} failed: {}", args.join(" "), stderr);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Fast-forward the checkout. Development checkouts (with a `.dev` marker)
/// are left alone unless `force` is set.
pub async fn self_update(ctx: &Context, force: bool) -> Result<CommandOutcome> {
    let dir = install_dir(ctx)?;

    if is_dev_install(&dir) && !force {
        return Ok(CommandOutcome::empty(format!(
            "{} is a development checkout; not updating (use --force to override)",
            dir.display()
        )));
    }

    let before = git(&dir, &["rev-parse", "--short", "HEAD"]).await?;
    info!(dir = %dir.display(), revision = %before, "Pulling updates");
    git(&dir, &["pull", "--ff-only"]).await?;
    let after = git(&dir, &["rev-parse", "--short", "HEAD"]).await?;

    if before == after {
        Ok(CommandOutcome::empty(format!("Already up to date at {}", after)))
    } else {
        Ok(CommandOutcome::success(format!(
            "Updated {} from {} to {}; rebuild with `cargo install --path crates/team51-cli`",
            dir.display(),
            before,
            after
        )))
    }
}
