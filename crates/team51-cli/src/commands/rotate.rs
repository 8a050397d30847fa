//! Credential rotation for Pressable sites.
//!
//! Rotation always runs SFTP first: the fresh SFTP password is stored in
//! 1Password, pushed to every DeployHQ server that logs in as that user, and
//! then used to open the SSH session that resets the WordPress password.

use anyhow::{Context as _, Result, anyhow, bail};
use team51_clients::PressableClient;
use team51_clients::SshSession;
use team51_clients::deployhq::Server;
use team51_clients::pressable::{PressableSite, sftp_owner};
use team51_core::password::{DEFAULT_LENGTH, generate_password};
use team51_core::vault::{CredentialVault, LoginItem};
use team51_core::{CommandOutcome, SiteRef};
use tracing::{error, info, warn};

use super::Context;

/// 1Password title of a site's SFTP login.
pub fn sftp_login_title(domain: &str) -> String {
    format!("{} SFTP", domain)
}

/// 1Password title of a site's WordPress admin login.
pub fn wp_login_title(domain: &str) -> String {
    format!("{} WP Admin", domain)
}

/// Credentials produced by an SFTP rotation.
#[derive(Debug)]
pub struct SftpRotation {
    pub username: String,
    pub password: String,
    pub deployhq_servers: usize,
}

/// Reset the SFTP password of `user` (default: the site owner), store it
/// and propagate it to DeployHQ.
pub async fn rotate_sftp(
    ctx: &Context,
    pressable: &PressableClient,
    site: &PressableSite,
    user: Option<&str>,
) -> Result<SftpRotation> {
    let domain = site.domain();
    let users = pressable.list_sftp_users(site.id).await?;

    let username = match user {
        Some(user) => users
            .iter()
            .find(|u| u.username == user)
            .map(|u| u.username.clone())
            .ok_or_else(|| anyhow!("{} has no SFTP user named {}", domain, user))?,
        None => sftp_owner(&users, ctx.settings.pressable.concierge_email.as_deref())
            .map(|u| u.username.clone())
            .ok_or_else(|| anyhow!("could not determine the SFTP owner of {}", domain))?,
    };

    info!(site = %domain, user = %username, "Rotating SFTP password");
    let password = pressable
        .reset_sftp_password(site.id, &username)
        .await
        .with_context(|| format!("failed to reset SFTP password for {} on {}", username, domain))?;

    let item = LoginItem::new(sftp_login_title(&domain), &username, &password)
        .with_url(format!("sftp://{}", ctx.settings.pressable.sftp_host));
    ctx.vault()
        .upsert_login(item)
        .await
        .with_context(|| format!("SFTP password for {} was reset but could not be stored", domain))?;

    let deployhq_servers = propagate_to_deployhq(ctx, &username, &password).await?;

    Ok(SftpRotation {
        username,
        password,
        deployhq_servers,
    })
}

/// Update every DeployHQ server that connects as `username`. Returns the
/// number of servers updated. Missing DeployHQ credentials skip the step.
async fn propagate_to_deployhq(ctx: &Context, username: &str, password: &str) -> Result<usize> {
    let deployhq = match ctx.deployhq() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Skipping DeployHQ password update");
            return Ok(0);
        }
    };

    let host = &ctx.settings.pressable.sftp_host;
    let mut updated = 0;
    for project in deployhq.list_projects().await? {
        for server in deployhq.list_servers(&project.permalink).await? {
            if server_uses_login(&server, host, username) {
                deployhq
                    .update_server_password(&project.permalink, &server.identifier, password)
                    .await?;
                updated += 1;
            }
        }
    }

    info!(user = username, servers = updated, "Updated DeployHQ servers");
    Ok(updated)
}

/// Whether a DeployHQ server logs in to `host` as `username`.
pub fn server_uses_login(server: &Server, host: &str, username: &str) -> bool {
    server.username.as_deref() == Some(username)
        && server
            .hostname
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case(host))
}

/// First login printed by `wp user list --field=user_login`.
pub fn first_login(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Reset a WordPress user's password over WP-CLI and store it.
///
/// The user defaults to the configured admin login, then to the first
/// administrator WP-CLI reports.
pub async fn rotate_wp(ctx: &Context, site: &PressableSite, ssh: &SshSession, user: Option<&str>) -> Result<String> {
    let domain = site.domain();
    let login = match user.or(ctx.settings.pressable.wp_admin_username.as_deref()) {
        Some(login) => login.to_string(),
        None => {
            let admins = ssh
                .wp(&["user", "list", "--role=administrator", "--field=user_login"])
                .await?;
            first_login(&admins).ok_or_else(|| anyhow!("{} has no administrator accounts", domain))?
        }
    };

    info!(site = %domain, user = %login, "Rotating WordPress password");
    let password = generate_password(DEFAULT_LENGTH);
    let user_pass = format!("--user_pass={}", password);
    ssh.wp(&["user", "update", login.as_str(), user_pass.as_str(), "--skip-email"])
        .await
        .with_context(|| format!("failed to update WordPress user {} on {}", login, domain))?;

    let item = LoginItem::new(wp_login_title(&domain), &login, &password)
        .with_url(format!("https://{}/wp-admin", domain));
    ctx.vault()
        .upsert_login(item)
        .await
        .with_context(|| format!("WordPress password for {} was reset but could not be stored", domain))?;

    Ok(login)
}

/// SSH session as the site owner using the SFTP password stored in 1Password.
pub async fn ssh_for_site(ctx: &Context, pressable: &PressableClient, site: &PressableSite) -> Result<SshSession> {
    let domain = site.domain();
    let users = pressable.list_sftp_users(site.id).await?;
    let owner = sftp_owner(&users, ctx.settings.pressable.concierge_email.as_deref())
        .ok_or_else(|| anyhow!("could not determine the SFTP owner of {}", domain))?;

    if !ctx.settings.ssh.use_sshpass {
        return Ok(ctx.ssh(&owner.username, None));
    }

    match ctx.vault().find_login(&sftp_login_title(&domain)).await? {
        Some(item) => Ok(ctx.ssh(&owner.username, Some(item.password.as_str()))),
        None => bail!(
            "no stored SFTP password for {}; run `team51 pressable rotate-sftp-password {}` first",
            domain,
            site.id
        ),
    }
}

/// Rotate SFTP then WordPress credentials of one site.
pub async fn rotate_site(ctx: &Context, pressable: &PressableClient, site: &PressableSite) -> Result<String> {
    let sftp = rotate_sftp(ctx, pressable, site, None).await?;
    let ssh = ctx.ssh(&sftp.username, Some(sftp.password.as_str()));
    let wp_user = rotate_wp(ctx, site, &ssh, None).await?;

    Ok(format!(
        "Rotated passwords for {}: SFTP user {} ({} DeployHQ servers updated), WordPress user {}",
        site.domain(),
        sftp.username,
        sftp.deployhq_servers,
        wp_user
    ))
}

pub async fn rotate_sftp_command(ctx: &Context, site: &SiteRef, user: Option<&str>) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let rotation = rotate_sftp(ctx, &pressable, &site, user).await?;
    Ok(CommandOutcome::success(format!(
        "Rotated SFTP password for {} on {} and stored it in 1Password ({} DeployHQ servers updated)",
        rotation.username,
        site.domain(),
        rotation.deployhq_servers
    )))
}

pub async fn rotate_wp_command(ctx: &Context, site: &SiteRef, user: Option<&str>) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let ssh = ssh_for_site(ctx, &pressable, &site).await?;
    let login = rotate_wp(ctx, &site, &ssh, user).await?;
    Ok(CommandOutcome::success(format!(
        "Rotated WordPress password for {} on {} and stored it in 1Password",
        login,
        site.domain()
    )))
}

pub async fn rotate_passwords_command(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    Ok(CommandOutcome::success(rotate_site(ctx, &pressable, &site).await?))
}

/// Rotate every live site. A failing site is logged and skipped; any
/// failure makes the command fail after all sites were attempted.
pub async fn rotate_all_sites(ctx: &Context) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let sites: Vec<PressableSite> = pressable
        .list_sites()
        .await?
        .into_iter()
        .filter(PressableSite::is_live)
        .collect();

    if sites.is_empty() {
        return Ok(CommandOutcome::empty("No live Pressable sites"));
    }

    let mut failures = Vec::new();
    for site in &sites {
        match rotate_site(ctx, &pressable, site).await {
            Ok(message) => println!("{}", message),
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(site = %site.domain(), error = %reason, "Rotation failed");
                failures.push((site.domain(), reason));
            }
        }
    }

    if failures.is_empty() {
        Ok(CommandOutcome::success(format!("Rotated passwords for {} sites", sites.len())))
    } else {
        Err(anyhow!(failure_summary(sites.len(), &failures)))
    }
}

/// Summary of failed sites printed after an all-sites run.
pub fn failure_summary(total: usize, failures: &[(String, String)]) -> String {
    let mut summary = format!("{} of {} sites failed:", failures.len(), total);
    for (site, reason) in failures {
        summary.push_str(&format!("\n  {}: {}", site, reason));
    }
    summary
}
