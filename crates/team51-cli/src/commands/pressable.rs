//! Pressable commands.

use anyhow::{Result, anyhow};
use team51_clients::pressable::{DEFAULT_COLLABORATOR_ROLES, PressableSite};
use team51_core::export::ExportFormat;
use team51_core::php_log::{self, LogSummary, Severity};
use team51_core::{CommandOutcome, OutputFormat, SiteRef, Table};
use tracing::info;

use super::rotate::ssh_for_site;
use super::{Context, report, yes_no};

/// Location of the PHP error log on Pressable containers.
const PHP_ERROR_LOG: &str = "/tmp/php-errors";

/// Lines read from the end of the error log.
const PHP_ERROR_TAIL: usize = 10_000;

fn site_row(site: &PressableSite) -> [String; 6] {
    [
        site.id.to_string(),
        site.name.clone(),
        site.domain(),
        site.state.clone().unwrap_or_default(),
        site.php_version.clone().unwrap_or_default(),
        site.datacenter_code.clone().unwrap_or_default(),
    ]
}

const SITE_HEADERS: [&str; 6] = ["ID", "Name", "Domain", "State", "PHP", "Datacenter"];

pub async fn list_sites(ctx: &Context, format: OutputFormat, export: Option<ExportFormat>) -> Result<CommandOutcome> {
    let sites = ctx.pressable()?.list_sites().await?;
    if sites.is_empty() {
        return Ok(CommandOutcome::empty("No Pressable sites"));
    }

    let mut table = Table::new(SITE_HEADERS);
    for site in &sites {
        table.push_row(site_row(site));
    }
    report(&table, format, export, "pressable-sites")
}

pub async fn site_info(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let site = ctx.pressable()?.find_site(site).await?;
    let mut table = Table::new(["Field", "Value"]);
    for (field, value) in SITE_HEADERS.iter().zip(site_row(&site)) {
        table.push_row([field.to_string(), value]);
    }
    table.push_row(["Staging".to_string(), yes_no(site.staging).to_string()]);
    table.push_row(["Created".to_string(), site.created.clone().unwrap_or_default()]);
    Ok(CommandOutcome::success(table.render(OutputFormat::Table)))
}

pub async fn list_collaborators(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let collaborators = pressable.list_collaborators(site.id).await?;
    if collaborators.is_empty() {
        return Ok(CommandOutcome::empty(format!("{} has no collaborators", site.domain())));
    }

    let mut table = Table::new(["ID", "Email", "Roles"]);
    for collaborator in collaborators {
        table.push_row([collaborator.id.to_string(), collaborator.email, collaborator.roles.join(", ")]);
    }
    Ok(CommandOutcome::success(table.render(OutputFormat::Table)))
}

pub async fn add_collaborator(ctx: &Context, site: &SiteRef, email: &str) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;

    let existing = pressable.list_collaborators(site.id).await?;
    if existing.iter().any(|c| c.email.eq_ignore_ascii_case(email)) {
        return Ok(CommandOutcome::empty(format!(
            "{} is already a collaborator on {}",
            email,
            site.domain()
        )));
    }

    pressable
        .add_collaborator(site.id, email, DEFAULT_COLLABORATOR_ROLES)
        .await?;
    Ok(CommandOutcome::success(format!("Added {} to {}", email, site.domain())))
}

pub async fn remove_collaborator(ctx: &Context, site: &SiteRef, email: &str) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;

    let collaborators = pressable.list_collaborators(site.id).await?;
    let Some(collaborator) = collaborators.iter().find(|c| c.email.eq_ignore_ascii_case(email)) else {
        return Ok(CommandOutcome::empty(format!(
            "{} is not a collaborator on {}",
            email,
            site.domain()
        )));
    };

    pressable.remove_collaborator(site.id, collaborator.id).await?;
    Ok(CommandOutcome::success(format!("Removed {} from {}", email, site.domain())))
}

pub async fn sftp_owner(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let users = pressable.list_sftp_users(site.id).await?;

    match team51_clients::pressable::sftp_owner(&users, ctx.settings.pressable.concierge_email.as_deref()) {
        Some(owner) => Ok(CommandOutcome::success(format!(
            "{} ({})",
            owner.username,
            owner.email.as_deref().unwrap_or("no email")
        ))),
        None => Ok(CommandOutcome::empty(format!("{} has no SFTP owner", site.domain()))),
    }
}

pub async fn php_errors(
    ctx: &Context,
    site: &SiteRef,
    limit: Option<usize>,
    severity: Option<&Severity>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let ssh = ssh_for_site(ctx, &pressable, &site).await?;

    info!(site = %site.domain(), "Reading PHP error log");
    let log = ssh.tail(PHP_ERROR_LOG, PHP_ERROR_TAIL).await?;
    let entries = php_log::parse(&log);
    let summaries = php_log::filter(php_log::summarize(&entries), severity, limit);

    if summaries.is_empty() {
        return Ok(CommandOutcome::empty(format!("No PHP errors logged on {}", site.domain())));
    }
    Ok(CommandOutcome::success(error_table(&summaries).render(format)))
}

fn error_table(summaries: &[LogSummary]) -> Table {
    let mut table = Table::new(["Severity", "Count", "Last seen", "Message"]);
    for summary in summaries {
        table.push_row([
            summary.severity.to_string(),
            summary.count.to_string(),
            summary.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            summary.message.clone(),
        ]);
    }
    table
}

pub async fn purge_cache(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    pressable.purge_cache(site.id).await?;
    Ok(CommandOutcome::success(format!("Purged cache for {}", site.domain())))
}

pub async fn wp(ctx: &Context, site: &SiteRef, args: &[String]) -> Result<CommandOutcome> {
    if args.is_empty() {
        return Err(anyhow!("no WP-CLI arguments given"));
    }
    let pressable = ctx.pressable()?;
    let site = pressable.find_site(site).await?;
    let ssh = ssh_for_site(ctx, &pressable, &site).await?;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = ssh.wp(&args).await?;
    if output.trim().is_empty() {
        return Ok(CommandOutcome::empty("WP-CLI produced no output"));
    }
    Ok(CommandOutcome::success(output.trim_end().to_string()))
}
