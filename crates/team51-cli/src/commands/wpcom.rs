//! WordPress.com commands.

use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use team51_clients::wpcom::{WpcomPlugin, WpcomSite};
use team51_core::export::ExportFormat;
use team51_core::fanout::{DEFAULT_CONCURRENCY, parallel_map};
use team51_core::site::eval_is_coming_soon;
use team51_core::{CommandOutcome, OutputFormat, SiteRef, Table};
use tracing::{info, warn};

use super::rotate::failure_summary;
use super::{Context, report, yes_no};

fn site_table<'a>(sites: impl IntoIterator<Item = &'a WpcomSite>) -> Table {
    let mut table = Table::new(["ID", "Name", "URL", "Jetpack", "Atomic", "Private", "Coming soon"]);
    for site in sites {
        let coming_soon = eval_is_coming_soon(&site.as_value());
        table.push_row([
            site.id.to_string(),
            site.name.clone(),
            site.url.clone(),
            yes_no(site.jetpack).to_string(),
            yes_no(site.is_wpcom_atomic).to_string(),
            yes_no(site.is_private).to_string(),
            yes_no(!coming_soon.is_empty()).to_string(),
        ]);
    }
    table
}

pub async fn list_sites(ctx: &Context, format: OutputFormat, export: Option<ExportFormat>) -> Result<CommandOutcome> {
    let sites = ctx.wpcom()?.list_sites().await?;
    if sites.is_empty() {
        return Ok(CommandOutcome::empty("No WordPress.com sites"));
    }
    report(&site_table(&sites), format, export, "wpcom-sites")
}

pub async fn site_info(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let site = ctx.wpcom()?.get_site(site).await?;
    Ok(CommandOutcome::success(serde_json::to_string_pretty(&site.as_value())?))
}

pub async fn list_stickers(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let stickers = ctx.wpcom()?.list_stickers(site).await?;
    if stickers.is_empty() {
        return Ok(CommandOutcome::empty(format!("{} has no stickers", site)));
    }
    Ok(CommandOutcome::success(stickers.join("\n")))
}

pub async fn add_sticker(ctx: &Context, site: &SiteRef, sticker: &str) -> Result<CommandOutcome> {
    if ctx.wpcom()?.add_sticker(site, sticker).await? {
        Ok(CommandOutcome::success(format!("Added sticker {} to {}", sticker, site)))
    } else {
        Ok(CommandOutcome::empty(format!("{} already has sticker {}", site, sticker)))
    }
}

pub async fn remove_sticker(ctx: &Context, site: &SiteRef, sticker: &str) -> Result<CommandOutcome> {
    if ctx.wpcom()?.remove_sticker(site, sticker).await? {
        Ok(CommandOutcome::success(format!("Removed sticker {} from {}", sticker, site)))
    } else {
        Ok(CommandOutcome::empty(format!("{} does not have sticker {}", site, sticker)))
    }
}

/// Plugins of one site, or plugin usage across every Jetpack-connected site.
pub async fn plugin_summary(
    ctx: &Context,
    site: Option<&SiteRef>,
    format: OutputFormat,
    export: Option<ExportFormat>,
) -> Result<CommandOutcome> {
    let wpcom = ctx.wpcom()?;

    if let Some(site) = site {
        let plugins = wpcom.list_plugins(site).await?;
        if plugins.is_empty() {
            return Ok(CommandOutcome::empty(format!("{} has no plugins", site)));
        }
        let mut table = Table::new(["Slug", "Name", "Version", "Active", "Autoupdate"]);
        for plugin in plugins {
            table.push_row([
                plugin.slug,
                plugin.name,
                plugin.version.unwrap_or_default(),
                yes_no(plugin.active).to_string(),
                yes_no(plugin.autoupdate).to_string(),
            ]);
        }
        return report(&table, format, export, "plugin-summary");
    }

    let sites: Vec<WpcomSite> = wpcom
        .list_sites()
        .await?
        .into_iter()
        .filter(|s| s.jetpack || s.is_wpcom_atomic)
        .collect();
    info!(sites = sites.len(), "Collecting plugin lists");

    let wpcom = &wpcom;
    let results = parallel_map(sites, DEFAULT_CONCURRENCY, |site| async move {
        let plugins = wpcom.list_plugins(&site.site_ref()).await;
        (site.domain(), plugins)
    })
    .await;

    let total = results.len();
    let mut lists = Vec::new();
    let mut failures = Vec::new();
    for (domain, plugins) in results {
        match plugins {
            Ok(plugins) => lists.push(plugins),
            Err(e) => {
                warn!(site = %domain, error = %e, "Could not list plugins");
                failures.push((domain, e.to_string()));
            }
        }
    }

    let table = aggregate_plugins(&lists);
    if failures.is_empty() {
        if table.is_empty() {
            return Ok(CommandOutcome::empty("No plugins found"));
        }
        return report(&table, format, export, "plugin-summary");
    }

    // Partial results are still printed; the missing sites fail the command.
    if !table.is_empty() {
        println!("{}", report(&table, format, export, "plugin-summary")?);
    }
    Err(anyhow!(failure_summary(total, &failures)))
}

#[derive(Default)]
struct PluginUsage {
    name: String,
    installed: usize,
    active: usize,
    versions: BTreeSet<String>,
}

/// Per-plugin counts across sites, most installed first.
fn aggregate_plugins(lists: &[Vec<WpcomPlugin>]) -> Table {
    let mut usage: BTreeMap<&str, PluginUsage> = BTreeMap::new();
    for plugin in lists.iter().flatten() {
        let entry = usage.entry(plugin.slug.as_str()).or_default();
        entry.name.clone_from(&plugin.name);
        entry.installed += 1;
        if plugin.active {
            entry.active += 1;
        }
        if let Some(version) = &plugin.version {
            entry.versions.insert(version.clone());
        }
    }

    let mut rows: Vec<(&str, PluginUsage)> = usage.into_iter().collect();
    rows.sort_by(|a, b| b.1.installed.cmp(&a.1.installed).then_with(|| a.0.cmp(b.0)));

    let mut table = Table::new(["Slug", "Name", "Sites", "Active", "Versions"]);
    for (slug, usage) in rows {
        table.push_row([
            slug.to_string(),
            usage.name,
            usage.installed.to_string(),
            usage.active.to_string(),
            usage.versions.into_iter().collect::<Vec<_>>().join(", "),
        ]);
    }
    table
}

pub async fn transfer_status(ctx: &Context, site: &SiteRef, wait: bool) -> Result<CommandOutcome> {
    let wpcom = ctx.wpcom()?;
    let status = if wait {
        let polling = &ctx.settings.polling;
        wpcom
            .wait_for_transfer(site, polling.interval(), polling.ceiling())
            .await?
    } else {
        wpcom.transfer_status(site).await?
    };

    Ok(CommandOutcome::success(format!(
        "Transfer of {}: {}",
        site, status.status
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryVault, context, serve};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn test_plugin_summary_fails_when_a_site_is_unreachable() {
        let router = Router::new()
            .route(
                "/me/sites",
                get(|| async {
                    Json(json!({ "sites": [
                        { "ID": 1, "URL": "https://alpha.example.com", "jetpack": true },
                        { "ID": 2, "URL": "https://beta.example.com", "jetpack": true },
                        { "ID": 3, "URL": "https://simple.example.com" }
                    ] }))
                }),
            )
            .route(
                "/sites/{site}/plugins",
                get(|Path(site): Path<u64>| async move {
                    if site == 1 {
                        Json(json!({ "plugins": [{ "slug": "akismet", "name": "Akismet", "active": true }] }))
                            .into_response()
                    } else {
                        (StatusCode::FORBIDDEN, "not connected").into_response()
                    }
                }),
            );
        let base = serve(router).await;
        let mut ctx = context(&MemoryVault::default());
        ctx.endpoints.wpcom = Some(base);

        let err = plugin_summary(&ctx, None, OutputFormat::Table, None)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("1 of 2 sites failed:"));
        assert!(err.contains("beta.example.com"));
    }

    fn plugin(slug: &str, version: &str, active: bool) -> WpcomPlugin {
        WpcomPlugin {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            version: Some(version.to_string()),
            active,
            autoupdate: false,
        }
    }

    #[test]
    fn test_aggregate_plugins() {
        let lists = vec![
            vec![plugin("akismet", "5.0", true), plugin("jetpack", "13.1", true)],
            vec![plugin("jetpack", "13.2", false)],
        ];
        let table = aggregate_plugins(&lists);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec!["jetpack", "JETPACK", "2", "1", "13.1, 13.2"]);
        assert_eq!(table.rows()[1], vec!["akismet", "AKISMET", "1", "1", "5.0"]);
    }

    #[test]
    fn test_site_table_marks_coming_soon() {
        let site: WpcomSite = serde_json::from_value(json!({
            "ID": 9, "name": "Alpha", "URL": "https://alpha.example.com",
            "jetpack": true, "is_coming_soon": true
        }))
        .unwrap();
        let table = site_table([&site]);
        assert_eq!(table.rows()[0][3], "yes");
        assert_eq!(table.rows()[0][6], "yes");
    }
}
