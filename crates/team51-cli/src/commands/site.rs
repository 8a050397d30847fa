//! End-to-end site workflows spanning GitHub, Pressable, DeployHQ and 1Password.

use anyhow::{Context as _, Result};
use team51_clients::dns;
use team51_clients::github::{BranchStatus, NewRepo};
use team51_clients::pressable::NewSite;
use team51_core::mail::{self, NameserverProvider};
use team51_core::password::{DEFAULT_LENGTH, generate_password};
use team51_core::{CommandOutcome, OutputFormat, SiteRef, Table};
use tracing::{info, warn};

use super::deployhq::{add_site_server, ensure_project};
use super::rotate::rotate_site;
use super::{Context, git_url};

/// Options of `site create-production`.
pub struct ProductionOptions {
    pub name: String,
    pub template: Option<String>,
    pub php_version: Option<String>,
    pub datacenter: Option<String>,
    pub repo: Option<String>,
}

/// Name of the development clone of a production site.
pub fn development_name(production: &str) -> String {
    format!("{}-development", production)
}

fn branch_line(repo: &str, branch: &str, status: &BranchStatus) -> String {
    match status {
        BranchStatus::Existing => format!("Branch {} already exists in {}", branch, repo),
        BranchStatus::Created { from } => format!("Created branch {} from {} in {}", branch, from, repo),
    }
}

/// Create the repository (if needed), the Pressable site and the DeployHQ
/// project, then rotate the new site's credentials.
pub async fn create_production(ctx: &Context, options: ProductionOptions) -> Result<CommandOutcome> {
    let github = ctx.github()?;
    let pressable = ctx.pressable()?;
    let deployhq = ctx.deployhq()?;
    let settings = &ctx.settings;
    let org = ctx.org();
    let repo = options.repo.as_deref().unwrap_or(&options.name);
    let mut lines = Vec::new();

    if github.get_repo(org, repo).await?.is_none() {
        let template = options.template.as_deref().unwrap_or(&settings.github.default_template);
        let created = github
            .create_repo_from_template(
                settings.github.template_owner(),
                template,
                org,
                &NewRepo {
                    name: repo.to_string(),
                    description: Some(format!("Site repository for {}", options.name)),
                    private: true,
                },
            )
            .await
            .context("failed to create repository")?;
        lines.push(format!("Created repository {}", created.html_url));
    } else {
        lines.push(format!("Using existing repository {}/{}", org, repo));
    }

    let production_branch = &settings.github.production_branch;
    let status = github.ensure_branch(org, repo, production_branch, None).await?;
    lines.push(branch_line(repo, production_branch, &status));

    let new_site = NewSite {
        name: options.name.clone(),
        php_version: options
            .php_version
            .unwrap_or_else(|| settings.pressable.default_php_version.clone()),
        datacenter_code: options
            .datacenter
            .unwrap_or_else(|| settings.pressable.default_datacenter.clone()),
    };
    let site = pressable.create_site(&new_site).await.context("failed to create Pressable site")?;
    info!(site = site.id, "Waiting for site to go live");
    let site = pressable
        .wait_until_live(site.id, settings.polling.interval(), settings.polling.ceiling())
        .await?;
    lines.push(format!("Created Pressable site {} ({})", site.domain(), site.id));

    let project = ensure_project(ctx, &deployhq, &options.name, repo, production_branch).await?;
    // Placeholder credential; the rotation below propagates the real SFTP password.
    let placeholder = generate_password(DEFAULT_LENGTH);
    add_site_server(
        ctx,
        &deployhq,
        &project.permalink,
        &site,
        production_branch,
        "Production",
        Some(placeholder.as_str()),
    )
    .await?;
    lines.push(format!(
        "DeployHQ project {} deploys {} from {}",
        project.permalink,
        production_branch,
        git_url(org, repo)
    ));

    lines.push(rotate_site(ctx, &pressable, &site).await?);
    Ok(CommandOutcome::success(lines.join("\n")))
}

/// Clone a production site into a staging development site wired to the
/// development branch.
pub async fn create_development(
    ctx: &Context,
    site: &SiteRef,
    branch: Option<&str>,
    repo: Option<&str>,
) -> Result<CommandOutcome> {
    let github = ctx.github()?;
    let pressable = ctx.pressable()?;
    let settings = &ctx.settings;
    let org = ctx.org();
    let mut lines = Vec::new();

    let production = pressable.find_site(site).await?;
    let repo = repo.unwrap_or(&production.name);
    let branch = branch.unwrap_or(&settings.github.development_branch);

    let clone = pressable
        .clone_site(production.id, &development_name(&production.name), true)
        .await
        .context("failed to clone production site")?;
    info!(site = clone.id, "Waiting for clone to go live");
    let development = pressable
        .wait_until_live(clone.id, settings.polling.interval(), settings.polling.ceiling())
        .await?;
    lines.push(format!(
        "Cloned {} into {} ({})",
        production.domain(),
        development.domain(),
        development.id
    ));

    let status = github
        .ensure_branch(org, repo, branch, Some(settings.github.production_branch.as_str()))
        .await?;
    lines.push(branch_line(repo, branch, &status));

    match ctx.deployhq() {
        Ok(deployhq) => match deployhq.find_project(repo).await? {
            Some(project) => {
                // Placeholder credential; the rotation below propagates the real SFTP password.
                let placeholder = generate_password(DEFAULT_LENGTH);
                add_site_server(
                    ctx,
                    &deployhq,
                    &project.permalink,
                    &development,
                    branch,
                    "Development",
                    Some(placeholder.as_str()),
                )
                .await?;
                lines.push(format!("DeployHQ project {} deploys {} to the development site", project.permalink, branch));
            }
            None => warn!(repo, "No DeployHQ project for repository, skipping server"),
        },
        Err(e) => warn!(error = %e, "Skipping DeployHQ server"),
    }

    lines.push(rotate_site(ctx, &pressable, &development).await?);
    Ok(CommandOutcome::success(lines.join("\n")))
}

/// Domain to check DNS for: `www.` is dropped so the apex nameservers are used.
pub fn mail_domain(domain: &str) -> &str {
    domain.strip_prefix("www.").unwrap_or(domain)
}

/// Report whether a site can deliver email, from its nameservers and
/// active plugins.
pub async fn check_email(ctx: &Context, site: &SiteRef) -> Result<CommandOutcome> {
    let wpcom = ctx.wpcom().ok();

    let domain = match site {
        SiteRef::Domain(domain) => domain.clone(),
        SiteRef::Id(_) => match &wpcom {
            Some(wpcom) => wpcom.get_site(site).await?.domain(),
            None => anyhow::bail!("a WordPress.com token is needed to resolve site IDs; pass a domain instead"),
        },
    };
    let domain = mail_domain(&domain).to_string();

    let nameservers = match dns::lookup_nameservers(&domain).await {
        Ok(nameservers) => nameservers,
        Err(e) => {
            warn!(domain = %domain, error = %e, "Nameserver lookup failed");
            Vec::new()
        }
    };

    let plugins = match &wpcom {
        Some(wpcom) => match wpcom.list_plugins(site).await {
            Ok(plugins) => Some(
                plugins
                    .into_iter()
                    .filter(|p| p.active)
                    .map(|p| p.slug)
                    .collect::<Vec<String>>(),
            ),
            Err(e) => {
                warn!(site = %site, error = %e, "Could not list plugins");
                None
            }
        },
        None => None,
    };

    let verdict = mail::evaluate(&nameservers, plugins.as_deref());

    let mut table = Table::new(["Check", "Result"]);
    table.push_row(["Domain".to_string(), domain.clone()]);
    table.push_row(["Nameservers".to_string(), nameservers.join(", ")]);
    table.push_row(["DNS provider".to_string(), NameserverProvider::classify(&nameservers).to_string()]);
    table.push_row([
        "SMTP plugin".to_string(),
        plugins
            .as_deref()
            .and_then(|active| mail::find_smtp_plugin(active))
            .unwrap_or_else(|| "none".to_string()),
    ]);
    table.push_row(["Verdict".to_string(), verdict.to_string()]);

    Ok(CommandOutcome::success(table.render(OutputFormat::Table)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_name() {
        assert_eq!(development_name("alpha"), "alpha-development");
    }

    #[test]
    fn test_mail_domain() {
        assert_eq!(mail_domain("www.example.com"), "example.com");
        assert_eq!(mail_domain("shop.example.com"), "shop.example.com");
    }

    #[test]
    fn test_branch_line() {
        assert_eq!(
            branch_line("alpha", "trunk", &BranchStatus::Existing),
            "Branch trunk already exists in alpha"
        );
        assert_eq!(
            branch_line("alpha", "develop", &BranchStatus::Created { from: "trunk".to_string() }),
            "Created branch develop from trunk in alpha"
        );
    }
}
