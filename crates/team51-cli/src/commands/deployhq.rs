//! DeployHQ commands.

use anyhow::{Result, anyhow};
use team51_clients::DeployHqClient;
use team51_clients::deployhq::{NewServer, Project};
use team51_clients::pressable::{PressableSite, sftp_owner};
use team51_core::vault::CredentialVault;
use team51_core::{CommandOutcome, OutputFormat, SiteRef, Table};
use tracing::info;

use super::rotate::sftp_login_title;
use super::{Context, git_url};

pub async fn list_projects(ctx: &Context, format: OutputFormat) -> Result<CommandOutcome> {
    let projects = ctx.deployhq()?.list_projects().await?;
    if projects.is_empty() {
        return Ok(CommandOutcome::empty("No DeployHQ projects"));
    }

    let mut table = Table::new(["Name", "Permalink", "Repository", "Branch"]);
    for project in projects {
        let (url, branch) = project
            .repository
            .map(|r| (r.url.unwrap_or_default(), r.branch.unwrap_or_default()))
            .unwrap_or_default();
        table.push_row([project.name, project.permalink, url, branch]);
    }
    Ok(CommandOutcome::success(table.render(format)))
}

/// Create (or reuse) a project and connect it to the repository.
pub async fn ensure_project(
    ctx: &Context,
    deployhq: &DeployHqClient,
    name: &str,
    repo: &str,
    branch: &str,
) -> Result<Project> {
    let project = match deployhq.find_project(name).await? {
        Some(project) => {
            info!(project = %project.permalink, "Reusing DeployHQ project");
            project
        }
        None => deployhq.create_project(name, ctx.settings.deployhq.zone_id).await?,
    };
    deployhq
        .connect_repository(&project.permalink, &git_url(ctx.org(), repo), branch)
        .await?;
    Ok(project)
}

pub async fn create_project(ctx: &Context, name: &str, repo: &str, branch: Option<&str>) -> Result<CommandOutcome> {
    let deployhq = ctx.deployhq()?;
    let branch = branch.unwrap_or(&ctx.settings.github.production_branch);
    let project = ensure_project(ctx, &deployhq, name, repo, branch).await?;
    Ok(CommandOutcome::success(format!(
        "DeployHQ project {} connected to {} ({})",
        project.permalink,
        git_url(ctx.org(), repo),
        branch
    )))
}

/// Add `site` to `project` as an SFTP server using the owner's stored
/// password. Reuses a server with the same name.
pub async fn add_site_server(
    ctx: &Context,
    deployhq: &DeployHqClient,
    project: &str,
    site: &PressableSite,
    branch: &str,
    name: &str,
    password: Option<&str>,
) -> Result<String> {
    if let Some(existing) = deployhq
        .list_servers(project)
        .await?
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
    {
        info!(project, server = %existing.name, "Server already exists");
        return Ok(existing.identifier);
    }

    let pressable = ctx.pressable()?;
    let users = pressable.list_sftp_users(site.id).await?;
    let owner = sftp_owner(&users, ctx.settings.pressable.concierge_email.as_deref())
        .ok_or_else(|| anyhow!("could not determine the SFTP owner of {}", site.domain()))?;

    let password = match password {
        Some(password) => password.to_string(),
        None => ctx
            .vault()
            .find_login(&sftp_login_title(&site.domain()))
            .await?
            .map(|item| item.password)
            .ok_or_else(|| {
                anyhow!(
                    "no stored SFTP password for {}; run `team51 pressable rotate-sftp-password {}` first",
                    site.domain(),
                    site.id
                )
            })?,
    };

    let environment = if site.staging { "development" } else { "production" };
    let server = NewServer::sftp(
        name,
        &ctx.settings.pressable.sftp_host,
        &owner.username,
        password,
        branch,
        environment,
    );
    Ok(deployhq.add_server(project, &server).await?.identifier)
}

pub async fn add_server(
    ctx: &Context,
    project: &str,
    site: &SiteRef,
    branch: Option<&str>,
    name: Option<&str>,
) -> Result<CommandOutcome> {
    let deployhq = ctx.deployhq()?;
    let project = deployhq
        .find_project(project)
        .await?
        .ok_or_else(|| anyhow!("DeployHQ project {} not found", project))?;
    let site = ctx.pressable()?.find_site(site).await?;

    let branch = branch.unwrap_or(if site.staging {
        ctx.settings.github.development_branch.as_str()
    } else {
        ctx.settings.github.production_branch.as_str()
    });
    let default_name = if site.staging { "Development" } else { "Production" };
    let name = name.unwrap_or(default_name);

    add_site_server(ctx, &deployhq, &project.permalink, &site, branch, name, None).await?;
    Ok(CommandOutcome::success(format!(
        "Server {} deploys {} to {}",
        name,
        branch,
        site.domain()
    )))
}

pub async fn deploy(ctx: &Context, project: &str, server: &str, branch: Option<&str>) -> Result<CommandOutcome> {
    let deployhq = ctx.deployhq()?;
    let project = deployhq
        .find_project(project)
        .await?
        .ok_or_else(|| anyhow!("DeployHQ project {} not found", project))?;

    let target = deployhq
        .list_servers(&project.permalink)
        .await?
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(server) || s.identifier == server)
        .ok_or_else(|| anyhow!("{} has no server named {}", project.permalink, server))?;

    let branch = branch
        .map(str::to_string)
        .or_else(|| target.branch.clone())
        .unwrap_or_else(|| ctx.settings.github.production_branch.clone());
    let revision = deployhq.latest_revision(&project.permalink, &branch).await?;
    let deployment = deployhq
        .deploy(&project.permalink, &target.identifier, &branch, &revision)
        .await?;

    Ok(CommandOutcome::success(format!(
        "Queued deployment {} of {}@{} to {}",
        deployment.identifier, branch, revision, target.name
    )))
}
