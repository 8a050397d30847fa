//! GitHub commands.

use anyhow::{Context as _, Result, bail};
use team51_clients::github::{BranchStatus, NewRepo};
use team51_core::{CommandOutcome, OutputFormat, Table};
use tracing::info;

use super::{Context, yes_no};

pub async fn list_repos(ctx: &Context, topic: Option<&str>, format: OutputFormat) -> Result<CommandOutcome> {
    let github = ctx.github()?;
    let mut table = Table::new(["Name", "URL", "Private", "Default branch"]);

    match topic {
        Some(topic) => {
            for repo in github.search_repos_by_topic(ctx.org(), topic).await? {
                let branch = repo.default_branch_ref.map(|b| b.name).unwrap_or_default();
                table.push_row([repo.name, repo.url, yes_no(repo.is_private).to_string(), branch]);
            }
        }
        None => {
            for repo in github.list_org_repos(ctx.org()).await? {
                table.push_row([repo.name, repo.html_url, yes_no(repo.private).to_string(), repo.default_branch]);
            }
        }
    }

    if table.is_empty() {
        return Ok(CommandOutcome::empty(match topic {
            Some(topic) => format!("No repositories in {} tagged '{}'", ctx.org(), topic),
            None => format!("No repositories in {}", ctx.org()),
        }));
    }
    Ok(CommandOutcome::success(table.render(format)))
}

pub async fn create_repo(
    ctx: &Context,
    name: &str,
    template: Option<&str>,
    description: Option<String>,
    public: bool,
) -> Result<CommandOutcome> {
    let github = ctx.github()?;
    let org = ctx.org();

    if github.get_repo(org, name).await?.is_some() {
        bail!("repository {}/{} already exists", org, name);
    }

    let template = template.unwrap_or(&ctx.settings.github.default_template);
    let repo = NewRepo {
        name: name.to_string(),
        description,
        private: !public,
    };
    info!(org, name, template, "Creating repository from template");
    let created = github
        .create_repo_from_template(ctx.settings.github.template_owner(), template, org, &repo)
        .await
        .with_context(|| format!("failed to create {}/{} from {}", org, name, template))?;

    Ok(CommandOutcome::success(format!("Created {}", created.html_url)))
}

pub async fn create_branch(ctx: &Context, repo: &str, branch: &str, from: Option<&str>) -> Result<CommandOutcome> {
    let github = ctx.github()?;
    match github.ensure_branch(ctx.org(), repo, branch, from).await? {
        BranchStatus::Existing => Ok(CommandOutcome::empty(format!(
            "Branch {} already exists in {}/{}",
            branch,
            ctx.org(),
            repo
        ))),
        BranchStatus::Created { from } => Ok(CommandOutcome::success(format!(
            "Created branch {} from {} in {}/{}",
            branch,
            from,
            ctx.org(),
            repo
        ))),
    }
}

pub async fn set_secret(ctx: &Context, repo: &str, name: &str, value: &str) -> Result<CommandOutcome> {
    if value.is_empty() {
        bail!("secret value must not be empty");
    }
    let github = ctx.github()?;
    github.set_actions_secret(ctx.org(), repo, name, value).await?;
    Ok(CommandOutcome::success(format!(
        "Set secret {} on {}/{}",
        name,
        ctx.org(),
        repo
    )))
}
