//! Removing a person from every site they can access.

use anyhow::{Context as _, Result, anyhow};
use std::io::{BufRead, Write};
use team51_clients::pressable::{Collaborator, PressableSite};
use team51_clients::wpcom::{WpcomSite, WpcomUser};
use team51_core::fanout::parallel_map;
use team51_core::{CommandOutcome, OutputFormat, Table};
use tracing::{info, warn};

use super::Context;
use super::rotate::failure_summary;

/// A membership found during the lookup phase.
enum Membership {
    Wpcom { site: WpcomSite, user: WpcomUser },
    Pressable { site: PressableSite, collaborator: Collaborator },
}

impl Membership {
    fn platform(&self) -> &'static str {
        match self {
            Membership::Wpcom { .. } => "WordPress.com",
            Membership::Pressable { .. } => "Pressable",
        }
    }

    fn site(&self) -> String {
        match self {
            Membership::Wpcom { site, .. } => site.domain(),
            Membership::Pressable { site, .. } => site.domain(),
        }
    }

    fn account(&self) -> String {
        match self {
            Membership::Wpcom { user, .. } => user.login.clone(),
            Membership::Pressable { collaborator, .. } => collaborator.email.clone(),
        }
    }
}

pub async fn remove_user(
    ctx: &Context,
    email: &str,
    concurrency: usize,
    yes: bool,
    include_pressable: bool,
) -> Result<CommandOutcome> {
    let wpcom = ctx.wpcom()?;
    let sites = wpcom.list_sites().await?;
    info!(sites = sites.len(), email, "Looking up user on WordPress.com sites");

    let wpcom_ref = &wpcom;
    let lookups = parallel_map(sites, concurrency, |site| async move {
        let user = wpcom_ref.find_site_user(&site.site_ref(), email).await;
        (site, user)
    })
    .await;

    let mut memberships = Vec::new();
    let mut failures = Vec::new();
    let mut searched = lookups.len();
    for (site, user) in lookups {
        match user {
            Ok(Some(user)) => memberships.push(Membership::Wpcom { site, user }),
            Ok(None) => {}
            Err(e) => {
                warn!(site = %site.domain(), error = %e, "User lookup failed");
                failures.push((site.domain(), format!("lookup failed: {}", e)));
            }
        }
    }

    let pressable = if include_pressable {
        Some(ctx.pressable()?)
    } else {
        None
    };
    if let Some(pressable) = &pressable {
        let sites = pressable.list_sites().await?;
        info!(sites = sites.len(), email, "Looking up collaborator on Pressable sites");
        let lookups = parallel_map(sites, concurrency, |site| async move {
            let collaborators = pressable.list_collaborators(site.id).await;
            (site, collaborators)
        })
        .await;

        searched += lookups.len();
        for (site, collaborators) in lookups {
            match collaborators {
                Ok(collaborators) => {
                    if let Some(collaborator) = collaborators.into_iter().find(|c| c.email.eq_ignore_ascii_case(email)) {
                        memberships.push(Membership::Pressable { site, collaborator });
                    }
                }
                Err(e) => {
                    warn!(site = %site.domain(), error = %e, "Collaborator lookup failed");
                    failures.push((site.domain(), format!("lookup failed: {}", e)));
                }
            }
        }
    }

    if memberships.is_empty() {
        if failures.is_empty() {
            return Ok(CommandOutcome::empty(format!("{} was not found on any site", email)));
        }
        return Err(anyhow!(failure_summary(searched, &failures)));
    }

    memberships.sort_by(|a, b| a.platform().cmp(b.platform()).then_with(|| a.site().cmp(&b.site())));
    println!("{}", membership_table(&memberships).render(OutputFormat::Table));

    if !yes && !confirm(&format!("Remove {} from {} sites?", email, memberships.len()))? {
        return Ok(CommandOutcome::empty("Aborted; nothing was removed"));
    }

    for membership in &memberships {
        let result = match membership {
            Membership::Wpcom { site, user } => wpcom.remove_site_user(&site.site_ref(), user.id).await,
            Membership::Pressable { site, collaborator } => match &pressable {
                Some(pressable) => pressable.remove_collaborator(site.id, collaborator.id).await,
                None => continue,
            },
        };
        match result {
            Ok(()) => println!("Removed {} from {} ({})", email, membership.site(), membership.platform()),
            Err(e) => failures.push((membership.site(), e.to_string())),
        }
    }

    if failures.is_empty() {
        Ok(CommandOutcome::success(format!(
            "Removed {} from {} sites",
            email,
            memberships.len()
        )))
    } else {
        Err(anyhow!(failure_summary(searched, &failures)))
    }
}

fn membership_table(memberships: &[Membership]) -> Table {
    let mut table = Table::new(["Platform", "Site", "Account"]);
    for membership in memberships {
        table.push_row([
            membership.platform().to_string(),
            membership.site(),
            membership.account(),
        ]);
    }
    table
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryVault, context, serve};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// WordPress.com sites 1 and 2 plus Pressable site 7. The user is on
    /// site 1; looking them up on site 2 fails when `broken` is set.
    async fn provider_mocks(broken: bool, removals: Arc<Mutex<Vec<String>>>) -> String {
        let wpcom_removals = removals.clone();
        let router = Router::new()
            .route(
                "/me/sites",
                get(|| async {
                    Json(json!({ "sites": [
                        { "ID": 1, "URL": "https://alpha.example.com" },
                        { "ID": 2, "URL": "https://beta.example.com" }
                    ] }))
                }),
            )
            .route(
                "/sites/{site}/users",
                get(move |Path(site): Path<String>| async move {
                    match site.as_str() {
                        "1" => Json(json!({ "users": [{ "ID": 42, "login": "jdoe", "email": "j@example.com" }] }))
                            .into_response(),
                        _ if broken => (StatusCode::INTERNAL_SERVER_ERROR, "database gone").into_response(),
                        _ => Json(json!({ "users": [] })).into_response(),
                    }
                }),
            )
            .route(
                "/sites/{site}/users/{id}/delete",
                post(move |Path((site, id)): Path<(String, u64)>| {
                    let removals = wpcom_removals.clone();
                    async move {
                        removals.lock().unwrap().push(format!("wpcom {} {}", site, id));
                        Json(json!({ "success": true }))
                    }
                }),
            )
            .route("/auth/token", post(|| async { Json(json!({ "access_token": "tok" })) }))
            .route(
                "/v1/sites",
                get(|| async {
                    Json(json!({ "data": [{ "id": 7, "name": "gamma", "url": "https://gamma.example.com" }] }))
                }),
            )
            .route(
                "/v1/sites/{id}/collaborators",
                get(|| async {
                    Json(json!({ "data": [
                        { "id": 3, "email": "other@example.com" },
                        { "id": 4, "email": "J@Example.com" }
                    ] }))
                }),
            )
            .route(
                "/v1/sites/{id}/collaborators/{collaborator}",
                delete(move |Path((id, collaborator)): Path<(u64, u64)>| {
                    let removals = removals.clone();
                    async move {
                        removals.lock().unwrap().push(format!("pressable {} {}", id, collaborator));
                        Json(json!({ "message": "Success" }))
                    }
                }),
            );

        serve(router).await
    }

    fn users_context(base: &str) -> Context {
        let mut ctx = context(&MemoryVault::default());
        ctx.endpoints.wpcom = Some(base.to_string());
        ctx.endpoints.pressable = Some(format!("{}/v1", base));
        ctx.endpoints.pressable_auth = Some(format!("{}/auth/token", base));
        ctx
    }

    #[tokio::test]
    async fn test_remove_user_reports_failed_lookups() {
        let removals = Arc::new(Mutex::new(Vec::new()));
        let base = provider_mocks(true, removals.clone()).await;
        let ctx = users_context(&base);

        let err = remove_user(&ctx, "j@example.com", 4, true, false)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("1 of 2 sites failed:"));
        assert!(err.contains("beta.example.com: lookup failed"));
        assert_eq!(*removals.lock().unwrap(), ["wpcom 1 42"]);
    }

    #[tokio::test]
    async fn test_remove_user_across_platforms() {
        let removals = Arc::new(Mutex::new(Vec::new()));
        let base = provider_mocks(false, removals.clone()).await;
        let ctx = users_context(&base);

        let outcome = remove_user(&ctx, "j@example.com", 4, true, true).await.unwrap();
        assert_eq!(outcome.to_string(), "Removed j@example.com from 2 sites");

        let mut removed = removals.lock().unwrap().clone();
        removed.sort();
        assert_eq!(removed, ["pressable 7 4", "wpcom 1 42"]);
    }

    #[tokio::test]
    async fn test_remove_user_not_found_is_empty() {
        let base = provider_mocks(false, Arc::new(Mutex::new(Vec::new()))).await;
        let ctx = users_context(&base);

        let outcome = remove_user(&ctx, "nobody@example.com", 4, true, false).await.unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn test_membership_table() {
        let site: WpcomSite =
            serde_json::from_value(json!({ "ID": 1, "URL": "https://alpha.example.com" })).unwrap();
        let user: WpcomUser =
            serde_json::from_value(json!({ "ID": 5, "login": "jdoe", "email": "j@example.com" })).unwrap();
        let table = membership_table(&[Membership::Wpcom { site, user }]);
        assert_eq!(table.rows()[0], vec!["WordPress.com", "alpha.example.com", "jdoe"]);
    }
}
