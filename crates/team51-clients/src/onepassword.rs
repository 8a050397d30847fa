//! 1Password CLI (`op`) backend for the credential vault.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use team51_core::vault::{CredentialVault, LoginItem};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::{ClientError, ClientResult};

/// Credential vault backed by the `op` binary.
///
/// The CLI must already be signed in; no session handling happens here.
pub struct OnePasswordCli {
    binary: String,
    vault: String,
    account: Option<String>,
}

impl OnePasswordCli {
    pub fn new(binary: impl Into<String>, vault: impl Into<String>, account: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            vault: vault.into(),
            account,
        }
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    /// Run `op` with the vault and JSON output flags appended.
    async fn run(&self, args: &[String]) -> ClientResult<String> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .arg("--vault")
            .arg(&self.vault)
            .arg("--format")
            .arg("json");
        if let Some(account) = &self.account {
            command.arg("--account").arg(account);
        }

        debug!(subcommand = %args.iter().take(2).cloned().collect::<Vec<_>>().join(" "), "Running op");
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ClientError::Command(format!("failed to run {}: {}", self.binary, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            if is_not_found(&stderr) {
                return Err(ClientError::NotFound(stderr));
            }
            error!(stderr = %stderr, "op command failed");
            return Err(ClientError::Command(format!("op: {}", stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn get_item(&self, title: &str) -> ClientResult<Option<LoginItem>> {
        let args = vec!["item".to_string(), "get".to_string(), title.to_string()];
        match self.run(&args).await {
            Ok(json) => parse_item(&json).map(Some),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CredentialVault for OnePasswordCli {
    async fn find_login(&self, title: &str) -> team51_core::Result<Option<LoginItem>> {
        Ok(self.get_item(title).await?)
    }

    async fn upsert_login(&self, item: LoginItem) -> team51_core::Result<LoginItem> {
        let args = match self.get_item(&item.title).await? {
            Some(existing) => {
                let id = existing.id.unwrap_or_else(|| item.title.clone());
                info!(title = %item.title, vault = %self.vault, "Updating 1Password login");
                let mut args = vec!["item".to_string(), "edit".to_string(), id];
                args.extend(assignments(&item));
                args
            }
            None => {
                info!(title = %item.title, vault = %self.vault, "Creating 1Password login");
                let mut args = vec![
                    "item".to_string(),
                    "create".to_string(),
                    "--category".to_string(),
                    "login".to_string(),
                    "--title".to_string(),
                    item.title.clone(),
                ];
                if let Some(url) = item.urls.first() {
                    args.push("--url".to_string());
                    args.push(url.clone());
                }
                args.extend(assignments(&item));
                args
            }
        };

        let json = self.run(&args).await?;
        Ok(parse_item(&json)?)
    }

    async fn list_logins(&self) -> team51_core::Result<Vec<String>> {
        let args = vec![
            "item".to_string(),
            "list".to_string(),
            "--categories".to_string(),
            "Login".to_string(),
        ];
        let json = self.run(&args).await?;
        Ok(parse_titles(&json)?)
    }
}

/// Field assignments in `op`'s `field=value` syntax.
fn assignments(item: &LoginItem) -> Vec<String> {
    let mut fields = vec![
        format!("username={}", item.username),
        format!("password={}", item.password),
    ];
    if let Some(notes) = &item.notes {
        fields.push(format!("notesPlain={}", notes));
    }
    fields
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("isn't an item") || lower.contains("not found") || lower.contains("no item")
}

#[derive(Debug, Deserialize)]
struct OpItem {
    id: String,
    title: String,
    #[serde(default)]
    fields: Vec<OpField>,
    #[serde(default)]
    urls: Vec<OpUrl>,
}

#[derive(Debug, Deserialize)]
struct OpField {
    id: String,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpUrl {
    href: String,
}

/// Convert `op item get --format json` output into a [`LoginItem`].
pub fn parse_item(json: &str) -> ClientResult<LoginItem> {
    let item: OpItem =
        serde_json::from_str(json).map_err(|e| ClientError::Parse(format!("op item: {}", e)))?;

    let field = |purpose: &str, id: &str| {
        item.fields
            .iter()
            .find(|f| f.purpose.as_deref() == Some(purpose) || f.id == id)
            .and_then(|f| f.value.clone())
    };

    Ok(LoginItem {
        id: Some(item.id.clone()),
        title: item.title.clone(),
        username: field("USERNAME", "username").unwrap_or_default(),
        password: field("PASSWORD", "password").unwrap_or_default(),
        urls: item.urls.iter().map(|u| u.href.clone()).collect(),
        notes: field("NOTES", "notesPlain").filter(|n| !n.is_empty()),
    })
}

/// Titles from `op item list --format json` output.
pub fn parse_titles(json: &str) -> ClientResult<Vec<String>> {
    #[derive(Deserialize)]
    struct Summary {
        title: String,
    }

    let items: Vec<Summary> =
        serde_json::from_str(json).map_err(|e| ClientError::Parse(format!("op item list: {}", e)))?;
    Ok(items.into_iter().map(|i| i.title).collect())
}
