//! CLI command implementations.

pub mod deployhq;
pub mod flickr;
pub mod front;
pub mod github;
pub mod jetpack;
pub mod pressable;
pub mod rotate;
pub mod self_update;
pub mod site;
pub mod users;
pub mod wpcom;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use team51_clients::{
    DeployHqClient, FlickrClient, FrontClient, GitHubClient, OnePasswordCli, PressableClient, SshSession,
    WpcomClient,
};
use team51_config::{ConfigError, ConfigSource, Settings};
use team51_core::export::{ExportFormat, export_table};
use team51_core::vault::CredentialVault;
use team51_core::{CommandOutcome, OutputFormat, Table};
use tracing::{info, warn};

/// API base URLs that replace the providers' public endpoints.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub github: Option<String>,
    pub pressable: Option<String>,
    pub pressable_auth: Option<String>,
    pub wpcom: Option<String>,
    pub deployhq: Option<String>,
    pub front: Option<String>,
    pub flickr: Option<String>,
}

/// Loaded settings plus constructors for the provider clients.
///
/// Clients are built on demand so that a command only needs the
/// credentials it actually uses.
pub struct Context {
    pub settings: Settings,
    pub endpoints: Endpoints,
    vault: Box<dyn CredentialVault>,
}

impl Context {
    /// Context backed by the 1Password CLI.
    pub fn new(settings: Settings) -> Self {
        let op = &settings.onepassword;
        let vault = OnePasswordCli::new(&op.binary, &op.vault, op.account.clone());
        Self::with_vault(settings, Box::new(vault))
    }

    pub fn with_vault(settings: Settings, vault: Box<dyn CredentialVault>) -> Self {
        Self {
            settings,
            endpoints: Endpoints::default(),
            vault,
        }
    }

    pub fn load(config: Option<PathBuf>, contractor: bool) -> Result<Self> {
        let source = ConfigSource { path: config, contractor };
        let settings = match Settings::load(&source) {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(path)) => {
                warn!(path = %path.display(), "No config file found, using defaults and environment");
                let mut settings = Settings::default();
                settings.apply_env(|key| std::env::var(key).ok());
                settings
            }
            Err(e) => return Err(e).context("failed to load configuration"),
        };
        Ok(Self::new(settings))
    }

    pub fn github(&self) -> Result<GitHubClient> {
        let token = self.settings.github.token()?;
        Ok(match &self.endpoints.github {
            Some(base) => GitHubClient::with_base_url(token, base),
            None => GitHubClient::new(token),
        })
    }

    pub fn org(&self) -> &str {
        &self.settings.github.org
    }

    pub fn pressable(&self) -> Result<PressableClient> {
        let (id, secret) = self.settings.pressable.credentials()?;
        Ok(match (&self.endpoints.pressable, &self.endpoints.pressable_auth) {
            (Some(base), Some(auth)) => PressableClient::with_urls(id, secret, base, auth),
            _ => PressableClient::new(id, secret),
        })
    }

    pub fn wpcom(&self) -> Result<WpcomClient> {
        let token = self.settings.wpcom.token()?;
        Ok(match &self.endpoints.wpcom {
            Some(base) => WpcomClient::with_base_url(token, base),
            None => WpcomClient::new(token),
        })
    }

    pub fn deployhq(&self) -> Result<DeployHqClient> {
        let (account, username, api_key) = self.settings.deployhq.credentials()?;
        Ok(match &self.endpoints.deployhq {
            Some(base) => DeployHqClient::with_base_url(base, username, api_key),
            None => DeployHqClient::new(account, username, api_key),
        })
    }

    pub fn front(&self) -> Result<FrontClient> {
        let token = self.settings.front.token()?;
        Ok(match &self.endpoints.front {
            Some(base) => FrontClient::with_base_url(token, base),
            None => FrontClient::new(token),
        })
    }

    pub fn flickr(&self) -> Result<FlickrClient> {
        let api_key = self.settings.flickr.api_key()?;
        Ok(match &self.endpoints.flickr {
            Some(base) => FlickrClient::with_base_url(api_key, base),
            None => FlickrClient::new(api_key),
        })
    }

    pub fn vault(&self) -> &dyn CredentialVault {
        self.vault.as_ref()
    }

    /// SSH session for a site's SFTP user. The password is only used when
    /// `sshpass` is enabled; otherwise key authentication is assumed.
    pub fn ssh(&self, username: &str, password: Option<&str>) -> SshSession {
        let ssh = &self.settings.ssh;
        let session = SshSession::new(&ssh.host, ssh.port, username).with_binary(&ssh.binary);
        match password {
            Some(password) if ssh.use_sshpass => session.with_password(password),
            _ => session,
        }
    }
}

/// Render `table` and optionally export it into the working directory.
pub fn report(table: &Table, format: OutputFormat, export: Option<ExportFormat>, stem: &str) -> Result<CommandOutcome> {
    let mut output = table.render(format);
    if let Some(export) = export {
        let path = export_to_cwd(table, export, stem)?;
        output.push_str(&format!("\nExported {} rows to {}", table.len(), path.display()));
    }
    Ok(CommandOutcome::success(output))
}

/// Write `table` as `<stem>.<ext>` in the working directory.
pub fn export_to_cwd(table: &Table, format: ExportFormat, stem: &str) -> Result<PathBuf> {
    let dir = std::env::current_dir().context("failed to determine working directory")?;
    export_in(table, format, &dir, stem)
}

fn export_in(table: &Table, format: ExportFormat, dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = export_table(table, format, dir, stem)?;
    info!(path = %path.display(), rows = table.len(), "Exported report");
    Ok(path)
}

/// Git URL for a repository given by name in the organisation or as a URL.
pub fn git_url(org: &str, repo: &str) -> String {
    if repo.contains("://") || repo.starts_with("git@") {
        repo.to_string()
    } else {
        format!("git@github.com:{}/{}.git", org, repo)
    }
}

/// Yes/no column value.
pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
