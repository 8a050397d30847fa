//! Settings file parsing and credential lookup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ConfigError, ConfigResult};

pub const CONFIG_FILE: &str = "config.json";
pub const CONTRACTOR_CONFIG_FILE: &str = "contractor-config.json";
pub const DEV_MARKER: &str = ".dev";

/// Where to load settings from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit `--config` path or `TEAM51_CONFIG`.
    pub path: Option<PathBuf>,
    /// Load `contractor-config.json` instead of `config.json`.
    pub contractor: bool,
}

impl ConfigSource {
    /// Resolve the file to read.
    pub fn resolve(&self) -> ConfigResult<PathBuf> {
        let base = match &self.path {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .ok_or(ConfigError::NoConfigDir)?
                .join("team51")
                .join(CONFIG_FILE),
        };

        if self.contractor {
            Ok(base.with_file_name(CONTRACTOR_CONFIG_FILE))
        } else {
            Ok(base)
        }
    }
}

/// All settings read from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub github: GitHubConfig,
    pub pressable: PressableConfig,
    pub wpcom: WpcomConfig,
    pub deployhq: DeployHqConfig,
    pub front: FrontConfig,
    pub flickr: FlickrConfig,
    pub onepassword: OnePasswordConfig,
    pub ssh: SshConfig,
    pub polling: PollingConfig,
    /// Checkout the tool runs from; holds the `.dev` marker.
    pub install_dir: Option<PathBuf>,
    /// File the settings were read from.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_token: Option<String>,
    pub org: String,
    pub template_owner: Option<String>,
    pub default_template: String,
    pub production_branch: String,
    pub development_branch: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            org: "a8cteam51".to_string(),
            template_owner: None,
            default_template: "team51-project-scaffold".to_string(),
            production_branch: "trunk".to_string(),
            development_branch: "develop".to_string(),
        }
    }
}

impl GitHubConfig {
    pub fn token(&self) -> ConfigResult<&str> {
        required(&self.api_token, "github.api_token", "TEAM51_GITHUB_TOKEN")
    }

    pub fn template_owner(&self) -> &str {
        self.template_owner.as_deref().unwrap_or(&self.org)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PressableConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub default_php_version: String,
    pub default_datacenter: String,
    /// Email of the collaborator used as SFTP/SSH owner when no user is flagged.
    pub concierge_email: Option<String>,
    pub sftp_host: String,
    /// WordPress login whose password `rotate-wp-password` resets by default.
    pub wp_admin_username: Option<String>,
}

impl Default for PressableConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            default_php_version: "8.2".to_string(),
            default_datacenter: "DFW".to_string(),
            concierge_email: None,
            sftp_host: "sftp.pressable.com".to_string(),
            wp_admin_username: None,
        }
    }
}

impl PressableConfig {
    pub fn credentials(&self) -> ConfigResult<(&str, &str)> {
        Ok((
            required(&self.client_id, "pressable.client_id", "TEAM51_PRESSABLE_CLIENT_ID")?,
            required(
                &self.client_secret,
                "pressable.client_secret",
                "TEAM51_PRESSABLE_CLIENT_SECRET",
            )?,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WpcomConfig {
    pub api_token: Option<String>,
}

impl WpcomConfig {
    pub fn token(&self) -> ConfigResult<&str> {
        required(&self.api_token, "wpcom.api_token", "TEAM51_WPCOM_TOKEN")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployHqConfig {
    /// Account subdomain, as in `<account>.deployhq.com`.
    pub account: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub zone_id: Option<u32>,
}

impl DeployHqConfig {
    pub fn credentials(&self) -> ConfigResult<(&str, &str, &str)> {
        Ok((
            required(&self.account, "deployhq.account", "TEAM51_DEPLOYHQ_ACCOUNT")?,
            required(&self.username, "deployhq.username", "TEAM51_DEPLOYHQ_USERNAME")?,
            required(&self.api_key, "deployhq.api_key", "TEAM51_DEPLOYHQ_API_KEY")?,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontConfig {
    pub api_token: Option<String>,
}

impl FrontConfig {
    pub fn token(&self) -> ConfigResult<&str> {
        required(&self.api_token, "front.api_token", "TEAM51_FRONT_TOKEN")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickrConfig {
    pub api_key: Option<String>,
}

impl FlickrConfig {
    pub fn api_key(&self) -> ConfigResult<&str> {
        required(&self.api_key, "flickr.api_key", "TEAM51_FLICKR_API_KEY")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnePasswordConfig {
    pub vault: String,
    pub binary: String,
    pub account: Option<String>,
}

impl Default for OnePasswordConfig {
    fn default() -> Self {
        Self {
            vault: "Team51".to_string(),
            binary: "op".to_string(),
            account: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    /// Authenticate with the SFTP password through `sshpass`.
    pub use_sshpass: bool,
    /// SSH client executable.
    pub binary: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "ssh.pressable.com".to_string(),
            port: 22,
            use_sshpass: true,
            binary: "ssh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Zero disables the ceiling.
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 30 * 60,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn ceiling(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
    env: &'static str,
) -> ConfigResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingCredential(name, env))
}

impl Settings {
    /// Load settings from `source`, then apply environment overrides.
    pub fn load(source: &ConfigSource) -> ConfigResult<Self> {
        let path = source.resolve()?;
        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse a config file without environment overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.loaded_from = Some(path.to_path_buf());
        settings.validate()?;
        Ok(settings)
    }

    /// Override credentials from environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut Option<String>); 10] = [
            ("TEAM51_GITHUB_TOKEN", &mut self.github.api_token),
            ("TEAM51_PRESSABLE_CLIENT_ID", &mut self.pressable.client_id),
            ("TEAM51_PRESSABLE_CLIENT_SECRET", &mut self.pressable.client_secret),
            ("TEAM51_WPCOM_TOKEN", &mut self.wpcom.api_token),
            ("TEAM51_DEPLOYHQ_ACCOUNT", &mut self.deployhq.account),
            ("TEAM51_DEPLOYHQ_USERNAME", &mut self.deployhq.username),
            ("TEAM51_DEPLOYHQ_API_KEY", &mut self.deployhq.api_key),
            ("TEAM51_FRONT_TOKEN", &mut self.front.api_token),
            ("TEAM51_FLICKR_API_KEY", &mut self.flickr.api_key),
            ("TEAM51_OP_ACCOUNT", &mut self.onepassword.account),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!(key, "Credential overridden from environment");
                *slot = Some(value);
            }
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.github.org.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.org".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.onepassword.vault.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "onepassword.vault".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Directory checked for the `.dev` marker: the configured install dir,
    /// else the directory the config was loaded from.
    pub fn install_dir(&self) -> Option<PathBuf> {
        self.install_dir.clone().or_else(|| {
            self.loaded_from
                .as_ref()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf)
        })
    }
}

/// Whether `dir` is a development checkout (contains a `.dev` marker).
pub fn is_dev_install(dir: &Path) -> bool {
    dir.join(DEV_MARKER).exists()
}
