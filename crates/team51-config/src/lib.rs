//! Configuration loading for the team51 operations CLI.
//!
//! This crate handles:
//! - Locating and parsing `config.json` / `contractor-config.json`
//! - Environment variable overrides for credentials
//! - The `.dev` install marker

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{
    ConfigSource, DeployHqConfig, FlickrConfig, FrontConfig, GitHubConfig, OnePasswordConfig,
    PollingConfig, PressableConfig, Settings, SshConfig, WpcomConfig, is_dev_install,
};
