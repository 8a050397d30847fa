//! Provider API clients for the team51 operations CLI.
//!
//! One typed async client per provider:
//! - GitHub (REST and GraphQL)
//! - Pressable
//! - WordPress.com and the Jetpack proxy
//! - DeployHQ
//! - Front
//! - Flickr
//!
//! plus shell-outs to the 1Password CLI, `ssh` and `dig`, and the polling
//! helper used to wait on asynchronous provider operations.

pub mod deployhq;
pub mod dns;
pub mod error;
pub mod flickr;
pub mod front;
pub mod github;
mod http;
pub mod onepassword;
pub mod poll;
pub mod pressable;
pub mod ssh;
pub mod wpcom;

#[cfg(test)]
mod testing;

pub use deployhq::DeployHqClient;
pub use error::{ClientError, ClientResult};
pub use flickr::FlickrClient;
pub use front::FrontClient;
pub use github::GitHubClient;
pub use onepassword::OnePasswordCli;
pub use pressable::PressableClient;
pub use ssh::SshSession;
pub use wpcom::WpcomClient;
