//! Stand-ins for provider APIs, the vault and `ssh` in command tests.

use async_trait::async_trait;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use team51_config::Settings;
use team51_core::vault::{CredentialVault, LoginItem};

use crate::commands::Context;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// In-memory vault that keeps every upsert in order.
#[derive(Clone, Default)]
pub struct MemoryVault {
    items: Arc<Mutex<Vec<LoginItem>>>,
}

impl MemoryVault {
    pub fn titles(&self) -> Vec<String> {
        self.items.lock().unwrap().iter().map(|i| i.title.clone()).collect()
    }

    pub fn password(&self, title: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|i| i.title == title)
            .map(|i| i.password.clone())
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn find_login(&self, title: &str) -> team51_core::Result<Option<LoginItem>> {
        Ok(self.items.lock().unwrap().iter().rev().find(|i| i.title == title).cloned())
    }

    async fn upsert_login(&self, item: LoginItem) -> team51_core::Result<LoginItem> {
        self.items.lock().unwrap().push(item.clone());
        Ok(item)
    }

    async fn list_logins(&self) -> team51_core::Result<Vec<String>> {
        Ok(self.titles())
    }
}

/// Context with test credentials for every provider and `vault` as store.
pub fn context(vault: &MemoryVault) -> Context {
    let mut settings = Settings::default();
    settings.github.api_token = Some("gh-token".to_string());
    settings.pressable.client_id = Some("id".to_string());
    settings.pressable.client_secret = Some("secret".to_string());
    settings.wpcom.api_token = Some("wpcom-token".to_string());
    settings.deployhq.account = Some("team51".to_string());
    settings.deployhq.username = Some("deployer".to_string());
    settings.deployhq.api_key = Some("key".to_string());
    settings.ssh.use_sshpass = false;
    Context::with_vault(settings, Box::new(vault.clone()))
}

/// Executable standing in for `ssh`: appends the remote command (its last
/// argument) to a log and prints `stdout`. Returns the script and log paths.
#[cfg(unix)]
pub fn fake_ssh(dir: &Path, stdout: &str) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("ssh");
    let log = dir.join("ssh.log");
    let body = format!(
        "#!/bin/sh\nfor last; do :; done\nprintf '%s\\n' \"$last\" >> '{}'\nprintf '%s\\n' '{}'\n",
        log.display(),
        stdout
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}
