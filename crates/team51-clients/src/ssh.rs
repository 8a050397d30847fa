//! Remote command execution over `ssh`, optionally fed a password by `sshpass`.

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::{ClientError, ClientResult};

/// Connection details for a site's SSH endpoint.
pub struct SshSession {
    binary: String,
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    use_sshpass: bool,
}

impl SshSession {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            binary: "ssh".to_string(),
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            use_sshpass: false,
        }
    }

    /// Authenticate with a password via `sshpass -e`. The password travels in
    /// the `SSHPASS` environment variable, never on the command line.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.use_sshpass = true;
        self
    }

    /// Client executable to run instead of `ssh` from `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    fn command(&self, remote: &str) -> Command {
        let mut command = match (&self.password, self.use_sshpass) {
            (Some(password), true) => {
                let mut c = Command::new("sshpass");
                c.env("SSHPASS", password).arg("-e").arg(&self.binary);
                c
            }
            _ => Command::new(&self.binary),
        };
        command
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg("LogLevel=ERROR")
            .arg(self.destination())
            .arg(remote);
        command
    }

    /// Run a shell command remotely and return its stdout.
    pub async fn run(&self, remote: &str) -> ClientResult<String> {
        debug!(destination = %self.destination(), command = remote, "Running remote command");

        let output = self
            .command(remote)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ClientError::Command(format!("failed to start ssh: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(destination = %self.destination(), stderr = %stderr, "Remote command failed");
            return Err(ClientError::Command(format!(
                "ssh {} exited with {}: {}",
                self.destination(),
                output.status,
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run WP-CLI on the remote site.
    pub async fn wp(&self, args: &[&str]) -> ClientResult<String> {
        info!(destination = %self.destination(), subcommand = args.first().copied().unwrap_or(""), "Running WP-CLI");
        self.run(&wp_command(args)).await
    }

    /// Last `lines` lines of a remote file.
    pub async fn tail(&self, path: &str, lines: usize) -> ClientResult<String> {
        self.run(&format!("tail -n {} {}", lines, shell_quote(path))).await
    }
}

/// Build a `wp` invocation with every argument quoted.
pub fn wp_command(args: &[&str]) -> String {
    let mut command = String::from("wp");
    for arg in args {
        command.push(' ');
        command.push_str(&shell_quote(arg));
    }
    command
}

/// Quote a string for a POSIX shell. Plain words pass through unchanged.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | '@' | ','));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("user"), "user");
        assert_eq!(shell_quote("--field=ID"), "--field=ID");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("p@ss$word!"), "'p@ss$word!'");
    }

    #[test]
    fn test_wp_command() {
        assert_eq!(
            wp_command(&["user", "update", "admin", "--user_pass=a b"]),
            "wp user update admin '--user_pass=a b'"
        );
        assert_eq!(wp_command(&[]), "wp");
    }

    #[test]
    fn test_destination_and_password_mode() {
        let plain = SshSession::new("ssh.pressable.com", 22, "site-owner");
        assert_eq!(plain.destination(), "site-owner@ssh.pressable.com");
        assert!(!plain.use_sshpass);

        let with_password = plain.with_password("pw");
        assert!(with_password.use_sshpass);
        assert_eq!(
            with_password.command("true").as_std().get_program(),
            std::ffi::OsStr::new("sshpass")
        );
    }

    #[test]
    fn test_custom_binary() {
        let session = SshSession::new("ssh.pressable.com", 22, "owner").with_binary("/usr/local/bin/ssh");
        assert_eq!(
            session.command("true").as_std().get_program(),
            std::ffi::OsStr::new("/usr/local/bin/ssh")
        );

        let with_password = session.with_password("pw");
        let command = with_password.command("true");
        let args: Vec<_> = command.as_std().get_args().take(2).collect();
        assert_eq!(args, ["-e", "/usr/local/bin/ssh"]);
    }
}
