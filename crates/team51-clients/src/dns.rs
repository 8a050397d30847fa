//! Nameserver lookups via `dig`.

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{ClientError, ClientResult};

/// Authoritative nameservers for `domain`, lower-cased without the trailing dot.
///
/// An empty list means the domain has no NS records (or does not resolve).
pub async fn lookup_nameservers(domain: &str) -> ClientResult<Vec<String>> {
    debug!(domain, "Looking up nameservers");

    let output = Command::new("dig")
        .args(["+short", "NS", domain])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ClientError::Command(format!("failed to run dig: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(domain, stderr = %stderr, "dig failed");
        return Err(ClientError::Command(format!("dig {}: {}", domain, stderr)));
    }

    Ok(parse_nameservers(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `dig +short NS` output. Lines that are not hostnames (comments,
/// CNAME targets ending a chain) are skipped.
pub fn parse_nameservers(output: &str) -> Vec<String> {
    let mut servers: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .filter(|line| !line.contains(char::is_whitespace))
        .map(|line| line.trim_end_matches('.').to_ascii_lowercase())
        .collect();
    servers.sort();
    servers.dedup();
    servers
}
