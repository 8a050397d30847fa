//! Email deliverability heuristic.
//!
//! Combines where a domain's DNS is hosted with whether the site runs an
//! SMTP plugin to guess whether outgoing WordPress mail is set up.

use derive_more::Display;
use serde::Serialize;

/// Plugin slugs that route WordPress mail through an external SMTP or API
/// sending service.
pub const SMTP_PLUGINS: &[&str] = &[
    "wp-mail-smtp",
    "post-smtp",
    "easy-wp-smtp",
    "fluent-smtp",
    "wp-ses",
    "mailgun",
    "sendgrid-email-delivery-simplified",
    "gosmtp",
    "smtp-mailer",
    "mailpoet",
];

/// Who hosts the domain's nameservers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum NameserverProvider {
    #[display("WordPress.com")]
    Wpcom,
    #[display("Cloudflare")]
    Cloudflare,
    #[display("other")]
    Other,
    #[display("unknown")]
    Unknown,
}

impl NameserverProvider {
    pub fn classify<S: AsRef<str>>(nameservers: &[S]) -> Self {
        let hosts: Vec<String> = nameservers
            .iter()
            .map(|ns| ns.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|ns| !ns.is_empty())
            .collect();

        if hosts.is_empty() {
            NameserverProvider::Unknown
        } else if hosts.iter().all(|h| h.ends_with(".wordpress.com")) {
            NameserverProvider::Wpcom
        } else if hosts.iter().all(|h| h.ends_with(".cloudflare.com")) {
            NameserverProvider::Cloudflare
        } else {
            NameserverProvider::Other
        }
    }
}

/// Outcome of the email check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MailVerdict {
    /// An SMTP plugin is active.
    Configured { plugin: String },
    /// No SMTP plugin, but DNS lives at WordPress.com so mail records can be
    /// fixed there.
    DnsManagedByWpcom,
    /// No SMTP plugin and DNS is elsewhere.
    NeedsSmtpPlugin { provider: NameserverProvider },
    /// Nothing could be determined.
    Unknown,
}

impl std::fmt::Display for MailVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailVerdict::Configured { plugin } => {
                write!(f, "SMTP plugin '{}' is active; mail should be delivered", plugin)
            }
            MailVerdict::DnsManagedByWpcom => write!(
                f,
                "no SMTP plugin, DNS is managed at WordPress.com; check the domain's email records there"
            ),
            MailVerdict::NeedsSmtpPlugin { provider } => write!(
                f,
                "no SMTP plugin and DNS is hosted by {}; install and configure an SMTP plugin",
                provider
            ),
            MailVerdict::Unknown => write!(f, "could not resolve nameservers or list plugins"),
        }
    }
}

/// The SMTP plugin among `active_plugins`, if any.
///
/// Plugin identifiers may be bare slugs or `slug/main-file.php`.
pub fn find_smtp_plugin<S: AsRef<str>>(active_plugins: &[S]) -> Option<String> {
    active_plugins.iter().find_map(|p| {
        let slug = p.as_ref().split('/').next().unwrap_or_default().to_lowercase();
        if SMTP_PLUGINS.contains(&slug.as_str()) {
            Some(slug)
        } else {
            None
        }
    })
}

/// Evaluate the heuristic. `active_plugins` is `None` when the plugin list
/// could not be fetched.
pub fn evaluate<S: AsRef<str>>(nameservers: &[S], active_plugins: Option<&[S]>) -> MailVerdict {
    if let Some(plugin) = active_plugins.and_then(find_smtp_plugin) {
        return MailVerdict::Configured { plugin };
    }

    let provider = NameserverProvider::classify(nameservers);
    match (provider, active_plugins) {
        (NameserverProvider::Unknown, None) => MailVerdict::Unknown,
        (NameserverProvider::Wpcom, _) => MailVerdict::DnsManagedByWpcom,
        (provider, _) => MailVerdict::NeedsSmtpPlugin { provider },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nameservers() {
        assert_eq!(
            NameserverProvider::classify(&["ns1.wordpress.com.", "NS2.WordPress.com"]),
            NameserverProvider::Wpcom
        );
        assert_eq!(
            NameserverProvider::classify(&["ada.ns.cloudflare.com"]),
            NameserverProvider::Cloudflare
        );
        assert_eq!(
            NameserverProvider::classify(&["ns1.wordpress.com", "ns1.example.net"]),
            NameserverProvider::Other
        );
        assert_eq!(NameserverProvider::classify::<&str>(&[]), NameserverProvider::Unknown);
    }

    #[test]
    fn test_find_smtp_plugin_matches_slug_prefix() {
        let plugins = ["jetpack/jetpack.php", "wp-mail-smtp/wp_mail_smtp.php"];
        assert_eq!(find_smtp_plugin(&plugins), Some("wp-mail-smtp".to_string()));
        assert_eq!(find_smtp_plugin(&["akismet"]), None);
    }

    #[test]
    fn test_evaluate_plugin_wins() {
        let plugins = ["post-smtp"];
        let verdict = evaluate(&["ns1.example.net"], Some(&plugins[..]));
        assert_eq!(verdict, MailVerdict::Configured { plugin: "post-smtp".to_string() });
    }

    #[test]
    fn test_evaluate_wpcom_dns_without_plugin() {
        let plugins = ["jetpack"];
        let verdict = evaluate(&["ns1.wordpress.com", "ns2.wordpress.com"], Some(&plugins[..]));
        assert_eq!(verdict, MailVerdict::DnsManagedByWpcom);
    }

    #[test]
    fn test_evaluate_needs_plugin() {
        let plugins: [&str; 0] = [];
        let verdict = evaluate(&["ns1.example.net"], Some(&plugins[..]));
        assert_eq!(
            verdict,
            MailVerdict::NeedsSmtpPlugin { provider: NameserverProvider::Other }
        );
    }

    #[test]
    fn test_evaluate_unknown() {
        assert_eq!(evaluate::<&str>(&[], None), MailVerdict::Unknown);
    }
}
