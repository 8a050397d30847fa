//! team51 operations CLI.

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use team51_core::export::ExportFormat;
use team51_core::php_log::Severity;
use team51_core::{CommandOutcome, OutputFormat, SiteRef};
use tracing_subscriber::EnvFilter;

mod commands;
#[cfg(test)]
mod testing;

use commands::Context;

#[derive(Parser)]
#[command(name = "team51")]
#[command(about = "Provision and maintain team51 sites across GitHub, Pressable, WordPress.com and DeployHQ", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.json
    #[arg(long, global = true, env = "TEAM51_CONFIG")]
    config: Option<PathBuf>,

    /// Load contractor-config.json instead of config.json
    #[arg(long, global = true, env = "TEAM51_CONTRACTOR", value_parser = FalseyValueParser::new())]
    contractor: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GitHub repositories, branches and secrets
    Github {
        #[command(subcommand)]
        command: GithubCommands,
    },
    /// Pressable sites, collaborators and credentials
    Pressable {
        #[command(subcommand)]
        command: PressableCommands,
    },
    /// WordPress.com sites, stickers, plugins and users
    Wpcom {
        #[command(subcommand)]
        command: WpcomCommands,
    },
    /// Jetpack modules through the WordPress.com proxy
    Jetpack {
        #[command(subcommand)]
        command: JetpackCommands,
    },
    /// DeployHQ projects, servers and deployments
    Deployhq {
        #[command(subcommand)]
        command: DeployHqCommands,
    },
    /// Front inboxes and conversations
    Front {
        #[command(subcommand)]
        command: FrontCommands,
    },
    /// Flickr photo exports
    Flickr {
        #[command(subcommand)]
        command: FlickrCommands,
    },
    /// End-to-end site workflows
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },
    /// Update this installation from its Git checkout
    SelfUpdate {
        /// Update even when the install is marked as a development checkout
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum GithubCommands {
    /// Repository listing
    Repos {
        #[command(subcommand)]
        command: GithubReposCommands,
    },
    /// Repository creation
    Repo {
        #[command(subcommand)]
        command: GithubRepoCommands,
    },
    /// Branch management
    Branch {
        #[command(subcommand)]
        command: GithubBranchCommands,
    },
    /// Actions secrets
    Secret {
        #[command(subcommand)]
        command: GithubSecretCommands,
    },
}

#[derive(Subcommand)]
enum GithubReposCommands {
    /// List organisation repositories
    List {
        /// Only repositories tagged with this topic
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum GithubRepoCommands {
    /// Create a repository from the project template
    Create {
        name: String,
        /// Template repository (defaults to the configured scaffold)
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Make the repository public
        #[arg(long)]
        public: bool,
    },
}

#[derive(Subcommand)]
enum GithubBranchCommands {
    /// Create a branch if it does not exist
    Create {
        repo: String,
        branch: String,
        /// Source branch (defaults to the repository's default branch)
        #[arg(long)]
        from: Option<String>,
    },
}

#[derive(Subcommand)]
enum GithubSecretCommands {
    /// Create or update an Actions secret
    Set {
        repo: String,
        name: String,
        #[arg(long, env = "TEAM51_SECRET_VALUE", hide_env_values = true)]
        value: String,
    },
}

#[derive(Subcommand)]
enum PressableCommands {
    /// Site listing
    Sites {
        #[command(subcommand)]
        command: PressableSitesCommands,
    },
    /// Single site details
    Site {
        #[command(subcommand)]
        command: PressableSiteCommands,
    },
    /// Site collaborators
    Collaborators {
        #[command(subcommand)]
        command: CollaboratorCommands,
    },
    /// SFTP users
    Sftp {
        #[command(subcommand)]
        command: SftpCommands,
    },
    /// Summarise the site's PHP error log
    PhpErrors {
        site: SiteRef,
        /// Show at most this many distinct messages
        #[arg(long)]
        limit: Option<usize>,
        /// Minimum severity (fatal, parse, warning, notice, deprecated)
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Edge cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Run WP-CLI on the site over SSH
    Wp {
        site: SiteRef,
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },
    /// Reset the SFTP password and store it in 1Password
    RotateSftpPassword {
        site: SiteRef,
        /// SFTP username (defaults to the site owner)
        #[arg(long)]
        user: Option<String>,
    },
    /// Reset a WordPress user's password and store it in 1Password
    RotateWpPassword {
        site: SiteRef,
        /// WordPress login (defaults to the configured admin, then the first administrator)
        #[arg(long)]
        user: Option<String>,
    },
    /// Rotate SFTP then WordPress passwords
    RotatePasswords {
        #[arg(required_unless_present = "all_sites", conflicts_with = "all_sites")]
        site: Option<SiteRef>,
        /// Rotate every live site on the account
        #[arg(long)]
        all_sites: bool,
    },
}

#[derive(Subcommand)]
enum PressableSitesCommands {
    /// List all sites
    List {
        #[arg(long, default_value = "table")]
        format: OutputFormat,
        /// Also write the list to pressable-sites.<csv|json>
        #[arg(long)]
        export: Option<ExportFormat>,
    },
}

#[derive(Subcommand)]
enum PressableSiteCommands {
    /// Show site details
    Info { site: SiteRef },
}

#[derive(Subcommand)]
enum CollaboratorCommands {
    /// List collaborators
    List { site: SiteRef },
    /// Add a collaborator with the default roles
    Add {
        site: SiteRef,
        #[arg(long)]
        email: String,
    },
    /// Remove a collaborator
    Remove {
        site: SiteRef,
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SftpCommands {
    /// Show the SFTP/SSH owner
    Owner { site: SiteRef },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Purge the site's edge cache
    Purge { site: SiteRef },
}

#[derive(Subcommand)]
enum WpcomCommands {
    /// Site listing
    Sites {
        #[command(subcommand)]
        command: WpcomSitesCommands,
    },
    /// Single site details
    Site {
        #[command(subcommand)]
        command: WpcomSiteCommands,
    },
    /// Blog stickers
    Stickers {
        #[command(subcommand)]
        command: StickerCommands,
    },
    /// Plugin reports
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },
    /// Show (or wait for) the Atomic transfer status
    TransferStatus {
        site: SiteRef,
        /// Poll until the transfer completes
        #[arg(long)]
        wait: bool,
    },
    /// Remove a user from every site they belong to
    RemoveUser {
        #[arg(long)]
        email: String,
        /// Concurrent site lookups
        #[arg(long, default_value_t = team51_core::fanout::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Also remove matching Pressable collaborators
        #[arg(long)]
        include_pressable: bool,
    },
}

#[derive(Subcommand)]
enum WpcomSitesCommands {
    /// List all sites the token can access
    List {
        #[arg(long, default_value = "table")]
        format: OutputFormat,
        /// Also write the list to wpcom-sites.<csv|json>
        #[arg(long)]
        export: Option<ExportFormat>,
    },
}

#[derive(Subcommand)]
enum WpcomSiteCommands {
    /// Show site details
    Info { site: SiteRef },
}

#[derive(Subcommand)]
enum StickerCommands {
    List { site: SiteRef },
    Add { site: SiteRef, sticker: String },
    Remove { site: SiteRef, sticker: String },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Plugins of one site, or usage counts across all sites
    Summary {
        #[arg(long)]
        site: Option<SiteRef>,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
        /// Also write the report to plugin-summary.<csv|json>
        #[arg(long)]
        export: Option<ExportFormat>,
    },
}

#[derive(Subcommand)]
enum JetpackCommands {
    /// Jetpack modules
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },
}

#[derive(Subcommand)]
enum ModuleCommands {
    Enable { site: SiteRef, module: String },
    Disable { site: SiteRef, module: String },
}

#[derive(Subcommand)]
enum DeployHqCommands {
    /// Project listing
    Projects {
        #[command(subcommand)]
        command: ProjectsCommands,
    },
    /// Project creation
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Deployment servers
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Deploy the latest revision of a branch
    Deploy {
        project: String,
        /// Server name
        #[arg(long)]
        server: String,
        #[arg(long)]
        branch: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectsCommands {
    List {
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project connected to a GitHub repository
    Create {
        name: String,
        /// Repository name in the organisation, or a full Git URL
        #[arg(long)]
        repo: String,
        #[arg(long)]
        branch: Option<String>,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Add a Pressable site as an SFTP server
    Add {
        project: String,
        #[arg(long)]
        site: SiteRef,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum FrontCommands {
    /// Inbox listing
    Inboxes {
        #[command(subcommand)]
        command: InboxCommands,
    },
    /// Conversation exports
    Conversations {
        #[command(subcommand)]
        command: ConversationCommands,
    },
}

#[derive(Subcommand)]
enum InboxCommands {
    List,
}

#[derive(Subcommand)]
enum ConversationCommands {
    /// Export every conversation of an inbox (ID or name)
    Export {
        inbox: String,
        #[arg(long, default_value = "csv")]
        export: ExportFormat,
    },
}

#[derive(Subcommand)]
enum FlickrCommands {
    /// Photo exports
    Photos {
        #[command(subcommand)]
        command: PhotoCommands,
    },
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// Export a user's public photo URLs
    Export {
        username: String,
        #[arg(long, default_value = "csv")]
        export: ExportFormat,
        #[arg(long)]
        max_pages: Option<u32>,
    },
}

#[derive(Subcommand)]
enum SiteCommands {
    /// Create repository, Pressable site and DeployHQ project for production
    CreateProduction {
        name: String,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        php_version: Option<String>,
        #[arg(long)]
        datacenter: Option<String>,
        /// Existing repository to use instead of creating one named after the site
        #[arg(long)]
        repo: Option<String>,
    },
    /// Clone a production site into a development site
    CreateDevelopment {
        site: SiteRef,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        repo: Option<String>,
    },
    /// Check whether the site can deliver email
    CheckEmail { site: SiteRef },
}

/// Default log filter for a `-v` count.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    match run(cli).await {
        Ok(CommandOutcome::Success(message)) => println!("{}", message),
        Ok(CommandOutcome::Empty(reason)) => println!("{}", reason.yellow()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<CommandOutcome> {
    let ctx = Context::load(cli.config, cli.contractor)?;

    match cli.command {
        Commands::Github { command } => match command {
            GithubCommands::Repos {
                command: GithubReposCommands::List { topic, format },
            } => commands::github::list_repos(&ctx, topic.as_deref(), format).await,
            GithubCommands::Repo {
                command:
                    GithubRepoCommands::Create {
                        name,
                        template,
                        description,
                        public,
                    },
            } => commands::github::create_repo(&ctx, &name, template.as_deref(), description, public).await,
            GithubCommands::Branch {
                command: GithubBranchCommands::Create { repo, branch, from },
            } => commands::github::create_branch(&ctx, &repo, &branch, from.as_deref()).await,
            GithubCommands::Secret {
                command: GithubSecretCommands::Set { repo, name, value },
            } => commands::github::set_secret(&ctx, &repo, &name, &value).await,
        },
        Commands::Pressable { command } => match command {
            PressableCommands::Sites {
                command: PressableSitesCommands::List { format, export },
            } => commands::pressable::list_sites(&ctx, format, export).await,
            PressableCommands::Site {
                command: PressableSiteCommands::Info { site },
            } => commands::pressable::site_info(&ctx, &site).await,
            PressableCommands::Collaborators { command } => match command {
                CollaboratorCommands::List { site } => commands::pressable::list_collaborators(&ctx, &site).await,
                CollaboratorCommands::Add { site, email } => {
                    commands::pressable::add_collaborator(&ctx, &site, &email).await
                }
                CollaboratorCommands::Remove { site, email } => {
                    commands::pressable::remove_collaborator(&ctx, &site, &email).await
                }
            },
            PressableCommands::Sftp {
                command: SftpCommands::Owner { site },
            } => commands::pressable::sftp_owner(&ctx, &site).await,
            PressableCommands::PhpErrors {
                site,
                limit,
                severity,
                format,
            } => commands::pressable::php_errors(&ctx, &site, limit, severity.as_ref(), format).await,
            PressableCommands::Cache {
                command: CacheCommands::Purge { site },
            } => commands::pressable::purge_cache(&ctx, &site).await,
            PressableCommands::Wp { site, args } => commands::pressable::wp(&ctx, &site, &args).await,
            PressableCommands::RotateSftpPassword { site, user } => {
                commands::rotate::rotate_sftp_command(&ctx, &site, user.as_deref()).await
            }
            PressableCommands::RotateWpPassword { site, user } => {
                commands::rotate::rotate_wp_command(&ctx, &site, user.as_deref()).await
            }
            PressableCommands::RotatePasswords { site, all_sites } => match site {
                Some(site) if !all_sites => commands::rotate::rotate_passwords_command(&ctx, &site).await,
                _ => commands::rotate::rotate_all_sites(&ctx).await,
            },
        },
        Commands::Wpcom { command } => match command {
            WpcomCommands::Sites {
                command: WpcomSitesCommands::List { format, export },
            } => commands::wpcom::list_sites(&ctx, format, export).await,
            WpcomCommands::Site {
                command: WpcomSiteCommands::Info { site },
            } => commands::wpcom::site_info(&ctx, &site).await,
            WpcomCommands::Stickers { command } => match command {
                StickerCommands::List { site } => commands::wpcom::list_stickers(&ctx, &site).await,
                StickerCommands::Add { site, sticker } => commands::wpcom::add_sticker(&ctx, &site, &sticker).await,
                StickerCommands::Remove { site, sticker } => {
                    commands::wpcom::remove_sticker(&ctx, &site, &sticker).await
                }
            },
            WpcomCommands::Plugins {
                command: PluginCommands::Summary { site, format, export },
            } => commands::wpcom::plugin_summary(&ctx, site.as_ref(), format, export).await,
            WpcomCommands::TransferStatus { site, wait } => {
                commands::wpcom::transfer_status(&ctx, &site, wait).await
            }
            WpcomCommands::RemoveUser {
                email,
                concurrency,
                yes,
                include_pressable,
            } => commands::users::remove_user(&ctx, &email, concurrency, yes, include_pressable).await,
        },
        Commands::Jetpack {
            command: JetpackCommands::Module { command },
        } => match command {
            ModuleCommands::Enable { site, module } => commands::jetpack::set_module(&ctx, &site, &module, true).await,
            ModuleCommands::Disable { site, module } => {
                commands::jetpack::set_module(&ctx, &site, &module, false).await
            }
        },
        Commands::Deployhq { command } => match command {
            DeployHqCommands::Projects {
                command: ProjectsCommands::List { format },
            } => commands::deployhq::list_projects(&ctx, format).await,
            DeployHqCommands::Project {
                command: ProjectCommands::Create { name, repo, branch },
            } => commands::deployhq::create_project(&ctx, &name, &repo, branch.as_deref()).await,
            DeployHqCommands::Server {
                command:
                    ServerCommands::Add {
                        project,
                        site,
                        branch,
                        name,
                    },
            } => commands::deployhq::add_server(&ctx, &project, &site, branch.as_deref(), name.as_deref()).await,
            DeployHqCommands::Deploy { project, server, branch } => {
                commands::deployhq::deploy(&ctx, &project, &server, branch.as_deref()).await
            }
        },
        Commands::Front { command } => match command {
            FrontCommands::Inboxes {
                command: InboxCommands::List,
            } => commands::front::list_inboxes(&ctx).await,
            FrontCommands::Conversations {
                command: ConversationCommands::Export { inbox, export },
            } => commands::front::export_conversations(&ctx, &inbox, export).await,
        },
        Commands::Flickr {
            command: FlickrCommands::Photos {
                command: PhotoCommands::Export {
                    username,
                    export,
                    max_pages,
                },
            },
        } => commands::flickr::export_photos(&ctx, &username, export, max_pages).await,
        Commands::Site { command } => match command {
            SiteCommands::CreateProduction {
                name,
                template,
                php_version,
                datacenter,
                repo,
            } => {
                commands::site::create_production(
                    &ctx,
                    commands::site::ProductionOptions {
                        name,
                        template,
                        php_version,
                        datacenter,
                        repo,
                    },
                )
                .await
            }
            SiteCommands::CreateDevelopment { site, branch, repo } => {
                commands::site::create_development(&ctx, &site, branch.as_deref(), repo.as_deref()).await
            }
            SiteCommands::CheckEmail { site } => commands::site::check_email(&ctx, &site).await,
        },
        Commands::SelfUpdate { force } => commands::self_update::self_update(&ctx, force).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(0), "warn");
        assert_eq!(default_filter(1), "info");
        assert_eq!(default_filter(2), "debug");
        assert_eq!(default_filter(5), "debug");
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["team51", "wpcom", "sites", "list", "--format", "md", "-vv", "--no-color"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_color);
        match cli.command {
            Commands::Wpcom {
                command:
                    WpcomCommands::Sites {
                        command: WpcomSitesCommands::List { format, export },
                    },
            } => {
                assert_eq!(format, OutputFormat::Markdown);
                assert_eq!(export, None);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_site_ref_arguments() {
        let cli = Cli::try_parse_from(["team51", "pressable", "cache", "purge", "https://Example.com/"]).unwrap();
        match cli.command {
            Commands::Pressable {
                command:
                    PressableCommands::Cache {
                        command: CacheCommands::Purge { site },
                    },
            } => assert_eq!(site, SiteRef::Domain("example.com".to_string())),
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_rotate_passwords_requires_site_or_all_sites() {
        assert!(Cli::try_parse_from(["team51", "pressable", "rotate-passwords"]).is_err());
        assert!(Cli::try_parse_from(["team51", "pressable", "rotate-passwords", "123", "--all-sites"]).is_err());
        assert!(Cli::try_parse_from(["team51", "pressable", "rotate-passwords", "--all-sites"]).is_ok());
        assert!(Cli::try_parse_from(["team51", "pressable", "rotate-passwords", "123"]).is_ok());
    }

    #[test]
    fn test_wp_passes_trailing_arguments() {
        let cli = Cli::try_parse_from(["team51", "pressable", "wp", "123", "--", "plugin", "list", "--status=active"])
            .unwrap();
        match cli.command {
            Commands::Pressable {
                command: PressableCommands::Wp { site, args },
            } => {
                assert_eq!(site, SiteRef::Id(123));
                assert_eq!(args, vec!["plugin", "list", "--status=active"]);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        assert!(Cli::try_parse_from(["team51", "github", "repos", "list", "--format", "yaml"]).is_err());
    }
}
