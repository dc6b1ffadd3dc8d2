//! CLI helper functions
//!
//! Resolves configuration from flags and environment variables, connects
//! clients, and drives each subcommand.
//!
//! Expected environment variables (all of them fallbacks for the matching
//! flags, except the Nexus/GitHub group which is environment-only):
//! - TABLEAU_SOURCE_SERVER / TABLEAU_TARGET_SERVER
//! - TABLEAU_SOURCE_SITE / TABLEAU_TARGET_SITE
//! - TABLEAU_SOURCE_TOKEN_NAME / TABLEAU_SOURCE_TOKEN_VALUE
//! - TABLEAU_SOURCE_USERNAME / TABLEAU_SOURCE_PASSWORD
//! - TABLEAU_TARGET_TOKEN_NAME / TABLEAU_TARGET_TOKEN_VALUE
//! - TABLEAU_TARGET_USERNAME / TABLEAU_TARGET_PASSWORD
//! - TABLEAU_API_VERSION
//! - NEXUS_URL / NEXUS_USERNAME / NEXUS_PASSWORD
//! - GITHUB_TOKEN / GITHUB_REPO / GITHUB_BASE_BRANCH (default: main)

use crate::client::{Auth, TableauClient};
use crate::export::{ExportPipeline, GithubClient, NexusUploader};
use crate::migrate::Migrator;
use crate::storage::DownloadDir;
use crate::tableau::{projects, sites, workbooks};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use url::Url;

/// Server and credential flags shared by every subcommand.
///
/// Each flag falls back to its environment variable when omitted.
#[derive(clap::Args, Clone)]
pub struct ConnectionOpts {
    /// Source Tableau server URL (e.g. https://tableau.example.com)
    #[arg(long, global = true)]
    pub source_server: Option<String>,

    /// Target Tableau server URL
    #[arg(long, global = true)]
    pub target_server: Option<String>,

    /// Source site contentUrl (omit for the default site)
    #[arg(long, global = true)]
    pub source_site: Option<String>,

    /// Target site contentUrl (omit for the default site)
    #[arg(long, global = true)]
    pub target_site: Option<String>,

    /// Pin a REST API version (e.g. 3.4) instead of auto-detecting
    #[arg(long, global = true)]
    pub api_version: Option<String>,

    /// Disable SSL certificate verification (insecure, for self-signed certs)
    #[arg(long, global = true)]
    pub no_ssl_verify: bool,

    /// Directory for workbook downloads; kept after the run when given
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// Include data extracts when downloading workbooks
    #[arg(long, global = true)]
    pub include_extract: bool,

    /// Skip data source connections when publishing
    #[arg(long, global = true)]
    pub skip_data_sources: bool,

    /// Name of a personal access token for the source server
    #[arg(long, global = true)]
    pub source_token_name: Option<String>,

    /// Value of a personal access token for the source server
    #[arg(long, global = true)]
    pub source_token_value: Option<String>,

    /// Username for the source server
    #[arg(long, global = true)]
    pub source_username: Option<String>,

    /// Password for the source server
    #[arg(long, global = true)]
    pub source_password: Option<String>,

    /// Name of a personal access token for the target server
    #[arg(long, global = true)]
    pub target_token_name: Option<String>,

    /// Value of a personal access token for the target server
    #[arg(long, global = true)]
    pub target_token_value: Option<String>,

    /// Username for the target server
    #[arg(long, global = true)]
    pub target_username: Option<String>,

    /// Password for the target server
    #[arg(long, global = true)]
    pub target_password: Option<String>,
}

/// Source or target project selection for workbook migration.
#[derive(clap::Args, Clone)]
pub struct ProjectSelection {
    /// Source project ID
    #[arg(long)]
    pub source_project_id: Option<String>,

    /// Source project name (alternative to --source-project-id)
    #[arg(long)]
    pub source_project_name: Option<String>,

    /// Target project ID
    #[arg(long)]
    pub target_project_id: Option<String>,

    /// Target project name (alternative to --target-project-id)
    #[arg(long)]
    pub target_project_name: Option<String>,
}

/// A workbook addressed by ID or by name.
pub enum WorkbookRef {
    Id(String),
    Name(String),
}

/// Connection settings for one Tableau server.
#[derive(Debug)]
pub struct ServerConfig {
    pub server: String,
    pub site: String,
    pub auth: Auth,
    pub api_version: Option<String>,
    pub verify_ssl: bool,
}

impl ServerConfig {
    /// Sign in and return a session-bound client.
    pub async fn connect(&self) -> Result<TableauClient> {
        let url = Url::parse(&self.server)
            .with_context(|| format!("Invalid server URL: {}", self.server))?;
        TableauClient::sign_in(
            url,
            &self.auth,
            &self.site,
            self.api_version.clone(),
            self.verify_ssl,
        )
        .await
    }
}

fn env_or(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| std::env::var(var).ok())
}

impl ConnectionOpts {
    /// Resolve the source server configuration from flags and environment.
    pub fn source_config(&self) -> Result<ServerConfig> {
        let server = env_or(self.source_server.clone(), "TABLEAU_SOURCE_SERVER").ok_or_else(
            || {
                eyre::eyre!(
                    "Source server must be provided via --source-server or TABLEAU_SOURCE_SERVER"
                )
            },
        )?;
        let site = env_or(self.source_site.clone(), "TABLEAU_SOURCE_SITE").unwrap_or_default();
        let auth = Auth::resolve(
            env_or(self.source_token_name.clone(), "TABLEAU_SOURCE_TOKEN_NAME"),
            env_or(self.source_token_value.clone(), "TABLEAU_SOURCE_TOKEN_VALUE"),
            env_or(self.source_username.clone(), "TABLEAU_SOURCE_USERNAME"),
            env_or(self.source_password.clone(), "TABLEAU_SOURCE_PASSWORD"),
        )
        .with_context(|| "Source authentication must be provided via flags or environment")?;

        Ok(ServerConfig {
            server,
            site,
            auth,
            api_version: env_or(self.api_version.clone(), "TABLEAU_API_VERSION"),
            verify_ssl: !self.no_ssl_verify,
        })
    }

    /// Resolve the target server configuration from flags and environment.
    pub fn target_config(&self) -> Result<ServerConfig> {
        let server = env_or(self.target_server.clone(), "TABLEAU_TARGET_SERVER").ok_or_else(
            || {
                eyre::eyre!(
                    "Target server must be provided via --target-server or TABLEAU_TARGET_SERVER"
                )
            },
        )?;
        let site = env_or(self.target_site.clone(), "TABLEAU_TARGET_SITE").unwrap_or_default();
        let auth = Auth::resolve(
            env_or(self.target_token_name.clone(), "TABLEAU_TARGET_TOKEN_NAME"),
            env_or(self.target_token_value.clone(), "TABLEAU_TARGET_TOKEN_VALUE"),
            env_or(self.target_username.clone(), "TABLEAU_TARGET_USERNAME"),
            env_or(self.target_password.clone(), "TABLEAU_TARGET_PASSWORD"),
        )
        .with_context(|| "Target authentication must be provided via flags or environment")?;

        Ok(ServerConfig {
            server,
            site,
            auth,
            api_version: env_or(self.api_version.clone(), "TABLEAU_API_VERSION"),
            verify_ssl: !self.no_ssl_verify,
        })
    }

    /// Open the download directory this invocation will use.
    pub fn open_download_dir(&self) -> Result<DownloadDir> {
        DownloadDir::new(self.download_dir.clone())
    }
}

fn require_env(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("{} environment variable not set", var))
}

/// Build the Nexus uploader from NEXUS_* environment variables.
pub fn load_nexus_uploader() -> Result<NexusUploader> {
    let url = require_env("NEXUS_URL")?;
    let username = require_env("NEXUS_USERNAME")?;
    let password = require_env("NEXUS_PASSWORD")?;
    NexusUploader::try_new(url, &username, &password)
}

/// Build the GitHub client from GITHUB_* environment variables.
pub fn load_github_client() -> Result<GithubClient> {
    let token = require_env("GITHUB_TOKEN")?;
    let repo = require_env("GITHUB_REPO")?;
    let base_branch =
        std::env::var("GITHUB_BASE_BRANCH").unwrap_or_else(|_| "main".to_string());
    GithubClient::try_new(repo, &token, base_branch)
}

async fn sign_out_quietly(client: &TableauClient) {
    if let Err(error) = client.sign_out().await {
        log::warn!("Error signing out: {}", error);
    }
}

/// List every site on the source server.
pub async fn list_sites(opts: &ConnectionOpts) -> Result<usize> {
    let client = opts.source_config()?.connect().await?;
    let result = sites::list_sites(&client).await;
    sign_out_quietly(&client).await;
    let sites = result?;

    log::info!("Found {} sites on source server", sites.len());
    println!("\nAvailable sites on source server:");
    for site in &sites {
        println!(
            "  - {} (ID: {}, URL: {})",
            site.name,
            site.id.bright_black(),
            site.content_url
        );
    }
    Ok(sites.len())
}

/// List every project on the source site.
pub async fn list_projects(opts: &ConnectionOpts) -> Result<usize> {
    let client = opts.source_config()?.connect().await?;
    let result = projects::list_projects(&client).await;
    sign_out_quietly(&client).await;
    let projects = result?;

    log::info!("Found {} projects on source site", projects.len());
    println!("\nAvailable projects on source site:");
    for project in &projects {
        let parent = project
            .parent_project_id
            .as_deref()
            .map(|id| format!(" (Parent ID: {})", id))
            .unwrap_or_default();
        println!(
            "  - {} (ID: {}){}",
            project.name,
            project.id.bright_black(),
            parent
        );
    }
    Ok(projects.len())
}

/// List workbooks on the source site, optionally filtered to one project
/// addressed by ID or name.
pub async fn list_workbooks(
    opts: &ConnectionOpts,
    project_id: Option<String>,
    project_name: Option<String>,
) -> Result<usize> {
    let client = opts.source_config()?.connect().await?;

    let result = async {
        let project_id = resolve_project_selector(&client, project_id, project_name).await?;
        Ok::<_, eyre::Report>(workbooks::list_workbooks(&client, project_id.as_deref()).await)
    }
    .await;
    sign_out_quietly(&client).await;
    let workbooks = result?;

    println!("\nAvailable workbooks:");
    for workbook in &workbooks {
        println!(
            "  - {} (ID: {}, Project ID: {})",
            workbook.name,
            workbook.id.bright_black(),
            workbook.project_id().unwrap_or("unknown")
        );
    }
    Ok(workbooks.len())
}

async fn resolve_project_selector(
    client: &TableauClient,
    project_id: Option<String>,
    project_name: Option<String>,
) -> Result<Option<String>> {
    if let Some(id) = project_id {
        return Ok(Some(id));
    }
    match project_name {
        Some(name) => {
            let project = projects::find_project_by_name(client, &name)
                .await?
                .ok_or_else(|| eyre::eyre!("No project found with name: {}", name))?;
            Ok(Some(project.id))
        }
        None => Ok(None),
    }
}

/// Migrate one workbook, addressed by ID or name, to the target server.
pub async fn migrate_workbook(
    opts: &ConnectionOpts,
    workbook: WorkbookRef,
    selection: &ProjectSelection,
) -> Result<()> {
    if selection.source_project_id.is_none() && selection.source_project_name.is_none() {
        eyre::bail!(
            "Either --source-project-id or --source-project-name is required when migrating a workbook"
        );
    }

    let source = opts.source_config()?.connect().await?;
    let target = opts.target_config()?.connect().await?;

    let source_project_id = match &selection.source_project_id {
        Some(id) => id.clone(),
        None => {
            // presence checked above
            let name = selection.source_project_name.as_deref().unwrap_or_default();
            projects::find_project_by_name(&source, name)
                .await?
                .ok_or_else(|| eyre::eyre!("No project found with name: {}", name))?
                .id
        }
    };

    let workbook_id = match workbook {
        WorkbookRef::Id(id) => id,
        WorkbookRef::Name(name) => {
            log::info!("Looking for workbook with name: {}", name);
            workbooks::find_workbook_by_name(&source, &name, Some(source_project_id.as_str()))
                .await
                .ok_or_else(|| eyre::eyre!("Could not find workbook with name: {}", name))?
                .id
        }
    };

    let target_project_id = match &selection.target_project_id {
        Some(id) => Some(id.clone()),
        None => match &selection.target_project_name {
            Some(name) => match projects::find_project_by_name(&target, name).await? {
                Some(project) => Some(project.id),
                None => {
                    log::info!("No target project found with name: {}. Will create it.", name);
                    None
                }
            },
            None => None,
        },
    };

    let target_project_id = match target_project_id {
        Some(id) => id,
        None => {
            // fall back to the explicit target name, or mirror the source
            // project's name
            let name = match &selection.target_project_name {
                Some(name) => name.clone(),
                None => projects::get_project(&source, &source_project_id).await?.name,
            };
            projects::ensure_project_exists(&target, &name, None).await?.id
        }
    };

    let downloads = opts.open_download_dir()?;
    let migrator = Migrator::new(
        source,
        target,
        downloads,
        opts.include_extract,
        opts.skip_data_sources,
    );
    let result = migrator
        .migrate_workbook(&workbook_id, Some(source_project_id.as_str()), &target_project_id)
        .await;
    migrator.sign_out().await;
    result
}

/// Migrate every workbook in one project to the target server.
pub async fn migrate_project(
    opts: &ConnectionOpts,
    project_id: &str,
    target_project_id: Option<String>,
) -> Result<usize> {
    let source = opts.source_config()?.connect().await?;
    let target = opts.target_config()?.connect().await?;
    let downloads = opts.open_download_dir()?;

    let migrator = Migrator::new(
        source,
        target,
        downloads,
        opts.include_extract,
        opts.skip_data_sources,
    );
    let result = migrator
        .migrate_project(project_id, target_project_id.as_deref())
        .await;
    migrator.sign_out().await;
    result
}

/// Migrate every project and workbook on the source site.
pub async fn migrate_site(opts: &ConnectionOpts) -> Result<()> {
    let source_config = opts.source_config()?;
    let target_config = opts.target_config()?;
    let source = source_config.connect().await?;
    let target = target_config.connect().await?;
    let downloads = opts.open_download_dir()?;

    let mut migrator = Migrator::new(
        source,
        target,
        downloads,
        opts.include_extract,
        opts.skip_data_sources,
    );
    let result = migrator
        .migrate_site(Some(source_config.site.as_str()), Some(target_config.site.as_str()))
        .await;
    migrator.sign_out().await;
    result
}

/// Export one workbook: download, zip, upload to Nexus, open a GitHub PR.
///
/// Returns the pull request URL.
pub async fn export_workbook(
    opts: &ConnectionOpts,
    workbook_name: &str,
    source_project: &str,
) -> Result<String> {
    // Validate the Nexus/GitHub environment before connecting anywhere
    let nexus = load_nexus_uploader()?;
    let github = load_github_client()?;

    let client = opts.source_config()?.connect().await?;
    let downloads = opts.open_download_dir()?;

    let pipeline = ExportPipeline::new(client, nexus, github, opts.include_extract);
    let result = pipeline.run(workbook_name, source_project, &downloads).await;
    sign_out_quietly(pipeline.source()).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn bare_opts() -> ConnectionOpts {
        ConnectionOpts {
            source_server: None,
            target_server: None,
            source_site: None,
            target_site: None,
            api_version: None,
            no_ssl_verify: false,
            download_dir: None,
            include_extract: false,
            skip_data_sources: false,
            source_token_name: None,
            source_token_value: None,
            source_username: None,
            source_password: None,
            target_token_name: None,
            target_token_value: None,
            target_username: None,
            target_password: None,
        }
    }

    fn clear_tableau_env() {
        for var in [
            "TABLEAU_SOURCE_SERVER",
            "TABLEAU_SOURCE_SITE",
            "TABLEAU_SOURCE_TOKEN_NAME",
            "TABLEAU_SOURCE_TOKEN_VALUE",
            "TABLEAU_SOURCE_USERNAME",
            "TABLEAU_SOURCE_PASSWORD",
            "TABLEAU_TARGET_SERVER",
            "TABLEAU_API_VERSION",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_source_config_from_flags() {
        clear_tableau_env();
        let mut opts = bare_opts();
        opts.source_server = Some("https://tableau.example.com".to_string());
        opts.source_site = Some("marketing".to_string());
        opts.source_token_name = Some("ci".to_string());
        opts.source_token_value = Some("secret".to_string());

        let config = opts.source_config().unwrap();
        assert_eq!(config.server, "https://tableau.example.com");
        assert_eq!(config.site, "marketing");
        assert!(config.verify_ssl);
        assert!(matches!(config.auth, Auth::PersonalAccessToken { .. }));
    }

    #[test]
    #[serial]
    fn test_source_config_from_env() {
        clear_tableau_env();
        unsafe {
            std::env::set_var("TABLEAU_SOURCE_SERVER", "https://env.example.com");
            std::env::set_var("TABLEAU_SOURCE_USERNAME", "admin");
            std::env::set_var("TABLEAU_SOURCE_PASSWORD", "hunter2");
            std::env::set_var("TABLEAU_API_VERSION", "3.4");
        }

        let config = bare_opts().source_config().unwrap();
        assert_eq!(config.server, "https://env.example.com");
        assert_eq!(config.site, "");
        assert_eq!(config.api_version.as_deref(), Some("3.4"));
        assert!(matches!(config.auth, Auth::Basic { .. }));

        clear_tableau_env();
    }

    #[test]
    #[serial]
    fn test_flags_override_env() {
        clear_tableau_env();
        unsafe {
            std::env::set_var("TABLEAU_SOURCE_SERVER", "https://env.example.com");
            std::env::set_var("TABLEAU_SOURCE_USERNAME", "admin");
            std::env::set_var("TABLEAU_SOURCE_PASSWORD", "hunter2");
        }

        let mut opts = bare_opts();
        opts.source_server = Some("https://flag.example.com".to_string());
        let config = opts.source_config().unwrap();
        assert_eq!(config.server, "https://flag.example.com");

        clear_tableau_env();
    }

    #[test]
    #[serial]
    fn test_source_config_missing_server() {
        clear_tableau_env();
        let result = bare_opts().source_config();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Source server must be provided")
        );
    }

    #[test]
    #[serial]
    fn test_source_config_missing_credentials() {
        clear_tableau_env();
        let mut opts = bare_opts();
        opts.source_server = Some("https://tableau.example.com".to_string());

        let result = opts.source_config();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_no_ssl_verify_flag() {
        clear_tableau_env();
        let mut opts = bare_opts();
        opts.source_server = Some("https://tableau.example.com".to_string());
        opts.source_token_name = Some("ci".to_string());
        opts.source_token_value = Some("secret".to_string());
        opts.no_ssl_verify = true;

        let config = opts.source_config().unwrap();
        assert!(!config.verify_ssl);
    }

    #[test]
    #[serial]
    fn test_require_env_missing() {
        unsafe { std::env::remove_var("NEXUS_URL") };
        let result = require_env("NEXUS_URL");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("NEXUS_URL"));
    }
}
