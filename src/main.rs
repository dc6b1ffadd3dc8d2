use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use tableau_workbook_migrator::cli::{self, ConnectionOpts, ProjectSelection, WorkbookRef};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Tableau Workbook Migrator: copy workbooks, projects, and sites between Tableau servers, or export a workbook to Nexus and GitHub
#[derive(Parser)]
#[command(name = "tabmig", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    connection: ConnectionOpts,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available sites on the source server
    ListSites,

    /// List available projects on the source site
    ListProjects,

    /// List available workbooks on the source site
    ListWorkbooks {
        /// Filter by source project ID
        #[arg(long)]
        project_id: Option<String>,

        /// Filter by source project name (alternative to --project-id)
        #[arg(long, conflicts_with = "project_id")]
        project_name: Option<String>,
    },

    /// Migrate one workbook by ID to the target server
    MigrateWorkbook {
        /// ID of the workbook to migrate
        workbook_id: String,

        #[command(flatten)]
        projects: ProjectSelection,
    },

    /// Migrate one workbook by name to the target server
    MigrateWorkbookByName {
        /// Name of the workbook to migrate
        workbook_name: String,

        #[command(flatten)]
        projects: ProjectSelection,
    },

    /// Migrate every workbook in a project to the target server
    MigrateProject {
        /// ID of the project to migrate
        project_id: String,

        /// Target project ID (found or created from the source name when omitted)
        #[arg(long)]
        target_project_id: Option<String>,
    },

    /// Migrate every project and workbook on the source site
    MigrateSite,

    /// Export one workbook: zip it, upload to Nexus, and open a GitHub PR
    Export {
        /// Name of the workbook to download
        #[arg(long)]
        workbook_name: String,

        /// Source project name or ID
        #[arg(long)]
        source_project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenv {
        Ok(_) => log::debug!("Loaded environment variables from {}", cli.env),
        Err(_) => log::debug!("Environment file {} not found, using process environment", cli.env),
    }

    match cli.command {
        Commands::ListSites => {
            cli::list_sites(&cli.connection).await?;
        }
        Commands::ListProjects => {
            cli::list_projects(&cli.connection).await?;
        }
        Commands::ListWorkbooks {
            project_id,
            project_name,
        } => {
            cli::list_workbooks(&cli.connection, project_id, project_name).await?;
        }
        Commands::MigrateWorkbook {
            workbook_id,
            projects,
        } => {
            log::info!("Migrating workbook {}", workbook_id.bright_black());
            cli::migrate_workbook(&cli.connection, WorkbookRef::Id(workbook_id), &projects)
                .await?;
        }
        Commands::MigrateWorkbookByName {
            workbook_name,
            projects,
        } => {
            log::info!("Migrating workbook {}", workbook_name.cyan());
            cli::migrate_workbook(&cli.connection, WorkbookRef::Name(workbook_name), &projects)
                .await?;
        }
        Commands::MigrateProject {
            project_id,
            target_project_id,
        } => {
            log::info!("Migrating project {}", project_id.bright_black());
            let count =
                cli::migrate_project(&cli.connection, &project_id, target_project_id).await?;
            log::info!("✓ Migrated {} workbook(s)", count);
        }
        Commands::MigrateSite => {
            log::info!("Migrating entire site");
            cli::migrate_site(&cli.connection).await?;
        }
        Commands::Export {
            workbook_name,
            source_project,
        } => {
            log::info!(
                "Exporting workbook {} from project {}",
                workbook_name.cyan(),
                source_project.bright_black()
            );
            let pr_url =
                cli::export_workbook(&cli.connection, &workbook_name, &source_project).await?;
            log::info!("✓ Export complete, pull request: {}", pr_url);
        }
    }

    Ok(())
}
