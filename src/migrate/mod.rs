//! Migration of workbooks, projects, and whole sites between servers.
//!
//! Migrations are copy operations: content is downloaded from the source
//! server and published to the target, leaving the source untouched.

mod hierarchy;

pub use hierarchy::{HierarchyPlan, plan_passes};

use crate::client::TableauClient;
use crate::storage::DownloadDir;
use crate::tableau::{projects, workbooks};
use eyre::{Context, Result};
use std::collections::HashMap;

/// Holds the two signed-in sessions and the download directory a migration
/// runs over.
pub struct Migrator {
    source: TableauClient,
    target: TableauClient,
    downloads: DownloadDir,
    include_extract: bool,
    skip_data_sources: bool,
}

impl Migrator {
    pub fn new(
        source: TableauClient,
        target: TableauClient,
        downloads: DownloadDir,
        include_extract: bool,
        skip_data_sources: bool,
    ) -> Self {
        Self {
            source,
            target,
            downloads,
            include_extract,
            skip_data_sources,
        }
    }

    pub fn source(&self) -> &TableauClient {
        &self.source
    }

    pub fn target(&self) -> &TableauClient {
        &self.target
    }

    /// Copy one workbook from the source site to a target project.
    ///
    /// The downloaded file is removed afterwards when the download directory
    /// is managed, whether or not the publish succeeded.
    pub async fn migrate_workbook(
        &self,
        workbook_id: &str,
        source_project_id: Option<&str>,
        target_project_id: &str,
    ) -> Result<()> {
        let workbook =
            workbooks::verify_workbook(&self.source, workbook_id, source_project_id).await?;

        let stem = workbooks::safe_file_stem(&format!("workbook_{}", workbook_id));
        let downloaded = workbooks::download_workbook(
            &self.source,
            workbook_id,
            self.downloads.path(),
            &stem,
            self.include_extract,
        )
        .await?;

        if self.skip_data_sources {
            log::info!("Publishing without data source connections (--skip-data-sources enabled)");
            log::warn!("The publish endpoint used here cannot skip data source connections.");
            log::warn!("The workbook will be published with its data connections intact.");
        }

        log::info!(
            "Uploading workbook {} to target project {}",
            workbook.name,
            target_project_id
        );
        let published = workbooks::publish_with_fallback(
            &self.target,
            &workbook.name,
            target_project_id,
            &downloaded,
        )
        .await;

        self.downloads.remove_file_if_managed(&downloaded);

        published.with_context(|| format!("Migration failed for workbook '{}'", workbook.name))?;
        log::info!("Successfully migrated workbook {}", workbook.name);
        Ok(())
    }

    /// Copy every workbook in a source project to a target project.
    ///
    /// Without an explicit target, a project matching the source's name and
    /// parent linkage is found or created on the target site.
    pub async fn migrate_project(
        &self,
        source_project_id: &str,
        target_project_id: Option<&str>,
    ) -> Result<usize> {
        let source_project = projects::get_project(&self.source, source_project_id).await?;

        let target_project_id = match target_project_id {
            Some(id) => id.to_string(),
            None => {
                let target = projects::ensure_project_exists(
                    &self.target,
                    &source_project.name,
                    source_project.parent_project_id.as_deref(),
                )
                .await?;
                target.id
            }
        };

        let project_workbooks =
            workbooks::list_workbooks(&self.source, Some(source_project_id)).await;

        for workbook in &project_workbooks {
            self.migrate_workbook(&workbook.id, Some(source_project_id), &target_project_id)
                .await?;
        }

        log::info!(
            "Successfully migrated {} workbooks from project {}",
            project_workbooks.len(),
            source_project.name
        );
        Ok(project_workbooks.len())
    }

    /// Copy every project and workbook from the source site to the target
    /// site, preserving the project tree.
    ///
    /// Projects whose parent never resolves are logged and skipped rather
    /// than aborting the rest of the site.
    pub async fn migrate_site(
        &mut self,
        source_site: Option<&str>,
        target_site: Option<&str>,
    ) -> Result<()> {
        if let Some(site) = source_site {
            if self.source.site_content_url() != site {
                self.source.switch_site(site).await?;
            }
        }
        if let Some(site) = target_site {
            if self.target.site_content_url() != site {
                self.target.switch_site(site).await?;
            }
        }

        let source_projects = projects::list_projects(&self.source).await?;
        log::info!("Found {} projects on source site", source_projects.len());

        let plan = plan_passes(&source_projects);
        if !plan.stalled.is_empty() {
            log::error!(
                "Unable to create project hierarchy for {} projects",
                plan.stalled.len()
            );
            for project in &plan.stalled {
                log::error!(
                    "  - {} (ID: {}, parent: {})",
                    project.name,
                    project.id,
                    project.parent_project_id.as_deref().unwrap_or("none")
                );
            }
        }

        // source project id -> target project id
        let mut project_map: HashMap<&str, String> = HashMap::new();
        for pass in &plan.passes {
            for project in pass {
                let target_parent_id = project
                    .parent_project_id
                    .as_deref()
                    .and_then(|parent| project_map.get(parent).cloned());
                let target = projects::ensure_project_exists(
                    &self.target,
                    &project.name,
                    target_parent_id.as_deref(),
                )
                .await?;
                project_map.insert(project.id.as_str(), target.id);
            }
        }

        for (source_project_id, target_project_id) in &project_map {
            self.migrate_project(source_project_id, Some(target_project_id.as_str()))
                .await?;
        }

        log::info!(
            "Successfully migrated site '{}' to '{}'",
            self.source.site_content_url(),
            self.target.site_content_url()
        );
        Ok(())
    }

    /// Sign out of both servers, warning on failure.
    pub async fn sign_out(&self) {
        if let Err(error) = self.source.sign_out().await {
            log::warn!("Error signing out of source server: {}", error);
        }
        if let Err(error) = self.target.sign_out().await {
            log::warn!("Error signing out of target server: {}", error);
        }
    }
}
