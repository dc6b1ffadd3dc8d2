//! Single-workbook export pipeline: download, zip, upload to Nexus, open a
//! GitHub pull request.
//!
//! Each step is one blocking remote call. The first failure aborts the
//! pipeline; completed side effects are not rolled back.

mod archive;
mod github;
mod nexus;

pub use archive::zip_single_file;
pub use github::GithubClient;
pub use nexus::NexusUploader;

use crate::client::TableauClient;
use crate::storage::DownloadDir;
use crate::tableau::{projects, workbooks};
use eyre::Result;

/// Project LUIDs are 36-character UUIDs; anything longer than this is
/// treated as an ID rather than a display name.
const LUID_LENGTH_HINT: usize = 20;

/// Drives one workbook from the source server to Nexus and GitHub.
pub struct ExportPipeline {
    source: TableauClient,
    nexus: NexusUploader,
    github: GithubClient,
    include_extract: bool,
}

impl ExportPipeline {
    pub fn new(
        source: TableauClient,
        nexus: NexusUploader,
        github: GithubClient,
        include_extract: bool,
    ) -> Self {
        Self {
            source,
            nexus,
            github,
            include_extract,
        }
    }

    pub fn source(&self) -> &TableauClient {
        &self.source
    }

    /// Run the full pipeline for one workbook. Returns the pull request URL.
    pub async fn run(
        &self,
        workbook_name: &str,
        project: &str,
        downloads: &DownloadDir,
    ) -> Result<String> {
        let project_id = self.resolve_project(project).await?;

        let workbook =
            workbooks::find_workbook_by_name(&self.source, workbook_name, Some(project_id.as_str()))
                .await
                .ok_or_else(|| {
                    eyre::eyre!(
                        "Workbook '{}' not found in project '{}'",
                        workbook_name,
                        project
                    )
                })?;

        log::info!("Downloading workbook '{}' (ID: {})...", workbook.name, workbook.id);
        let stem = workbooks::safe_file_stem(&workbook.name);
        let downloaded = workbooks::download_workbook(
            &self.source,
            &workbook.id,
            downloads.path(),
            &stem,
            self.include_extract,
        )
        .await?;

        let archive = zip_single_file(&downloaded, None)?;
        self.nexus.upload(&archive).await?;

        let pr_url = self.github.push_workbook(&downloaded).await?;
        log::info!("SUCCESS: GitHub PR created at {}", pr_url);
        Ok(pr_url)
    }

    /// Resolve a project argument that may be a LUID or a display name.
    async fn resolve_project(&self, project: &str) -> Result<String> {
        if looks_like_luid(project) {
            return Ok(project.to_string());
        }
        projects::find_project_by_name(&self.source, project)
            .await?
            .map(|p| p.id)
            .ok_or_else(|| eyre::eyre!("Project '{}' not found on Tableau server", project))
    }
}

fn looks_like_luid(value: &str) -> bool {
    value.len() > LUID_LENGTH_HINT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_luid() {
        assert!(looks_like_luid("5f2a9b10-9a1c-4b6e-8a2f-0b8e44d2c111"));
        assert!(!looks_like_luid("Finance"));
        assert!(!looks_like_luid("Quarterly Reports"));
    }
}
