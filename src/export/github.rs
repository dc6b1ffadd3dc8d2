//! GitHub branch, commit, and pull-request creation over the REST API.

use base64::Engine;
use chrono::Utc;
use eyre::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

const API_BASE: &str = "https://api.github.com";

/// Client for one GitHub repository, token-authenticated.
pub struct GithubClient {
    client: Client,
    repo: String,
    base_branch: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    html_url: String,
}

impl GithubClient {
    /// Build a client for `owner/repo` with the token preconfigured.
    pub fn try_new(
        repo: impl Into<String>,
        token: &str,
        base_branch: impl Into<String>,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token).parse()?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            "application/vnd.github+json".parse()?,
        );
        // GitHub rejects requests without a User-Agent
        headers.insert(
            reqwest::header::USER_AGENT,
            concat!("tableau-workbook-migrator/", env!("CARGO_PKG_VERSION")).parse()?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .with_context(|| "Failed to build GitHub HTTP client")?;

        Ok(Self {
            client,
            repo: repo.into(),
            base_branch: base_branch.into(),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/repos/{}/{}", API_BASE, self.repo, suffix)
    }

    /// Head commit SHA of the base branch.
    async fn base_branch_sha(&self) -> Result<String> {
        let url = self.endpoint(&format!("branches/{}", self.base_branch));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch branch '{}'", self.base_branch))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!(
                "Failed to resolve base branch '{}' ({}): {}",
                self.base_branch,
                status,
                body
            );
        }

        let branch: BranchResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse branch response")?;
        Ok(branch.commit.sha)
    }

    /// Create `refs/heads/{branch}` at the given commit.
    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let body = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        let response = self
            .client
            .post(self.endpoint("git/refs"))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to create branch '{}'", branch))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to create branch '{}' ({}): {}", branch, status, body);
        }
        Ok(())
    }

    /// Commit file content onto a branch via the contents API.
    async fn commit_file(
        &self,
        branch: &str,
        path_in_repo: &str,
        message: &str,
        content: &[u8],
    ) -> Result<()> {
        let body = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "branch": branch,
        });
        let response = self
            .client
            .put(self.endpoint(&format!("contents/{}", path_in_repo)))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to commit '{}'", path_in_repo))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to commit '{}' ({}): {}", path_in_repo, status, body);
        }
        Ok(())
    }

    /// Open a pull request and return its html_url.
    async fn open_pull_request(&self, title: &str, body_text: &str, head: &str) -> Result<String> {
        let body = json!({
            "title": title,
            "body": body_text,
            "head": head,
            "base": self.base_branch,
        });
        let response = self
            .client
            .post(self.endpoint("pulls"))
            .json(&body)
            .send()
            .await
            .with_context(|| "Failed to create pull request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to create pull request ({}): {}", status, body);
        }

        let pr: PullRequestResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse pull request response")?;
        Ok(pr.html_url)
    }

    /// Create a timestamped branch off the base branch, commit the workbook
    /// file at the repository root, and open a pull request.
    ///
    /// Returns the pull request URL.
    pub async fn push_workbook(&self, file: &Path) -> Result<String> {
        let filename = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| eyre::eyre!("File has no usable name: {}", file.display()))?;
        let stem = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(filename);

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let branch = branch_name(stem, &timestamp);

        let sha = self.base_branch_sha().await?;
        self.create_branch(&branch, &sha).await?;
        log::info!("Created branch {}", branch);

        let content = std::fs::read(file)
            .with_context(|| format!("Failed to read workbook file: {}", file.display()))?;
        let message = format!("Add Tableau workbook {}", filename);
        self.commit_file(&branch, filename, &message, &content)
            .await?;
        log::info!("Committed workbook to {}", branch);

        let pr_url = self
            .open_pull_request(&message, "Automated Tableau workbook upload.", &branch)
            .await?;
        log::info!("PR created: {}", pr_url);
        Ok(pr_url)
    }
}

fn branch_name(stem: &str, timestamp: &str) -> String {
    format!("tableau-wb-{}-{}", stem, timestamp)
}
