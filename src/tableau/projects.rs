//! Project listing, lookup, and creation.

use crate::client::TableauClient;
use crate::tableau::types::{Pagination, ProjectItem};
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::json;

const PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct ProjectsEnvelope {
    pagination: Pagination,
    #[serde(default)]
    projects: ProjectList,
}

#[derive(Deserialize, Default)]
struct ProjectList {
    #[serde(default)]
    project: Vec<ProjectItem>,
}

#[derive(Deserialize)]
struct ProjectEnvelope {
    project: ProjectItem,
}

/// List every project on the active site.
pub async fn list_projects(client: &TableauClient) -> Result<Vec<ProjectItem>> {
    fetch_projects(client, &[]).await
}

async fn fetch_projects(
    client: &TableauClient,
    extra_query: &[(&str, &str)],
) -> Result<Vec<ProjectItem>> {
    let page_size = PAGE_SIZE.to_string();
    let path = client.site_path("projects");
    let mut projects = Vec::new();
    let mut page = 1usize;

    loop {
        let page_number = page.to_string();
        let mut query = vec![
            ("pageSize", page_size.as_str()),
            ("pageNumber", page_number.as_str()),
        ];
        query.extend_from_slice(extra_query);

        let envelope: ProjectsEnvelope = client.get_json(&path, &query).await?;
        let total = envelope.pagination.total();
        let fetched = envelope.projects.project.len();
        projects.extend(envelope.projects.project);

        log::debug!(
            "Fetched page {} ({} of {} projects)",
            page,
            projects.len(),
            total
        );

        if projects.len() >= total || fetched == 0 {
            break;
        }
        page += 1;
    }

    Ok(projects)
}

/// Fetch one project by ID.
///
/// The REST API has no single-project endpoint, so this walks the listing.
pub async fn get_project(client: &TableauClient, project_id: &str) -> Result<ProjectItem> {
    let projects = list_projects(client).await?;
    projects
        .into_iter()
        .find(|p| p.id == project_id)
        .ok_or_else(|| eyre::eyre!("Project with ID '{}' not found", project_id))
}

/// Find a project by name, case-insensitively.
///
/// Warns and returns the first match when the name is ambiguous.
pub async fn find_project_by_name(
    client: &TableauClient,
    name: &str,
) -> Result<Option<ProjectItem>> {
    let projects = list_projects(client).await?;
    log::info!("Found {} projects on site", projects.len());

    let needle = name.to_lowercase();
    let matching: Vec<ProjectItem> = projects
        .into_iter()
        .filter(|p| p.name.to_lowercase() == needle)
        .collect();

    if matching.is_empty() {
        return Ok(None);
    }
    if matching.len() > 1 {
        log::warn!(
            "Multiple projects found with name: {}. Using the first one.",
            name
        );
    }

    let project = matching.into_iter().next();
    if let Some(project) = &project {
        log::info!("Found project '{}' with ID: {}", project.name, project.id);
    }
    Ok(project)
}

/// Create a project on the active site.
pub async fn create_project(
    client: &TableauClient,
    name: &str,
    parent_id: Option<&str>,
) -> Result<ProjectItem> {
    let mut body = json!({ "project": { "name": name } });
    if let Some(parent_id) = parent_id {
        body["project"]["parentProjectId"] = json!(parent_id);
    }

    let envelope: ProjectEnvelope = client
        .post_json(&client.site_path("projects"), &body)
        .await
        .with_context(|| format!("Failed to create project '{}'", name))?;

    log::info!("Created new project: {}", name);
    Ok(envelope.project)
}

/// Make sure a project exists on the active site, creating it if needed.
///
/// Matching is by exact name (server-side filter) plus parent linkage: a
/// `None` parent only matches top-level projects, a `Some` parent must match
/// exactly.
pub async fn ensure_project_exists(
    client: &TableauClient,
    name: &str,
    parent_id: Option<&str>,
) -> Result<ProjectItem> {
    let filter = format!("name:eq:{}", name);
    let matching = fetch_projects(client, &[("filter", filter.as_str())]).await?;

    for project in matching {
        let parent_matches = match (parent_id, project.parent_project_id.as_deref()) {
            (None, None) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => false,
        };
        if parent_matches {
            log::info!("Found existing project: {}", name);
            return Ok(project);
        }
    }

    create_project(client, name, parent_id).await
}
