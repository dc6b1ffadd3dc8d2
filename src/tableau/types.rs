//! Item types deserialized from Tableau Server REST responses.

use serde::Deserialize;

/// Paging metadata returned by every listing endpoint.
///
/// Tableau serializes these counters as JSON strings, so they are kept as
/// strings and parsed on demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page_number: String,
    #[serde(default)]
    pub page_size: String,
    #[serde(default)]
    pub total_available: String,
}

impl Pagination {
    /// Total items available across all pages. Unparseable counters count
    /// as zero, which ends the paging loop.
    pub fn total(&self) -> usize {
        self.total_available.parse().unwrap_or(0)
    }
}

/// A site (tenant) on a Tableau server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteItem {
    pub id: String,
    pub name: String,
    /// Empty for the default site.
    #[serde(default)]
    pub content_url: String,
}

/// A project (folder) on a site. Projects form a tree via
/// `parent_project_id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_project_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A workbook on a site. The owning project comes back as a nested
/// reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

impl WorkbookItem {
    /// ID of the owning project, when the server included it.
    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.id.as_str())
    }
}

/// Nested project reference inside a workbook record.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Server directive controlling what happens when a published workbook name
/// already exists in the target project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Replace an existing workbook of the same name.
    Overwrite,
    /// Fail if a workbook of the same name already exists.
    CreateNew,
}

impl PublishMode {
    /// Value of the `overwrite` query parameter on the publish endpoint.
    pub fn overwrite_param(&self) -> &'static str {
        match self {
            Self::Overwrite => "true",
            Self::CreateNew => "false",
        }
    }
}

impl std::fmt::Display for PublishMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwrite => write!(f, "Overwrite"),
            Self::CreateNew => write!(f, "CreateNew"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_parses_string_counters() {
        let raw = r#"{"pageNumber": "1", "pageSize": "100", "totalAvailable": "237"}"#;
        let pagination: Pagination = serde_json::from_str(raw).unwrap();
        assert_eq!(pagination.total(), 237);
    }

    #[test]
    fn test_pagination_tolerates_garbage() {
        let raw = r#"{"pageNumber": "1", "pageSize": "100", "totalAvailable": "n/a"}"#;
        let pagination: Pagination = serde_json::from_str(raw).unwrap();
        assert_eq!(pagination.total(), 0);
    }

    #[test]
    fn test_project_item_top_level() {
        let raw = r#"{"id": "p-1", "name": "Finance"}"#;
        let project: ProjectItem = serde_json::from_str(raw).unwrap();
        assert_eq!(project.name, "Finance");
        assert!(project.parent_project_id.is_none());
    }

    #[test]
    fn test_project_item_with_parent() {
        let raw = r#"{"id": "p-2", "name": "Reports", "parentProjectId": "p-1"}"#;
        let project: ProjectItem = serde_json::from_str(raw).unwrap();
        assert_eq!(project.parent_project_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_workbook_item_project_id() {
        let raw = r#"{
            "id": "wb-1",
            "name": "Sales",
            "contentUrl": "Sales",
            "project": {"id": "p-1", "name": "Finance"}
        }"#;
        let workbook: WorkbookItem = serde_json::from_str(raw).unwrap();
        assert_eq!(workbook.project_id(), Some("p-1"));
    }

    #[test]
    fn test_workbook_item_without_project() {
        let raw = r#"{"id": "wb-1", "name": "Sales"}"#;
        let workbook: WorkbookItem = serde_json::from_str(raw).unwrap();
        assert!(workbook.project_id().is_none());
    }

    #[test]
    fn test_publish_mode_params() {
        assert_eq!(PublishMode::Overwrite.overwrite_param(), "true");
        assert_eq!(PublishMode::CreateNew.overwrite_param(), "false");
        assert_eq!(PublishMode::Overwrite.to_string(), "Overwrite");
    }
}
