//! Workbook listing, the download cascade, and publish fallback.
//!
//! Downloads try several shapes in sequence: an explicit filename per
//! candidate extension, then a server-named request, then a directory scan
//! as last-ditch recovery. Publishing tries Overwrite and falls back to
//! CreateNew once. Each failed attempt is recorded and the collected
//! messages travel with the terminal error.

use crate::client::TableauClient;
use crate::tableau::types::{Pagination, PublishMode, WorkbookItem};
use eyre::{Context, Result};
use regex::Regex;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

const PAGE_SIZE: usize = 100;

/// Candidate extensions, preferred first. Packaged workbooks (.twbx) are the
/// common case.
const WORKBOOK_EXTENSIONS: [&str; 2] = [".twbx", ".twb"];

static UNSAFE_STEM_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-.]").expect("pattern is a valid literal"));

#[derive(Deserialize)]
struct WorkbooksEnvelope {
    pagination: Pagination,
    #[serde(default)]
    workbooks: WorkbookList,
}

#[derive(Deserialize, Default)]
struct WorkbookList {
    #[serde(default)]
    workbook: Vec<WorkbookItem>,
}

#[derive(Deserialize)]
struct WorkbookEnvelope {
    workbook: WorkbookItem,
}

/// Reduce a workbook name or ID to characters safe in a filename.
pub fn safe_file_stem(name: &str) -> String {
    UNSAFE_STEM_CHARS.replace_all(name, "_").into_owned()
}

async fn fetch_workbooks(client: &TableauClient) -> Result<Vec<WorkbookItem>> {
    let page_size = PAGE_SIZE.to_string();
    let path = client.site_path("workbooks");
    let mut workbooks = Vec::new();
    let mut page = 1usize;

    loop {
        let page_number = page.to_string();
        let query = [
            ("pageSize", page_size.as_str()),
            ("pageNumber", page_number.as_str()),
        ];
        let envelope: WorkbooksEnvelope = client.get_json(&path, &query).await?;
        let total = envelope.pagination.total();
        let fetched = envelope.workbooks.workbook.len();
        workbooks.extend(envelope.workbooks.workbook);

        log::debug!(
            "Fetched page {} ({} of {} workbooks)",
            page,
            workbooks.len(),
            total
        );

        if workbooks.len() >= total || fetched == 0 {
            break;
        }
        page += 1;
    }

    Ok(workbooks)
}

/// List workbooks on the active site, optionally filtered to one project.
///
/// The project filter is applied locally, comparing IDs case-insensitively
/// as strings. Enumeration failures are logged and produce an empty list so
/// callers can continue.
pub async fn list_workbooks(
    client: &TableauClient,
    project_id: Option<&str>,
) -> Vec<WorkbookItem> {
    let all = match fetch_workbooks(client).await {
        Ok(workbooks) => workbooks,
        Err(error) => {
            log::error!("Error listing workbooks: {}", error);
            return Vec::new();
        }
    };

    log::info!("Retrieved {} total workbooks from site", all.len());

    match project_id {
        Some(project_id) => {
            let wanted = project_id.to_lowercase();
            let filtered: Vec<WorkbookItem> = all
                .into_iter()
                .filter(|wb| {
                    wb.project_id()
                        .map(|id| id.to_lowercase() == wanted)
                        .unwrap_or(false)
                })
                .collect();
            log::info!(
                "Filtered to {} workbooks in project {}",
                filtered.len(),
                project_id
            );
            filtered
        }
        None => all,
    }
}

/// Find a workbook by name, case-insensitively, optionally within a project.
///
/// Logs the available workbooks when nothing matches; warns and picks the
/// first match when the name is ambiguous.
pub async fn find_workbook_by_name(
    client: &TableauClient,
    name: &str,
    project_id: Option<&str>,
) -> Option<WorkbookItem> {
    let workbooks = list_workbooks(client, project_id).await;

    let needle = name.to_lowercase();
    let matching: Vec<WorkbookItem> = workbooks
        .iter()
        .filter(|wb| wb.name.to_lowercase() == needle)
        .cloned()
        .collect();

    if matching.is_empty() {
        log::warn!("No workbook found with name: {}", name);
        if let Some(project_id) = project_id {
            log::info!("Available workbooks in project {}:", project_id);
            for wb in &workbooks {
                log::info!("  - {} (ID: {})", wb.name, wb.id);
            }
        }
        return None;
    }

    if matching.len() > 1 {
        log::warn!(
            "Multiple workbooks found with name: {}. Using the first one.",
            name
        );
    }

    let workbook = matching.into_iter().next();
    if let Some(workbook) = &workbook {
        log::info!("Found workbook '{}' with ID: {}", workbook.name, workbook.id);
    }
    workbook
}

/// Fetch one workbook record by ID.
pub async fn get_workbook(client: &TableauClient, workbook_id: &str) -> Result<WorkbookItem> {
    let envelope: WorkbookEnvelope = client
        .get_json(&client.site_path(&format!("workbooks/{}", workbook_id)), &[])
        .await?;
    Ok(envelope.workbook)
}

/// Verify a workbook exists before touching it.
///
/// On failure the terminal error lists the sibling workbooks of the hinted
/// project, so the operator can spot a mistyped ID.
pub async fn verify_workbook(
    client: &TableauClient,
    workbook_id: &str,
    project_hint: Option<&str>,
) -> Result<WorkbookItem> {
    log::info!("Verifying workbook exists with ID: {}", workbook_id);
    match get_workbook(client, workbook_id).await {
        Ok(workbook) => {
            log::info!("Found workbook: {} (ID: {})", workbook.name, workbook_id);
            Ok(workbook)
        }
        Err(error) => {
            log::error!(
                "Error finding workbook with ID {}: {}",
                workbook_id,
                error
            );
            let siblings = list_workbooks(client, project_hint).await;
            if siblings.is_empty() {
                eyre::bail!(
                    "Workbook with ID '{}' not found. Please verify the ID is correct.",
                    workbook_id
                );
            }
            let listing = siblings
                .iter()
                .map(|wb| format!("  - {} (ID: {})", wb.name, wb.id))
                .collect::<Vec<_>>()
                .join("\n");
            eyre::bail!(
                "Workbook with ID '{}' not found. Available workbooks:\n{}",
                workbook_id,
                listing
            );
        }
    }
}

/// Download a workbook, trying each fallback in sequence.
///
/// 1. One attempt per candidate extension, writing `{stem}{ext}` into `dir`
///    and accepting the first non-empty file.
/// 2. An alternate request that lets the server name the file; a 400 on the
///    `includeExtract` parameter triggers one retry without it.
/// 3. When the alternate response names nothing usable, the newest workbook
///    file written to `dir` since the attempt began is taken as recovery.
///
/// Exhausting every attempt is terminal; the error carries one message per
/// failed attempt.
pub async fn download_workbook(
    client: &TableauClient,
    workbook_id: &str,
    dir: &Path,
    stem: &str,
    include_extract: bool,
) -> Result<PathBuf> {
    let mut errors: Vec<String> = Vec::new();

    for ext in WORKBOOK_EXTENSIONS {
        let candidate = dir.join(format!("{}{}", stem, ext));
        log::info!(
            "Attempting to download workbook {} to {}",
            workbook_id,
            candidate.display()
        );

        match download_to_file(client, workbook_id, &candidate, Some(include_extract)).await {
            Ok(()) => match accept_non_empty(&candidate)? {
                Some(size) => {
                    log::info!("Downloaded workbook file size: {} bytes", size);
                    log::info!("Successfully downloaded workbook to {}", candidate.display());
                    return Ok(candidate);
                }
                None => {
                    errors.push(format!("Downloaded file is empty (extension: {})", ext));
                }
            },
            Err(error) => {
                errors.push(format!(
                    "Error during download with extension {}: {}",
                    ext, error
                ));
            }
        }
    }

    log::info!("Trying alternative download approach...");
    let attempt_started = SystemTime::now();

    match download_server_named(client, workbook_id, dir, include_extract).await {
        Ok(Some(path)) => {
            log::info!(
                "Alternative download succeeded with server-named file: {}",
                path.display()
            );
            return Ok(path);
        }
        Ok(None) => match newest_workbook_file(dir, attempt_started)? {
            Some(path) => {
                log::info!("Found potential workbook file: {}", path.display());
                return Ok(path);
            }
            None => {
                errors.push("No workbook files found in download directory".to_string());
            }
        },
        Err(error) => {
            errors.push(format!("Alternative download approach failed: {}", error));
        }
    }

    let detail = errors.join("\n");
    log::error!("All download attempts failed:\n{}", detail);
    eyre::bail!(
        "Failed to download workbook {} after multiple attempts:\n{}",
        workbook_id,
        detail
    )
}

/// GET the workbook content endpoint and write the body to `target`.
async fn download_to_file(
    client: &TableauClient,
    workbook_id: &str,
    target: &Path,
    include_extract: Option<bool>,
) -> Result<()> {
    let path = client.site_path(&format!("workbooks/{}/content", workbook_id));
    let response = match include_extract {
        Some(include) => {
            let include = include.to_string();
            client
                .get(&path, &[("includeExtract", include.as_str())])
                .await?
        }
        None => client.get(&path, &[]).await?,
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        eyre::bail!("Workbook content request failed ({}): {}", status, body);
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| "Failed to read workbook content")?;
    std::fs::write(target, &bytes)
        .with_context(|| format!("Failed to write workbook file: {}", target.display()))?;
    Ok(())
}

/// Alternate download form: let the server name the file via
/// Content-Disposition.
///
/// Older API versions reject the `includeExtract` parameter with a 400; one
/// retry drops it. Returns `Ok(None)` when no non-empty file could be placed
/// under a server-supplied name.
async fn download_server_named(
    client: &TableauClient,
    workbook_id: &str,
    dir: &Path,
    include_extract: bool,
) -> Result<Option<PathBuf>> {
    let path = client.site_path(&format!("workbooks/{}/content", workbook_id));
    let include = include_extract.to_string();

    let mut response = client
        .get(&path, &[("includeExtract", include.as_str())])
        .await?;
    if response.status() == reqwest::StatusCode::BAD_REQUEST {
        log::info!("Server rejected the includeExtract parameter, retrying without it");
        response = client.get(&path, &[]).await?;
    }

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        eyre::bail!("Workbook content request failed ({}): {}", status, body);
    }

    let server_name = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_content_disposition);

    let bytes = response
        .bytes()
        .await
        .with_context(|| "Failed to read workbook content")?;

    // Without a server-supplied name, fall back to a provisional one; an
    // empty body still yields None either way
    let target = match server_name {
        Some(name) => dir.join(name),
        None => dir.join("workbook.twbx"),
    };
    std::fs::write(&target, &bytes)
        .with_context(|| format!("Failed to write workbook file: {}", target.display()))?;

    Ok(accept_non_empty(&target)?.map(|_| target))
}

/// Keep a downloaded file only if it exists with size > 0. Empty files are
/// removed so a later attempt can reuse the name.
fn accept_non_empty(path: &Path) -> Result<Option<u64>> {
    if !path.exists() {
        return Ok(None);
    }
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat downloaded file: {}", path.display()))?
        .len();
    if size > 0 {
        Ok(Some(size))
    } else {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove empty file: {}", path.display()))?;
        Ok(None)
    }
}

/// Newest non-empty `.twb`/`.twbx` in `dir`, restricted to files modified at
/// or after `since`. Files already present before the attempt started are
/// not candidates.
fn newest_workbook_file(dir: &Path, since: SystemTime) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_workbook = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("twb") | Some("twbx")
        );
        if !is_workbook {
            continue;
        }

        let metadata = entry.metadata()?;
        if metadata.len() == 0 {
            continue;
        }
        let modified = metadata.modified()?;
        if modified < since {
            continue;
        }

        if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Pull the filename out of a Content-Disposition header value, e.g.
/// `name="tableau_workbook"; filename="Sales.twbx"`.
fn filename_from_content_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let rest = rest.trim();
    let name = if let Some(stripped) = rest.strip_prefix('"') {
        stripped.split('"').next()?
    } else {
        rest.split(';').next()?.trim()
    };
    // Strip any path segments a misbehaving server might include
    let name = Path::new(name).file_name()?.to_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Publish a workbook file into a project on the active site.
pub async fn publish_workbook(
    client: &TableauClient,
    name: &str,
    target_project_id: &str,
    file: &Path,
    mode: PublishMode,
) -> Result<()> {
    log::info!("Publishing with mode: {}", mode);

    let payload = json!({
        "workbook": {
            "name": name,
            "project": { "id": target_project_id },
        }
    });

    let file_name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook.twbx")
        .to_string();
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read workbook file: {}", file.display()))?;

    let payload_part = multipart::Part::text(payload.to_string()).mime_str("application/json")?;
    let file_part = multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    let form = multipart::Form::new()
        .part("request_payload", payload_part)
        .part("tableau_workbook", file_part);

    let response = client
        .post_multipart(
            &client.site_path("workbooks"),
            &[("overwrite", mode.overwrite_param())],
            form,
        )
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        eyre::bail!("Failed to publish workbook '{}' ({}): {}", name, status, body);
    }

    log::info!("Published workbook '{}' to project {}", name, target_project_id);
    Ok(())
}

/// Publish with Overwrite, falling back once to CreateNew.
///
/// The fallback failure propagates to the caller.
pub async fn publish_with_fallback(
    client: &TableauClient,
    name: &str,
    target_project_id: &str,
    file: &Path,
) -> Result<()> {
    match publish_workbook(client, name, target_project_id, file, PublishMode::Overwrite).await {
        Ok(()) => Ok(()),
        Err(error) => {
            log::error!("Error publishing workbook: {}", error);
            log::error!("Workbook file exists: {}", file.exists());
            if let Ok(metadata) = std::fs::metadata(file) {
                log::error!("Workbook file size: {}", metadata.len());
            }
            log::error!("Target project: {}", target_project_id);

            log::info!("Trying alternative publish mode...");
            publish_workbook(client, name, target_project_id, file, PublishMode::CreateNew).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("Sales Report"), "Sales_Report");
        assert_eq!(safe_file_stem("Q1/Q2: totals"), "Q1_Q2__totals");
        assert_eq!(safe_file_stem("plain-name_1.0"), "plain-name_1.0");
    }

    #[test]
    fn test_filename_from_content_disposition_quoted() {
        let header = r#"name="tableau_workbook"; filename="Sales Report.twbx""#;
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            Some("Sales Report.twbx")
        );
    }

    #[test]
    fn test_filename_from_content_disposition_bare() {
        let header = "attachment; filename=Sales.twbx";
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            Some("Sales.twbx")
        );
    }

    #[test]
    fn test_filename_from_content_disposition_missing() {
        assert!(filename_from_content_disposition("attachment").is_none());
    }

    #[test]
    fn test_filename_from_content_disposition_strips_paths() {
        let header = r#"attachment; filename="../../etc/Sales.twbx""#;
        assert_eq!(
            filename_from_content_disposition(header).as_deref(),
            Some("Sales.twbx")
        );
    }

    #[test]
    fn test_accept_non_empty_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sales.twbx");
        std::fs::write(&path, b"workbook bytes").unwrap();

        let size = accept_non_empty(&path).unwrap();
        assert_eq!(size, Some(14));
        assert!(path.exists());
    }

    #[test]
    fn test_accept_non_empty_discards_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sales.twbx");
        std::fs::write(&path, b"").unwrap();

        let size = accept_non_empty(&path).unwrap();
        assert_eq!(size, None);
        assert!(!path.exists(), "empty file should be removed");
    }

    #[test]
    fn test_accept_non_empty_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.twbx");
        assert_eq!(accept_non_empty(&path).unwrap(), None);
    }

    #[test]
    fn test_newest_workbook_file_picks_latest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("older.twb"), b"old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(dir.path().join("newer.twbx"), b"new").unwrap();

        let found = newest_workbook_file(dir.path(), UNIX_EPOCH).unwrap();
        assert_eq!(
            found.unwrap().file_name().unwrap().to_str().unwrap(),
            "newer.twbx"
        );
    }

    #[test]
    fn test_newest_workbook_file_ignores_other_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::write(dir.path().join("data.zip"), b"zip").unwrap();

        assert!(newest_workbook_file(dir.path(), UNIX_EPOCH).unwrap().is_none());
    }

    #[test]
    fn test_newest_workbook_file_ignores_empty_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.twbx"), b"").unwrap();

        assert!(newest_workbook_file(dir.path(), UNIX_EPOCH).unwrap().is_none());
    }

    #[test]
    fn test_newest_workbook_file_respects_since() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stale.twbx"), b"stale").unwrap();

        // Files written before the attempt started must not be candidates
        let since = SystemTime::now() + Duration::from_secs(3600);
        assert!(newest_workbook_file(dir.path(), since).unwrap().is_none());
    }
}
