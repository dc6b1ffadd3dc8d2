//! Site listing over GET /api/{version}/sites

use crate::client::TableauClient;
use crate::tableau::types::{Pagination, SiteItem};
use eyre::Result;
use serde::Deserialize;

const PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct SitesEnvelope {
    pagination: Pagination,
    #[serde(default)]
    sites: SiteList,
}

#[derive(Deserialize, Default)]
struct SiteList {
    #[serde(default)]
    site: Vec<SiteItem>,
}

/// List every site on the server the session can see.
pub async fn list_sites(client: &TableauClient) -> Result<Vec<SiteItem>> {
    let page_size = PAGE_SIZE.to_string();
    let mut sites = Vec::new();
    let mut page = 1usize;

    loop {
        let page_number = page.to_string();
        let query = [
            ("pageSize", page_size.as_str()),
            ("pageNumber", page_number.as_str()),
        ];
        let envelope: SitesEnvelope = client.get_json("sites", &query).await?;
        let total = envelope.pagination.total();
        let fetched = envelope.sites.site.len();
        sites.extend(envelope.sites.site);

        log::debug!("Fetched page {} ({} of {} sites)", page, sites.len(), total);

        if sites.len() >= total || fetched == 0 {
            break;
        }
        page += 1;
    }

    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sites_envelope_parses() {
        let raw = r#"{
            "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "2"},
            "sites": {"site": [
                {"id": "s-1", "name": "Default", "contentUrl": ""},
                {"id": "s-2", "name": "Marketing", "contentUrl": "marketing"}
            ]}
        }"#;
        let envelope: SitesEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.pagination.total(), 2);
        assert_eq!(envelope.sites.site.len(), 2);
        assert_eq!(envelope.sites.site[1].content_url, "marketing");
    }

    #[test]
    fn test_sites_envelope_empty_listing() {
        // Tableau omits the inner array entirely when a site list is empty
        let raw = r#"{
            "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "0"},
            "sites": {}
        }"#;
        let envelope: SitesEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.sites.site.is_empty());
    }
}
