//! Tableau Server REST client
//!
//! Provides [`TableauClient`] for making requests against the Tableau Server
//! REST API. A client represents one signed-in session bound to one site;
//! use [`TableauClient::switch_site`] to move the session to another site.
//!
//! All requests negotiate JSON responses via the `Accept` header and carry
//! the session token in `X-Tableau-Auth`.

use super::Auth;
use eyre::{Context, Result};
use reqwest::{Client, Response, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// REST API version used to probe /serverinfo before a session exists.
/// Every supported Tableau Server release answers on this baseline.
const PROBE_API_VERSION: &str = "2.4";

/// A signed-in Tableau Server session.
///
/// # Example
/// ```no_run
/// use tableau_workbook_migrator::client::{Auth, TableauClient};
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("https://tableau.example.com")?;
/// let auth = Auth::Basic {
///     username: "admin".to_string(),
///     password: "hunter2".to_string(),
/// };
/// let client = TableauClient::sign_in(url, &auth, "", None, true).await?;
///
/// let sites: serde_json::Value = client.get_json("sites", &[]).await?;
/// client.sign_out().await?;
/// # Ok(())
/// # }
/// ```
pub struct TableauClient {
    client: Client,
    url: Url,
    api_version: String,
    token: String,
    site_id: String,
    site_content_url: String,
}

#[derive(Deserialize)]
struct SignInEnvelope {
    credentials: Credentials,
}

#[derive(Deserialize)]
struct Credentials {
    token: String,
    site: CredentialsSite,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsSite {
    id: String,
    #[serde(default)]
    content_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoEnvelope {
    server_info: ServerInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    rest_api_version: String,
}

impl TableauClient {
    /// Sign in to a Tableau server and return a session-bound client.
    ///
    /// # Arguments
    /// * `url` - Base server URL (e.g. `https://tableau.example.com`)
    /// * `auth` - Credentials (personal access token or username/password)
    /// * `site` - Site contentUrl; empty string addresses the default site
    /// * `api_version` - Pinned REST API version, or `None` to auto-detect
    ///   from the server's /serverinfo endpoint
    /// * `verify_ssl` - Disables TLS certificate verification when false
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built, version
    /// detection fails, or the server rejects the credentials.
    pub async fn sign_in(
        url: Url,
        auth: &Auth,
        site: &str,
        api_version: Option<String>,
        verify_ssl: bool,
    ) -> Result<Self> {
        if !verify_ssl {
            log::warn!("SSL certificate verification is disabled. This is insecure.");
        }
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .with_context(|| "Failed to build HTTP client")?;

        let api_version = match api_version {
            Some(version) => {
                log::info!("Using API version: {}", version);
                version
            }
            None => {
                let version = detect_api_version(&client, &url).await?;
                log::info!("Detected server API version: {}", version);
                version
            }
        };

        log::info!("Signing in to {} with {} authentication", url, auth);

        let signin_url = url
            .join(&format!("api/{}/auth/signin", api_version))
            .with_context(|| format!("Invalid server URL: {}", url))?;
        let response = client
            .post(signin_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&auth.signin_payload(site))
            .send()
            .await
            .with_context(|| format!("Failed to reach Tableau server at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Sign-in to {} failed ({}): {}", url, status, body);
        }

        let envelope: SignInEnvelope = response
            .json()
            .await
            .with_context(|| "Failed to parse sign-in response")?;

        log::info!(
            "Signed in to site '{}' (ID: {})",
            display_site(&envelope.credentials.site.content_url),
            envelope.credentials.site.id
        );

        Ok(Self {
            client,
            url,
            api_version,
            token: envelope.credentials.token,
            site_id: envelope.credentials.site.id,
            site_content_url: envelope.credentials.site.content_url,
        })
    }

    /// Switch the session to another site on the same server.
    ///
    /// Replaces the session token and site context in place.
    pub async fn switch_site(&mut self, content_url: &str) -> Result<()> {
        log::info!(
            "Switching from site '{}' to '{}'",
            display_site(&self.site_content_url),
            display_site(content_url)
        );

        let body = serde_json::json!({ "site": { "contentUrl": content_url } });
        let response = self
            .request(reqwest::Method::POST, "auth/switchSite", &[])?
            .json(&body)
            .send()
            .await
            .with_context(|| "Failed to send switchSite request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to switch to site '{}' ({}): {}", content_url, status, body);
        }

        let envelope: SignInEnvelope = response
            .json()
            .await
            .with_context(|| "Failed to parse switchSite response")?;

        self.token = envelope.credentials.token;
        self.site_id = envelope.credentials.site.id;
        self.site_content_url = envelope.credentials.site.content_url;

        Ok(())
    }

    /// Invalidate the session token.
    pub async fn sign_out(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "auth/signout", &[])?
            .send()
            .await
            .with_context(|| "Failed to send signout request")?;

        if !response.status().is_success() {
            let status = response.status();
            eyre::bail!("Sign-out failed ({})", status);
        }

        log::info!("Signed out of {}", self.url);
        Ok(())
    }

    /// LUID of the active site.
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// contentUrl of the active site. Empty for the default site.
    pub fn site_content_url(&self) -> &str {
        &self.site_content_url
    }

    /// Pinned or detected REST API version.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Base server URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Prefix a resource path with the active site, e.g.
    /// `site_path("workbooks")` → `sites/{site-id}/workbooks`.
    pub fn site_path(&self, suffix: &str) -> String {
        format!("sites/{}/{}", self.site_id, suffix.trim_start_matches('/'))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.url
            .join(&format!("api/{}/{}", self.api_version, path))
            .with_context(|| format!("Invalid API path: {}", path))
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .client
            .request(method, self.endpoint(path)?)
            .header("X-Tableau-Auth", &self.token)
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        Ok(builder)
    }

    /// GET a path and return the raw response without status handling.
    ///
    /// Used for binary downloads where the caller inspects the status to
    /// drive fallback behavior.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        self.request(reqwest::Method::GET, path, query)?
            .send()
            .await
            .with_context(|| format!("Request failed: GET {}", path))
    }

    /// GET a path and deserialize a JSON response, bailing on non-2xx.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.get(path, query).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("GET {} failed ({}): {}", path, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from GET {}", path))
    }

    /// POST a JSON body and deserialize a JSON response, bailing on non-2xx.
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .request(reqwest::Method::POST, path, &[])?
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request failed: POST {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("POST {} failed ({}): {}", path, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from POST {}", path))
    }

    /// POST a multipart form and return the raw response.
    ///
    /// Tableau's publish endpoints take a `request_payload` part plus the
    /// file part; the caller owns status handling to drive publish-mode
    /// fallback.
    pub async fn post_multipart(
        &self,
        path: &str,
        query: &[(&str, &str)],
        form: multipart::Form,
    ) -> Result<Response> {
        self.request(reqwest::Method::POST, path, query)?
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Request failed: POST {}", path))
    }
}

impl std::fmt::Display for TableauClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (site: {})",
            self.url,
            display_site(&self.site_content_url)
        )
    }
}

/// Ask the server which REST API version it speaks.
async fn detect_api_version(client: &Client, url: &Url) -> Result<String> {
    let info_url = url
        .join(&format!("api/{}/serverinfo", PROBE_API_VERSION))
        .with_context(|| format!("Invalid server URL: {}", url))?;
    let response = client
        .get(info_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("Failed to query server info from {}", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        eyre::bail!("Server info request failed ({}): {}", status, body);
    }

    let envelope: ServerInfoEnvelope = response
        .json()
        .await
        .with_context(|| "Failed to parse server info response")?;

    Ok(envelope.server_info.rest_api_version)
}

/// The default site has an empty contentUrl; render it readably.
fn display_site(content_url: &str) -> &str {
    if content_url.is_empty() {
        "default"
    } else {
        content_url
    }
}
