use eyre::Result;
use serde_json::{Value, json};

/// Credentials for a Tableau Server sign-in.
///
/// Tableau accepts either a personal access token or a username/password
/// pair. When both are configured, the token wins.
#[derive(Debug)]
pub enum Auth {
    /// Authenticate with a personal access token
    PersonalAccessToken { name: String, secret: String },
    /// Authenticate with username and password
    Basic { username: String, password: String },
}

impl Auth {
    /// Resolve credentials from optional token and username/password parts.
    ///
    /// Mirrors the precedence used for both source and target servers:
    /// a complete token pair is preferred, then username/password. Missing
    /// credentials are a fatal error.
    pub fn resolve(
        token_name: Option<String>,
        token_value: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        match (token_name, token_value, username, password) {
            (Some(name), Some(secret), _, _) => Ok(Self::PersonalAccessToken { name, secret }),
            (_, _, Some(username), Some(password)) => Ok(Self::Basic { username, password }),
            (_, _, Some(_), None) => {
                eyre::bail!("Username provided without a password")
            }
            _ => eyre::bail!("No authentication credentials provided"),
        }
    }

    /// Build the JSON body for POST /api/{version}/auth/signin.
    pub(crate) fn signin_payload(&self, site_content_url: &str) -> Value {
        match self {
            Self::PersonalAccessToken { name, secret } => json!({
                "credentials": {
                    "personalAccessTokenName": name,
                    "personalAccessTokenSecret": secret,
                    "site": { "contentUrl": site_content_url },
                }
            }),
            Self::Basic { username, password } => json!({
                "credentials": {
                    "name": username,
                    "password": password,
                    "site": { "contentUrl": site_content_url },
                }
            }),
        }
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonalAccessToken { name, .. } => write!(f, "PersonalAccessToken ({})", name),
            Self::Basic { username, .. } => write!(f, "Basic ({})", username),
        }
    }
}
