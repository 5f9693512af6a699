//! Keystone v3 password authentication.
//!
//! Produces an immutable [`Session`] that every client and transfer task
//! borrows read-only. The session is plain data; re-authentication builds a
//! new one rather than mutating shared state.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::ClientError;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Identity endpoint to authenticate against.
#[derive(Debug, Clone)]
pub struct AuthEndpoint {
    /// Base URL of the OpenStack deployment, e.g. `https://cloud.example.org`.
    /// The Keystone path (`/identity/v3/auth/tokens`) is appended here.
    pub base_url: String,
}

impl AuthEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url: String = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn tokens_url(&self) -> String {
        format!("{}/identity/v3/auth/tokens", self.base_url)
    }
}

/// Login credentials, scoped to a project in the `default` domain.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub project: String,
}

/// An authenticated session: bearer token plus resolved storage endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token, sent as `X-Auth-Token` on every storage request.
    pub token: String,
    /// Account-level Swift URL (`.../v1/AUTH_{project_id}`).
    pub storage_url: String,
    pub project_id: String,
    pub user_id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    project: IdRef,
    user: IdRef,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    interface: String,
    url: String,
}

/// Authenticate with a username/password scoped to a project.
///
/// Distinguishes three failure modes: bad credentials (HTTP 401 →
/// [`ClientError::Unauthorized`]), a server-side problem (any other
/// non-success status), and a connection failure ([`ClientError::Network`]).
pub async fn authenticate(
    endpoint: &AuthEndpoint,
    credentials: &Credentials,
) -> Result<Session, ClientError> {
    let http: Client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ClientError::InvalidConfig {
            message: format!("failed to build HTTP client: {e}"),
        })?;

    let payload = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": credentials.username,
                        "domain": { "id": "default" },
                        "password": credentials.password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": credentials.project,
                    "domain": { "id": "default" },
                }
            }
        }
    });

    let url: String = endpoint.tokens_url();
    let response: Response = http.post(&url).json(&payload).send().await?;

    match response.status() {
        StatusCode::CREATED | StatusCode::OK => {}
        status => return Err(auth_failure(status, &url)),
    }

    let token: String = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidConfig {
            message: "identity response carried no subject token".to_string(),
        })?;

    let body: TokenResponse = response.json().await?;
    let project_id: String = body.token.project.id;
    let user_id: String = body.token.user.id;
    let storage_url: String =
        resolve_storage_url(&body.token.catalog, &endpoint.base_url, &project_id)?;

    Ok(Session {
        token,
        storage_url,
        project_id,
        user_id,
    })
}

/// Map a non-success identity response to the error taxonomy: 401 means bad
/// credentials, anything else is a server-side problem. Connection failures
/// never reach this point; they become [`ClientError::Network`] through the
/// `reqwest::Error` conversion on `send()`.
fn auth_failure(status: StatusCode, url: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        status => ClientError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

/// Pick the object-store public endpoint out of the service catalog, falling
/// back to `{base_url}/v1/AUTH_{project_id}` when the deployment hides the
/// catalog. The account path segment is appended if the catalog URL lacks it.
fn resolve_storage_url(
    catalog: &[CatalogEntry],
    base_url: &str,
    project_id: &str,
) -> Result<String, ClientError> {
    let public_url: Option<&str> = catalog
        .iter()
        .filter(|entry| entry.service_type == "object-store")
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| ep.interface == "public")
        .map(|ep| ep.url.as_str());

    let mut url: String = match public_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => base_url.trim_end_matches('/').to_string(),
    };

    if url.is_empty() {
        return Err(ClientError::InvalidConfig {
            message: "no object-store endpoint available".to_string(),
        });
    }
    if !url.contains("/v1/AUTH_") {
        url = format!("{url}/v1/AUTH_{project_id}");
    }
    Ok(url)
}
