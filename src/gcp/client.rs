//! GCP Client
//!
//! Main client for the Firebase REST APIs, combining authentication,
//! HTTP functionality and endpoint selection.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::error::BackendError;
use anyhow::{Context, Result};
use serde_json::Value;

const IDENTITY_ROOT: &str = "https://identitytoolkit.googleapis.com";
const FIRESTORE_ROOT: &str = "https://firestore.googleapis.com";

/// API roots, switched to `http://host` when an emulator is configured
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub identity_root: String,
    pub firestore_root: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_root: IDENTITY_ROOT.to_string(),
            firestore_root: FIRESTORE_ROOT.to_string(),
        }
    }
}

impl Endpoints {
    /// Production endpoints, overridden by `FIREBASE_AUTH_EMULATOR_HOST`
    /// and `FIRESTORE_EMULATOR_HOST`
    pub fn from_env() -> Result<Self> {
        Self::from_emulator_hosts(
            std::env::var("FIREBASE_AUTH_EMULATOR_HOST").ok().as_deref(),
            std::env::var("FIRESTORE_EMULATOR_HOST").ok().as_deref(),
        )
    }

    pub fn from_emulator_hosts(auth: Option<&str>, firestore: Option<&str>) -> Result<Self> {
        let mut endpoints = Self::default();
        if let Some(host) = auth.filter(|h| !h.is_empty()) {
            // The auth emulator serves the production host name as a path prefix
            endpoints.identity_root = format!(
                "{}/identitytoolkit.googleapis.com",
                emulator_root(host).context("Invalid FIREBASE_AUTH_EMULATOR_HOST")?
            );
        }
        if let Some(host) = firestore.filter(|h| !h.is_empty()) {
            endpoints.firestore_root =
                emulator_root(host).context("Invalid FIRESTORE_EMULATOR_HOST")?;
        }
        Ok(endpoints)
    }

    /// Both APIs served from one root (wiremock, local proxies)
    pub fn single(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            identity_root: root.to_string(),
            firestore_root: root.to_string(),
        }
    }

    pub fn identity_emulated(&self) -> bool {
        self.identity_root != IDENTITY_ROOT
    }

    pub fn firestore_emulated(&self) -> bool {
        self.firestore_root != FIRESTORE_ROOT
    }

    pub fn uses_emulator(&self) -> bool {
        self.identity_emulated() || self.firestore_emulated()
    }
}

fn emulator_root(host: &str) -> Result<String> {
    let url = url::Url::parse(&format!("http://{}", host))?;
    let host_str = url.host_str().context("missing host")?;
    Ok(match url.port() {
        Some(port) => format!("http://{}:{}", host_str, port),
        None => format!("http://{}", host_str),
    })
}

/// Main client shared by the resource clients
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: Endpoints,
}

impl GcpClient {
    pub fn new(
        credentials: GcpCredentials,
        project_id: &str,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let http = GcpHttpClient::new().context("Failed to create HTTP client")?;

        Ok(Self {
            credentials,
            http,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    async fn token(&self) -> Result<String, BackendError> {
        self.credentials
            .get_token()
            .await
            .map_err(|e| BackendError::unavailable(format!("{e:#}")))
    }

    pub async fn get(&self, url: &str) -> Result<Value, BackendError> {
        let token = self.token().await?;
        self.http.get(url, &token).await
    }

    pub async fn post(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let token = self.token().await?;
        self.http.post(url, &token, body).await
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let token = self.token().await?;
        self.http.patch(url, &token, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value, BackendError> {
        let token = self.token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Identity Toolkit API helpers
    // =========================================================================

    /// Build Identity Toolkit project-scoped URL, e.g. `accounts:lookup`
    pub fn identity_url(&self, path: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.endpoints.identity_root, self.project_id, path
        )
    }

    // =========================================================================
    // Firestore API helpers
    // =========================================================================

    /// Build Firestore documents URL for the default database
    pub fn firestore_url(&self, path: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.endpoints.firestore_root, self.project_id, path
        )
    }

    /// Build Firestore URL for one document
    pub fn firestore_document_url(&self, collection: &str, doc_id: &str) -> String {
        self.firestore_url(&format!(
            "{}/{}",
            collection,
            urlencoding::encode(doc_id)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::new(
            GcpCredentials::fixed("t"),
            "demo-project",
            Endpoints::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_url() {
        assert_eq!(
            client().identity_url("accounts:lookup"),
            "https://identitytoolkit.googleapis.com/v1/projects/demo-project/accounts:lookup"
        );
    }

    #[test]
    fn test_firestore_document_url_encodes_id() {
        assert_eq!(
            client().firestore_document_url("users", "a b"),
            "https://firestore.googleapis.com/v1/projects/demo-project/databases/(default)/documents/users/a%20b"
        );
    }

    #[test]
    fn test_emulator_hosts() {
        let endpoints =
            Endpoints::from_emulator_hosts(Some("127.0.0.1:9099"), Some("localhost:8080")).unwrap();
        assert_eq!(
            endpoints.identity_root,
            "http://127.0.0.1:9099/identitytoolkit.googleapis.com"
        );
        assert_eq!(endpoints.firestore_root, "http://localhost:8080");
        assert!(endpoints.uses_emulator());
        assert!(!Endpoints::default().uses_emulator());

        let firestore_only = Endpoints::from_emulator_hosts(None, Some("localhost:8080")).unwrap();
        assert!(firestore_only.firestore_emulated());
        assert!(!firestore_only.identity_emulated());
        assert!(firestore_only.uses_emulator());
    }

    #[test]
    fn test_empty_emulator_host_is_ignored() {
        let endpoints = Endpoints::from_emulator_hosts(Some(""), None).unwrap();
        assert_eq!(endpoints, Endpoints::default());
    }
}
