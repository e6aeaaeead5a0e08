//! Google Authentication
//!
//! Handles authentication using a service account key file, Application
//! Default Credentials (ADC), or the static token accepted by the Firebase
//! emulators.

use anyhow::{Context, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};

/// Scopes covering Identity Toolkit and Firestore admin access
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/identitytoolkit",
];

/// Token the Firebase emulators accept as an admin credential
pub const EMULATOR_TOKEN: &str = "owner";

const ADC_HELP: &str = "Failed to initialize GCP authentication. \
Pass --credentials or run 'gcloud auth application-default login'";

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    /// ADC, loaded on the first token or project request
    Deferred(Arc<OnceCell<Arc<dyn TokenProvider>>>),
    Static(String),
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Credentials from a service account key file, or ADC when no file is given
    pub async fn new(credentials_file: Option<&Path>) -> Result<Self> {
        let provider: Arc<dyn TokenProvider> = match credentials_file {
            Some(path) => {
                tracing::info!("Using service account key: {:?}", path);
                let account = CustomServiceAccount::from_file(path).with_context(|| {
                    format!("Failed to load service account key from {}", path.display())
                })?;
                Arc::new(account)
            }
            None => gcp_auth::provider().await.context(ADC_HELP)?,
        };

        Ok(Self::from_provider(provider))
    }

    pub fn from_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(provider),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Application Default Credentials, resolved only when first needed
    pub fn deferred() -> Self {
        Self {
            source: TokenSource::Deferred(Arc::new(OnceCell::new())),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Fixed token, used against emulators and in tests
    pub fn fixed(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// True for a fixed token (emulators, tests)
    pub fn is_static(&self) -> bool {
        matches!(self.source, TokenSource::Static(_))
    }

    async fn provider(&self) -> Result<Option<&Arc<dyn TokenProvider>>> {
        match &self.source {
            TokenSource::Provider(provider) => Ok(Some(provider)),
            TokenSource::Deferred(cell) => {
                let provider = cell
                    .get_or_try_init(|| async {
                        tracing::info!("Loading Application Default Credentials");
                        gcp_auth::provider().await
                    })
                    .await
                    .context(ADC_HELP)?;
                Ok(Some(provider))
            }
            TokenSource::Static(_) => Ok(None),
        }
    }

    /// Project the credentials belong to, if the provider knows it
    pub async fn project_id(&self) -> Option<String> {
        let provider = match self.provider().await {
            Ok(Some(provider)) => provider,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("No credentials to take a project from: {:#}", e);
                return None;
            }
        };
        match provider.project_id().await {
            Ok(project) => Some(project.to_string()),
            Err(e) => {
                tracing::debug!("Credential provider has no project: {}", e);
                None
            }
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }
        let Some(provider) = self.provider().await? else {
            anyhow::bail!("no token provider");
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;

        let token_str = token.as_str().to_string();
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs are 6-30 characters of lowercase letters, digits, and hyphens,
/// start with a letter and do not end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }
    if !project.starts_with(|c: char| c.is_ascii_lowercase()) || project.ends_with('-') {
        return false;
    }
    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Default project from the environment or the active gcloud configuration
pub fn get_default_project() -> Option<String> {
    for var in ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    let config_dir = get_gcloud_config_dir()?;
    let active_config = std::fs::read_to_string(config_dir.join("active_config")).ok()?;
    let config_name = active_config.trim();

    // Path traversal guard
    if !config_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }

    let content = std::fs::read_to_string(
        config_dir
            .join("configurations")
            .join(format!("config_{}", config_name)),
    )
    .ok()?;

    project_from_properties(&content)
}

/// Extract `project` from the `[core]` section of a gcloud properties file
fn project_from_properties(content: &str) -> Option<String> {
    let mut in_core_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_core_section = line == "[core]";
            continue;
        }
        if !in_core_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let project = value.trim();
            if key.trim() == "project" && validate_project_id(project) {
                return Some(project.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("fir-godemo-e0791"));
        assert!(!validate_project_id("short"));
        assert!(!validate_project_id("Upper-case-id"));
        assert!(!validate_project_id("ends-with-dash-"));
        assert!(!validate_project_id("1starts-with-digit"));
    }

    #[test]
    fn test_project_from_properties_reads_core_section() {
        let content = "\
[compute]
project = not-this-one
[core]
# comment
account = someone@example.com
project = my-firebase-app
";
        assert_eq!(
            project_from_properties(content).as_deref(),
            Some("my-firebase-app")
        );
    }

    #[test]
    fn test_project_from_properties_without_core() {
        assert_eq!(project_from_properties("[compute]\nzone = x\n"), None);
    }

    #[test]
    fn test_fixed_credentials_return_token() {
        let creds = GcpCredentials::fixed(EMULATOR_TOKEN);
        let token = tokio_test::block_on(creds.get_token()).unwrap();
        assert_eq!(token, "owner");
        assert_eq!(tokio_test::block_on(creds.project_id()), None);
        assert!(creds.is_static());
    }

    #[test]
    fn test_deferred_credentials_load_nothing_up_front() {
        let creds = GcpCredentials::deferred();
        assert!(!creds.is_static());
        match &creds.source {
            TokenSource::Deferred(cell) => assert!(!cell.initialized()),
            _ => panic!("expected deferred source"),
        }
    }
}
