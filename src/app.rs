//! Startup and reporting
//!
//! Builds the resource clients once per process and turns the outcome of the
//! single dispatch into output and an exit status.

use crate::cli::Args;
use crate::config::Config;
use crate::error::CrudError;
use crate::gcp::auth::{GcpCredentials, EMULATOR_TOKEN};
use crate::gcp::client::{Endpoints, GcpClient};
use crate::gcp::http::hint_for;
use crate::resource::document::DocumentClient;
use crate::resource::identity::IdentityClient;
use crate::resource::{Dispatcher, OperationOutcome};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;

/// Project used against emulators when nothing else is configured
const EMULATOR_PROJECT: &str = "demo-firecrud";

/// Credentials for each API
pub struct ServiceCredentials {
    pub identity: GcpCredentials,
    pub firestore: GcpCredentials,
}

impl ServiceCredentials {
    /// A key file is used for both APIs. Without one, an emulated API gets the
    /// emulator token and a production API gets ADC. ADC is loaded eagerly
    /// only when neither API is emulated.
    pub async fn resolve(endpoints: &Endpoints, credentials_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = credentials_file {
            let credentials = GcpCredentials::new(Some(path)).await?;
            return Ok(Self {
                identity: credentials.clone(),
                firestore: credentials,
            });
        }

        let (identity_emulated, firestore_emulated) =
            (endpoints.identity_emulated(), endpoints.firestore_emulated());
        let production = if identity_emulated || firestore_emulated {
            GcpCredentials::deferred()
        } else {
            GcpCredentials::new(None).await?
        };
        let pick = |emulated: bool| {
            if emulated {
                GcpCredentials::fixed(EMULATOR_TOKEN)
            } else {
                production.clone()
            }
        };

        Ok(Self {
            identity: pick(identity_emulated),
            firestore: pick(firestore_emulated),
        })
    }

    /// Project known to the first non-static credentials
    async fn project_id(&self) -> Option<String> {
        for credentials in [&self.identity, &self.firestore] {
            if credentials.is_static() {
                continue;
            }
            if let Some(project) = credentials.project_id().await {
                return Some(project);
            }
        }
        None
    }
}

/// Resolve credentials, project and endpoints, then build both clients
pub async fn build_dispatcher(args: &Args, config: &Config) -> Result<Dispatcher> {
    let endpoints = Endpoints::from_env()?;
    if endpoints.uses_emulator() {
        tracing::info!("Using emulator endpoints: {:?}", endpoints);
    }
    let credentials_file = config.effective_credentials(args.credentials.as_deref());
    let credentials = ServiceCredentials::resolve(&endpoints, credentials_file.as_deref()).await?;

    let project = match config.effective_project(args.project.as_deref()) {
        Some(project) => project,
        None => match credentials.project_id().await {
            Some(project) => project,
            None if endpoints.uses_emulator() => EMULATOR_PROJECT.to_string(),
            None => {
                return Err(anyhow::anyhow!(
                    "No project configured. Set GOOGLE_CLOUD_PROJECT or use --project"
                ))
            }
        },
    };
    tracing::info!("Using project: {}", project);

    let identity = GcpClient::new(credentials.identity, &project, endpoints.clone())
        .context("Failed to initialize Identity Toolkit client")?;
    let firestore = GcpClient::new(credentials.firestore, &project, endpoints)
        .context("Failed to initialize Firestore client")?;
    let page_size = config.effective_page_size();
    let collection = config.effective_collection(args.collection.as_deref());

    Ok(Dispatcher::new()
        .with_client(Box::new(IdentityClient::new(identity, page_size)))
        .with_client(Box::new(DocumentClient::new(firestore, &collection, page_size))))
}

/// Print a successful outcome as JSON on stdout
pub fn report_success(outcome: &OperationOutcome) -> ExitCode {
    match serde_json::to_string_pretty(&outcome.to_json()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to render result: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Print a failed operation on stderr; the exit code tells request errors
/// (2) from backend failures (1)
pub fn report_failure(err: &CrudError) -> ExitCode {
    tracing::error!("{}", err);
    eprintln!("Error: {}", err);
    if let Some(hint) = err.backend().and_then(hint_for) {
        eprintln!("Hint: {}", hint);
    }
    ExitCode::from(err.exit_code())
}

/// Print a startup failure (credentials, project, endpoints)
pub fn report_startup_failure(err: &anyhow::Error) -> ExitCode {
    tracing::error!("Startup failed: {:#}", err);
    eprintln!("Error: {:#}", err);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_both_emulators_use_the_emulator_token() {
        let endpoints =
            Endpoints::from_emulator_hosts(Some("127.0.0.1:9099"), Some("127.0.0.1:8080")).unwrap();
        let credentials = ServiceCredentials::resolve(&endpoints, None).await.unwrap();

        assert_eq!(credentials.identity.get_token().await.unwrap(), EMULATOR_TOKEN);
        assert_eq!(credentials.firestore.get_token().await.unwrap(), EMULATOR_TOKEN);
        assert_eq!(credentials.project_id().await, None);
    }

    #[tokio::test]
    async fn test_emulator_token_stays_with_the_emulated_api() {
        let endpoints = Endpoints::from_emulator_hosts(None, Some("127.0.0.1:8080")).unwrap();
        let credentials = ServiceCredentials::resolve(&endpoints, None).await.unwrap();

        assert_eq!(credentials.firestore.get_token().await.unwrap(), EMULATOR_TOKEN);
        // Production Identity Toolkit must never see the emulator token
        assert!(!credentials.identity.is_static());
    }
}
