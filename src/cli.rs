//! Command-line surface
//!
//! Flags become one [`OperationRequest`]. The action and resource selectors
//! are plain strings so that unknown values are reported through the same
//! error path as every other failure.

use crate::error::CrudResult;
use crate::resource::{OperationRequest, ParameterBag};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// CRUD for Firebase Authentication users and Cloud Firestore documents
#[derive(Parser, Debug, Clone)]
#[command(name = "firecrud", version, about, long_about = None)]
pub struct Args {
    /// Resource kind: identity (users) or document (firestore)
    #[arg(short, long)]
    pub resource: String,

    /// The action to perform: create, read (or get), update or delete
    #[arg(short, long)]
    pub action: String,

    /// User ID for read, update and delete on identities
    #[arg(long = "userId", visible_alias = "user-id")]
    pub user_id: Option<String>,

    /// Document ID for read, update and delete on documents
    #[arg(long = "docId", visible_alias = "doc-id")]
    pub doc_id: Option<String>,

    /// User email
    #[arg(long)]
    pub email: Option<String>,

    /// User password
    #[arg(long)]
    pub password: Option<String>,

    /// User display name
    #[arg(long)]
    pub display_name: Option<String>,

    /// Whether the user's email is verified (true/false)
    #[arg(long)]
    pub email_verified: Option<String>,

    /// Whether the user is disabled (true/false)
    #[arg(long)]
    pub disabled: Option<String>,

    /// Document field as key=value (repeatable)
    #[arg(short, long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// Firestore collection (default: users)
    #[arg(long)]
    pub collection: Option<String>,

    /// Firebase / GCP project to use
    #[arg(short, long)]
    pub project: Option<String>,

    /// Service account key file (default: Application Default Credentials)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Args {
    /// Collect every supplied parameter into a bag
    pub fn params(&self) -> ParameterBag {
        let mut params = ParameterBag::new();
        for (key, value) in &self.fields {
            params.insert(key, value);
        }

        let named = [
            ("userId", &self.user_id),
            ("docId", &self.doc_id),
            ("email", &self.email),
            ("password", &self.password),
            ("displayName", &self.display_name),
            ("emailVerified", &self.email_verified),
            ("disabled", &self.disabled),
        ];
        for (name, value) in named {
            if let Some(value) = value {
                params.insert(name, value);
            }
        }
        params
    }

    pub fn request(&self) -> CrudResult<OperationRequest> {
        OperationRequest::parse(&self.resource, &self.action, self.params())
    }
}
