//! firecrud
//!
//! Create, read, update and delete Firebase Authentication users and Cloud
//! Firestore documents from the command line.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod gcp;
pub mod resource;

/// Version injected at compile time via FIRECRUD_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("FIRECRUD_VERSION") {
    Some(v) => v,
    None => "dev",
};
