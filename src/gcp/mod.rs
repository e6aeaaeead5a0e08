//! Google API plumbing
//!
//! Authentication, the bearer-token HTTP client and URL builders for the
//! Identity Toolkit and Firestore REST APIs.
//!
//! # Module Structure
//!
//! - [`auth`] - Service account / ADC credentials with token caching
//! - [`client`] - Main client: credentials + HTTP + endpoints
//! - [`http`] - HTTP verbs and Google error envelope parsing

pub mod auth;
pub mod client;
pub mod http;
