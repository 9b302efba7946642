//! Custom Axum extractors.

pub mod auth;

pub use auth::{CredentialSource, OptionalSession, Session};
