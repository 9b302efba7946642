//! Domain layer for the Proofroom backend.
//!
//! This crate contains:
//! - Domain models (Invite, Gallery, Identity)
//! - The storage and collaborator traits the core consumes
//! - The invite lifecycle and the resilient store gateway
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;

pub use errors::{InviteError, StoreError};
