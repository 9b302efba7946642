//! Persistence layer for the Proofroom backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage traits
//! - Classification of driver failures into transient and terminal

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

pub use repositories::{GalleryRepository, IdentityRepository, InviteRepository};
