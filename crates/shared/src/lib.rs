//! Shared utilities and common types for the Proofroom backend.
//!
//! This crate provides functionality used across all other crates:
//! - Capability model primitives (roles, permission bundles)
//! - Signed credential issuing and verification
//! - Password hashing with Argon2id
//! - Invite code generation and input normalization

pub mod capability;
pub mod crypto;
pub mod jwt;
pub mod password;
pub mod validation;
