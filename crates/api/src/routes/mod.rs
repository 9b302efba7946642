//! HTTP route handlers.

pub mod auth;
pub mod health;
pub mod invites;
