//! Application services around the access core.

pub mod bootstrap;
pub mod credentials;
pub mod email;
pub mod session;

pub use email::EmailService;
pub use session::{HostCanonicalizer, SessionCookies};
