//! Session boundary: binds signed tokens to the browser as a cookie and keeps
//! the cookie's scope pinned to one canonical host.
//!
//! `attach` and `clear` render the scope attributes (`Path`, `Domain`,
//! `Secure`, `SameSite`) from the same function. A clear that differs in any
//! of them is ignored by browsers and leaves the old cookie in place.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use shared::jwt::SignedToken;

use crate::config::{Environment, SessionConfig};

/// SameSite policy of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    /// Cross-site sends allowed; needed for the external redirect flow in production.
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Session cookie writer and reader.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    path: String,
    domain: Option<String>,
    secure: bool,
    same_site: SameSite,
}

impl SessionCookies {
    pub fn new(config: &SessionConfig) -> Self {
        let production = config.environment.is_production();
        let domain = config.cookie_domain.trim();
        Self {
            name: config.cookie_name.clone(),
            path: config.cookie_path.clone(),
            domain: (!domain.is_empty()).then(|| domain.to_string()),
            secure: production,
            same_site: match config.environment {
                Environment::Development => SameSite::Strict,
                Environment::Production => SameSite::None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set-Cookie value carrying `token`, living as long as the token does.
    pub fn build_session_cookie(&self, token: &SignedToken) -> String {
        let max_age = (token.expires_at - token.issued_at).num_seconds().max(0);
        format!(
            "{}={}; Max-Age={}{}",
            self.name,
            token.token,
            max_age,
            self.scope_attributes()
        )
    }

    /// Set-Cookie value that removes the session cookie.
    pub fn build_clear_cookie(&self) -> String {
        format!(
            "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
            self.name,
            self.scope_attributes()
        )
    }

    /// Adds the session cookie to response headers.
    pub fn attach(&self, headers: &mut HeaderMap, token: &SignedToken) {
        if let Ok(value) = HeaderValue::from_str(&self.build_session_cookie(token)) {
            headers.append(SET_COOKIE, value);
        }
    }

    /// Adds a clearing Set-Cookie to response headers.
    pub fn clear(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.build_clear_cookie()) {
            headers.append(SET_COOKIE, value);
        }
    }

    /// Session token from the request's Cookie header, if present and non-empty.
    pub fn extract<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|cookie_header| cookie_header.split(';'))
            .map(str::trim)
            .find_map(|cookie| {
                let (cookie_name, cookie_value) = cookie.split_once('=')?;
                (cookie_name == self.name && !cookie_value.is_empty()).then_some(cookie_value)
            })
    }

    fn scope_attributes(&self) -> String {
        let mut attrs = format!("; Path={}; HttpOnly", self.path);

        if self.secure {
            attrs.push_str("; Secure");
        }

        attrs.push_str("; SameSite=");
        attrs.push_str(self.same_site.as_str());

        if let Some(domain) = &self.domain {
            attrs.push_str("; Domain=");
            attrs.push_str(domain);
        }

        attrs
    }
}

/// Decides whether a request host must be redirected to the canonical host.
#[derive(Debug, Clone)]
pub struct HostCanonicalizer {
    canonical_host: String,
    aliases: Vec<String>,
    scheme: &'static str,
}

impl HostCanonicalizer {
    /// Returns `None` when no canonical host is configured.
    pub fn from_config(config: &SessionConfig) -> Option<Self> {
        let canonical_host = config.canonical_host.trim().to_ascii_lowercase();
        if canonical_host.is_empty() {
            return None;
        }

        let mut aliases: Vec<String> = config
            .host_aliases
            .iter()
            .map(|alias| alias.trim().to_ascii_lowercase())
            .filter(|alias| !alias.is_empty() && *alias != canonical_host)
            .collect();

        // The www-toggled variant is always an alias.
        let toggled = match canonical_host.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => format!("www.{}", canonical_host),
        };
        if !aliases.contains(&toggled) {
            aliases.push(toggled);
        }

        Some(Self {
            canonical_host,
            aliases,
            scheme: if config.environment.is_production() {
                "https"
            } else {
                "http"
            },
        })
    }

    pub fn canonical_host(&self) -> &str {
        &self.canonical_host
    }

    /// Redirect location for a request on `host` (as sent, port included)
    /// targeting `path_and_query`. Unknown hosts are left alone.
    pub fn redirect_target(&self, host: &str, path_and_query: &str) -> Option<String> {
        let name = strip_port(host).trim_end_matches('.').to_ascii_lowercase();
        if name == self.canonical_host || !self.aliases.iter().any(|alias| *alias == name) {
            return None;
        }

        let path_and_query = if path_and_query.is_empty() {
            "/"
        } else {
            path_and_query
        };
        Some(format!(
            "{}://{}{}",
            self.scheme, self.canonical_host, path_and_query
        ))
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. [::1]:8080
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}
