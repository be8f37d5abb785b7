//! Account records and startup loading.
//!
//! One [`Account`] configures one session: a display name, an optional
//! starting address, and the authentication cookies exported from a real
//! browser profile. Accounts are loaded once at process start and never
//! mutated afterwards; a run with no account source at all is a fatal
//! startup error.

use std::path::Path;

use chromiumoxide::cdp::browser_protocol::network::{
    CookieSameSite, SetCookieParams, TimeSinceEpoch,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{PatrolError, Result};

/// Environment variable carrying the accounts JSON list.
pub const ACCOUNTS_ENV: &str = "PATROL_ACCOUNTS";

/// Fallback accounts file in the working directory.
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Identity for one session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,

    /// Starting address; the site root when absent.
    #[serde(default)]
    pub start_url: Option<String>,

    #[serde(default)]
    pub cookies: Vec<AccountCookie>,
}

/// A cookie in browser-extension export shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Unix seconds; ignored for session cookies.
    #[serde(default)]
    pub expiration_date: Option<f64>,
    #[serde(default)]
    pub session: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    /// `lax` / `strict` / `none`, case-insensitive; anything else is dropped.
    #[serde(default)]
    pub same_site: Option<String>,
}

impl AccountCookie {
    /// Normalizes this record into CDP `Network.setCookie` parameters.
    pub fn to_params(&self) -> Result<SetCookieParams> {
        let mut builder = SetCookieParams::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .path(self.path.clone().unwrap_or_else(|| "/".to_string()))
            .http_only(self.http_only)
            .secure(self.secure);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let (Some(expires), false) = (self.expiration_date, self.session) {
            builder = builder.expires(TimeSinceEpoch::new(expires.floor()));
        }
        if let Some(same_site) = self.same_site.as_deref() {
            match same_site.to_ascii_lowercase().as_str() {
                "lax" => builder = builder.same_site(CookieSameSite::Lax),
                "strict" => builder = builder.same_site(CookieSameSite::Strict),
                "none" => builder = builder.same_site(CookieSameSite::None),
                other => debug!(value = other, cookie = %self.name, "dropping unknown sameSite"),
            }
        }

        builder
            .build()
            .map_err(|e| PatrolError::Config(format!("cookie {}: {e}", self.name)))
    }
}

/// Loads the account list from the environment, falling back to `file`.
///
/// [`ACCOUNTS_ENV`] wins when set, then the file; when neither source
/// exists the process must not start.
pub fn load_accounts(file: Option<&Path>) -> Result<Vec<Account>> {
    if let Ok(raw) = std::env::var(ACCOUNTS_ENV) {
        return parse_accounts(&raw)
            .map_err(|e| PatrolError::Config(format!("{ACCOUNTS_ENV}: {e}")));
    }

    let path = file.unwrap_or(Path::new(ACCOUNTS_FILE));
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        return parse_accounts(&raw)
            .map_err(|e| PatrolError::Config(format!("{}: {e}", path.display())));
    }

    Err(PatrolError::Config(format!(
        "no accounts configured: set {ACCOUNTS_ENV} or provide {}",
        path.display()
    )))
}

fn parse_accounts(raw: &str) -> std::result::Result<Vec<Account>, serde_json::Error> {
    serde_json::from_str(raw)
}
