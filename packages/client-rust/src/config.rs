//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use schemaform_core::LookupOrdering;

/// Where schema and menu documents are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLocation {
    /// Static web root, e.g. `http://localhost:5173`.
    Http(String),
    /// Local directory holding `schemas/*.json`.
    Directory(PathBuf),
}

impl SchemaLocation {
    /// `http://` and `https://` values are web roots; anything else is a path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Http(raw.to_string())
        } else {
            Self::Directory(PathBuf::from(raw))
        }
    }
}

/// Errors from [`ClientConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("page size must be at least 1")]
    ZeroPageSize,
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level configuration for the renderers and their collaborators.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the entity storage API.
    pub api_base_url: String,
    /// Where schema documents live.
    pub schema_location: SchemaLocation,
    /// Path of the menu document relative to the schema location.
    pub menu_path: String,
    /// Records per list page.
    pub page_size: u32,
    /// Maximum time to wait for any single request.
    pub request_timeout: Duration,
    /// Skip TLS certificate verification (local development servers).
    pub accept_invalid_certs: bool,
    /// How overlapping autocomplete responses are applied.
    pub lookup_ordering: LookupOrdering,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://localhost:7277/api".to_string(),
            schema_location: SchemaLocation::Http("http://localhost:5173".to_string()),
            menu_path: "schemas/menu.json".to_string(),
            page_size: 2,
            request_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            lookup_ordering: LookupOrdering::LatestIssued,
        }
    }
}

impl ClientConfig {
    /// Checks the values that would otherwise fail on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero page size or an unparsable URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        check_url("api base URL", &self.api_base_url)?;
        if let SchemaLocation::Http(root) = &self.schema_location {
            check_url("schema root", root)?;
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
