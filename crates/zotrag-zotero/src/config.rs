//! Zotero connection settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zotrag_core::LibraryError;

pub const ENV_LIBRARY_ID: &str = "ZOTERO_USER_ID";
pub const ENV_API_KEY: &str = "ZOTERO_API_KEY";
pub const ENV_LIBRARY_TYPE: &str = "ZOTERO_LIBRARY_TYPE";

pub const DEFAULT_BASE_URL: &str = "https://api.zotero.org";

/// Kind of Zotero library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    #[default]
    User,
    Group,
}

impl LibraryType {
    /// URL path segment, `users` or `groups`.
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

impl FromStr for LibraryType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(Self::User),
            "group" | "groups" => Ok(Self::Group),
            other => Err(LibraryError::MissingCredentials(format!(
                "{ENV_LIBRARY_TYPE} must be 'user' or 'group', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// Settings for [`ZoteroClient`](crate::ZoteroClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct ZoteroConfig {
    pub library_id: String,
    #[serde(default)]
    pub library_type: LibraryType,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Items per listing request (the API caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    120
}

impl ZoteroConfig {
    pub fn new(library_id: impl Into<String>, library_type: LibraryType, api_key: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            library_type,
            api_key: api_key.into(),
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Read `ZOTERO_USER_ID`, `ZOTERO_API_KEY` and `ZOTERO_LIBRARY_TYPE`.
    ///
    /// The library type defaults to `user` when unset.
    pub fn from_env() -> Result<Self, LibraryError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LibraryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| LibraryError::MissingCredentials(format!("{name} is not set")))
        };

        let library_id = required(ENV_LIBRARY_ID)?;
        let api_key = required(ENV_API_KEY)?;
        let library_type = match lookup(ENV_LIBRARY_TYPE) {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => LibraryType::default(),
        };

        Ok(Self::new(library_id, library_type, api_key))
    }

    /// Base URL of this library, e.g. `https://api.zotero.org/users/123`.
    #[must_use]
    pub fn library_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.library_type.path_segment(),
            self.library_id
        )
    }
}

impl fmt::Debug for ZoteroConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoteroConfig")
            .field("library_id", &self.library_id)
            .field("library_type", &self.library_type)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish()
    }
}
