//! Client configuration.

use std::fmt;
use std::time::Duration;

use notion2sql_core::{Error, Result};

/// Notion REST API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
/// API version sent in the `Notion-Version` header
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
/// Request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Retries for 429 and 5xx responses
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Largest page size Notion accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Settings shared by every request a client makes.
///
/// # Examples
///
/// ```
/// use notion2sql_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("secret_abc")
///     .with_timeout(Duration::from_secs(10))
///     .with_max_retries(5);
/// assert_eq!(config.max_retries, 5);
/// assert!(!format!("{:?}", config).contains("secret_abc"));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Integration token
    pub api_key: String,
    /// API root, without trailing slash
    pub base_url: String,
    pub notion_version: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Page size used when following pagination
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Default settings with the given api key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read settings from `NOTION_API_KEY` (required), `NOTION_BASE_URL`,
    /// `NOTION_VERSION`, `NOTION_TIMEOUT_SECS` and `NOTION_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("NOTION_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("NOTION_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key.trim());
        if let Some(url) = lookup("NOTION_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(version) = lookup("NOTION_VERSION") {
            config = config.with_notion_version(version);
        }
        if let Some(secs) = lookup("NOTION_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid NOTION_TIMEOUT_SECS: {secs}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = lookup("NOTION_MAX_RETRIES") {
            let retries: u32 = retries
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid NOTION_MAX_RETRIES: {retries}")))?;
            config = config.with_max_retries(retries);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_notion_version(mut self, version: impl Into<String>) -> Self {
        self.notion_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reject settings the API would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::Config("api key is empty".to_string()));
        }
        if self.api_key.chars().any(char::is_whitespace) {
            return Err(Error::Config("api key contains whitespace".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("notion_version", &self.notion_version)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Page id from `NOTION_PAGE_ID`.
pub fn page_id_from_env() -> Result<String> {
    std::env::var("NOTION_PAGE_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::Config("NOTION_PAGE_ID is not set".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("secret_x");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.notion_version, "2022-06-28");
        assert_eq!(config.page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("NOTION_API_KEY", " secret_y "),
            ("NOTION_BASE_URL", "http://localhost:8080/v1/"),
            ("NOTION_TIMEOUT_SECS", "5"),
            ("NOTION_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "secret_y");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_from_lookup_errors() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[
                ("NOTION_API_KEY", "k"),
                ("NOTION_TIMEOUT_SECS", "soon")
            ])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("a b").validate().is_err());
        assert!(ClientConfig::new("k").with_page_size(101).validate().is_err());
        assert!(ClientConfig::new("k")
            .with_base_url("ftp://x")
            .validate()
            .is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let text = format!("{:?}", ClientConfig::new("secret_hidden"));
        assert!(!text.contains("secret_hidden"));
        assert!(text.contains("<redacted>"));
    }
}
