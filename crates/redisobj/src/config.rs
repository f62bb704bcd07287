use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::digest::ContentHasher;
use crate::error::{Error, Result};
use crate::key::DEFAULT_ROOT_PREFIX;
use crate::options::ttl_secs;

/// Store-wide configuration.
///
/// Loadable from TOML:
///
/// ```toml
/// root_prefix = "myapp"
/// default_ttl = 3600
/// digest_domain = "myapp-record-v1"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// First segment of every boundary key.
    pub root_prefix: String,
    /// TTL applied to writes whose options do not set one, in seconds.
    #[serde(with = "ttl_secs")]
    pub default_ttl: Option<Duration>,
    /// Domain tag mixed into every content digest.
    pub digest_domain: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_prefix: DEFAULT_ROOT_PREFIX.to_string(),
            default_ttl: None,
            digest_domain: ContentHasher::RECORD.domain().to_string(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Check that the prefix can be used as a key segment.
    pub fn validate(&self) -> Result<()> {
        if self.root_prefix.is_empty() {
            return Err(Error::Config("root_prefix must not be empty".into()));
        }
        if self
            .root_prefix
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}'))
        {
            return Err(Error::Config(format!(
                "root_prefix {:?} contains whitespace or braces",
                self.root_prefix
            )));
        }
        if self.digest_domain.is_empty() {
            return Err(Error::Config("digest_domain must not be empty".into()));
        }
        Ok(())
    }
}
