use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call behavior for [`Store::write`](crate::Store::write) and
/// [`Store::read`](crate::Store::read).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Consult and publish content digests so unchanged records are skipped.
    pub enable_caching: bool,
    /// Expiry applied to every key a write touches. Ignored by reads.
    #[serde(default, with = "ttl_secs")]
    pub ttl: Option<Duration>,
}

impl Options {
    /// Caching disabled, no TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caching enabled, no TTL.
    pub fn cached() -> Self {
        Self::new().with_caching(true)
    }

    pub fn with_caching(mut self, enable: bool) -> Self {
        self.enable_caching = enable;
        self
    }

    /// Set the TTL. A zero duration means no TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// The TTL to apply, falling back to `default` when none is set.
    pub fn effective_ttl(&self, default: Option<Duration>) -> Option<Duration> {
        self.ttl.or(default).filter(|ttl| !ttl.is_zero())
    }
}

/// TTLs as whole seconds in serialized form.
pub(crate) mod ttl_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => s.serialize_some(&ttl.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs))
    }
}
