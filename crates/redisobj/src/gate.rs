use std::time::Duration;

use redisobj_client::{Command, Context, KvClient, Reply};
use tracing::debug;

use crate::digest::ContentDigest;
use crate::error::{Error, Result};
use crate::key;

/// Which side of a call the gate is consulted for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateMode {
    /// Publish the new digest (with the write's TTL) and report whether it
    /// matches the one it replaced.
    Write { ttl: Option<Duration> },
    /// Report whether the stored digest matches.
    Read,
}

/// Decides whether a boundary record's stored contents are already current.
pub trait FreshnessGate: Send + Sync {
    /// Returns `true` when the digest stored for `record_key` equals
    /// `digest`. A missing digest is never fresh.
    fn check(&self, record_key: &str, digest: &ContentDigest, mode: GateMode) -> Result<bool>;

    /// Returns `false` for gates that never report fresh. Callers skip
    /// computing digests for them.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Gate used when caching is disabled: nothing is ever fresh.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledGate;

impl FreshnessGate for DisabledGate {
    fn check(&self, _record_key: &str, _digest: &ContentDigest, _mode: GateMode) -> Result<bool> {
        Ok(false)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Gate backed by the freshness keys in the store.
///
/// Each check is its own round trip, issued before the main pipeline.
pub struct StoreGate<'a, C: ?Sized> {
    client: &'a C,
    ctx: &'a Context,
}

impl<'a, C: KvClient + ?Sized> StoreGate<'a, C> {
    pub fn new(client: &'a C, ctx: &'a Context) -> Self {
        Self { client, ctx }
    }
}

impl<C: KvClient + ?Sized> FreshnessGate for StoreGate<'_, C> {
    fn check(&self, record_key: &str, digest: &ContentDigest, mode: GateMode) -> Result<bool> {
        let hash_key = key::freshness_key(record_key);
        let current = digest.to_hex();
        let command = match mode {
            GateMode::Write { ttl } => Command::set_get(&hash_key, &current, ttl),
            GateMode::Read => Command::get(&hash_key),
        };
        let reply = self
            .client
            .execute_one(self.ctx, command)
            .map_err(|e| Error::cache(record_key, e))?;
        let fresh = match reply {
            Reply::Nil => false,
            Reply::Bulk(stored) => stored == current,
            other => {
                return Err(Error::cache(
                    record_key,
                    format!("unexpected {} reply for {hash_key}", other.shape()),
                ))
            }
        };
        debug!(key = %record_key, fresh, ?mode, "freshness checked");
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use redisobj_client::{ClientError, InMemoryClient};

    use super::*;
    use crate::digest::ContentHasher;

    fn digest_of(text: &str) -> ContentDigest {
        let mut builder = ContentHasher::RECORD.builder();
        builder.scalar("Text", text);
        builder.finish()
    }

    #[test]
    fn disabled_gate_is_never_fresh() {
        let gate = DisabledGate;
        assert!(!gate.is_enabled());
        assert!(!gate.check("k", &digest_of("a"), GateMode::Read).unwrap());
    }

    #[test]
    fn write_publishes_and_compares() {
        let client = InMemoryClient::new();
        let ctx = Context::background();
        let gate = StoreGate::new(&client, &ctx);
        let write = GateMode::Write { ttl: None };

        assert!(!gate.check("{r:T}", &digest_of("a"), write).unwrap());
        assert_eq!(client.string("{r:T}.__HASH__"), Some(digest_of("a").to_hex()));
        assert!(gate.check("{r:T}", &digest_of("a"), write).unwrap());
        assert!(!gate.check("{r:T}", &digest_of("b"), write).unwrap());
        assert_eq!(client.string("{r:T}.__HASH__"), Some(digest_of("b").to_hex()));
    }

    #[test]
    fn write_applies_ttl() {
        let client = InMemoryClient::new();
        let ctx = Context::background();
        let gate = StoreGate::new(&client, &ctx);
        let ttl = Duration::from_secs(30);
        gate.check("{r:T}", &digest_of("a"), GateMode::Write { ttl: Some(ttl) })
            .unwrap();
        assert_eq!(client.ttl("{r:T}.__HASH__"), Some(ttl));
    }

    #[test]
    fn read_does_not_publish() {
        let client = InMemoryClient::new();
        let ctx = Context::background();
        let gate = StoreGate::new(&client, &ctx);
        assert!(!gate.check("{r:T}", &digest_of("a"), GateMode::Read).unwrap());
        assert!(client.is_empty());

        gate.check("{r:T}", &digest_of("a"), GateMode::Write { ttl: None })
            .unwrap();
        assert!(gate.check("{r:T}", &digest_of("a"), GateMode::Read).unwrap());
        assert!(!gate.check("{r:T}", &digest_of("z"), GateMode::Read).unwrap());
    }

    #[test]
    fn store_errors_become_cache_failures() {
        let client = InMemoryClient::new();
        let ctx = Context::background();
        client.fail_next_round_trip(ClientError::Connection("reset".into()));
        let gate = StoreGate::new(&client, &ctx);
        let err = gate
            .check("{r:T}", &digest_of("a"), GateMode::Read)
            .unwrap_err();
        assert!(matches!(err, Error::CacheFailure { ref key, .. } if key == "{r:T}"));
    }
}
