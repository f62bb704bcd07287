use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};
use crate::plan::RecordPlan;
use crate::record::Record;

/// Domain-separated BLAKE3 content hasher for records.
///
/// The domain tag is prepended to every digest, so two stores configured
/// with different domains never consider each other's digests fresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: Cow<'static, str>,
}

impl ContentHasher {
    /// Hasher for record contents.
    pub const RECORD: Self = Self {
        domain: Cow::Borrowed("redisobj-record-v1"),
    };

    /// Create a hasher with a custom domain tag.
    pub fn new(domain: impl Into<Cow<'static, str>>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// Start a digest.
    pub fn builder(&self) -> DigestBuilder {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        DigestBuilder { hasher }
    }

    /// Digest one record and its embedded children.
    pub fn digest<R: Record>(&self, plan: &RecordPlan<R>, obj: &R) -> Result<ContentDigest> {
        let mut builder = self.builder();
        feed_record(plan, obj, &mut builder)?;
        Ok(builder.finish())
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::RECORD
    }
}

/// A finished 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, as stored at the freshness key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

// Every item is tagged and length-prefixed so adjacent values cannot run
// into each other.
const TAG_RECORD: u8 = 0x01;
const TAG_SCALAR: u8 = 0x02;
const TAG_LIST: u8 = 0x03;
const TAG_MAP: u8 = 0x04;
const TAG_END: u8 = 0x05;

/// Incremental digest over a record's encoded fields.
pub struct DigestBuilder {
    hasher: blake3::Hasher,
}

impl DigestBuilder {
    fn bytes(&mut self, data: &str) {
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data.as_bytes());
    }

    pub fn begin_record(&mut self, type_name: &str) {
        self.hasher.update(&[TAG_RECORD]);
        self.bytes(type_name);
    }

    pub fn end_record(&mut self) {
        self.hasher.update(&[TAG_END]);
    }

    pub fn scalar(&mut self, name: &str, value: &str) {
        self.hasher.update(&[TAG_SCALAR]);
        self.bytes(name);
        self.bytes(value);
    }

    pub fn list(&mut self, name: &str, items: &[String]) {
        self.hasher.update(&[TAG_LIST]);
        self.bytes(name);
        self.hasher.update(&(items.len() as u64).to_le_bytes());
        for item in items {
            self.bytes(item);
        }
    }

    /// `entries` must already be in a canonical order.
    pub fn map(&mut self, name: &str, entries: &[(String, String)]) {
        self.hasher.update(&[TAG_MAP]);
        self.bytes(name);
        self.hasher.update(&(entries.len() as u64).to_le_bytes());
        for (key, value) in entries {
            self.bytes(key);
            self.bytes(value);
        }
    }

    pub fn finish(self) -> ContentDigest {
        ContentDigest(*self.hasher.finalize().as_bytes())
    }
}

/// Feed `obj` and its embedded children, in write order.
pub(crate) fn feed_record<R: Record>(
    plan: &RecordPlan<R>,
    obj: &R,
    builder: &mut DigestBuilder,
) -> Result<()> {
    builder.begin_record(plan.type_name());
    for child in plan.nested_fields() {
        child.plan.digest(obj, builder)?;
    }
    for field in plan.scalar_fields() {
        let value = field
            .encode(obj)
            .map_err(|e| Error::field_type(plan.type_name(), field.name(), e))?;
        builder.scalar(field.name(), &value);
    }
    for field in plan.list_fields() {
        let items = field
            .encode(obj)
            .map_err(|e| Error::field_type(plan.type_name(), field.name(), e))?;
        builder.list(field.name(), &items);
    }
    for field in plan.map_fields() {
        let entries = field
            .encode(obj)
            .map_err(|e| Error::field_type(plan.type_name(), field.name(), e))?;
        builder.map(field.name(), &entries);
    }
    builder.end_record();
    Ok(())
}
