//! Key derivation.
//!
//! Every record maps to one hash key; list and map fields get leaf keys
//! beneath it, and boundary records get a freshness key:
//!
//! ```text
//! {redisobj:Root:u1}                      hash: scalar fields of Root
//! {redisobj:Root:u1}.Tags                 sorted set: list field
//! {redisobj:Root:u1}.__HASH__             string: content digest
//! {redisobj:Root:u1}:Address              hash: embedded record
//! {redisobj:NestedWithOwnKey:c1}          hash: keyed nested record
//! ```
//!
//! Boundary keys are wrapped in braces so that a record and all of its
//! embedded children share one cluster hash slot.

use serde::Serialize;
use tracing::trace;

use crate::plan::RecordPlan;
use crate::record::Record;

/// Root prefix used when none is configured.
pub const DEFAULT_ROOT_PREFIX: &str = "redisobj";

/// Identity segment used when a keyed record's identity is empty.
pub const MISSING_IDENTITY: &str = "none";

/// Leaf name of the freshness key.
pub const HASH_FIELD: &str = "__HASH__";

/// Where a record sits relative to the object passed to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement<'a> {
    /// The object passed to the store.
    Root,
    /// A nested record under the record stored at `parent_key`.
    Nested { parent_key: &'a str },
}

impl Placement<'_> {
    /// Boundary records own their key and freshness digest: the root, and
    /// every keyed record wherever it is nested.
    pub fn is_boundary(&self, keyed: bool) -> bool {
        keyed || matches!(self, Self::Root)
    }
}

/// Derive the hash key of `obj`.
///
/// Total: an empty or unencodable identity degrades to [`MISSING_IDENTITY`].
pub fn record_key<R: Record>(
    plan: &RecordPlan<R>,
    obj: &R,
    placement: Placement<'_>,
    root_prefix: &str,
) -> String {
    match placement {
        Placement::Nested { parent_key } if !plan.is_keyed() => {
            format!("{parent_key}:{}", plan.type_name())
        }
        _ => {
            if !plan.is_keyed() {
                return format!("{{{root_prefix}:{}}}", plan.type_name());
            }
            let identity = plan.identity_of(obj).unwrap_or_else(|| {
                trace!(type_name = plan.type_name(), "empty identity, using placeholder");
                MISSING_IDENTITY.to_string()
            });
            format!("{{{root_prefix}:{}:{identity}}}", plan.type_name())
        }
    }
}

/// Key of a list or map field of the record stored at `record_key`.
pub fn leaf_key(record_key: &str, field: &str) -> String {
    format!("{record_key}.{field}")
}

/// Key holding the content digest of the boundary record at `record_key`.
pub fn freshness_key(record_key: &str) -> String {
    leaf_key(record_key, HASH_FIELD)
}

/// What a key in a [`KeyLayout`] stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum KeyRole {
    /// Hash of a record's scalar fields.
    Record { type_name: &'static str },
    /// Sorted set of a list field.
    List { field: &'static str },
    /// Hash of a map field.
    Map { field: &'static str },
    /// Content digest of a boundary record.
    Freshness,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyEntry {
    pub key: String,
    #[serde(flatten)]
    pub role: KeyRole,
}

/// Every key an object maps to, in write order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KeyLayout {
    pub entries: Vec<KeyEntry>,
}

impl KeyLayout {
    fn push(&mut self, key: String, role: KeyRole) {
        self.entries.push(KeyEntry { key, role });
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn layout_record<R: Record>(
    plan: &RecordPlan<R>,
    obj: &R,
    placement: Placement<'_>,
    root_prefix: &str,
    out: &mut KeyLayout,
) {
    let key = record_key(plan, obj, placement, root_prefix);
    out.push(
        key.clone(),
        KeyRole::Record {
            type_name: plan.type_name(),
        },
    );
    if placement.is_boundary(plan.is_keyed()) {
        out.push(freshness_key(&key), KeyRole::Freshness);
    }
    for child in plan.nested_fields() {
        child.plan.layout(obj, &key, root_prefix, out);
    }
    for field in plan.list_fields() {
        out.push(leaf_key(&key, field.name()), KeyRole::List { field: field.name() });
    }
    for field in plan.map_fields() {
        out.push(leaf_key(&key, field.name()), KeyRole::Map { field: field.name() });
    }
}
