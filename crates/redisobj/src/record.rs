use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use redisobj_codec::{CodecResult, Scalar};

use crate::schema::Schema;

/// A type that can be written to and read from the key-value store.
///
/// Implementations declare their fields in struct order through the
/// [`Schema`] builder. The declaration is compiled once per type into a
/// [`RecordPlan`](crate::RecordPlan) and cached by the [`Store`](crate::Store).
///
/// ```
/// use redisobj::{Record, Schema};
///
/// #[derive(Default)]
/// struct Session {
///     id: String,
///     user: String,
///     hits: u64,
///     pages: Vec<String>,
/// }
///
/// impl Record for Session {
///     const TYPE_NAME: &'static str = "Session";
///
///     fn schema(schema: &mut Schema<Self>) {
///         schema
///             .key("Id", |s| &s.id, |s| &mut s.id)
///             .scalar("User", |s| &s.user, |s| &mut s.user)
///             .scalar("Hits", |s| &s.hits, |s| &mut s.hits)
///             .list("Pages", |s| &s.pages, |s| &mut s.pages);
///     }
/// }
/// ```
pub trait Record: Send + Sync + 'static {
    /// The type name used as a key segment. Must be unique per store.
    const TYPE_NAME: &'static str;

    /// Declare the record's fields.
    fn schema(schema: &mut Schema<Self>)
    where
        Self: Sized;
}

/// A map whose keys and values are both [`Scalar`]s.
///
/// Implemented for [`HashMap`] and [`BTreeMap`]. Maps are stored as a hash
/// at their leaf key and replaced wholesale on read.
pub trait ScalarMap: Default + Send + Sync + 'static {
    type Key: Scalar;
    type Value: Scalar;

    /// Encode every entry. Order is unspecified.
    fn encode_entries(&self) -> CodecResult<Vec<(String, String)>>;

    /// Insert a decoded entry.
    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
}

impl<K, V, S> ScalarMap for HashMap<K, V, S>
where
    K: Scalar + Eq + Hash,
    V: Scalar,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn encode_entries(&self) -> CodecResult<Vec<(String, String)>> {
        self.iter()
            .map(|(k, v)| Ok((k.encode()?, v.encode()?)))
            .collect()
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K, V> ScalarMap for BTreeMap<K, V>
where
    K: Scalar + Ord,
    V: Scalar,
{
    type Key = K;
    type Value = V;

    fn encode_entries(&self) -> CodecResult<Vec<(String, String)>> {
        self.iter()
            .map(|(k, v)| Ok((k.encode()?, v.encode()?)))
            .collect()
    }

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}
