//! Object-to-key/value mapping engine.
//!
//! redisobj persists plain Rust structs to a Redis-style store and reads them
//! back. Each record type declares its fields once through [`Record`]; the
//! declaration is compiled into a [`RecordPlan`] that decides, per field,
//! which key holds it and which command writes or reads it:
//!
//! | Field | Stored as | Write | Read |
//! |-------|-----------|-------|------|
//! | scalar | field of the record's hash | `HSET` | `HGET` |
//! | list | sorted set scored by index | `DEL` + `ZADD` | `ZRANGE 0 -1` |
//! | map | hash at a leaf key | `DEL` + `HSET` | `HGETALL` |
//! | nested record | its own hash | recursive | recursive |
//!
//! A nested record with an identity field is stored under its own root-level
//! key; one without is embedded under its parent's key.
//!
//! # Round trips
//!
//! Every command for one call is queued on a single pipeline and executed in
//! one round trip. With [`Options::enable_caching`], each boundary record
//! (the root and every keyed record) is hashed first: a write publishes the
//! digest and skips the field writes of records whose digest is unchanged; a
//! read skips records whose stored digest matches the destination.
//!
//! # Modules
//!
//! - [`schema`] / [`record`] -- field declarations
//! - [`plan`] -- compiled per-type plans
//! - [`key`] -- key derivation
//! - [`digest`] -- domain-separated BLAKE3 content digests
//! - [`gate`] -- cache freshness checks
//! - [`exec`] -- command emission and reply resolution
//! - [`store`] -- the [`Store`] facade

pub mod config;
pub mod digest;
pub mod error;
pub mod exec;
pub mod gate;
pub mod key;
pub mod options;
pub mod plan;
pub mod record;
pub mod schema;
pub mod store;

pub use config::StoreConfig;
pub use digest::{ContentDigest, ContentHasher};
pub use error::{Error, Result, SchemaError};
pub use exec::{Emission, ResultConsumer};
pub use gate::{DisabledGate, FreshnessGate, GateMode, StoreGate};
pub use key::{KeyEntry, KeyLayout, KeyRole, Placement};
pub use options::Options;
pub use plan::{FieldShape, FieldSummary, PlanSummary, RecordPlan};
pub use record::{Record, ScalarMap};
pub use schema::Schema;
pub use store::Store;

pub use redisobj_client as client;
pub use redisobj_codec as codec;
