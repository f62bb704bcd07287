//! Key-value client interface for redisobj.
//!
//! redisobj never talks to a network socket itself. Everything it needs from
//! the key-value store is expressed as [`Command`]s queued on a [`Pipeline`]
//! and executed through a [`KvClient`] in a single round trip, yielding one
//! [`Reply`] (or per-command error) for each queued command, in order.
//!
//! # Backends
//!
//! All backends implement the [`KvClient`] trait:
//!
//! - [`InMemoryClient`] -- a single-node store with string, hash and
//!   sorted-set values, per-key TTLs on a manually advanced clock, a command
//!   log, and injectable failures. Intended for tests, demos and benchmarks.
//!
//! # Design Rules
//!
//! 1. A pipeline's replies are returned in the order its commands were queued.
//! 2. A key that does not exist is not an error: reads reply [`Reply::Nil`]
//!    or an empty collection.
//! 3. Per-command failures do not abort the rest of the pipeline; transport
//!    failures and cancellation fail the whole round trip.

pub mod command;
pub mod context;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod traits;

pub use command::{Command, Reply, SetCondition};
pub use context::Context;
pub use error::{ClientError, ClientResult};
pub use memory::InMemoryClient;
pub use pipeline::Pipeline;
pub use traits::KvClient;
