//! Scalar wire codec for redisobj.
//!
//! Every value that redisobj places in the key-value store travels as a
//! string: hash field values, sorted-set members, identity segments of keys.
//! This crate defines that representation.
//!
//! # Key Types
//!
//! - [`Scalar`] -- a primitive value with a lossless string encoding
//! - [`ScalarKind`] -- the classification of a scalar, used in plans and errors
//! - [`CodecError`] -- the `InvalidFieldType` failure family
//!
//! # Encoding Rules
//!
//! 1. Integers of every width use their canonical base-10 form.
//! 2. Floats use the shortest decimal that parses back to the same value.
//! 3. Booleans encode as `"true"` / `"false"`.
//! 4. Strings are stored verbatim.
//! 5. The empty string decodes to the zero value of every non-string kind,
//!    so a field that was never written reads back as its default.

pub mod error;
pub mod kind;
pub mod scalar;

pub use error::{CodecError, CodecResult};
pub use kind::ScalarKind;
pub use scalar::Scalar;
