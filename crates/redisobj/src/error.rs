use redisobj_client::ClientError;
use redisobj_codec::CodecError;

/// Errors raised while compiling a record declaration into a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A type or field name cannot be used as a key segment.
    #[error("invalid name {name:?} in {type_name}: {reason}")]
    InvalidName {
        type_name: String,
        name: String,
        reason: String,
    },

    /// Two fields share one name.
    #[error("duplicate field {field:?} in {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// More than one field carries the identity marker.
    #[error("{type_name} declares more than one identity field: {first:?} and {second:?}")]
    DuplicateIdentity {
        type_name: String,
        first: String,
        second: String,
    },

    /// Two embedded (unkeyed) records of the same type would share one key.
    #[error("{type_name} embeds {nested_type} more than once without an identity field")]
    DuplicateEmbeddedType {
        type_name: String,
        nested_type: String,
    },

    /// A record type contains itself.
    #[error("{type_name} is nested within itself")]
    RecursiveType { type_name: String },
}

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target object cannot be mapped (checked before any I/O).
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// The record declaration was rejected by the plan compiler.
    #[error("invalid record schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// A field value cannot be carried by the wire encoding.
    #[error("invalid field type for {field}: {source}")]
    InvalidFieldType {
        field: String,
        #[source]
        source: CodecError,
    },

    /// A keyed record has no stored identity.
    #[error("object not found: {key}")]
    ObjectNotFound { key: String },

    /// The freshness digest or its round trip failed.
    #[error("cache failure at {key}: {reason}")]
    CacheFailure { key: String, reason: String },

    /// The store reported a failure other than an absent key.
    #[error("failed executing store command: {0}")]
    RedisCommand(#[from] ClientError),

    /// The store configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::InvalidFieldType`] for `field` of the record at `key`.
    pub(crate) fn field_type(key: &str, field: &str, source: CodecError) -> Self {
        Self::InvalidFieldType {
            field: format!("{key}/{field}"),
            source,
        }
    }

    /// Build an [`Error::CacheFailure`] for the record at `key`.
    pub(crate) fn cache(key: &str, reason: impl ToString) -> Self {
        Self::CacheFailure {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for [`Error::ObjectNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
