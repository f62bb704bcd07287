use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Existence precondition for [`Command::Set`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SetCondition {
    /// Always set.
    #[default]
    Always,
    /// Only set if the key does not exist (`NX`).
    IfNotExists,
    /// Only set if the key already exists (`XX`).
    IfExists,
}

/// A single key-value store command.
///
/// The variants cover exactly the command surface redisobj consumes. Each
/// variant documents the [`Reply`] shape it produces.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Command {
    /// `GET key` → [`Reply::Bulk`] or [`Reply::Nil`].
    Get { key: String },

    /// `SET key value [EX ttl] [NX|XX] [GET]`.
    ///
    /// With `get`, replies with the previous value ([`Reply::Bulk`] or
    /// [`Reply::Nil`]) whether or not the write happened. Without it, replies
    /// [`Reply::Ok`], or [`Reply::Nil`] when the condition was not met.
    /// A plain `SET` without expiry clears any existing TTL.
    Set {
        key: String,
        value: String,
        expiry: Option<Duration>,
        condition: SetCondition,
        get: bool,
    },

    /// `HGET key field` → [`Reply::Bulk`] or [`Reply::Nil`].
    HGet { key: String, field: String },

    /// `HSET key field value [field value ...]` → [`Reply::Integer`] (fields added).
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// `HGETALL key` → [`Reply::Map`] (empty when the key is absent).
    HGetAll { key: String },

    /// `ZADD key score member [score member ...]` → [`Reply::Integer`] (members added).
    ZAdd {
        key: String,
        members: Vec<(f64, String)>,
    },

    /// `ZRANGE key start stop` → [`Reply::Array`] ordered by score.
    ZRange { key: String, start: i64, stop: i64 },

    /// `DEL key [key ...]` → [`Reply::Integer`] (keys removed).
    Del { keys: Vec<String> },

    /// `PEXPIRE key ttl` → [`Reply::Integer`] (1 if the key exists).
    Expire { key: String, ttl: Duration },

    /// `PERSIST key` → [`Reply::Integer`] (1 if an expiry was removed).
    Persist { key: String },

    /// `PTTL key` → [`Reply::Integer`]: milliseconds left, `-1` without
    /// expiry, `-2` when the key is absent.
    Ttl { key: String },
}

impl Command {
    /// `GET key`.
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    /// Unconditional `SET key value [EX ttl]`.
    pub fn set(key: impl Into<String>, value: impl Into<String>, expiry: Option<Duration>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            expiry,
            condition: SetCondition::Always,
            get: false,
        }
    }

    /// `SET key value [EX ttl] GET`: write and return the previous value.
    pub fn set_get(
        key: impl Into<String>,
        value: impl Into<String>,
        expiry: Option<Duration>,
    ) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            expiry,
            condition: SetCondition::Always,
            get: true,
        }
    }

    /// `HGET key field`.
    pub fn hget(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::HGet {
            key: key.into(),
            field: field.into(),
        }
    }

    /// `HSET key field value`.
    pub fn hset(key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::HSet {
            key: key.into(),
            fields: vec![(field.into(), value.into())],
        }
    }

    /// `HGETALL key`.
    pub fn hgetall(key: impl Into<String>) -> Self {
        Self::HGetAll { key: key.into() }
    }

    /// `ZRANGE key 0 -1`: every member in score order.
    pub fn zrange_all(key: impl Into<String>) -> Self {
        Self::ZRange {
            key: key.into(),
            start: 0,
            stop: -1,
        }
    }

    /// `DEL key`.
    pub fn del(key: impl Into<String>) -> Self {
        Self::Del {
            keys: vec![key.into()],
        }
    }

    /// `PEXPIRE key ttl`.
    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self::Expire {
            key: key.into(),
            ttl,
        }
    }

    /// `PERSIST key`.
    pub fn persist(key: impl Into<String>) -> Self {
        Self::Persist { key: key.into() }
    }

    /// The store command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Set { .. } => "SET",
            Self::HGet { .. } => "HGET",
            Self::HSet { .. } => "HSET",
            Self::HGetAll { .. } => "HGETALL",
            Self::ZAdd { .. } => "ZADD",
            Self::ZRange { .. } => "ZRANGE",
            Self::Del { .. } => "DEL",
            Self::Expire { .. } => "PEXPIRE",
            Self::Persist { .. } => "PERSIST",
            Self::Ttl { .. } => "PTTL",
        }
    }

    /// Keys touched by the command.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Get { key }
            | Self::Set { key, .. }
            | Self::HGet { key, .. }
            | Self::HSet { key, .. }
            | Self::HGetAll { key }
            | Self::ZAdd { key, .. }
            | Self::ZRange { key, .. }
            | Self::Expire { key, .. }
            | Self::Persist { key }
            | Self::Ttl { key } => vec![key.as_str()],
            Self::Del { keys } => keys.iter().map(String::as_str).collect(),
        }
    }

    /// Returns `true` for commands that modify the keyspace.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Set { .. }
                | Self::HSet { .. }
                | Self::ZAdd { .. }
                | Self::Del { .. }
                | Self::Expire { .. }
                | Self::Persist { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        for key in self.keys() {
            write!(f, " {key}")?;
        }
        match self {
            Self::HGet { field, .. } => write!(f, " {field}"),
            Self::HSet { fields, .. } => {
                for (field, value) in fields {
                    write!(f, " {field} {value:?}")?;
                }
                Ok(())
            }
            Self::ZRange { start, stop, .. } => write!(f, " {start} {stop}"),
            Self::Expire { ttl, .. } => write!(f, " {}", ttl.as_millis()),
            _ => Ok(()),
        }
    }
}

/// A single command's reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Reply {
    /// The key or field does not exist.
    Nil,
    /// Status reply `OK`.
    Ok,
    /// Integer reply.
    Integer(i64),
    /// A single string value.
    Bulk(String),
    /// An ordered list of strings.
    Array(Vec<String>),
    /// Field/value pairs.
    Map(Vec<(String, String)>),
}

impl Reply {
    /// Short name of the reply shape, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Ok => "status",
            Self::Integer(_) => "integer",
            Self::Bulk(_) => "bulk",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Returns `true` for [`Reply::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}
