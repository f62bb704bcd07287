/// Errors reported by a key-value client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The command targeted a key holding a different kind of value.
    #[error("WRONGTYPE operation against key {key:?} holding the wrong kind of value")]
    WrongType { key: String },

    /// The command was rejected before execution (bad arity, bad expiry).
    #[error("invalid arguments for {command}: {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },

    /// The store reported a failure while executing the command.
    #[error("{command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    /// The round trip could not be completed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend returned a different number of replies than commands.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller cancelled the context.
    #[error("operation cancelled")]
    Cancelled,

    /// The context deadline passed before the round trip.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
