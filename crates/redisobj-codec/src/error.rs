use crate::kind::ScalarKind;

/// Errors from encoding or decoding a scalar value.
///
/// All variants describe a field whose value cannot be carried by the wire
/// representation, which callers surface as `InvalidFieldType`.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The wire string does not parse as the target kind.
    #[error("invalid field type: cannot decode {kind} from {value:?}: {reason}")]
    Decode {
        kind: ScalarKind,
        value: String,
        reason: String,
    },

    /// The in-memory value has no wire representation.
    #[error("invalid field type: cannot encode {kind}: {reason}")]
    Encode { kind: ScalarKind, reason: String },
}

impl CodecError {
    /// Build a decode error for `kind` from the offending wire string.
    pub fn decode(kind: ScalarKind, value: &str, reason: impl ToString) -> Self {
        Self::Decode {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build an encode error for `kind`.
    pub fn encode(kind: ScalarKind, reason: impl ToString) -> Self {
        Self::Encode {
            kind,
            reason: reason.to_string(),
        }
    }

    /// The scalar kind involved in the failure.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Decode { kind, .. } | Self::Encode { kind, .. } => *kind,
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
