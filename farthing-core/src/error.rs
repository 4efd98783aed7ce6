//! Error types for the farthing core crate.

use std::fmt;

/// Failure while decoding consensus-encoded bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remained than the field required.
    UnexpectedEnd,
    /// A CompactSize varint used a longer encoding than its value needs.
    NonCanonicalVarint,
    /// A length or count field exceeded its allowed maximum.
    OversizedField {
        /// Name of the offending field.
        field: &'static str,
        /// Decoded value.
        value: u64,
        /// Allowed maximum.
        max: u64,
    },
    /// A field held a value outside its legal range.
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable description of the problem.
        reason: &'static str,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEnd => write!(f, "unexpected end of stream"),
            DecodeError::NonCanonicalVarint => write!(f, "non-canonical CompactSize encoding"),
            DecodeError::OversizedField { field, value, max } => {
                write!(f, "{} is {} which exceeds the maximum of {}", field, value, max)
            }
            DecodeError::InvalidValue { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
