//! Result kinds shared by every public operation.
//!
//! The library never panics on untrusted input and never recovers internally:
//! every failure is surfaced to the caller as one of the kinds below, and a
//! failed decode leaves the connection context untouched (apart from error
//! counters) so that a later valid packet still decodes.

use thiserror::Error;

/// Error kind returned by every fallible `pktc` operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PktcError {
    /// A parameter violated its contract: empty input, empty training corpus,
    /// a reserved model id, or an out-of-range configuration value.
    #[error("invalid argument")]
    InvalidArg,

    /// The destination buffer cannot hold the output (or, on decode, the
    /// declared original size).
    #[error("destination buffer too small")]
    BufferTooSmall,

    /// The input payload exceeds the 65,535-byte packet limit.
    #[error("input exceeds maximum payload size")]
    TooBig,

    /// The compressed input is inconsistent: unknown packet type, bitstream
    /// underflow, entropy state out of range, a back-reference outside the
    /// decoded history, or a failed final-state check.
    #[error("corrupt compressed data")]
    Corrupt,

    /// A legacy header declared a model id that does not match the bound
    /// dictionary.
    #[error("packet model id does not match dictionary")]
    ModelMismatch,

    /// A dictionary blob failed validation: bad magic, unsupported version,
    /// checksum mismatch, or malformed tables.
    #[error("invalid dictionary")]
    DictInvalid,

    /// The operation requires a dictionary but none is bound to the context.
    #[error("no dictionary bound")]
    NoDict,

    /// An allocation failed during training or context creation.
    #[error("out of memory")]
    NoMem,

    /// The packet or configuration requires a feature the bound dictionary
    /// (or this build) does not provide.
    #[error("unsupported feature")]
    Unsupported,

    /// The blob was produced by a newer, incompatible format revision.
    #[error("unsupported format version")]
    Version,
}

impl PktcError {
    /// Stable machine-readable name of the kind, for logs and bindings.
    pub fn name(&self) -> &'static str {
        match self {
            PktcError::InvalidArg => "INVALID_ARG",
            PktcError::BufferTooSmall => "BUFFER_TOO_SMALL",
            PktcError::TooBig => "TOO_BIG",
            PktcError::Corrupt => "CORRUPT",
            PktcError::ModelMismatch => "MODEL_MISMATCH",
            PktcError::DictInvalid => "DICT_INVALID",
            PktcError::NoDict => "NO_DICT",
            PktcError::NoMem => "NO_MEM",
            PktcError::Unsupported => "UNSUPPORTED",
            PktcError::Version => "VERSION",
        }
    }
}

/// Specialized result type for `pktc` operations.
pub type Result<T> = core::result::Result<T, PktcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable() {
        assert_eq!(PktcError::Corrupt.name(), "CORRUPT");
        assert_eq!(PktcError::BufferTooSmall.name(), "BUFFER_TOO_SMALL");
        assert_eq!(PktcError::ModelMismatch.name(), "MODEL_MISMATCH");
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(PktcError::Corrupt.to_string(), "corrupt compressed data");
        assert_eq!(PktcError::NoDict.to_string(), "no dictionary bound");
    }
}
