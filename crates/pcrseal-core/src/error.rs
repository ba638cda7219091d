// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for pcrseal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::HashAlgorithm;

/// Top-level error type for all pcrseal operations.
#[derive(Debug, Error)]
pub enum SealError {
    // -- Wire format errors --
    #[error("TLV length field ({declared}) does not match the {actual} value bytes present")]
    MalformedLength { declared: usize, actual: usize },

    #[error("stream ended before a complete TLV could be read")]
    Incomplete,

    #[error("{field} TLV has type {actual}, expected {expected}")]
    UnexpectedTlvType {
        field: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("{field} value is {actual} bytes, expected {expected}")]
    MalformedField {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown hash algorithm identifier {0:#06x}")]
    UnknownAlgorithm(u16),

    #[error("unknown hash algorithm name {0:?}")]
    UnknownAlgorithmName(String),

    #[error("TLV value of {len} bytes does not fit the {max}-byte length field")]
    ValueTooLarge { len: usize, max: usize },

    #[error("pending record needs at least {needed} bytes, over the {limit}-byte limit")]
    RecordTooLarge { needed: usize, limit: usize },

    #[error("{algorithm} digest is {actual} bytes, expected {expected}")]
    DigestSizeMismatch {
        algorithm: HashAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("digest set lists {0} more than once")]
    DuplicateAlgorithm(HashAlgorithm),

    #[error("digest set must contain at least one digest")]
    EmptyDigestSet,

    #[error("event log ends in the middle of record {record}")]
    TruncatedLog { record: usize },

    #[error("record number {actual} found where {expected} was expected")]
    OutOfSequence { expected: u64, actual: u64 },

    #[error("record {record} carries no {algorithm} digest")]
    MissingDigest {
        record: u64,
        algorithm: HashAlgorithm,
    },

    #[error("event content could not be measured: {0}")]
    Content(String),

    // -- Policy and sealing errors --
    #[error("invalid policy assertion: {0}")]
    InvalidAssertion(String),

    #[error("register {0} is required but missing from the snapshot")]
    MissingRegister(u8),

    #[error("authorization failed: {0}")]
    Authorization(String),

    // -- Hardware collaborator --
    #[error("root of trust transport error: {0}")]
    Transport(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`SealError`] for callers.
///
/// Only `Authorization` is expected during normal operation: it is what a
/// changed register state looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Corrupt or truncated encodings.
    Format,
    /// The presented register state does not satisfy the policy.
    Authorization,
    /// The hardware collaborator or the filesystem failed.
    Transport,
    /// The caller asked for something that cannot work (bad assertion, missing data).
    Usage,
}

impl SealError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedLength { .. }
            | Self::Incomplete
            | Self::UnexpectedTlvType { .. }
            | Self::MalformedField { .. }
            | Self::UnknownAlgorithm(_)
            | Self::UnknownAlgorithmName(_)
            | Self::ValueTooLarge { .. }
            | Self::RecordTooLarge { .. }
            | Self::DigestSizeMismatch { .. }
            | Self::DuplicateAlgorithm(_)
            | Self::EmptyDigestSet
            | Self::TruncatedLog { .. }
            | Self::OutOfSequence { .. }
            | Self::Serialization(_) => ErrorClass::Format,

            Self::Authorization(_) => ErrorClass::Authorization,

            Self::Transport(_) | Self::Io(_) => ErrorClass::Transport,

            Self::MissingDigest { .. }
            | Self::Content(_)
            | Self::InvalidAssertion(_)
            | Self::MissingRegister(_) => ErrorClass::Usage,
        }
    }

    /// True when the error is a policy mismatch rather than a fault.
    pub fn is_authorization(&self) -> bool {
        self.class() == ErrorClass::Authorization
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_is_distinguishable() {
        let err = SealError::Authorization("policy digest mismatch".into());
        assert!(err.is_authorization());
        assert_eq!(err.class(), ErrorClass::Authorization);

        let transport = SealError::Transport("device busy".into());
        assert!(!transport.is_authorization());
        assert_eq!(transport.class(), ErrorClass::Transport);
    }

    #[test]
    fn codec_errors_are_format_errors() {
        for err in [
            SealError::Incomplete,
            SealError::MalformedLength {
                declared: 4,
                actual: 2,
            },
            SealError::UnknownAlgorithm(0x0099),
            SealError::TruncatedLog { record: 3 },
            SealError::UnknownAlgorithmName("md4".into()),
            SealError::ValueTooLarge {
                len: 1 << 33,
                max: u32::MAX as usize,
            },
            SealError::RecordTooLarge {
                needed: 1 << 30,
                limit: 1 << 24,
            },
        ] {
            assert_eq!(err.class(), ErrorClass::Format, "{err}");
        }
    }

    #[test]
    fn display_mentions_algorithm() {
        let err = SealError::DigestSizeMismatch {
            algorithm: HashAlgorithm::Sha256,
            expected: 32,
            actual: 20,
        };
        assert_eq!(err.to_string(), "SHA-256 digest is 20 bytes, expected 32");
    }
}
