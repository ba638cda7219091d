// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event content: what a record measures.

use pcrseal_core::error::Result;
use pcrseal_core::types::HashAlgorithm;

use crate::tlv::Tlv;

/// Something that can be recorded in the event log.
///
/// The log treats content as opaque: it only needs the measurement digest
/// for each requested bank and the TLV to store alongside it.
pub trait Content {
    /// Digest of this content under `algorithm`, as extended into the register.
    fn generate_digest(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>>;

    /// The CONTENT field of the record.
    fn to_tlv(&self) -> Tlv;
}

/// Content whose measurement is the hash of its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedContent {
    pub content_type: u8,
    pub data: Vec<u8>,
}

impl TaggedContent {
    pub fn new(content_type: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            data: data.into(),
        }
    }
}

impl Content for TaggedContent {
    fn generate_digest(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        Ok(algorithm.digest(&self.data))
    }

    fn to_tlv(&self) -> Tlv {
        Tlv::new(self.content_type, self.data.clone())
    }
}
