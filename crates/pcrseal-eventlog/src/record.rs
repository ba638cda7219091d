// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical event log record (CELR): four TLVs in fixed order.
//
//   RECNUM   type 0, 8-byte big-endian record number
//   PCR      type 1, 1-byte register index
//   DIGESTS  type 3, nested TLVs keyed by hash algorithm
//   CONTENT  caller-defined type and value
//
// Type 2 (NV index) is reserved by the CEL format and not produced here.

use pcrseal_core::error::{Result, SealError};
use pcrseal_core::types::HashAlgorithm;

use crate::content::Content;
use crate::tlv::{TLV_HEADER_LEN, Tlv, declared_len};

/// RECNUM field type.
pub const RECNUM_TYPE: u8 = 0;
/// PCR field type.
pub const PCR_TYPE: u8 = 1;
/// NV index field type. Records measured into NV indices are refused.
pub const NV_INDEX_TYPE: u8 = 2;
/// DIGESTS field type.
pub const DIGESTS_TYPE: u8 = 3;

/// Supports up to 2^64 records.
pub const RECNUM_VALUE_LEN: usize = 8;
/// Supports up to 256 registers.
pub const PCR_VALUE_LEN: usize = 1;

/// The digests of one event, one per hash bank, in the order recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSet {
    entries: Vec<(HashAlgorithm, Vec<u8>)>,
}

impl DigestSet {
    /// Build a digest set, rejecting empty sets, repeated algorithms, and
    /// digests of the wrong size.
    pub fn new(entries: impl IntoIterator<Item = (HashAlgorithm, Vec<u8>)>) -> Result<Self> {
        let mut checked: Vec<(HashAlgorithm, Vec<u8>)> = Vec::new();
        for (algorithm, digest) in entries {
            algorithm.check_size(&digest)?;
            if checked.iter().any(|(seen, _)| *seen == algorithm) {
                return Err(SealError::DuplicateAlgorithm(algorithm));
            }
            checked.push((algorithm, digest));
        }
        if checked.is_empty() {
            return Err(SealError::EmptyDigestSet);
        }
        Ok(Self { entries: checked })
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(alg, _)| *alg == algorithm)
            .map(|(_, digest)| digest.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &[u8])> {
        self.entries
            .iter()
            .map(|(alg, digest)| (*alg, digest.as_slice()))
    }

    pub fn algorithms(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.entries.iter().map(|(alg, _)| *alg)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The DIGESTS TLV: each digest as a nested TLV typed by the low byte of
    /// its TPM_ALG_ID.
    pub fn to_tlv(&self) -> Tlv {
        let mut value = Vec::new();
        for (algorithm, digest) in &self.entries {
            // Every supported TPM_ALG_ID fits in one byte.
            Tlv::new(algorithm.tpm_id() as u8, digest.clone()).encode_into(&mut value);
        }
        Tlv::new(DIGESTS_TYPE, value)
    }

    /// Parse a DIGESTS TLV.
    ///
    /// The outer TLV is already complete, so a nested TLV running past its
    /// end is corruption (`MalformedLength`), not a short read.
    pub fn from_tlv(tlv: &Tlv) -> Result<Self> {
        expect_type(tlv, "DIGESTS", DIGESTS_TYPE)?;

        let mut rest = tlv.value.as_slice();
        let mut entries = Vec::new();
        while !rest.is_empty() {
            let nested = match Tlv::read_one(&mut rest) {
                Ok(nested) => nested,
                Err(SealError::Incomplete) => return Err(nested_overrun(rest)),
                Err(e) => return Err(e),
            };
            let algorithm = HashAlgorithm::from_tpm_id(u16::from(nested.tlv_type))?;
            entries.push((algorithm, nested.value));
        }
        Self::new(entries)
    }
}

fn nested_overrun(rest: &[u8]) -> SealError {
    match declared_len(rest) {
        Some(declared) => SealError::MalformedLength {
            declared,
            actual: rest.len() - TLV_HEADER_LEN,
        },
        None => SealError::MalformedLength {
            declared: TLV_HEADER_LEN,
            actual: rest.len(),
        },
    }
}

fn expect_type(tlv: &Tlv, field: &'static str, expected: u8) -> Result<()> {
    if tlv.tlv_type == expected {
        Ok(())
    } else {
        Err(SealError::UnexpectedTlvType {
            field,
            expected,
            actual: tlv.tlv_type,
        })
    }
}

fn expect_len(tlv: &Tlv, field: &'static str, expected: usize) -> Result<()> {
    if tlv.value.len() == expected {
        Ok(())
    } else {
        Err(SealError::MalformedField {
            field,
            expected,
            actual: tlv.value.len(),
        })
    }
}

/// One canonical event log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub recnum: u64,
    pub register: u8,
    pub digests: DigestSet,
    pub content: Tlv,
}

impl Record {
    /// Assemble a record for `content`, measured into `register`.
    pub fn create<C: Content + ?Sized>(
        recnum: u64,
        register: u8,
        digests: impl IntoIterator<Item = (HashAlgorithm, Vec<u8>)>,
        content: &C,
    ) -> Result<Self> {
        let content = content.to_tlv();
        content.check_len()?;
        Ok(Self {
            recnum,
            register,
            digests: DigestSet::new(digests)?,
            content,
        })
    }

    pub fn recnum_tlv(&self) -> Tlv {
        Tlv::new(RECNUM_TYPE, self.recnum.to_be_bytes().to_vec())
    }

    pub fn register_tlv(&self) -> Tlv {
        Tlv::new(PCR_TYPE, vec![self.register])
    }

    /// Append RECNUM, PCR, DIGESTS and CONTENT to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        self.recnum_tlv().encode_into(out);
        self.register_tlv().encode_into(out);
        self.digests.to_tlv().encode_into(out);
        self.content.encode_into(out);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Read the next record from `input`, advancing only when all four
    /// fields were available.
    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        let mut cursor = *input;

        let recnum = Tlv::read_one(&mut cursor)?;
        expect_type(&recnum, "RECNUM", RECNUM_TYPE)?;
        expect_len(&recnum, "RECNUM", RECNUM_VALUE_LEN)?;

        let register = Tlv::read_one(&mut cursor)?;
        if register.tlv_type == NV_INDEX_TYPE {
            return Err(SealError::UnexpectedTlvType {
                field: "NV_INDEX",
                expected: PCR_TYPE,
                actual: NV_INDEX_TYPE,
            });
        }
        expect_type(&register, "PCR", PCR_TYPE)?;
        expect_len(&register, "PCR", PCR_VALUE_LEN)?;

        let digests = Tlv::read_one(&mut cursor)?;
        expect_type(&digests, "DIGESTS", DIGESTS_TYPE)?;

        let content = Tlv::read_one(&mut cursor)?;

        let mut recnum_bytes = [0u8; RECNUM_VALUE_LEN];
        recnum_bytes.copy_from_slice(&recnum.value);

        let record = Self {
            recnum: u64::from_be_bytes(recnum_bytes),
            register: register.value[0],
            digests: DigestSet::from_tlv(&digests)?,
            content,
        };
        *input = cursor;
        Ok(record)
    }
}
