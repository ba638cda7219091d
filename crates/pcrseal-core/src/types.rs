// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: hash algorithms, register selections, register values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Result, SealError};

/// TPM_ALG_SHA1.
pub const TPM_ALG_SHA1: u16 = 0x0004;
/// TPM_ALG_SHA256.
pub const TPM_ALG_SHA256: u16 = 0x000B;
/// TPM_ALG_SHA384.
pub const TPM_ALG_SHA384: u16 = 0x000C;
/// TPM_ALG_SHA512.
pub const TPM_ALG_SHA512: u16 = 0x000D;

/// Smallest `sizeofSelect` a PC-client TPM accepts (24 registers).
pub const PCR_SELECT_MIN: usize = 3;

/// Hash algorithms a register bank or event log may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, in TPM identifier order.
    pub const ALL: [HashAlgorithm; 4] = [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Digest length in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// TPM_ALG_ID for this algorithm.
    pub fn tpm_id(&self) -> u16 {
        match self {
            Self::Sha1 => TPM_ALG_SHA1,
            Self::Sha256 => TPM_ALG_SHA256,
            Self::Sha384 => TPM_ALG_SHA384,
            Self::Sha512 => TPM_ALG_SHA512,
        }
    }

    /// Look up an algorithm by TPM_ALG_ID.
    pub fn from_tpm_id(id: u16) -> Result<Self> {
        match id {
            TPM_ALG_SHA1 => Ok(Self::Sha1),
            TPM_ALG_SHA256 => Ok(Self::Sha256),
            TPM_ALG_SHA384 => Ok(Self::Sha384),
            TPM_ALG_SHA512 => Ok(Self::Sha512),
            other => Err(SealError::UnknownAlgorithm(other)),
        }
    }

    /// Hash `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of `parts` without building it in memory.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            Self::Sha1 => hash_parts::<Sha1>(parts),
            Self::Sha256 => hash_parts::<Sha256>(parts),
            Self::Sha384 => hash_parts::<Sha384>(parts),
            Self::Sha512 => hash_parts::<Sha512>(parts),
        }
    }

    /// The all-zero digest a register holds after reset.
    pub fn zero_digest(&self) -> Vec<u8> {
        vec![0u8; self.size()]
    }

    /// Fail with `DigestSizeMismatch` unless `digest` has this algorithm's size.
    pub fn check_size(&self, digest: &[u8]) -> Result<()> {
        if digest.len() == self.size() {
            Ok(())
        } else {
            Err(SealError::DigestSizeMismatch {
                algorithm: *self,
                expected: self.size(),
                actual: digest.len(),
            })
        }
    }
}

fn hash_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        };
        f.write_str(name)
    }
}

impl FromStr for HashAlgorithm {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(SealError::UnknownAlgorithmName(s.to_string())),
        }
    }
}

/// A set of registers within one hash bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterSelection {
    pub algorithm: HashAlgorithm,
    pub registers: BTreeSet<u8>,
}

impl RegisterSelection {
    pub fn new(algorithm: HashAlgorithm, registers: impl IntoIterator<Item = u8>) -> Self {
        Self {
            algorithm,
            registers: registers.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Number of bitmap bytes needed to name every selected register.
    pub fn select_size(&self) -> usize {
        match self.registers.last() {
            Some(&highest) => PCR_SELECT_MIN.max(usize::from(highest) / 8 + 1),
            None => PCR_SELECT_MIN,
        }
    }

    /// Register bitmap: register `i` is bit `i % 8` of byte `i / 8`.
    pub fn bitmap(&self) -> Vec<u8> {
        let mut bits = vec![0u8; self.select_size()];
        for &index in &self.registers {
            bits[usize::from(index) / 8] |= 1 << (index % 8);
        }
        bits
    }

    /// TPML_PCR_SELECTION holding this single selection.
    ///
    /// ```text
    /// count:          4 bytes (big-endian u32, always 1)
    /// hash:           2 bytes (big-endian TPM_ALG_ID)
    /// sizeofSelect:   1 byte
    /// pcrSelect:      sizeofSelect bytes
    /// ```
    pub fn to_tpml_bytes(&self) -> Vec<u8> {
        let bitmap = self.bitmap();
        let mut buf = Vec::with_capacity(7 + bitmap.len());
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&self.algorithm.tpm_id().to_be_bytes());
        // select_size() tops out at 32 for u8 register indices.
        buf.push(bitmap.len() as u8);
        buf.extend_from_slice(&bitmap);
        buf
    }
}

/// Register index to value, for one hash bank.
///
/// Iteration is always in ascending register order, which is the order the
/// TPM concatenates register values in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValues {
    pub algorithm: HashAlgorithm,
    pub values: BTreeMap<u8, Vec<u8>>,
}

impl RegisterValues {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            values: BTreeMap::new(),
        }
    }

    /// Set `index` to `value`, returning the previous value if any.
    pub fn insert(&mut self, index: u8, value: Vec<u8>) -> Option<Vec<u8>> {
        self.values.insert(index, value)
    }

    pub fn get(&self, index: u8) -> Option<&[u8]> {
        self.values.get(&index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.values.iter().map(|(&index, value)| (index, value.as_slice()))
    }

    /// The registers this map covers.
    pub fn selection(&self) -> RegisterSelection {
        RegisterSelection::new(self.algorithm, self.values.keys().copied())
    }

    /// Values concatenated in ascending register order.
    pub fn concatenated(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.values.len() * self.algorithm.size());
        for value in self.values.values() {
            buf.extend_from_slice(value);
        }
        buf
    }

    /// Reject empty maps and values of the wrong size for the bank.
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(SealError::InvalidAssertion(
                "register snapshot names no registers".into(),
            ));
        }
        for value in self.values.values() {
            self.algorithm.check_size(value)?;
        }
        Ok(())
    }
}

impl fmt::Display for RegisterValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.algorithm)?;
        for (index, value) in &self.values {
            writeln!(f, "  {index:>3}: {}", hex::encode(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_ids_round_trip() {
        for alg in HashAlgorithm::ALL {
            assert_eq!(HashAlgorithm::from_tpm_id(alg.tpm_id()).unwrap(), alg);
            assert_eq!(alg.digest(b"x").len(), alg.size());
        }
        assert!(matches!(
            HashAlgorithm::from_tpm_id(0x0012),
            Err(SealError::UnknownAlgorithm(0x0012))
        ));
    }

    #[test]
    fn sha256_known_value() {
        assert_eq!(
            hex::encode(HashAlgorithm::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            HashAlgorithm::Sha256.digest_parts(&[b"a".as_slice(), b"bc".as_slice()]),
            HashAlgorithm::Sha256.digest(b"abc")
        );
    }

    #[test]
    fn parse_names() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        let err = "md5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(&err, SealError::UnknownAlgorithmName(name) if name == "md5"));
        assert_eq!(err.class(), crate::error::ErrorClass::Format);
    }

    #[test]
    fn selection_encoding_matches_tpml() {
        let sel = RegisterSelection::new(HashAlgorithm::Sha256, [23, 7]);
        assert_eq!(hex::encode(sel.to_tpml_bytes()), "00000001000b03800080");
    }

    #[test]
    fn selection_grows_for_high_registers() {
        let sel = RegisterSelection::new(HashAlgorithm::Sha1, [0, 30]);
        assert_eq!(sel.select_size(), 4);
        assert_eq!(sel.bitmap(), vec![0x01, 0x00, 0x00, 0x40]);

        let empty = RegisterSelection::new(HashAlgorithm::Sha1, []);
        assert_eq!(empty.bitmap(), vec![0, 0, 0]);
    }

    #[test]
    fn values_concatenate_in_register_order() {
        let mut values = RegisterValues::new(HashAlgorithm::Sha1);
        values.insert(9, vec![0x09; 20]);
        values.insert(2, vec![0x02; 20]);

        let concat = values.concatenated();
        assert_eq!(&concat[..20], &[0x02; 20]);
        assert_eq!(&concat[20..], &[0x09; 20]);
        assert_eq!(values.selection().registers.len(), 2);
    }

    #[test]
    fn validate_rejects_bad_snapshots() {
        let empty = RegisterValues::new(HashAlgorithm::Sha256);
        assert!(matches!(empty.validate(), Err(SealError::InvalidAssertion(_))));

        let mut short = RegisterValues::new(HashAlgorithm::Sha256);
        short.insert(7, vec![0u8; 20]);
        assert!(matches!(
            short.validate(),
            Err(SealError::DigestSizeMismatch { expected: 32, actual: 20, .. })
        ));
    }
}
