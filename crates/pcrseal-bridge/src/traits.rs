// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Root-of-trust capabilities the sealing engine consumes.
//
// Implementations talk to real hardware (or emulate it). They surface every
// failure as-is: retries and timeouts belong to the implementation, never to
// the engine calling it.

use std::fmt;

use pcrseal_core::error::Result;
use pcrseal_core::types::{HashAlgorithm, RegisterSelection, RegisterValues};
use serde::{Deserialize, Serialize};

/// Everything the sealing engine needs from the hardware.
pub trait RootOfTrust: RegisterBank + PolicySessions + SealedStorage {
    /// Human-readable description (e.g. "TPM 2.0 (/dev/tpmrm0)").
    fn platform_name(&self) -> &str;
}

/// Measurement registers.
pub trait RegisterBank {
    /// Read the current value of every selected register.
    fn read_registers(&self, selection: &RegisterSelection) -> Result<RegisterValues>;

    /// Extend `index` in the `algorithm` bank by `digest`.
    fn extend_register(&self, index: u8, algorithm: HashAlgorithm, digest: &[u8]) -> Result<()>;
}

/// Policy sessions: running digests of satisfied assertions.
pub trait PolicySessions {
    /// Start a policy session whose digest starts at all zeroes.
    fn open_policy_session(&self, algorithm: HashAlgorithm) -> Result<SessionHandle>;

    /// Assert the live values of `selection` (TPM2_PolicyPCR) and return the
    /// session's updated digest.
    fn certify_registers(&self, session: SessionHandle, selection: &RegisterSelection)
    -> Result<Vec<u8>>;

    /// Current digest of the session.
    fn policy_digest(&self, session: SessionHandle) -> Result<Vec<u8>>;

    /// Release the session.
    fn flush_session(&self, session: SessionHandle) -> Result<()>;
}

/// Objects sealed under a parent storage key.
pub trait SealedStorage {
    /// Create (or load) a storage parent and return its handle.
    fn create_parent_key(&self) -> Result<KeyHandle>;

    /// Release a parent key.
    fn flush_key(&self, key: KeyHandle) -> Result<()>;

    /// Seal `secret` under `parent`, bound to the template's policy digest.
    fn encrypt_under_parent(
        &self,
        parent: KeyHandle,
        secret: &[u8],
        template: &SealTemplate,
    ) -> Result<SealedBlob>;

    /// Recover the secret. Objects with a register policy need a policy
    /// session whose digest equals the blob's `auth_policy`.
    fn decrypt_under_parent(
        &self,
        parent: KeyHandle,
        blob: &SealedBlob,
        session: Option<SessionHandle>,
    ) -> Result<Vec<u8>>;

    /// Check that `blob`'s creation data was produced by this root under
    /// `parent` (TPM2_CertifyCreation).
    fn certify_creation(&self, parent: KeyHandle, blob: &SealedBlob) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A loaded parent key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHandle(pub u32);

/// An open policy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u32);

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Sealed objects
// ---------------------------------------------------------------------------

/// What to bind a new sealed object to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealTemplate {
    /// Name algorithm of the object; also hashes the creation registers.
    pub name_algorithm: HashAlgorithm,
    /// Policy digest required to unseal. Empty means no register policy.
    pub auth_policy: Vec<u8>,
    /// Registers the policy asserts, recorded so a session can be rebuilt.
    pub policy_selection: Option<RegisterSelection>,
    /// Registers whose live values are captured in the creation data.
    pub creation_selection: RegisterSelection,
}

/// Register state captured when an object was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationData {
    pub selection: RegisterSelection,
    /// Name-algorithm hash of the selected values in ascending register order.
    pub registers_digest: Vec<u8>,
}

impl CreationData {
    /// Canonical bytes covered by the creation ticket.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.selection.to_tpml_bytes();
        buf.extend_from_slice(&(self.registers_digest.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.registers_digest);
        buf
    }
}

/// A secret sealed under a parent key.
///
/// `private` is opaque outside the root of trust that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    pub name_algorithm: HashAlgorithm,
    pub private: Vec<u8>,
    pub auth_policy: Vec<u8>,
    pub policy_selection: Option<RegisterSelection>,
    pub creation: CreationData,
    pub creation_ticket: Vec<u8>,
}

impl SealedBlob {
    /// Whether unsealing requires a register policy session.
    pub fn has_register_policy(&self) -> bool {
        !self.auth_policy.is_empty()
    }

    /// Name of the object: the name algorithm's TPM_ALG_ID followed by its
    /// hash over the ciphertext, the policy digest and the policy selection.
    /// The creation ticket covers this name, so creation data cannot be
    /// moved to another object.
    pub fn object_name(&self) -> Vec<u8> {
        let selection = match &self.policy_selection {
            Some(selection) => selection.to_tpml_bytes(),
            None => Vec::new(),
        };
        let private_len = (self.private.len() as u64).to_be_bytes();
        let policy_len = (self.auth_policy.len() as u64).to_be_bytes();
        let selection_len = (selection.len() as u64).to_be_bytes();

        let mut name = self.name_algorithm.tpm_id().to_be_bytes().to_vec();
        name.extend_from_slice(&self.name_algorithm.digest_parts(&[
            private_len.as_slice(),
            self.private.as_slice(),
            policy_len.as_slice(),
            self.auth_policy.as_slice(),
            selection_len.as_slice(),
            selection.as_slice(),
        ]));
        name
    }
}
