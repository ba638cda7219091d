// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sealing engine: seal, unseal and reseal secrets under a parent key.

use pcrseal_bridge::{KeyHandle, RootOfTrust, SealTemplate, SealedBlob};
use pcrseal_core::config::SealConfig;
use pcrseal_core::error::{Result, SealError};
use pcrseal_core::types::{HashAlgorithm, RegisterSelection};
use secrecy::{ExposeSecret, SecretSlice};
use tracing::{debug, instrument, warn};

use crate::policy::PolicyAssertion;
use crate::policy_digest::{compute_policy_digest, registers_digest};
use crate::session::PolicySession;

/// A parent storage key on a root of trust.
///
/// The key is flushed from the root when this value is dropped.
pub struct SealingKey<'a, R: RootOfTrust + ?Sized> {
    root: &'a R,
    handle: KeyHandle,
    session_algorithm: HashAlgorithm,
}

impl<'a, R: RootOfTrust + ?Sized> SealingKey<'a, R> {
    /// Create a parent key using the default session algorithm.
    pub fn create(root: &'a R) -> Result<Self> {
        Self::with_config(root, &SealConfig::default())
    }

    /// Create a parent key whose policies and object names use
    /// `config.session_algorithm`.
    pub fn with_config(root: &'a R, config: &SealConfig) -> Result<Self> {
        let handle = root.create_parent_key()?;
        debug!(%handle, platform = root.platform_name(), "sealing key ready");
        Ok(Self {
            root,
            handle,
            session_algorithm: config.session_algorithm,
        })
    }

    pub fn handle(&self) -> KeyHandle {
        self.handle
    }

    pub fn session_algorithm(&self) -> HashAlgorithm {
        self.session_algorithm
    }

    /// Seal `secret` so that it is released only while the registers match
    /// `assertion`. `None` seals without a register policy.
    #[instrument(skip_all, fields(key = %self.handle, secret_len = secret.len()))]
    pub fn seal(&self, secret: &[u8], assertion: Option<&PolicyAssertion>) -> Result<SealedBlob> {
        let template = match assertion {
            None => SealTemplate {
                name_algorithm: self.session_algorithm,
                auth_policy: Vec::new(),
                policy_selection: None,
                creation_selection: RegisterSelection::new(self.session_algorithm, []),
            },
            Some(assertion) => {
                let values = assertion.evaluate(self.root)?;
                let selection = values.selection();
                SealTemplate {
                    name_algorithm: self.session_algorithm,
                    auth_policy: compute_policy_digest(self.session_algorithm, &values)?,
                    policy_selection: Some(selection.clone()),
                    creation_selection: selection,
                }
            }
        };

        let blob = self
            .root
            .encrypt_under_parent(self.handle, secret, &template)?;
        debug!(policy = blob.has_register_policy(), "secret sealed");
        Ok(blob)
    }

    /// Recover the secret from `blob`.
    ///
    /// The blob's register policy is always satisfied by a live session. A
    /// `certify` assertion must also match the register state the blob was
    /// created under, and the root must vouch for that creation data.
    #[instrument(skip_all, fields(key = %self.handle, certify = certify.is_some()))]
    pub fn unseal(&self, blob: &SealedBlob, certify: Option<&PolicyAssertion>) -> Result<Vec<u8>> {
        if let Some(assertion) = certify {
            self.certify_creation(blob, assertion)?;
        }

        if !blob.has_register_policy() {
            return self.root.decrypt_under_parent(self.handle, blob, None);
        }

        let selection = blob.policy_selection.as_ref().ok_or_else(|| {
            SealError::InvalidAssertion("sealed blob has a policy but no register selection".into())
        })?;
        let session = PolicySession::open(self.root, self.session_algorithm)?;
        session.certify(selection)?;
        let secret = self
            .root
            .decrypt_under_parent(self.handle, blob, Some(session.handle()))
            .inspect_err(|e| {
                if e.is_authorization() {
                    warn!(registers = ?selection.registers, "register policy not satisfied");
                }
            })?;
        debug!("secret unsealed");
        Ok(secret)
    }

    /// Move the secret in `blob` under a new policy.
    ///
    /// The secret never leaves this call. `new_assertion = None` produces a
    /// blob without a register policy.
    #[instrument(skip_all, fields(key = %self.handle))]
    pub fn reseal(
        &self,
        blob: &SealedBlob,
        certify: Option<&PolicyAssertion>,
        new_assertion: Option<&PolicyAssertion>,
    ) -> Result<SealedBlob> {
        let secret = SecretSlice::from(self.unseal(blob, certify)?);
        let resealed = self.seal(secret.expose_secret(), new_assertion)?;
        debug!(policy = resealed.has_register_policy(), "secret resealed");
        Ok(resealed)
    }

    fn certify_creation(&self, blob: &SealedBlob, assertion: &PolicyAssertion) -> Result<()> {
        if matches!(assertion, PolicyAssertion::TargetRegisters(_)) {
            return Err(SealError::InvalidAssertion(
                "a target register state cannot certify a sealed object".into(),
            ));
        }

        let values = assertion.evaluate(self.root)?;
        if values.selection() != blob.creation.selection
            || registers_digest(self.session_algorithm, &values) != blob.creation.registers_digest
        {
            warn!(registers = ?values.selection().registers, "certified registers do not match creation data");
            return Err(SealError::Authorization(
                "registers do not match the sealed object's creation data".into(),
            ));
        }
        self.root.certify_creation(self.handle, blob)
    }
}

impl<R: RootOfTrust + ?Sized> Drop for SealingKey<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.root.flush_key(self.handle) {
            warn!(key = %self.handle, error = %e, "failed to flush sealing key");
        }
    }
}
