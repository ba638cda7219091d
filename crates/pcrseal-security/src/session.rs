// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scoped policy sessions.

use pcrseal_bridge::{PolicySessions, SessionHandle};
use pcrseal_core::error::Result;
use pcrseal_core::types::{HashAlgorithm, RegisterSelection};
use tracing::warn;

/// A policy session that is flushed when dropped, on every exit path.
pub struct PolicySession<'a, R: PolicySessions + ?Sized> {
    root: &'a R,
    handle: SessionHandle,
}

impl<'a, R: PolicySessions + ?Sized> PolicySession<'a, R> {
    pub fn open(root: &'a R, algorithm: HashAlgorithm) -> Result<Self> {
        let handle = root.open_policy_session(algorithm)?;
        Ok(Self { root, handle })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Assert the live values of `selection`; returns the updated digest.
    pub fn certify(&self, selection: &RegisterSelection) -> Result<Vec<u8>> {
        self.root.certify_registers(self.handle, selection)
    }

    pub fn digest(&self) -> Result<Vec<u8>> {
        self.root.policy_digest(self.handle)
    }
}

impl<R: PolicySessions + ?Sized> Drop for PolicySession<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.root.flush_session(self.handle) {
            warn!(handle = %self.handle, error = %e, "failed to flush policy session");
        }
    }
}
