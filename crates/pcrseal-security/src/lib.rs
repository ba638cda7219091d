// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Register-policy sealing for pcrseal.
//
// Secrets are sealed under a parent key on a root of trust and released only
// while selected measurement registers hold authorised values. Policy
// digests are computed offline so a secret can be resealed to a register
// state the platform has not reached yet.

pub mod key;
pub mod policy;
pub mod policy_digest;
pub mod session;

pub use key::SealingKey;
pub use policy::PolicyAssertion;
pub use policy_digest::{
    TPM_CC_POLICY_PCR, compute_policy_digest, extend_policy_digest, registers_digest,
    session_policy_digest,
};
pub use session::PolicySession;
