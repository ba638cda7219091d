// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offline PolicyPCR digests.
//
// A fresh policy session starts at the all-zero digest. TPM2_PolicyPCR then
// sets
//
//   policyDigest' = H(policyDigest || TPM_CC_PolicyPCR || TPML_PCR_SELECTION || pcrDigest)
//
// with pcrDigest = H(selected register values in ascending index order),
// H being the session's hash algorithm. Computing this without hardware
// lets a policy be built for register values that are not live.

use pcrseal_bridge::PolicySessions;
use pcrseal_core::error::Result;
use pcrseal_core::types::{HashAlgorithm, RegisterSelection, RegisterValues};

use crate::session::PolicySession;

/// Command code of TPM2_PolicyPCR.
pub const TPM_CC_POLICY_PCR: u32 = 0x0000_017F;

/// `H(values)` over the register values in ascending index order.
pub fn registers_digest(algorithm: HashAlgorithm, values: &RegisterValues) -> Vec<u8> {
    algorithm.digest(&values.concatenated())
}

/// One PolicyPCR step applied to `running`.
pub fn extend_policy_digest(
    algorithm: HashAlgorithm,
    running: &[u8],
    selection: &RegisterSelection,
    registers_digest: &[u8],
) -> Result<Vec<u8>> {
    algorithm.check_size(running)?;
    algorithm.check_size(registers_digest)?;
    let command = TPM_CC_POLICY_PCR.to_be_bytes();
    let selection = selection.to_tpml_bytes();
    Ok(algorithm.digest_parts(&[
        running,
        command.as_slice(),
        selection.as_slice(),
        registers_digest,
    ]))
}

/// The digest a fresh `algorithm` session reaches after asserting `values`.
pub fn compute_policy_digest(algorithm: HashAlgorithm, values: &RegisterValues) -> Result<Vec<u8>> {
    values.validate()?;
    extend_policy_digest(
        algorithm,
        &algorithm.zero_digest(),
        &values.selection(),
        &registers_digest(algorithm, values),
    )
}

/// The same digest, produced by a live session over the current values of
/// `selection`.
pub fn session_policy_digest<R: PolicySessions + ?Sized>(
    root: &R,
    algorithm: HashAlgorithm,
    selection: &RegisterSelection,
) -> Result<Vec<u8>> {
    let session = PolicySession::open(root, algorithm)?;
    session.certify(selection)
}
