// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Register extend chain: new = H(old || measurement).

use crate::error::Result;
use crate::types::HashAlgorithm;

/// Extend `base` by each digest in `extensions`, in order.
///
/// Bit-identical to what a register in the `algorithm` bank holds after the
/// same sequence of extend operations. Every input must be exactly
/// `algorithm.size()` bytes, as the hardware would refuse anything else.
pub fn extend_chain<I, D>(algorithm: HashAlgorithm, base: &[u8], extensions: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = D>,
    D: AsRef<[u8]>,
{
    algorithm.check_size(base)?;
    let mut value = base.to_vec();
    for extension in extensions {
        value = extend_once(algorithm, &value, extension.as_ref())?;
    }
    Ok(value)
}

/// A single extend step.
pub fn extend_once(algorithm: HashAlgorithm, current: &[u8], measurement: &[u8]) -> Result<Vec<u8>> {
    algorithm.check_size(measurement)?;
    Ok(algorithm.digest_parts(&[current, measurement]))
}
