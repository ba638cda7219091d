// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Policy assertions: which register state authorises an unseal.

use pcrseal_bridge::RegisterBank;
use pcrseal_core::error::{Result, SealError};
use pcrseal_core::types::{RegisterSelection, RegisterValues};
use tracing::debug;

/// A register state a policy is built from or certified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAssertion {
    /// Whatever the selected registers hold when the assertion is evaluated.
    CurrentRegisters(RegisterSelection),
    /// Values captured earlier, typically at seal time.
    ExpectedRegisters(RegisterValues),
    /// Predicted values the registers have not reached yet.
    TargetRegisters(RegisterValues),
}

impl PolicyAssertion {
    /// The registers this assertion names.
    pub fn selection(&self) -> RegisterSelection {
        match self {
            Self::CurrentRegisters(selection) => selection.clone(),
            Self::ExpectedRegisters(values) | Self::TargetRegisters(values) => values.selection(),
        }
    }

    /// Resolve the assertion to concrete register values.
    ///
    /// Only `CurrentRegisters` touches the hardware. Snapshots are returned
    /// as given once validated.
    pub fn evaluate<B: RegisterBank + ?Sized>(&self, bank: &B) -> Result<RegisterValues> {
        match self {
            Self::CurrentRegisters(selection) => {
                if selection.is_empty() {
                    return Err(SealError::InvalidAssertion(
                        "register selection is empty".into(),
                    ));
                }
                let values = bank.read_registers(selection)?;
                if let Some(&missing) = selection
                    .registers
                    .iter()
                    .find(|&&index| values.get(index).is_none())
                {
                    return Err(SealError::MissingRegister(missing));
                }
                values.validate()?;
                debug!(registers = ?selection.registers, "read live registers");
                Ok(values)
            }
            Self::ExpectedRegisters(values) | Self::TargetRegisters(values) => {
                values.validate()?;
                Ok(values.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcrseal_bridge::SoftwareRoot;
    use pcrseal_core::types::HashAlgorithm;

    const SHA256: HashAlgorithm = HashAlgorithm::Sha256;

    #[test]
    fn current_reads_live_values() {
        let root = SoftwareRoot::new().expect("software root");
        root.extend_register(7, SHA256, &[0x11; 32]).unwrap();

        let sel = RegisterSelection::new(SHA256, [7, 8]);
        let values = PolicyAssertion::CurrentRegisters(sel.clone())
            .evaluate(&root)
            .expect("evaluate");
        assert_eq!(values.selection(), sel);
        assert_ne!(values.get(7), Some(SHA256.zero_digest().as_slice()));
        assert_eq!(values.get(8), Some(SHA256.zero_digest().as_slice()));
    }

    #[test]
    fn snapshots_pass_through_unchanged() {
        let root = SoftwareRoot::new().expect("software root");
        let mut snapshot = RegisterValues::new(SHA256);
        snapshot.insert(4, vec![0x5A; 32]);

        for assertion in [
            PolicyAssertion::ExpectedRegisters(snapshot.clone()),
            PolicyAssertion::TargetRegisters(snapshot.clone()),
        ] {
            assert_eq!(assertion.evaluate(&root).unwrap(), snapshot);
            assert_eq!(assertion.selection(), snapshot.selection());
        }
    }

    #[test]
    fn invalid_assertions_are_rejected() {
        let root = SoftwareRoot::new().expect("software root");

        let empty = PolicyAssertion::CurrentRegisters(RegisterSelection::new(SHA256, []));
        assert!(matches!(empty.evaluate(&root), Err(SealError::InvalidAssertion(_))));

        let mut short = RegisterValues::new(SHA256);
        short.insert(7, vec![0; 20]);
        assert!(matches!(
            PolicyAssertion::TargetRegisters(short).evaluate(&root),
            Err(SealError::DigestSizeMismatch { .. })
        ));

        let unread = PolicyAssertion::CurrentRegisters(RegisterSelection::new(
            HashAlgorithm::Sha512,
            [0],
        ));
        assert!(matches!(unread.evaluate(&root), Err(SealError::Transport(_))));
    }
}
