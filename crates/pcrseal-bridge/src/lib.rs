// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Root-of-trust abstraction for pcrseal.
//
// The sealing engine only ever talks to a `RootOfTrust`. Hardware-backed
// implementations live outside this crate; `SoftwareRoot` emulates one in
// memory.

pub mod sim;
pub mod traits;

use pcrseal_core::config::SealConfig;
use pcrseal_core::error::Result;

pub use sim::SoftwareRoot;
pub use traits::{
    CreationData, KeyHandle, PolicySessions, RegisterBank, RootOfTrust, SealTemplate,
    SealedBlob, SealedStorage, SessionHandle,
};

/// The root of trust available to this build.
///
/// Without a hardware backend this is always the software root, configured
/// from `config`.
pub fn root_of_trust(config: &SealConfig) -> Result<Box<dyn RootOfTrust>> {
    tracing::warn!("no hardware root of trust available, using the software root");
    Ok(Box::new(SoftwareRoot::with_config(config)?))
}
