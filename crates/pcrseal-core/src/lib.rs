// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pcrseal: Core types, hash algorithms, the register extend chain, and error
// definitions shared across all crates.

pub mod chain;
pub mod config;
pub mod error;
pub mod types;

pub use chain::{extend_chain, extend_once};
pub use config::SealConfig;
pub use error::{ErrorClass, Result, SealError};
pub use types::*;
