// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sealing and event-log configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::HashAlgorithm;

/// Settings shared by the sealing engine, the software root of trust, and
/// the command-line tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    /// Hash algorithm of policy sessions and of sealed objects' names.
    pub session_algorithm: HashAlgorithm,
    /// Digests recorded for every event appended to a log.
    pub log_algorithms: Vec<HashAlgorithm>,
    /// Registers per bank (24 on PC-client platforms).
    pub register_count: u16,
    /// Register banks the platform exposes.
    pub banks: Vec<HashAlgorithm>,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            session_algorithm: HashAlgorithm::Sha256,
            log_algorithms: vec![HashAlgorithm::Sha256],
            register_count: 24,
            banks: vec![HashAlgorithm::Sha1, HashAlgorithm::Sha256],
        }
    }
}

impl SealConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SealError;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pcrseal.json");
        std::fs::write(&path, r#"{ "log_algorithms": ["sha1", "sha384"] }"#).unwrap();

        let config = SealConfig::load(&path).expect("load config");
        assert_eq!(
            config.log_algorithms,
            vec![HashAlgorithm::Sha1, HashAlgorithm::Sha384]
        );
        assert_eq!(config.session_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.register_count, 24);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SealConfig::load("/nonexistent/pcrseal.json").unwrap_err();
        assert!(matches!(err, SealError::Io(_)));
    }

    #[test]
    fn malformed_file_is_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SealConfig::load(&path),
            Err(SealError::Serialization(_))
        ));
    }
}
