// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns the JSON document to print.

use std::collections::BTreeMap;
use std::path::Path;

use pcrseal_core::error::Result;
use pcrseal_core::types::HashAlgorithm;
use pcrseal_eventlog::{Cel, Record};
use serde::Serialize;
use tracing::{debug, info};

/// One record as shown by `pcrseal dump`.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub recnum: u64,
    pub register: u8,
    /// Algorithm name to hex digest, in log order.
    pub digests: Vec<(HashAlgorithm, String)>,
    pub content_type: u8,
    pub content_len: usize,
}

impl From<&Record> for RecordView {
    fn from(record: &Record) -> Self {
        Self {
            recnum: record.recnum,
            register: record.register,
            digests: record
                .digests
                .iter()
                .map(|(alg, digest)| (alg, hex::encode(digest)))
                .collect(),
            content_type: record.content.tlv_type,
            content_len: record.content.value.len(),
        }
    }
}

/// Replayed values of one bank, as shown by `pcrseal replay`.
#[derive(Debug, Serialize)]
pub struct BankView {
    pub algorithm: HashAlgorithm,
    pub registers: BTreeMap<u8, String>,
}

fn read_log(path: &Path) -> Result<Cel> {
    let data = std::fs::read(path)?;
    let cel = Cel::decode(&data)?;
    info!(path = %path.display(), records = cel.len(), "event log loaded");
    Ok(cel)
}

/// Every record of the log at `path`.
pub fn dump(path: &Path) -> Result<Vec<RecordView>> {
    Ok(read_log(path)?.records().iter().map(RecordView::from).collect())
}

/// Replay the log at `path` into each of `algorithms`.
pub fn replay(path: &Path, algorithms: &[HashAlgorithm]) -> Result<Vec<BankView>> {
    let cel = read_log(path)?;
    algorithms
        .iter()
        .map(|&algorithm| -> Result<BankView> {
            let values = cel.replay(algorithm)?;
            debug!(%algorithm, registers = values.len(), "bank replayed");
            Ok(BankView {
                algorithm,
                registers: values
                    .iter()
                    .map(|(index, value)| (index, hex::encode(value)))
                    .collect(),
            })
        })
        .collect()
}
