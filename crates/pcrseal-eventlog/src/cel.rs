// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical event log: an append-only list of records.
//
// Appends are not synchronised. Record numbers come from the current length,
// so concurrent producers must share one log behind a lock.

use pcrseal_core::chain::extend_once;
use pcrseal_core::error::{Result, SealError};
use pcrseal_core::types::{HashAlgorithm, RegisterValues};
use tracing::{debug, instrument};

use crate::content::Content;
use crate::record::Record;

/// An ordered, append-only canonical event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cel {
    records: Vec<Record>,
}

impl Cel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Measure `content` under each of `algorithms` and append a record for
    /// `register`. Nothing is appended if any digest cannot be produced.
    #[instrument(skip(self, content), fields(records = self.records.len()))]
    pub fn append_event<C: Content + ?Sized>(
        &mut self,
        register: u8,
        algorithms: &[HashAlgorithm],
        content: &C,
    ) -> Result<&Record> {
        if algorithms.is_empty() {
            return Err(SealError::EmptyDigestSet);
        }

        let mut digests = Vec::with_capacity(algorithms.len());
        for &algorithm in algorithms {
            digests.push((algorithm, content.generate_digest(algorithm)?));
        }

        let recnum = self.records.len() as u64;
        let record = Record::create(recnum, register, digests, content)?;
        self.records.push(record);
        debug!(recnum, "event appended");
        Ok(&self.records[self.records.len() - 1])
    }

    /// Concatenated record encodings, in log order.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for record in &self.records {
            record.encode_into(out);
        }
    }

    /// Decode a complete log. A trailing partial record is `TruncatedLog`.
    #[instrument(skip_all, fields(len = data.len()))]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut input = data;
        let mut records = Vec::new();
        while !input.is_empty() {
            let record = match Record::decode(&mut input) {
                Ok(record) => record,
                Err(SealError::Incomplete) => {
                    return Err(SealError::TruncatedLog {
                        record: records.len(),
                    });
                }
                Err(e) => return Err(e),
            };
            check_sequence(records.len() as u64, &record)?;
            records.push(record);
        }
        debug!(records = records.len(), "event log decoded");
        Ok(Self { records })
    }

    /// Records measured into `register`, in log order.
    pub fn records_for_register(&self, register: u8) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.register == register)
    }

    /// Recompute the `algorithm` bank from the log.
    ///
    /// Every register the log touches starts at the zero digest and is
    /// extended by its records in order. Registers the log never mentions
    /// are absent from the result.
    pub fn replay(&self, algorithm: HashAlgorithm) -> Result<RegisterValues> {
        let mut values = RegisterValues::new(algorithm);
        for record in &self.records {
            let digest = record
                .digests
                .get(algorithm)
                .ok_or(SealError::MissingDigest {
                    record: record.recnum,
                    algorithm,
                })?;
            let current = values
                .values
                .entry(record.register)
                .or_insert_with(|| algorithm.zero_digest());
            *current = extend_once(algorithm, current, digest)?;
        }
        Ok(values)
    }

    /// Registers in `observed` whose value the log does not reproduce.
    ///
    /// A register the log never touches is expected to still hold the zero
    /// digest.
    pub fn verify_replay(&self, observed: &RegisterValues) -> Result<Vec<u8>> {
        let replayed = self.replay(observed.algorithm)?;
        let zero = observed.algorithm.zero_digest();
        let mismatched: Vec<u8> = observed
            .iter()
            .filter(|(index, value)| {
                replayed.get(*index).unwrap_or(zero.as_slice()) != *value
            })
            .map(|(index, _)| index)
            .collect();
        if !mismatched.is_empty() {
            debug!(?mismatched, "replay does not match observed registers");
        }
        Ok(mismatched)
    }
}

/// Record numbers are dense and start at zero.
pub(crate) fn check_sequence(expected: u64, record: &Record) -> Result<()> {
    if record.recnum == expected {
        Ok(())
    } else {
        Err(SealError::OutOfSequence {
            expected,
            actual: record.recnum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TaggedContent;
    use pcrseal_core::chain::extend_chain;
    use proptest::prelude::*;

    const BOTH: &[HashAlgorithm] = &[HashAlgorithm::Sha1, HashAlgorithm::Sha256];

    /// Content that refuses one bank.
    struct NoSha1;

    impl Content for NoSha1 {
        fn generate_digest(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
            match algorithm {
                HashAlgorithm::Sha1 => Err(SealError::Content("SHA-1 disabled".into())),
                other => Ok(other.digest(b"no-sha1")),
            }
        }

        fn to_tlv(&self) -> crate::tlv::Tlv {
            crate::tlv::Tlv::new(7, b"no-sha1".to_vec())
        }
    }

    fn boot_log() -> Cel {
        let mut cel = Cel::new();
        for (register, data) in [(4u8, "shim"), (4, "grub"), (8, "cmdline"), (4, "vmlinuz")] {
            cel.append_event(register, BOTH, &TaggedContent::new(1, data.as_bytes().to_vec()))
                .expect("append");
        }
        cel
    }

    #[test]
    fn record_numbers_follow_position() {
        let cel = boot_log();
        for (i, record) in cel.records().iter().enumerate() {
            assert_eq!(record.recnum, i as u64);
        }
    }

    #[test]
    fn encode_decode_whole_log() {
        let cel = boot_log();
        let decoded = Cel::decode(&cel.encode()).expect("decode");
        assert_eq!(decoded, cel);
        assert_eq!(Cel::decode(&[]).unwrap(), Cel::new());
    }

    #[test]
    fn append_without_algorithms_fails() {
        let mut cel = Cel::new();
        let err = cel
            .append_event(0, &[], &TaggedContent::new(1, b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, SealError::EmptyDigestSet));
        assert!(cel.is_empty());
    }

    #[test]
    fn failed_digest_leaves_log_untouched() {
        let mut cel = boot_log();
        let before = cel.clone();
        let err = cel.append_event(9, BOTH, &NoSha1).unwrap_err();
        assert!(matches!(err, SealError::Content(_)));
        assert_eq!(cel, before);

        // The same content is fine on the bank it supports.
        cel.append_event(9, &[HashAlgorithm::Sha256], &NoSha1)
            .expect("append sha256 only");
        assert_eq!(cel.len(), before.len() + 1);
    }

    #[test]
    fn truncated_log_reports_record_index() {
        let bytes = boot_log().encode();
        let err = Cel::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, SealError::TruncatedLog { record: 3 }));
    }

    #[test]
    fn out_of_sequence_record_rejected() {
        let cel = boot_log();
        let mut bytes = Vec::new();
        cel.records()[0].encode_into(&mut bytes);
        cel.records()[2].encode_into(&mut bytes);
        assert!(matches!(
            Cel::decode(&bytes),
            Err(SealError::OutOfSequence { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn replay_matches_extend_chain() {
        let cel = boot_log();
        let alg = HashAlgorithm::Sha256;
        let replayed = cel.replay(alg).expect("replay");

        let pcr4: Vec<Vec<u8>> = ["shim", "grub", "vmlinuz"]
            .iter()
            .map(|s| alg.digest(s.as_bytes()))
            .collect();
        let expected4 = extend_chain(alg, &alg.zero_digest(), &pcr4).unwrap();
        assert_eq!(replayed.get(4), Some(expected4.as_slice()));
        assert_eq!(replayed.len(), 2);
        assert_eq!(cel.records_for_register(4).count(), 3);
    }

    #[test]
    fn replay_needs_the_bank() {
        let cel = boot_log();
        assert!(matches!(
            cel.replay(HashAlgorithm::Sha512),
            Err(SealError::MissingDigest { record: 0, algorithm: HashAlgorithm::Sha512 })
        ));
    }

    #[test]
    fn verify_replay_flags_divergent_registers() {
        let cel = boot_log();
        let mut observed = cel.replay(HashAlgorithm::Sha1).unwrap();
        assert!(cel.verify_replay(&observed).unwrap().is_empty());

        observed.insert(8, vec![0xEE; 20]);
        observed.insert(0, HashAlgorithm::Sha1.zero_digest());
        observed.insert(1, vec![0x01; 20]);
        assert_eq!(cel.verify_replay(&observed).unwrap(), vec![1, 8]);
    }

    fn arb_algorithms() -> impl Strategy<Value = Vec<HashAlgorithm>> {
        prop::sample::subsequence(HashAlgorithm::ALL.to_vec(), 1..=4)
    }

    proptest! {
        /// Any sequence of appends survives an encode/decode cycle and keeps
        /// dense record numbers.
        #[test]
        fn appended_logs_round_trip(
            events in prop::collection::vec(
                (any::<u8>(), any::<u8>(), prop::collection::vec(any::<u8>(), 0..64), arb_algorithms()),
                0..12,
            ),
        ) {
            let mut cel = Cel::new();
            for (register, content_type, data, algorithms) in &events {
                cel.append_event(*register, algorithms, &TaggedContent::new(*content_type, data.clone()))
                    .expect("append");
            }

            let decoded = Cel::decode(&cel.encode()).expect("decode");
            prop_assert_eq!(&decoded, &cel);
            for (i, record) in decoded.records().iter().enumerate() {
                prop_assert_eq!(record.recnum, i as u64);
            }
        }
    }
}
