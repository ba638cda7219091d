// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Incremental event log reader for logs that grow while being read (a pipe,
// a securityfs file, a socket).

use pcrseal_core::error::{Result, SealError};
use tracing::trace;

use crate::cel::check_sequence;
use crate::record::Record;
use crate::tlv::{TLV_HEADER_LEN, declared_len};

/// Default cap on the bytes one record may need: 16 MiB.
pub const DEFAULT_MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Fields in a record.
const RECORD_FIELDS: usize = 4;

/// Buffers log bytes and hands out records as soon as they are complete.
///
/// A partial record at the end of the buffer is not an error here; it stays
/// buffered until more bytes arrive or [`LogReader::finish`] is called. A
/// partial record whose headers already declare more than the reader's limit
/// fails with `RecordTooLarge` instead of waiting.
#[derive(Debug)]
pub struct LogReader {
    buffer: Vec<u8>,
    records_read: u64,
    max_record_len: usize,
    /// Lower bound on the buffer length the next record needs.
    needed: usize,
}

impl Default for LogReader {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_RECORD_LEN)
    }
}

impl LogReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reader refusing records larger than `max_record_len` bytes.
    pub fn with_limit(max_record_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            records_read: 0,
            max_record_len,
            needed: 0,
        }
    }

    /// Add the next chunk of log bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes waiting for the rest of their record.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// The next complete record, or `None` if more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.buffer.is_empty() || self.buffer.len() < self.needed {
            return Ok(None);
        }

        let (record, consumed) = {
            let mut cursor = self.buffer.as_slice();
            match Record::decode(&mut cursor) {
                Ok(record) => (record, self.buffer.len() - cursor.len()),
                Err(SealError::Incomplete) => {
                    let needed = required_len(&self.buffer);
                    if needed > self.max_record_len {
                        return Err(SealError::RecordTooLarge {
                            needed,
                            limit: self.max_record_len,
                        });
                    }
                    self.needed = needed;
                    trace!(pending = self.buffer.len(), needed, "waiting for more log data");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        };

        check_sequence(self.records_read, &record)?;
        self.buffer.drain(..consumed);
        self.records_read += 1;
        self.needed = 0;
        Ok(Some(record))
    }

    /// Every record that is complete so far.
    pub fn drain_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// End of input: leftover bytes mean the log was cut mid-record.
    pub fn finish(self) -> Result<()> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(SealError::TruncatedLog {
                record: self.records_read as usize,
            })
        }
    }
}

/// Lower bound on the bytes the record at the start of `data` occupies,
/// from whichever field headers are already present.
fn required_len(data: &[u8]) -> usize {
    let mut offset = 0usize;
    for _ in 0..RECORD_FIELDS {
        let Some(declared) = data.get(offset..).and_then(declared_len) else {
            return offset.saturating_add(TLV_HEADER_LEN);
        };
        offset = offset
            .saturating_add(TLV_HEADER_LEN)
            .saturating_add(declared);
        if offset > data.len() {
            break;
        }
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cel::Cel;
    use crate::content::TaggedContent;
    use pcrseal_core::types::HashAlgorithm;

    fn sample_log() -> Cel {
        let mut cel = Cel::new();
        for i in 0..4u8 {
            cel.append_event(i, &[HashAlgorithm::Sha256], &TaggedContent::new(1, vec![i; 10]))
                .expect("append");
        }
        cel
    }

    #[test]
    fn byte_at_a_time() {
        let cel = sample_log();
        let bytes = cel.encode();

        let mut reader = LogReader::new();
        let mut records = Vec::new();
        for byte in &bytes {
            reader.push(std::slice::from_ref(byte));
            records.extend(reader.drain_records().expect("drain"));
        }

        assert_eq!(records.as_slice(), cel.records());
        assert_eq!(reader.records_read(), 4);
        assert_eq!(reader.pending(), 0);
        reader.finish().expect("clean end");
    }

    #[test]
    fn partial_tail_is_truncation_at_finish() {
        let bytes = sample_log().encode();
        let mut reader = LogReader::new();
        reader.push(&bytes[..bytes.len() - 2]);

        assert_eq!(reader.drain_records().unwrap().len(), 3);
        assert!(reader.pending() > 0);
        assert!(matches!(
            reader.finish(),
            Err(SealError::TruncatedLog { record: 3 })
        ));
    }

    #[test]
    fn oversized_length_fails_fast() {
        let mut reader = LogReader::new();
        // RECNUM header claiming 4 GiB.
        reader.push(&[0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
        assert!(matches!(
            reader.next_record(),
            Err(SealError::RecordTooLarge { limit: DEFAULT_MAX_RECORD_LEN, .. })
        ));
    }

    #[test]
    fn limit_counts_every_field() {
        let bytes = sample_log().encode();
        let first_len = sample_log().records()[0].encode().len();

        let mut tight = LogReader::with_limit(first_len - 1);
        tight.push(&bytes[..first_len - 1]);
        assert!(matches!(
            tight.next_record(),
            Err(SealError::RecordTooLarge { .. })
        ));

        let mut exact = LogReader::with_limit(first_len);
        exact.push(&bytes[..first_len - 1]);
        assert!(exact.next_record().unwrap().is_none());
        exact.push(&bytes[first_len - 1..first_len]);
        assert!(exact.next_record().unwrap().is_some());
    }

    #[test]
    fn waits_for_declared_bytes() {
        let bytes = sample_log().encode();
        let mut reader = LogReader::new();
        reader.push(&bytes[..20]);
        assert!(reader.next_record().unwrap().is_none());
        // The headers seen so far already put the record past 20 bytes.
        assert!(reader.needed > 20);
        assert!(reader.needed <= sample_log().records()[0].encode().len());
    }

    #[test]
    fn corruption_is_not_deferred() {
        let mut reader = LogReader::new();
        // A PCR field where RECNUM belongs is wrong however many bytes follow.
        reader.push(&[1, 0, 0, 0, 1, 7]);
        assert!(matches!(
            reader.next_record(),
            Err(SealError::UnexpectedTlvType { field: "RECNUM", .. })
        ));
    }
}
