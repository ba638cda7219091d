// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pcrseal-eventlog: TCG Canonical Event Log (CEL) encoding, decoding, and
// replay. Records are four TLVs (RECNUM, PCR, DIGESTS, CONTENT); a log is the
// plain concatenation of its records.

pub mod cel;
pub mod content;
pub mod reader;
pub mod record;
pub mod tlv;

pub use cel::Cel;
pub use content::{Content, TaggedContent};
pub use reader::{DEFAULT_MAX_RECORD_LEN, LogReader};
pub use record::{DigestSet, Record};
pub use tlv::Tlv;
