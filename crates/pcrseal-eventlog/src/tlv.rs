// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Type-length-value codec, the building block of the canonical event log.
//
// Wire form (TCG CEL):
//
//   type:   1 byte
//   length: 4 bytes (big-endian u32)
//   value:  length bytes

use pcrseal_core::error::{Result, SealError};

/// Size of the type field.
pub const TLV_TYPE_FIELD_LEN: usize = 1;
/// Size of the big-endian length field.
pub const TLV_LENGTH_FIELD_LEN: usize = 4;
/// Bytes preceding the value.
pub const TLV_HEADER_LEN: usize = TLV_TYPE_FIELD_LEN + TLV_LENGTH_FIELD_LEN;
/// Largest value the length field can describe.
pub const TLV_MAX_VALUE_LEN: usize = u32::MAX as usize;

/// A single TLV. The length is implied by `value.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tlv {
    pub tlv_type: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tlv_type: u8, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Bytes this TLV occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        TLV_HEADER_LEN + self.value.len()
    }

    /// Encode to a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Fail with `ValueTooLarge` unless the value fits the length field.
    pub fn check_len(&self) -> Result<()> {
        value_len_field(self.value.len()).map(|_| ())
    }

    /// Append the encoding to `out`.
    ///
    /// The value must pass [`Tlv::check_len`]. Records and logs only hold
    /// TLVs that did.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let len = value_len_field(self.value.len());
        debug_assert!(len.is_ok(), "TLV value overflows the length field");
        out.push(self.tlv_type);
        out.extend_from_slice(&len.unwrap_or(u32::MAX).to_be_bytes());
        out.extend_from_slice(&self.value);
    }

    /// Decode a buffer holding exactly one TLV.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let declared = declared_len(data).ok_or(SealError::Incomplete)?;
        let actual = data.len() - TLV_HEADER_LEN;
        if declared != actual {
            return Err(SealError::MalformedLength { declared, actual });
        }
        Ok(Self::new(data[0], &data[TLV_HEADER_LEN..]))
    }

    /// Read the first TLV from `input` and advance past it.
    ///
    /// `input` is left untouched unless a whole TLV was available; a short
    /// stream yields [`SealError::Incomplete`].
    pub fn read_one(input: &mut &[u8]) -> Result<Self> {
        let data = *input;
        let declared = declared_len(data).ok_or(SealError::Incomplete)?;
        let end = TLV_HEADER_LEN
            .checked_add(declared)
            .ok_or(SealError::Incomplete)?;
        if data.len() < end {
            return Err(SealError::Incomplete);
        }
        let tlv = Self::new(data[0], &data[TLV_HEADER_LEN..end]);
        *input = &data[end..];
        Ok(tlv)
    }
}

fn value_len_field(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| SealError::ValueTooLarge {
        len,
        max: TLV_MAX_VALUE_LEN,
    })
}

/// The length field of the TLV at the start of `data`, if the header is there.
pub(crate) fn declared_len(data: &[u8]) -> Option<usize> {
    let field = data.get(TLV_TYPE_FIELD_LEN..TLV_HEADER_LEN)?;
    let len = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    usize::try_from(len).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let tlv = Tlv::new(0x07, vec![0xDE, 0xAD]);
        assert_eq!(tlv.encode(), vec![0x07, 0, 0, 0, 2, 0xDE, 0xAD]);
        assert_eq!(tlv.encoded_len(), 7);
    }

    #[test]
    fn empty_value() {
        let tlv = Tlv::new(0xFF, Vec::new());
        let bytes = tlv.encode();
        assert_eq!(bytes, vec![0xFF, 0, 0, 0, 0]);
        assert_eq!(Tlv::decode(&bytes).unwrap(), tlv);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        // Declares 3 bytes, carries 2.
        let short = [0x01, 0, 0, 0, 3, 0xAA, 0xBB];
        assert!(matches!(
            Tlv::decode(&short),
            Err(SealError::MalformedLength { declared: 3, actual: 2 })
        ));

        // Declares 1 byte, carries 2.
        let long = [0x01, 0, 0, 0, 1, 0xAA, 0xBB];
        assert!(matches!(
            Tlv::decode(&long),
            Err(SealError::MalformedLength { declared: 1, actual: 2 })
        ));
    }

    #[test]
    fn decode_short_header_is_incomplete() {
        assert!(matches!(Tlv::decode(&[0x01, 0, 0]), Err(SealError::Incomplete)));
    }

    #[test]
    fn read_one_advances_cursor() {
        let mut bytes = Tlv::new(1, vec![9]).encode();
        Tlv::new(2, vec![8, 7]).encode_into(&mut bytes);

        let mut cursor = bytes.as_slice();
        assert_eq!(Tlv::read_one(&mut cursor).unwrap(), Tlv::new(1, vec![9]));
        assert_eq!(cursor.len(), 7);
        assert_eq!(Tlv::read_one(&mut cursor).unwrap(), Tlv::new(2, vec![8, 7]));
        assert!(cursor.is_empty());
    }

    #[test]
    fn length_field_bound() {
        assert_eq!(value_len_field(7).unwrap(), 7);
        assert_eq!(value_len_field(TLV_MAX_VALUE_LEN).unwrap(), u32::MAX);
        assert!(Tlv::new(1, vec![0; 64]).check_len().is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_value_is_refused() {
        assert!(matches!(
            value_len_field(TLV_MAX_VALUE_LEN + 1),
            Err(SealError::ValueTooLarge { len, max })
                if len == TLV_MAX_VALUE_LEN + 1 && max == TLV_MAX_VALUE_LEN
        ));
    }

    #[test]
    fn read_one_incomplete_leaves_cursor() {
        // Header promises 16 bytes, only 4 present.
        let bytes = [0x03, 0, 0, 0, 16, 1, 2, 3, 4];
        let mut cursor = &bytes[..];
        assert!(matches!(Tlv::read_one(&mut cursor), Err(SealError::Incomplete)));
        assert_eq!(cursor.len(), bytes.len());

        let mut header_only = &bytes[..3];
        assert!(matches!(
            Tlv::read_one(&mut header_only),
            Err(SealError::Incomplete)
        ));

        let mut nothing: &[u8] = &[];
        assert!(matches!(Tlv::read_one(&mut nothing), Err(SealError::Incomplete)));
    }
}
