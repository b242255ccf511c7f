//! Variation indices and their compact array form.
//!
//! An index is a 16 bit outer (which item variation data) and a 16 bit inner
//! (which row) part. Both are usually small, so the array stores each index
//! with the outer part folded down to sit right above the significant inner
//! bits and uses the narrowest entry that holds every folded value.

use std::fmt::{Debug, Display};

use serde::{Serialize, Serializer};
use write_fonts::{
    read::{FontData, ReadError},
    tables::layout::VariationIndex,
    types::Uint24,
};

use crate::error::Error;

/// The final, post-optimization index of a delta set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIdx(u32);

impl VarIdx {
    pub fn new(outer: u16, inner: u16) -> Self {
        VarIdx(((outer as u32) << 16) | inner as u32)
    }

    pub fn from_raw(raw: u32) -> Self {
        VarIdx(raw)
    }

    pub fn outer(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn inner(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }
}

impl From<VariationIndex> for VarIdx {
    fn from(value: VariationIndex) -> Self {
        VarIdx::new(value.delta_set_outer_index, value.delta_set_inner_index)
    }
}

impl Debug for VarIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VarIdx({}:{})", self.outer(), self.inner())
    }
}

impl Serialize for VarIdx {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Display for VarIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.outer(), self.inner())
    }
}

/// Entry size and inner bit count of a packed index array, stored as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFormat {
    /// Bytes per entry, 1..=4
    pub entry_size: u8,
    /// Bits of each entry holding the inner part, 1..=16
    pub inner_bits: u8,
}

impl Default for EntryFormat {
    fn default() -> Self {
        EntryFormat {
            entry_size: 1,
            inner_bits: 1,
        }
    }
}

impl EntryFormat {
    pub fn to_byte(self) -> u8 {
        ((self.entry_size - 1) << 4) | (self.inner_bits - 1)
    }

    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        let entry_size = (byte >> 4) + 1;
        if entry_size > 4 {
            return Err(Error::InvalidEntrySize(entry_size));
        }
        Ok(EntryFormat {
            entry_size,
            inner_bits: (byte & 0x0F) + 1,
        })
    }

    fn inner_mask(self) -> u32 {
        (1 << self.inner_bits) - 1
    }

    fn fold(self, idx: VarIdx) -> u32 {
        let raw = idx.to_u32();
        ((raw & 0xFFFF_0000) >> (16 - self.inner_bits)) | (raw & self.inner_mask())
    }

    fn unfold(self, raw: u32) -> VarIdx {
        VarIdx::from_raw(((raw >> self.inner_bits) << 16) | (raw & self.inner_mask()))
    }
}

/// Bytes needed to store `value`, at least 1.
pub(crate) fn min_bytes_for(value: u32) -> u8 {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

pub(crate) fn write_uint(out: &mut Vec<u8>, value: u32, size: u8) {
    out.extend_from_slice(&value.to_be_bytes()[4 - size as usize..]);
}

pub(crate) fn read_uint(data: FontData, pos: usize, size: u8) -> Result<u32, ReadError> {
    match size {
        1 => data.read_at::<u8>(pos).map(u32::from),
        2 => data.read_at::<u16>(pos).map(u32::from),
        3 => data.read_at::<Uint24>(pos).map(|v| v.to_u32()),
        _ => data.read_at::<u32>(pos),
    }
}

/// Pack indices into the narrowest array that holds them all.
pub fn pack_var_idxs(indices: &[VarIdx]) -> (EntryFormat, Vec<u8>) {
    if indices.is_empty() {
        return (EntryFormat::default(), Vec::new());
    }
    let all_bits = indices.iter().fold(0, |acc, idx| acc | idx.to_u32());
    let inner_bits = (32 - (all_bits & 0xFFFF).leading_zeros()).max(1) as u8;
    let mut format = EntryFormat {
        entry_size: 4,
        inner_bits,
    };
    format.entry_size = min_bytes_for(format.fold(VarIdx::from_raw(all_bits)));

    let mut data = Vec::with_capacity(indices.len() * format.entry_size as usize);
    for idx in indices {
        write_uint(&mut data, format.fold(*idx), format.entry_size);
    }
    (format, data)
}

/// Read `count` indices packed in `format` from the start of `data`.
pub fn unpack_var_idxs(
    format: EntryFormat,
    data: FontData,
    count: usize,
) -> Result<Vec<VarIdx>, ReadError> {
    (0..count)
        .map(|i| {
            read_uint(data, i * format.entry_size as usize, format.entry_size)
                .map(|raw| format.unfold(raw))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn idxs(raw: &[(u16, u16)]) -> Vec<VarIdx> {
        raw.iter().map(|(o, i)| VarIdx::new(*o, *i)).collect()
    }

    #[test]
    fn empty_packs_to_nothing() {
        let (format, data) = pack_var_idxs(&[]);
        assert_eq!(0x00, format.to_byte());
        assert!(data.is_empty());
    }

    #[test]
    fn small_indices_share_a_byte() {
        // inner needs 3 bits, outer 1 folds to bit 3
        let indices = idxs(&[(0, 5), (1, 2), (0, 0)]);
        let (format, data) = pack_var_idxs(&indices);
        assert_eq!(
            EntryFormat {
                entry_size: 1,
                inner_bits: 3
            },
            format
        );
        assert_eq!(0x02, format.to_byte());
        assert_eq!(vec![0x05, 0x0A, 0x00], data);
        assert_eq!(
            indices,
            unpack_var_idxs(format, FontData::new(&data), 3).unwrap()
        );
    }

    #[rstest]
    #[case(&[(0, 0xFF)], 1)]
    #[case(&[(0, 0x100)], 2)]
    #[case(&[(1, 0xFF)], 2)]
    #[case(&[(0x80, 0xFFFF)], 3)]
    #[case(&[(0xFFFF, 0xFFFF)], 4)]
    #[case(&[(0xFFFF, 0)], 3)]
    fn narrowest_entry(#[case] raw: &[(u16, u16)], #[case] expected_size: u8) {
        let indices = idxs(raw);
        let (format, data) = pack_var_idxs(&indices);
        assert_eq!(expected_size, format.entry_size);
        assert_eq!(raw.len() * expected_size as usize, data.len());
        assert_eq!(
            indices,
            unpack_var_idxs(format, FontData::new(&data), raw.len()).unwrap()
        );
    }

    #[test]
    fn format_byte_round_trip() {
        for byte in 0..0x40_u8 {
            assert_eq!(byte, EntryFormat::from_byte(byte).unwrap().to_byte());
        }
    }

    #[test]
    fn reject_wide_entries() {
        assert!(matches!(
            EntryFormat::from_byte(0x40),
            Err(Error::InvalidEntrySize(5))
        ));
    }

    #[test]
    fn truncated_array() {
        let format = EntryFormat {
            entry_size: 2,
            inner_bits: 16,
        };
        assert!(unpack_var_idxs(format, FontData::new(&[0, 1, 0]), 2).is_err());
    }
}
