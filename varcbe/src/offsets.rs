//! Offset arrays and the sections they index.
//!
//! An offset array is a `u32` header, entry size minus one in the top two bits
//! and the count in the rest, followed by that many big-endian entries. In an
//! indexed section the entries are the cumulative end offsets of each item,
//! measured from the first byte after the array, and the items follow
//! immediately.

use write_fonts::read::FontData;

use crate::{
    error::Error,
    var_idx::{min_bytes_for, read_uint, write_uint},
};

/// Largest count the header can hold
pub const MAX_OFFSET_COUNT: usize = 0x3FFF_FFFF;

/// Write `offsets` with the narrowest entry size that holds the largest.
pub fn compile_offsets(offsets: &[u32]) -> Result<Vec<u8>, Error> {
    if offsets.len() > MAX_OFFSET_COUNT {
        return Err(Error::TooManyOffsets(offsets.len()));
    }
    let entry_size = min_bytes_for(offsets.iter().copied().max().unwrap_or_default());
    let mut data = Vec::with_capacity(4 + offsets.len() * entry_size as usize);
    let header = ((entry_size as u32 - 1) << 30) | offsets.len() as u32;
    data.extend_from_slice(&header.to_be_bytes());
    for offset in offsets {
        write_uint(&mut data, *offset, entry_size);
    }
    Ok(data)
}

/// Read an offset array from the start of `data`.
///
/// Returns the offsets and the number of bytes they occupy.
pub fn decompile_offsets(data: FontData) -> Result<(Vec<u32>, usize), Error> {
    let header = data
        .read_at::<u32>(0)
        .map_err(Error::read("offset array header"))?;
    let entry_size = (header >> 30) as u8 + 1;
    let count = (header & MAX_OFFSET_COUNT as u32) as usize;
    let len = 4 + count
        .checked_mul(entry_size as usize)
        .ok_or(Error::TooManyOffsets(count))?;
    if len > data.len() {
        return Err(Error::OffsetOutOfBounds {
            context: "offset array",
            offset: len,
            len: data.len(),
        });
    }
    let offsets = (0..count)
        .map(|i| read_uint(data, 4 + i * entry_size as usize, entry_size))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::read("offset array"))?;
    Ok((offsets, len))
}

/// Write items as an indexed section.
pub fn compile_indexed_section<T: AsRef<[u8]>>(items: &[T]) -> Result<Vec<u8>, Error> {
    let mut ends = Vec::with_capacity(items.len());
    let mut end = 0_usize;
    for item in items {
        end += item.as_ref().len();
        ends.push(u32::try_from(end).map_err(|_| Error::OffsetOutOfBounds {
            context: "indexed section",
            offset: end,
            len: u32::MAX as usize,
        })?);
    }
    let mut data = compile_offsets(&ends)?;
    for item in items {
        data.extend_from_slice(item.as_ref());
    }
    Ok(data)
}

/// Split an indexed section at the start of `bytes` into its items.
pub fn read_indexed_section<'a>(
    bytes: &'a [u8],
    context: &'static str,
) -> Result<Vec<&'a [u8]>, Error> {
    let (ends, array_len) = decompile_offsets(FontData::new(bytes))?;
    if ends.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(Error::DecreasingOffsets {
            context,
            offsets: ends,
        });
    }
    let items = &bytes[array_len..];
    let mut start = 0;
    ends.iter()
        .map(|end| {
            let end = *end as usize;
            let item = items.get(start..end).ok_or(Error::OffsetOutOfBounds {
                context,
                offset: end,
                len: items.len(),
            })?;
            start = end;
            Ok(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::error::ErrorKind;

    #[rstest]
    #[case(&[], 1)]
    #[case(&[0, 3, 0xFF], 1)]
    #[case(&[0, 0x100], 2)]
    #[case(&[5, 0xFFFF, 0x10000], 3)]
    #[case(&[0x100_0000], 4)]
    fn offsets_round_trip(#[case] offsets: &[u32], #[case] entry_size: u8) {
        let data = compile_offsets(offsets).unwrap();
        assert_eq!(4 + offsets.len() * entry_size as usize, data.len());
        assert_eq!(entry_size - 1, data[0] >> 6);
        let (decoded, len) = decompile_offsets(FontData::new(&data)).unwrap();
        assert_eq!(offsets, decoded.as_slice());
        assert_eq!(data.len(), len);
    }

    #[test]
    fn empty_offsets_header() {
        assert_eq!(vec![0, 0, 0, 0], compile_offsets(&[]).unwrap());
    }

    #[test]
    fn header_packs_size_and_count() {
        let data = compile_offsets(&[1, 0x200]).unwrap();
        assert_eq!(vec![0x40, 0, 0, 2, 0, 1, 2, 0], data);
    }

    #[test]
    fn indexed_section_round_trip() {
        let items: Vec<Vec<u8>> = vec![vec![1, 2], vec![], vec![3]];
        let data = compile_indexed_section(&items).unwrap();
        assert_eq!(vec![0, 0, 0, 3, 2, 2, 3, 1, 2, 3], data);
        let decoded = read_indexed_section(&data, "test").unwrap();
        assert_eq!(
            items,
            decoded.into_iter().map(|i| i.to_vec()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn truncated_offsets() {
        let err = decompile_offsets(FontData::new(&[0, 0, 0, 3, 1])).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn item_past_end() {
        let err = read_indexed_section(&[0, 0, 0, 1, 4, 1, 2], "test").unwrap_err();
        assert!(matches!(err, Error::OffsetOutOfBounds { .. }), "{err:?}");
    }

    #[test]
    fn decreasing_offsets() {
        let err = read_indexed_section(&[0, 0, 0, 2, 2, 1, 9, 9], "test").unwrap_err();
        assert!(matches!(err, Error::DecreasingOffsets { .. }), "{err:?}");
    }
}
