//! Deduplication of components that compile to the same bytes.
//!
//! A component that occurs more than once anywhere in the font is stored once
//! in the shared component section and every occurrence is replaced by a
//! back reference: `0x8000 | index` as a u16, or `0xC0000000 | index` as a
//! u32 once the index no longer fits in 14 bits.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;
use varcir::types::GlyphName;
use write_fonts::read::FontData;

use crate::error::Error;

const SHARED_REFERENCE: u16 = 0x8000;
const LONG_SHARED_REFERENCE: u16 = 0x4000;
const MAX_SHORT_INDEX: usize = 0x3FFF;
const MAX_LONG_INDEX: usize = 0x3FFF_FFFF;

/// Compiled components per glyph plus the blobs they may refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedComponents {
    pub glyphs: BTreeMap<GlyphName, Vec<Vec<u8>>>,
    pub shared: Vec<Vec<u8>>,
}

/// The bytes that refer to shared component `index`.
pub fn back_reference(index: usize) -> Result<Vec<u8>, Error> {
    if index <= MAX_SHORT_INDEX {
        Ok((SHARED_REFERENCE | index as u16).to_be_bytes().to_vec())
    } else if index <= MAX_LONG_INDEX {
        let long_flags = ((SHARED_REFERENCE | LONG_SHARED_REFERENCE) as u32) << 16;
        Ok((long_flags | index as u32).to_be_bytes().to_vec())
    } else {
        Err(Error::SharedIndexOverflow(index))
    }
}

/// If `data` starts with a back reference, its index and length.
pub fn read_back_reference(data: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let data = FontData::new(data);
    let first = data
        .read_at::<u16>(0)
        .map_err(Error::read("component flags"))?;
    if first & SHARED_REFERENCE == 0 {
        return Ok(None);
    }
    if first & LONG_SHARED_REFERENCE == 0 {
        return Ok(Some(((first as usize) & MAX_SHORT_INDEX, 2)));
    }
    let long = data
        .read_at::<u32>(0)
        .map_err(Error::read("shared component reference"))?;
    Ok(Some(((long as usize) & MAX_LONG_INDEX, 4)))
}

/// Move every component that occurs more than once into shared data.
///
/// Shared blobs are numbered in the order they are first seen, walking
/// glyphs in name order.
pub fn optimize_shared_component_data(
    glyphs: BTreeMap<GlyphName, Vec<Vec<u8>>>,
) -> Result<SharedComponents, Error> {
    let mut counts: IndexMap<&[u8], usize> = IndexMap::new();
    for component in glyphs.values().flatten() {
        *counts.entry(component.as_slice()).or_default() += 1;
    }
    let shared_indices: IndexMap<&[u8], usize> = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .enumerate()
        .map(|(index, (component, _))| (*component, index))
        .collect();

    let mut references = Vec::with_capacity(shared_indices.len());
    for index in 0..shared_indices.len() {
        references.push(back_reference(index)?);
    }

    let rewritten: BTreeMap<GlyphName, Vec<Vec<u8>>> = glyphs
        .iter()
        .map(|(name, components)| {
            let components = components
                .iter()
                .map(|component| match shared_indices.get(component.as_slice()) {
                    Some(index) => references[*index].clone(),
                    None => component.clone(),
                })
                .collect();
            (name.clone(), components)
        })
        .collect();
    let shared: Vec<Vec<u8>> = shared_indices.keys().map(|c| c.to_vec()).collect();

    let size = |glyphs: &BTreeMap<GlyphName, Vec<Vec<u8>>>| -> usize {
        glyphs.values().flatten().map(Vec::len).sum()
    };
    let before = size(&glyphs);
    let after = size(&rewritten) + shared.iter().map(Vec::len).sum::<usize>();
    debug!(
        "Shared {} components: {before} bytes before, {after} after, saved {}",
        shared.len(),
        before as i64 - after as i64
    );

    Ok(SharedComponents {
        glyphs: rewritten,
        shared,
    })
}

/// Replace back references with the bytes they refer to.
pub fn resolve_shared_component_data(
    components: &SharedComponents,
) -> Result<BTreeMap<GlyphName, Vec<Vec<u8>>>, Error> {
    components
        .glyphs
        .iter()
        .map(|(name, glyph_components)| {
            let resolved = glyph_components
                .iter()
                .map(|component| match read_back_reference(component)? {
                    Some((index, _)) => components
                        .shared
                        .get(index)
                        .cloned()
                        .ok_or(Error::InvalidSharedIndex {
                            index,
                            available: components.shared.len(),
                        }),
                    None => Ok(component.clone()),
                })
                .collect::<Result<Vec<_>, Error>>()?;
            Ok((name.clone(), resolved))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    fn glyphs(raw: &[(&str, &[&[u8]])]) -> BTreeMap<GlyphName, Vec<Vec<u8>>> {
        raw.iter()
            .map(|(name, components)| {
                (
                    GlyphName::from(*name),
                    components.iter().map(|c| c.to_vec()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn repeated_components_become_references() {
        let _ = env_logger::builder().is_test(true).try_init();
        let input = glyphs(&[
            ("A", &[&[0, 0, 0, 0], &[0, 0x20, 0, 0, 1, 0]]),
            ("B", &[&[0, 0x40, 0, 0, 9, 9], &[0, 0, 0, 0]]),
            ("C", &[&[0, 0x40, 0, 0, 9, 9], &[0, 0x20, 0, 0, 2, 0]]),
        ]);
        let optimized = optimize_shared_component_data(input.clone()).unwrap();
        assert_eq!(
            vec![vec![0, 0, 0, 0], vec![0, 0x40, 0, 0, 9, 9]],
            optimized.shared
        );
        assert_eq!(
            glyphs(&[
                ("A", &[&[0x80, 0], &[0, 0x20, 0, 0, 1, 0]]),
                ("B", &[&[0x80, 1], &[0x80, 0]]),
                ("C", &[&[0x80, 1], &[0, 0x20, 0, 0, 2, 0]]),
            ]),
            optimized.glyphs
        );
        assert_eq!(input, resolve_shared_component_data(&optimized).unwrap());
    }

    #[test]
    fn nothing_to_share() {
        let input = glyphs(&[("A", &[&[0, 0, 0, 0]]), ("B", &[&[0, 0, 0, 1, 0]])]);
        let optimized = optimize_shared_component_data(input.clone()).unwrap();
        assert!(optimized.shared.is_empty());
        assert_eq!(input, optimized.glyphs);
    }

    #[test]
    fn long_references_past_14_bits() {
        let input: BTreeMap<GlyphName, Vec<Vec<u8>>> = (0..2)
            .map(|g| {
                let components = (0..=MAX_SHORT_INDEX as u32 + 1)
                    .map(|i| i.to_be_bytes().to_vec())
                    .collect();
                (GlyphName::from(format!("g{g}")), components)
            })
            .collect();
        let optimized = optimize_shared_component_data(input.clone()).unwrap();
        let last = optimized.glyphs[&GlyphName::from("g1")].last().unwrap();
        assert_eq!(&vec![0xC0, 0x00, 0x40, 0x00], last);
        assert_eq!(input, resolve_shared_component_data(&optimized).unwrap());
    }

    #[test]
    fn back_reference_forms() {
        assert_eq!(vec![0x80, 0x00], back_reference(0).unwrap());
        assert_eq!(vec![0xBF, 0xFF], back_reference(0x3FFF).unwrap());
        assert_eq!(vec![0xC0, 0x00, 0x40, 0x00], back_reference(0x4000).unwrap());
        assert_eq!(
            vec![0xFF, 0xFF, 0xFF, 0xFF],
            back_reference(0x3FFF_FFFF).unwrap()
        );
        let err = back_reference(0x4000_0000).unwrap_err();
        assert_eq!(ErrorKind::Range, err.kind());
    }

    #[test]
    fn read_back_reference_forms() {
        assert_eq!(None, read_back_reference(&[0x00, 0x20, 0]).unwrap());
        assert_eq!(Some((5, 2)), read_back_reference(&[0x80, 0x05]).unwrap());
        assert_eq!(
            Some((0x12345, 4)),
            read_back_reference(&[0xC0, 0x01, 0x23, 0x45]).unwrap()
        );
        assert!(read_back_reference(&[0xC0, 0x01]).is_err());
    }

    #[test]
    fn dangling_reference() {
        let components = SharedComponents {
            glyphs: glyphs(&[("A", &[&[0x80, 0x01]])]),
            shared: vec![vec![0, 0, 0, 0]],
        };
        assert!(matches!(
            resolve_shared_component_data(&components),
            Err(Error::InvalidSharedIndex {
                index: 1,
                available: 1
            })
        ));
    }
}
