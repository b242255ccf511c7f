//! The VarC table.
//!
//! ```text
//! u32       version, 0x00010000
//! Offset32  shared component data, may be 0
//! Offset32  glyph data
//! Offset32  ItemVariationStore, may be 0
//! ```
//!
//! Shared component data and glyph data are indexed sections, see
//! [`crate::offsets`]. Glyph data has one entry per glyph id up to the last
//! glyph with components; an empty entry means no variable components.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};
use serde::Serialize;
use varcir::types::{Axes, GlyphName, GlyphOrder};
use write_fonts::read::FontData;

use crate::{
    component::{compile_component, read_component},
    error::{Error, GlyphProblem},
    offsets::{compile_indexed_section, read_indexed_section},
    options::Flags,
    records::ComponentRecord,
    shared::{optimize_shared_component_data, read_back_reference},
    store::VarStoreData,
    var_idx::VarIdx,
};

pub const VERSION: u32 = 0x0001_0000;

const HEADER_LEN: usize = 16;

/// The composite glyphs of the font the table belongs to.
///
/// A glyph with variable components must be a composite with exactly as many
/// components in the outline table.
pub trait CompositeGlyphs {
    /// The number of components, or None if the glyph is not a composite
    fn component_count(&self, glyph: &str) -> Option<usize>;
}

impl CompositeGlyphs for BTreeMap<GlyphName, usize> {
    fn component_count(&self, glyph: &str) -> Option<usize> {
        self.get(glyph).copied()
    }
}

impl CompositeGlyphs for HashMap<GlyphName, usize> {
    fn component_count(&self, glyph: &str) -> Option<usize> {
        self.get(glyph).copied()
    }
}

/// What the table needs to know about the rest of the font.
#[derive(Clone, Copy)]
pub struct FontContext<'a> {
    pub axes: &'a Axes,
    pub glyph_order: &'a GlyphOrder,
    pub composites: &'a dyn CompositeGlyphs,
}

impl<'a> FontContext<'a> {
    pub fn new(
        axes: &'a Axes,
        glyph_order: &'a GlyphOrder,
        composites: &'a dyn CompositeGlyphs,
    ) -> Self {
        FontContext {
            axes,
            glyph_order,
            composites,
        }
    }

    /// The glyph id of a glyph with `num_components` variable components
    fn check_glyph(&self, name: &GlyphName, num_components: usize) -> Result<usize, Error> {
        let fail = |problem| Error::GlyphError(name.clone(), problem);
        let gid = self
            .glyph_order
            .glyph_id(name.as_str())
            .ok_or_else(|| fail(GlyphProblem::NotInGlyphOrder))?;
        let expected = self
            .composites
            .component_count(name.as_str())
            .ok_or_else(|| fail(GlyphProblem::NotAComposite))?;
        if expected != num_components {
            return Err(fail(GlyphProblem::ComponentCountMismatch {
                expected,
                actual: num_components,
            }));
        }
        Ok(gid)
    }
}

/// A decoded, or ready to compile, VarC table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Varc {
    pub glyph_data: BTreeMap<GlyphName, Vec<ComponentRecord<VarIdx>>>,
    pub var_store: Option<VarStoreData>,
}

fn offset32(pos: usize) -> Result<u32, Error> {
    u32::try_from(pos).map_err(|_| Error::OffsetOutOfBounds {
        context: "VarC",
        offset: pos,
        len: u32::MAX as usize,
    })
}

impl Varc {
    /// Serialize the table.
    ///
    /// Glyphs without components are left out.
    pub fn compile(&self, context: &FontContext, flags: Flags) -> Result<Vec<u8>, Error> {
        let mut gids = BTreeMap::new();
        let mut compiled = BTreeMap::new();
        for (name, records) in self.glyph_data.iter() {
            let gid = context.check_glyph(name, records.len())?;
            if records.is_empty() {
                continue;
            }
            let components = records
                .iter()
                .map(|record| compile_component(name, record, context.axes))
                .collect::<Result<Vec<_>, Error>>()?;
            gids.insert(gid, name.clone());
            compiled.insert(name.clone(), components);
        }

        let (glyphs, shared) = if flags.contains(Flags::SHARE_COMPONENT_DATA) {
            let optimized = optimize_shared_component_data(compiled)?;
            (optimized.glyphs, optimized.shared)
        } else {
            (compiled, Vec::new())
        };

        let num_entries = gids.keys().next_back().map(|gid| gid + 1).unwrap_or_default();
        let mut entries = vec![Vec::new(); num_entries];
        for (gid, name) in gids.iter() {
            if let Some(components) = glyphs.get(name) {
                entries[*gid] = components.concat();
            }
        }

        let shared_section = if shared.is_empty() {
            None
        } else {
            Some(compile_indexed_section(&shared)?)
        };
        let glyph_section = compile_indexed_section(&entries)?;

        let mut pos = HEADER_LEN;
        let shared_offset = match &shared_section {
            Some(section) => {
                let offset = offset32(pos)?;
                pos += section.len();
                offset
            }
            None => 0,
        };
        let glyph_offset = offset32(pos)?;
        pos += glyph_section.len();
        let store_offset = match &self.var_store {
            Some(_) => offset32(pos)?,
            None => 0,
        };

        let mut data = Vec::with_capacity(pos);
        data.extend_from_slice(&VERSION.to_be_bytes());
        data.extend_from_slice(&shared_offset.to_be_bytes());
        data.extend_from_slice(&glyph_offset.to_be_bytes());
        data.extend_from_slice(&store_offset.to_be_bytes());
        if let Some(section) = shared_section {
            data.extend(section);
        }
        data.extend(glyph_section);
        if let Some(store) = &self.var_store {
            data.extend_from_slice(store.as_bytes());
        }
        debug!(
            "VarC of {} bytes: {} glyphs, {} shared components, {} store bytes",
            data.len(),
            gids.len(),
            shared.len(),
            self.var_store
                .as_ref()
                .map(|s| s.as_bytes().len())
                .unwrap_or_default()
        );
        Ok(data)
    }

    /// A readable dump of every record, for inspecting a table.
    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Read a table, decoding every glyph.
    pub fn decompile(data: &[u8], context: &FontContext) -> Result<Varc, Error> {
        let header = FontData::new(data);
        let version = header.read_at::<u32>(0).map_err(Error::read("VarC header"))?;
        if version != VERSION {
            return Err(Error::UnknownVersion(version));
        }
        let read_offset = |pos| {
            header
                .read_at::<u32>(pos)
                .map(|offset| offset as usize)
                .map_err(Error::read("VarC header"))
        };
        let shared_offset = read_offset(4)?;
        let glyph_offset = read_offset(8)?;
        let store_offset = read_offset(12)?;

        let section = |offset: usize, context: &'static str| {
            if offset < HEADER_LEN {
                return Err(Error::OffsetOutOfBounds {
                    context,
                    offset,
                    len: data.len(),
                });
            }
            data.get(offset..).ok_or(Error::OffsetOutOfBounds {
                context,
                offset,
                len: data.len(),
            })
        };

        let shared = if shared_offset == 0 {
            Vec::new()
        } else {
            read_indexed_section(
                section(shared_offset, "shared component data")?,
                "shared component data",
            )?
        };
        let entries = read_indexed_section(section(glyph_offset, "glyph data")?, "glyph data")?;
        if entries.len() > context.glyph_order.len() {
            return Err(Error::TooManyGlyphEntries {
                entries: entries.len(),
                glyphs: context.glyph_order.len(),
            });
        }

        let mut glyph_data = BTreeMap::new();
        for (gid, bytes) in entries.into_iter().enumerate() {
            if bytes.is_empty() {
                continue;
            }
            let Some(name) = context.glyph_order.glyph_name(gid) else {
                continue;
            };
            let num_components = context
                .composites
                .component_count(name.as_str())
                .ok_or_else(|| Error::GlyphError(name.clone(), GlyphProblem::NotAComposite))?;
            let records = read_glyph(name, bytes, num_components, context.axes, &shared)?;
            trace!("{name} has {} variable components", records.len());
            glyph_data.insert(name.clone(), records);
        }

        let var_store = if store_offset == 0 {
            None
        } else {
            Some(VarStoreData::new(
                section(store_offset, "variation store")?.to_vec(),
            )?)
        };

        Ok(Varc {
            glyph_data,
            var_store,
        })
    }
}

/// Decode exactly `num_components` components from `data`.
fn read_glyph(
    name: &GlyphName,
    data: &[u8],
    num_components: usize,
    axes: &Axes,
    shared: &[&[u8]],
) -> Result<Vec<ComponentRecord<VarIdx>>, Error> {
    let mut records = Vec::with_capacity(num_components);
    let mut pos = 0;
    for _ in 0..num_components {
        let rest = data.get(pos..).unwrap_or_default();
        match read_back_reference(rest)? {
            Some((index, len)) => {
                records.push(read_shared(index, axes, shared)?);
                pos += len;
            }
            None => {
                let (record, len) = read_component(rest, axes)?;
                records.push(record);
                pos += len;
            }
        }
    }
    if pos != data.len() {
        return Err(Error::TrailingData {
            context: format!("glyph '{name}'"),
            unread: data.len().saturating_sub(pos),
        });
    }
    Ok(records)
}

fn read_shared(
    index: usize,
    axes: &Axes,
    shared: &[&[u8]],
) -> Result<ComponentRecord<VarIdx>, Error> {
    let data = shared.get(index).ok_or(Error::InvalidSharedIndex {
        index,
        available: shared.len(),
    })?;
    if read_back_reference(data)?.is_some() {
        return Err(Error::NestedSharedReference(index));
    }
    let (record, len) = read_component(data, axes)?;
    if len != data.len() {
        return Err(Error::TrailingData {
            context: format!("shared component {index}"),
            unread: data.len() - len,
        });
    }
    Ok(record)
}
