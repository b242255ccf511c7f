//! The binary form of one component record.
//!
//! ```text
//! u16     flags
//! u8      variation index entry format
//! u8/u16  axis count, width per AXIS_INDICES_ARE_WORDS
//! u8/u16  axis indices; the top bit marks a coordinate with a variation index
//! i16     coordinates, F4Dot12
//! i16     transform fields present in flags, in field order
//! ...     packed variation indices: coordinates, then transform fields
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;
use varcir::{ir::TransformField, types::Axes, types::GlyphName};
use write_fonts::read::FontData;

use crate::{
    error::Error,
    fixed::{to_i16, Precision, MAX_INT_BITS_FOR_SCALE},
    records::{ComponentRecord, TransformRecord, ValueRecord},
    var_idx::{pack_var_idxs, unpack_var_idxs, EntryFormat, VarIdx},
};

/// Largest axis index a component can refer to
pub const MAX_AXIS_INDEX: usize = 0x7FFF;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ComponentFlags: u16 {
        const NUM_INT_BITS_FOR_SCALE_MASK = 0x0007;
        const AXIS_INDICES_ARE_WORDS = 0x0008;
        /// Every transform field present has a variation index
        const HAVE_TRANSFORM_VARIATIONS = 0x0010;
        const HAVE_ROTATION = 0x0020;
        const HAVE_SCALE_X = 0x0040;
        const HAVE_SCALE_Y = 0x0080;
        const HAVE_SKEW_X = 0x0100;
        const HAVE_SKEW_Y = 0x0200;
        const HAVE_TCENTER_X = 0x0400;
        const HAVE_TCENTER_Y = 0x0800;
    }
}

impl ComponentFlags {
    pub fn for_field(field: TransformField) -> ComponentFlags {
        ComponentFlags::from_bits_retain(ComponentFlags::HAVE_ROTATION.bits() << field.index())
    }

    pub fn num_int_bits_for_scale(self) -> u8 {
        (self & ComponentFlags::NUM_INT_BITS_FOR_SCALE_MASK).bits() as u8
    }
}

/// Serialize one component.
///
/// Coordinates are written in axis order.
pub fn compile_component(
    glyph: &GlyphName,
    record: &ComponentRecord<VarIdx>,
    axes: &Axes,
) -> Result<Vec<u8>, Error> {
    let mut coords = record
        .coord
        .iter()
        .map(|(tag, value)| {
            let index = axes.index_of(*tag).ok_or(Error::UnknownAxis(*tag))?;
            if index > MAX_AXIS_INDEX {
                return Err(Error::AxisIndexOverflow(index));
            }
            Ok((index as u16, *tag, value))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    coords.sort_by_key(|(index, ..)| *index);
    let words = coords.len() > 0xFF || coords.iter().any(|(index, ..)| *index > 0x7F);

    let transform_variations = record.transform.has_variations();
    if transform_variations && record.transform.iter().any(|(_, v)| v.var_idx.is_none()) {
        return Err(Error::MixedTransformVariations(glyph.clone()));
    }

    let num_int_bits_for_scale = record.num_int_bits_for_scale;
    if num_int_bits_for_scale > MAX_INT_BITS_FOR_SCALE {
        return Err(Error::ScaleBitsOverflow {
            glyph: glyph.clone(),
            bits: num_int_bits_for_scale,
        });
    }
    let mut flags = ComponentFlags::from_bits_retain(num_int_bits_for_scale as u16);
    if words {
        flags |= ComponentFlags::AXIS_INDICES_ARE_WORDS;
    }
    if transform_variations {
        flags |= ComponentFlags::HAVE_TRANSFORM_VARIATIONS;
    }
    for (field, _) in record.transform.iter() {
        flags |= ComponentFlags::for_field(field);
    }

    let var_idxs: Vec<VarIdx> = coords
        .iter()
        .filter_map(|(_, _, value)| value.var_idx)
        .chain(
            record
                .transform
                .iter()
                .filter_map(|(_, value)| value.var_idx),
        )
        .collect();
    let (format, packed) = pack_var_idxs(&var_idxs);

    let mut data = Vec::new();
    data.extend_from_slice(&flags.bits().to_be_bytes());
    data.push(format.to_byte());
    if words {
        data.extend_from_slice(&(coords.len() as u16).to_be_bytes());
    } else {
        data.push(coords.len() as u8);
    }
    for (index, _, value) in coords.iter() {
        let has_var_idx = value.var_idx.is_some();
        if words {
            let raw = if has_var_idx { index | 0x8000 } else { *index };
            data.extend_from_slice(&raw.to_be_bytes());
        } else {
            let raw = if has_var_idx { *index as u8 | 0x80 } else { *index as u8 };
            data.push(raw);
        }
    }

    let overflow = |field: String, value: f64| Error::FixedOverflow {
        glyph: glyph.clone(),
        field,
        value,
    };
    for (_, tag, value) in coords.iter() {
        let fixed = to_i16(Precision::COORD.to_fixed(value.value))
            .ok_or_else(|| overflow(format!("coordinate {tag}"), value.value))?;
        data.extend_from_slice(&fixed.to_be_bytes());
    }
    for (field, value) in record.transform.iter() {
        let precision = Precision::for_field(field, num_int_bits_for_scale);
        let fixed = to_i16(precision.to_fixed(value.value))
            .ok_or_else(|| overflow(field.to_string(), value.value))?;
        data.extend_from_slice(&fixed.to_be_bytes());
    }
    data.extend(packed);
    Ok(data)
}

/// Reads big-endian values, tracking position.
struct Reader<'a> {
    data: FontData<'a>,
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Reader {
            data: FontData::new(data),
            pos: 0,
            context,
        }
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let value = self.data.read_at::<u8>(self.pos).map_err(Error::read(self.context))?;
        self.pos += 1;
        Ok(value)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let value = self
            .data
            .read_at::<u16>(self.pos)
            .map_err(Error::read(self.context))?;
        self.pos += 2;
        Ok(value)
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        let value = self
            .data
            .read_at::<i16>(self.pos)
            .map_err(Error::read(self.context))?;
        self.pos += 2;
        Ok(value)
    }

    fn read_var_idxs(&mut self, format: EntryFormat, count: usize) -> Result<Vec<VarIdx>, Error> {
        let rest = self
            .data
            .split_off(self.pos)
            .unwrap_or_else(|| FontData::new(&[]));
        let var_idxs = unpack_var_idxs(format, rest, count).map_err(Error::read(self.context))?;
        self.pos += count * format.entry_size as usize;
        Ok(var_idxs)
    }
}

/// Read one inline component from the start of `data`.
///
/// Returns the record and the number of bytes it occupies. Shared data
/// references are resolved by the caller.
pub fn read_component(
    data: &[u8],
    axes: &Axes,
) -> Result<(ComponentRecord<VarIdx>, usize), Error> {
    let mut reader = Reader::new(data, "component");
    let raw_flags = reader.read_u16()?;
    let flags = ComponentFlags::from_bits(raw_flags).ok_or(Error::ReservedFlags(raw_flags))?;
    let format = EntryFormat::from_byte(reader.read_u8()?)?;
    let words = flags.contains(ComponentFlags::AXIS_INDICES_ARE_WORDS);
    let num_axes = if words {
        reader.read_u16()? as usize
    } else {
        reader.read_u8()? as usize
    };

    let mut axis_entries = Vec::with_capacity(num_axes);
    for _ in 0..num_axes {
        let (index, has_var_idx) = if words {
            let raw = reader.read_u16()?;
            (raw & 0x7FFF, raw & 0x8000 != 0)
        } else {
            let raw = reader.read_u8()?;
            ((raw & 0x7F) as u16, raw & 0x80 != 0)
        };
        let tag = axes
            .axis_at(index as usize)
            .ok_or(Error::InvalidAxisIndex(index))?
            .tag;
        if axis_entries.iter().any(|(t, _, _)| *t == tag) {
            return Err(Error::DuplicateAxisIndex(index));
        }
        axis_entries.push((tag, index, has_var_idx));
    }
    let mut coord_values = Vec::with_capacity(num_axes);
    for _ in 0..num_axes {
        coord_values.push(Precision::COORD.from_fixed(reader.read_i16()? as i32));
    }

    let num_int_bits_for_scale = flags.num_int_bits_for_scale();
    let mut transform_values = Vec::new();
    for field in TransformField::ALL {
        if flags.contains(ComponentFlags::for_field(field)) {
            let precision = Precision::for_field(field, num_int_bits_for_scale);
            transform_values.push((field, precision.from_fixed(reader.read_i16()? as i32)));
        }
    }

    let transform_variations = flags.contains(ComponentFlags::HAVE_TRANSFORM_VARIATIONS);
    let num_var_idxs = axis_entries.iter().filter(|(_, _, v)| *v).count()
        + if transform_variations {
            transform_values.len()
        } else {
            0
        };
    let mut var_idxs = reader.read_var_idxs(format, num_var_idxs)?.into_iter();

    let mut coord = BTreeMap::new();
    for ((tag, _, has_var_idx), value) in axis_entries.into_iter().zip(coord_values) {
        let var_idx = if has_var_idx { var_idxs.next() } else { None };
        coord.insert(tag, ValueRecord::new(value, var_idx));
    }
    let mut transform = TransformRecord::default();
    for (field, value) in transform_values {
        let var_idx = if transform_variations {
            var_idxs.next()
        } else {
            None
        };
        transform.set(field, ValueRecord::new(value, var_idx));
    }

    Ok((
        ComponentRecord {
            coord,
            transform,
            num_int_bits_for_scale,
        },
        reader.pos,
    ))
}
