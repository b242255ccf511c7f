//! In-memory form of compiled component records.
//!
//! Records are generic over the variation index type: they are built holding
//! the temporary ids handed out by the store builder and can only be
//! serialized once those have been remapped to final [`VarIdx`] values.

use std::collections::BTreeMap;

use serde::{ser::SerializeMap, Serialize, Serializer};
use varcir::ir::TransformField;
use write_fonts::types::Tag;

use crate::{error::Error, store::PendingVarIdx, store::VarIdxRemapping, var_idx::VarIdx};

/// A default-master value and, if it varies, where its deltas live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRecord<I> {
    pub value: f64,
    pub var_idx: Option<I>,
}

impl<I> ValueRecord<I> {
    pub fn new(value: f64, var_idx: Option<I>) -> Self {
        ValueRecord { value, var_idx }
    }

    pub fn fixed(value: f64) -> Self {
        ValueRecord {
            value,
            var_idx: None,
        }
    }

    fn try_map<J>(self, f: impl FnOnce(I) -> Result<J, Error>) -> Result<ValueRecord<J>, Error> {
        Ok(ValueRecord {
            value: self.value,
            var_idx: self.var_idx.map(f).transpose()?,
        })
    }
}

/// The transform fields present in a record, indexed by [`TransformField::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord<I>([Option<ValueRecord<I>>; 7]);

impl<I> Default for TransformRecord<I> {
    fn default() -> Self {
        TransformRecord([None, None, None, None, None, None, None])
    }
}

impl<I> TransformRecord<I> {
    pub fn get(&self, field: TransformField) -> Option<&ValueRecord<I>> {
        self.0[field.index()].as_ref()
    }

    pub fn set(&mut self, field: TransformField, value: ValueRecord<I>) {
        self.0[field.index()] = Some(value);
    }

    /// Present fields, in storage order
    pub fn iter(&self) -> impl Iterator<Item = (TransformField, &ValueRecord<I>)> {
        TransformField::ALL
            .iter()
            .zip(self.0.iter())
            .filter_map(|(field, value)| value.as_ref().map(|v| (*field, v)))
    }

    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// True if any present field refers to the variation store
    pub fn has_variations(&self) -> bool {
        self.0.iter().flatten().any(|v| v.var_idx.is_some())
    }
}

impl<I: Serialize> Serialize for TransformRecord<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.name(), value)?;
        }
        map.end()
    }
}

fn serialize_coord<I: Serialize, S: Serializer>(
    coord: &BTreeMap<Tag, ValueRecord<I>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(coord.iter().map(|(tag, value)| (tag.to_string(), value)))
}

/// One variable component of a glyph.
///
/// Only fields that differ from their default or vary across masters are
/// present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRecord<I> {
    /// Positions on the base glyph's axes
    #[serde(serialize_with = "serialize_coord")]
    pub coord: BTreeMap<Tag, ValueRecord<I>>,
    pub transform: TransformRecord<I>,
    pub num_int_bits_for_scale: u8,
}

impl<I> Default for ComponentRecord<I> {
    fn default() -> Self {
        ComponentRecord {
            coord: Default::default(),
            transform: Default::default(),
            num_int_bits_for_scale: 0,
        }
    }
}

impl<I> ComponentRecord<I> {
    /// No coordinates and an identity transform
    pub fn is_empty(&self) -> bool {
        self.coord.is_empty() && self.transform.is_empty()
    }
}

impl ComponentRecord<PendingVarIdx> {
    /// Swap every temporary id for its final index.
    pub fn remap(self, remapping: &VarIdxRemapping) -> Result<ComponentRecord<VarIdx>, Error> {
        let coord = self
            .coord
            .into_iter()
            .map(|(tag, value)| Ok((tag, value.try_map(|idx| remapping.get(idx))?)))
            .collect::<Result<_, Error>>()?;
        let mut transform = TransformRecord::default();
        for (slot, value) in transform.0.iter_mut().zip(self.transform.0) {
            *slot = value.map(|v| v.try_map(|idx| remapping.get(idx))).transpose()?;
        }
        Ok(ComponentRecord {
            coord,
            transform,
            num_int_bits_for_scale: self.num_int_bits_for_scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_iterates_in_storage_order() {
        let mut transform = TransformRecord::<VarIdx>::default();
        transform.set(TransformField::TCenterX, ValueRecord::fixed(10.0));
        transform.set(TransformField::Rotation, ValueRecord::fixed(45.0));
        assert_eq!(
            vec![TransformField::Rotation, TransformField::TCenterX],
            transform.iter().map(|(f, _)| f).collect::<Vec<_>>()
        );
        assert_eq!(2, transform.len());
        assert!(!transform.has_variations());
    }

    #[test]
    fn empty_component() {
        let mut record = ComponentRecord::<VarIdx>::default();
        assert!(record.is_empty());
        record
            .coord
            .insert(Tag::new(b"wght"), ValueRecord::fixed(0.5));
        assert!(!record.is_empty());
    }
}
