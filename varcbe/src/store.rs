//! Collects per-master values for the whole font into one variation store.
//!
//! Values are submitted glyph by glyph; the store is only built and
//! optimized once everything has been seen, which renumbers every index
//! handed out so far.

use std::collections::HashMap;

use log::{debug, trace};
use serde::{Serialize, Serializer};
use varcir::{coords::NormalizedLocation, types::Axes, variations::VariationModel};
use write_fonts::{
    dump_table,
    read::{tables::variations::ItemVariationStore, FontData, FontRead},
    tables::variations::ivs_builder::{VariationIndexRemapping, VariationStoreBuilder},
};

use crate::{error::Error, var_idx::VarIdx};

/// An index handed out before the store is optimized.
///
/// Cannot be written to the table, see [`VarIdxRemapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingVarIdx(u32);

/// Maps the ids handed out while building to their final indices.
#[derive(Debug, Default)]
pub struct VarIdxRemapping(VariationIndexRemapping);

impl VarIdxRemapping {
    pub fn get(&self, idx: PendingVarIdx) -> Result<VarIdx, Error> {
        self.0
            .get(idx.0)
            .map(VarIdx::from)
            .ok_or(Error::UnmappedVarIdx(idx.0))
    }
}

/// A compiled ItemVariationStore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarStoreData(Vec<u8>);

impl VarStoreData {
    /// Wrap bytes, checking they parse as a store
    pub fn new(bytes: Vec<u8>) -> Result<Self, Error> {
        ItemVariationStore::read(FontData::new(&bytes)).map_err(Error::InvalidVariationStore)?;
        Ok(VarStoreData(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn store(&self) -> Result<ItemVariationStore<'_>, Error> {
        ItemVariationStore::read(FontData::new(&self.0)).map_err(Error::InvalidVariationStore)
    }
}

/// Dumped as hex
impl Serialize for VarStoreData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hex: String = self.0.iter().map(|b| format!("{b:02x}")).collect();
        serializer.serialize_str(&hex)
    }
}

/// Builds a variation store one set of master values at a time.
pub struct OnlineStoreBuilder {
    axes: Axes,
    builder: VariationStoreBuilder,
    // one model per distinct list of master locations
    models: HashMap<Vec<NormalizedLocation>, VariationModel>,
    current: Option<Vec<NormalizedLocation>>,
}

impl OnlineStoreBuilder {
    pub fn new(axes: &Axes) -> Result<Self, Error> {
        let axis_count =
            u16::try_from(axes.len()).map_err(|_| Error::AxisIndexOverflow(axes.len()))?;
        Ok(OnlineStoreBuilder {
            axes: axes.clone(),
            builder: VariationStoreBuilder::new(axis_count),
            models: Default::default(),
            current: None,
        })
    }

    /// Use the model for these master locations for subsequent submissions.
    ///
    /// Values passed to [`Self::store_masters`] are parallel to `locations`.
    pub fn set_model(&mut self, locations: &[NormalizedLocation]) -> Result<(), Error> {
        if !self.models.contains_key(locations) {
            trace!("New model for {locations:?}");
            let model = VariationModel::new(locations, self.axes.axis_order())?;
            self.models.insert(locations.to_vec(), model);
        }
        self.current = Some(locations.to_vec());
        Ok(())
    }

    /// Submit one fixed point value per master.
    ///
    /// Returns the value the store treats as the default and the id of the deltas.
    pub fn store_masters(&mut self, values: &[i32]) -> Result<(i32, PendingVarIdx), Error> {
        let model = self
            .current
            .as_ref()
            .and_then(|key| self.models.get(key))
            .ok_or(Error::NoModel)?;
        if values.len() != model.num_locations() {
            return Err(Error::WrongNumberOfMasters {
                expected: model.num_locations(),
                actual: values.len(),
            });
        }
        let values: Vec<f64> = values.iter().map(|v| *v as f64).collect();
        let mut base = 0;
        let mut deltas = Vec::with_capacity(values.len());
        for (region, delta) in model.deltas(&values)? {
            if region.is_default() {
                base = delta as i32;
            } else {
                deltas.push((region.to_write_fonts_region(&self.axes), delta as i32));
            }
        }
        let id = self.builder.add_deltas(deltas);
        Ok((base, PendingVarIdx(id)))
    }

    /// Optimize and serialize the store.
    ///
    /// If nothing was submitted there is no store.
    pub fn finish(self) -> Result<(Option<VarStoreData>, VarIdxRemapping), Error> {
        if self.builder.is_empty() {
            return Ok((None, VarIdxRemapping::default()));
        }
        let (store, remapping) = self.builder.build();
        let bytes = dump_table(&store).map_err(|e| Error::DumpTableError {
            context: "ItemVariationStore".to_string(),
            message: format!("{e:?}"),
        })?;
        debug!(
            "Variation store of {} bytes for {} models",
            bytes.len(),
            self.models.len()
        );
        Ok((Some(VarStoreData::new(bytes)?), VarIdxRemapping(remapping)))
    }
}
