//! Evaluates component records at a location, the way a renderer would.

use std::collections::BTreeMap;

use varcir::{coords::NormalizedLocation, ir::Transform, types::Axes};
use write_fonts::{
    read::tables::variations::{DeltaSetIndex, ItemVariationStore},
    types::{F2Dot14, Tag},
};

use crate::{
    error::Error,
    fixed::Precision,
    records::{ComponentRecord, ValueRecord},
    var_idx::VarIdx,
    varc::Varc,
};

/// A component with every variation applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    /// Normalized position on the base glyph's axes
    pub location: BTreeMap<Tag, f64>,
    pub transform: Transform,
}

pub struct VarcInstancer<'a> {
    varc: &'a Varc,
    store: Option<ItemVariationStore<'a>>,
    coords: Vec<F2Dot14>,
}

impl<'a> VarcInstancer<'a> {
    pub fn new(
        varc: &'a Varc,
        axes: &Axes,
        location: &NormalizedLocation,
    ) -> Result<Self, Error> {
        let store = varc
            .var_store
            .as_ref()
            .map(|store| store.store())
            .transpose()?;
        Ok(VarcInstancer {
            varc,
            store,
            coords: location.to_f2dot14_coords(axes),
        })
    }

    /// The delta stored at `var_idx` for our location, as a fixed point value.
    pub fn delta(&self, var_idx: VarIdx) -> Result<i32, Error> {
        let store = self
            .store
            .as_ref()
            .ok_or(Error::NoVariationStore(var_idx))?;
        store
            .compute_delta(
                DeltaSetIndex {
                    outer: var_idx.outer(),
                    inner: var_idx.inner(),
                },
                &self.coords,
            )
            .map_err(Error::read(format!("delta set {var_idx}")))
    }

    fn value(&self, value: &ValueRecord<VarIdx>, precision: Precision) -> Result<f64, Error> {
        let delta = match value.var_idx {
            Some(var_idx) => precision.from_fixed(self.delta(var_idx)?),
            None => 0.0,
        };
        Ok(value.value + delta)
    }

    pub fn instantiate(
        &self,
        record: &ComponentRecord<VarIdx>,
    ) -> Result<ComponentInstance, Error> {
        let location: BTreeMap<Tag, f64> = record
            .coord
            .iter()
            .map(|(tag, value)| Ok((*tag, self.value(value, Precision::COORD)?)))
            .collect::<Result<_, Error>>()?;
        let mut transform = Transform::default();
        for (field, value) in record.transform.iter() {
            let precision = Precision::for_field(field, record.num_int_bits_for_scale);
            transform.set(field, self.value(value, precision)?);
        }
        Ok(ComponentInstance {
            location,
            transform,
        })
    }

    /// The components of a glyph, if it has variable components
    pub fn glyph(&self, name: &str) -> Result<Option<Vec<ComponentInstance>>, Error> {
        self.varc
            .glyph_data
            .get(name)
            .map(|records| {
                records
                    .iter()
                    .map(|r| self.instantiate(r))
                    .collect::<Result<Vec<_>, Error>>()
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use varcir::{ir::TransformField, types::Axis};

    use super::*;

    #[test]
    fn constant_values_need_no_store() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let mut record = ComponentRecord::default();
        record
            .coord
            .insert(Tag::new(b"wght"), ValueRecord::fixed(0.75));
        record
            .transform
            .set(TransformField::SkewY, ValueRecord::fixed(-15.0));
        let varc = Varc::default();
        let instancer =
            VarcInstancer::new(&varc, &axes, &NormalizedLocation::for_pos(&[("wght", 1.0)]))
                .unwrap();
        let instance = instancer.instantiate(&record).unwrap();
        assert_eq!(Some(&0.75), instance.location.get(&Tag::new(b"wght")));
        assert_eq!(-15.0, instance.transform.skew_y);
        assert_eq!(1.0, instance.transform.scale_x);
        assert_eq!(None, instancer.glyph("A").unwrap());
    }

    #[test]
    fn variation_without_store() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let mut record = ComponentRecord::default();
        record.coord.insert(
            Tag::new(b"wght"),
            ValueRecord::new(0.0, Some(VarIdx::new(0, 0))),
        );
        let varc = Varc::default();
        let instancer = VarcInstancer::new(&varc, &axes, &NormalizedLocation::new()).unwrap();
        assert!(matches!(
            instancer.instantiate(&record),
            Err(Error::NoVariationStore(..))
        ));
    }
}
