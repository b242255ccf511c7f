//! Turns per-master component sources into component records.
//!
//! A field only makes it into the record if it is not at its default
//! everywhere. Fields that vary are submitted to the store builder, which
//! must already hold the model for the glyph's master locations.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use varcir::{
    ir::{ComponentSource, TransformField},
    types::GlyphName,
};
use write_fonts::types::Tag;

use crate::{
    error::Error,
    fixed::{num_int_bits_for_scale, to_i16, Precision},
    records::{ComponentRecord, TransformRecord, ValueRecord},
    store::{OnlineStoreBuilder, PendingVarIdx},
};

/// Build the record for one component from its sources, default master first.
pub fn build_component_record(
    glyph: &GlyphName,
    masters: &[&ComponentSource],
    store: &mut OnlineStoreBuilder,
) -> Result<ComponentRecord<PendingVarIdx>, Error> {
    if masters.is_empty() {
        return Ok(ComponentRecord::default());
    }
    let num_int_bits_for_scale = scale_bits(glyph, masters)?;
    let coord = build_coords(glyph, masters, store)?;
    let transform = build_transform(glyph, masters, num_int_bits_for_scale, store)?;
    Ok(ComponentRecord {
        coord,
        transform,
        num_int_bits_for_scale,
    })
}

fn scale_bits(glyph: &GlyphName, masters: &[&ComponentSource]) -> Result<u8, Error> {
    let (min, max) = masters
        .iter()
        .flat_map(|m| [m.transform.scale_x, m.transform.scale_y])
        .fold((0.0_f64, 0.0_f64), |(min, max), v| (min.min(v), max.max(v)));
    num_int_bits_for_scale(min, max).ok_or_else(|| Error::ScaleOutOfRange {
        glyph: glyph.clone(),
        min,
        max,
    })
}

fn all_equal<T: PartialEq>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] == pair[1])
}

/// Convert every master value, failing if any of them overflows.
fn fixed_values(
    glyph: &GlyphName,
    field: impl Fn() -> String,
    precision: Precision,
    values: &[f64],
) -> Result<Vec<i32>, Error> {
    values
        .iter()
        .map(|v| {
            let fixed = precision.to_fixed(*v);
            to_i16(fixed).ok_or_else(|| Error::FixedOverflow {
                glyph: glyph.clone(),
                field: field(),
                value: *v,
            })?;
            Ok(fixed)
        })
        .collect()
}

/// Submit to the store and make sure it agrees on the default.
fn store_variation(
    store: &mut OnlineStoreBuilder,
    fixed: &[i32],
) -> Result<PendingVarIdx, Error> {
    let (base, var_idx) = store.store_masters(fixed)?;
    if base != fixed[0] {
        return Err(Error::BaseMismatch {
            expected: fixed[0],
            actual: base,
        });
    }
    Ok(var_idx)
}

fn build_coords(
    glyph: &GlyphName,
    masters: &[&ComponentSource],
    store: &mut OnlineStoreBuilder,
) -> Result<BTreeMap<Tag, ValueRecord<PendingVarIdx>>, Error> {
    let tags: BTreeSet<Tag> = masters.iter().flat_map(|m| m.coord.keys().copied()).collect();
    let mut coord = BTreeMap::new();
    for tag in tags {
        let values: Vec<f64> = masters
            .iter()
            .map(|m| m.coord.get(&tag).copied().unwrap_or_default())
            .collect();
        if all_equal(&values) && values[0] == 0.0 {
            continue;
        }
        let fixed = fixed_values(glyph, || format!("coordinate {tag}"), Precision::COORD, &values)?;
        let record = if all_equal(&fixed) {
            ValueRecord::fixed(values[0])
        } else {
            ValueRecord::new(values[0], Some(store_variation(store, &fixed)?))
        };
        trace!("{glyph} coordinate {tag} {record:?}");
        coord.insert(tag, record);
    }
    Ok(coord)
}

fn build_transform(
    glyph: &GlyphName,
    masters: &[&ComponentSource],
    num_int_bits_for_scale: u8,
    store: &mut OnlineStoreBuilder,
) -> Result<TransformRecord<PendingVarIdx>, Error> {
    let kept: Vec<(TransformField, Vec<f64>)> = TransformField::ALL
        .into_iter()
        .map(|field| {
            let values: Vec<f64> = masters.iter().map(|m| m.transform.get(field)).collect();
            (field, values)
        })
        .filter(|(field, values)| !(all_equal(values) && values[0] == field.default_value()))
        .collect();

    // one flag covers every transform field, so either all of them vary or none do
    let has_variations = kept.iter().any(|(_, values)| !all_equal(values));

    let mut transform = TransformRecord::default();
    for (field, values) in kept {
        let precision = Precision::for_field(field, num_int_bits_for_scale);
        let fixed = fixed_values(glyph, || field.to_string(), precision, &values)?;
        let var_idx = if has_variations {
            Some(store_variation(store, &fixed)?)
        } else {
            None
        };
        let record = ValueRecord::new(values[0], var_idx);
        trace!("{glyph} {field} {record:?}");
        transform.set(field, record);
    }
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use varcir::{
        coords::NormalizedLocation,
        types::{Axes, Axis},
    };

    use super::*;
    use crate::error::ErrorKind;

    fn wght_store() -> OnlineStoreBuilder {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let mut store = OnlineStoreBuilder::new(&axes).unwrap();
        store
            .set_model(&[
                NormalizedLocation::new(),
                NormalizedLocation::for_pos(&[("wght", 1.0)]),
            ])
            .unwrap();
        store
    }

    fn dot(wght: f64) -> ComponentSource {
        let mut component = ComponentSource::new("dot");
        component.coord.insert(Tag::new(b"wght"), wght);
        component
    }

    fn build(masters: &[ComponentSource]) -> Result<ComponentRecord<PendingVarIdx>, Error> {
        let masters: Vec<_> = masters.iter().collect();
        build_component_record(&"A".into(), &masters, &mut wght_store())
    }

    #[test]
    fn weight_and_scale_vary() {
        let neutral = dot(0.0);
        let mut bold = dot(1.0);
        bold.transform.scale_x = 1.5;
        let record = build(&[neutral, bold]).unwrap();

        let wght = record.coord.get(&Tag::new(b"wght")).unwrap();
        assert_eq!(0.0, wght.value);
        assert!(wght.var_idx.is_some());

        let scale_x = record.transform.get(TransformField::ScaleX).unwrap();
        assert_eq!(1.0, scale_x.value);
        assert!(scale_x.var_idx.is_some());
        assert_eq!(1, record.transform.len());
        assert_eq!(2, record.num_int_bits_for_scale);
    }

    #[test]
    fn defaults_are_omitted() {
        let record = build(&[dot(0.0), dot(0.0)]).unwrap();
        assert!(record.is_empty(), "{record:?}");
    }

    #[test]
    fn constant_non_default_has_no_var_idx() {
        let mut neutral = dot(0.5);
        neutral.transform.rotation = 30.0;
        let mut bold = dot(0.5);
        bold.transform.rotation = 30.0;
        let record = build(&[neutral, bold]).unwrap();
        assert_eq!(
            Some(&ValueRecord::fixed(0.5)),
            record.coord.get(&Tag::new(b"wght"))
        );
        assert_eq!(
            Some(&ValueRecord::fixed(30.0)),
            record.transform.get(TransformField::Rotation)
        );
    }

    #[test]
    fn quantization_erases_coordinate_variation() {
        // both round to 2048 at 12 bits
        let record = build(&[dot(0.5), dot(0.50001)]).unwrap();
        assert_eq!(
            Some(&ValueRecord::fixed(0.5)),
            record.coord.get(&Tag::new(b"wght"))
        );
    }

    #[test]
    fn coordinate_missing_in_a_master_is_zero() {
        let neutral = ComponentSource::new("dot");
        let bold = dot(1.0);
        let record = build(&[neutral, bold]).unwrap();
        let wght = record.coord.get(&Tag::new(b"wght")).unwrap();
        assert_eq!(0.0, wght.value);
        assert!(wght.var_idx.is_some());
    }

    #[test]
    fn one_varying_transform_field_varies_all() {
        let mut neutral = dot(0.0);
        neutral.transform.t_center_x = 50.0;
        neutral.transform.rotation = 10.0;
        let mut bold = neutral.clone();
        bold.transform.rotation = 20.0;
        let record = build(&[neutral, bold]).unwrap();
        assert!(record.coord.is_empty());
        let center = record.transform.get(TransformField::TCenterX).unwrap();
        assert_eq!(50.0, center.value);
        assert!(center.var_idx.is_some());
        assert!(record
            .transform
            .iter()
            .all(|(_, value)| value.var_idx.is_some()));
    }

    #[test]
    fn scale_that_does_not_fit() {
        let mut neutral = dot(0.0);
        neutral.transform.scale_y = 200.0;
        let err = build(&[neutral.clone(), neutral]).unwrap_err();
        assert!(matches!(err, Error::ScaleOutOfRange { .. }), "{err:?}");
        assert_eq!(ErrorKind::Range, err.kind());
    }

    #[test]
    fn coordinate_that_does_not_fit() {
        let err = build(&[dot(8.0), dot(8.0)]).unwrap_err();
        assert!(
            matches!(&err, Error::FixedOverflow { field, .. } if field == "coordinate wght"),
            "{err:?}"
        );
    }

    #[test]
    fn center_that_does_not_fit() {
        let mut neutral = dot(0.0);
        neutral.transform.t_center_y = 40000.0;
        let err = build(&[neutral.clone(), neutral]).unwrap_err();
        assert!(
            matches!(&err, Error::FixedOverflow { field, .. } if field == "tCenterY"),
            "{err:?}"
        );
    }
}
