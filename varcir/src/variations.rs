//! Turns per-master values into deltas over regions of variation space.
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{Debug, Display},
};

use log::{log_enabled, trace};
use ordered_float::OrderedFloat;
use thiserror::Error;
use write_fonts::{
    tables::variations::RegionAxisCoordinates,
    types::{F2Dot14, Tag},
};

use crate::{
    coords::{NormalizedCoord, NormalizedLocation},
    types::Axes,
};

const ZERO: OrderedFloat<f64> = OrderedFloat(0.0);
const ONE: OrderedFloat<f64> = OrderedFloat(1.0);

#[derive(Debug, Error)]
pub enum VariationModelError {
    #[error("No master is at the default location")]
    NoDefault,
    #[error("More than one master is at {0:?}")]
    DuplicateLocation(NormalizedLocation),
}

#[derive(Debug, Error, PartialEq)]
pub enum DeltaError {
    #[error("Expected a value for each of {expected} masters, got {actual}")]
    WrongNumberOfValues { expected: usize, actual: usize },
}

/// A model of how variation space is subdivided into regions to create deltas.
///
/// Given the master locations of one glyph, in the order the caller knows them,
/// works out the region each master covers and how much every earlier master
/// contributes at its location.
///
/// Follows `class VariationModel` in fontTools.varLib.models.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationModel {
    axis_order: Vec<Tag>,

    // Sorted such that [i] is only influenced by [..i]
    locations: Vec<NormalizedLocation>,
    // [i] is the caller's index of locations[i]
    master_order: Vec<usize>,
    influence: Vec<VariationRegion>,
    // [i] gives (model index, weight) for every earlier master active at locations[i]
    delta_weights: Vec<Vec<(usize, OrderedFloat<f64>)>>,
}

impl VariationModel {
    /// Create a model for the given master locations.
    ///
    /// Axes not in `axis_order` are ignored, axes missing from a location are at 0.
    /// Exactly one location must be the default.
    pub fn new(
        locations: &[NormalizedLocation],
        axis_order: Vec<Tag>,
    ) -> Result<Self, VariationModelError> {
        let mut expanded: Vec<(usize, NormalizedLocation)> = Vec::with_capacity(locations.len());
        for (idx, location) in locations.iter().enumerate() {
            let mut location = location.clone();
            location.retain(|tag, _| axis_order.contains(tag));
            for tag in axis_order.iter() {
                if !location.contains(*tag) {
                    location.insert(*tag, NormalizedCoord::new(0.0));
                }
            }
            if expanded.iter().any(|(_, seen)| *seen == location) {
                return Err(VariationModelError::DuplicateLocation(location));
            }
            expanded.push((idx, location));
        }

        let sorting_hat = LocationSortingHat::new(
            &expanded.iter().map(|(_, l)| l.clone()).collect::<Vec<_>>(),
            &axis_order,
        );
        expanded.sort_by_cached_key(|(_, loc)| sorting_hat.key_for(loc));

        if !expanded
            .first()
            .map(|(_, loc)| loc.is_default())
            .unwrap_or_default()
        {
            return Err(VariationModelError::NoDefault);
        }

        let (master_order, locations): (Vec<_>, Vec<_>) = expanded.into_iter().unzip();
        let regions = regions_for(&axis_order, &locations);
        let influence = master_influence(&axis_order, &regions);
        let delta_weights = delta_weights(&locations, &influence);

        if log_enabled!(log::Level::Trace) {
            trace!("Model for {} masters", locations.len());
            for (loc, region) in locations.iter().zip(influence.iter()) {
                trace!("  {loc:?} {region:?}");
            }
        }

        Ok(VariationModel {
            axis_order,
            locations,
            master_order,
            influence,
            delta_weights,
        })
    }

    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    /// Master locations in model order, default first
    pub fn locations(&self) -> impl Iterator<Item = &NormalizedLocation> {
        self.locations.iter()
    }

    pub fn axis_order(&self) -> &[Tag] {
        &self.axis_order
    }

    /// Convert values at each master into a delta per region.
    ///
    /// `values` is parallel to the locations the model was built from. The
    /// result is in model order and starts with the default region, whose
    /// delta is the default value. Deltas are rounded half to even as they
    /// are computed, so that rounding error does not compound where masters
    /// overlap (this matches fontTools).
    pub fn deltas(&self, values: &[f64]) -> Result<Vec<(VariationRegion, f64)>, DeltaError> {
        if values.len() != self.locations.len() {
            return Err(DeltaError::WrongNumberOfValues {
                expected: self.locations.len(),
                actual: values.len(),
            });
        }

        let mut result: Vec<(VariationRegion, f64)> = Vec::with_capacity(values.len());
        for (model_idx, region) in self.influence.iter().enumerate() {
            let value = values[self.master_order[model_idx]];
            // Earlier masters are resolved already; what they don't account for is our delta
            let delta = self.delta_weights[model_idx]
                .iter()
                .fold(value, |acc, (prev_idx, weight)| {
                    acc - result[*prev_idx].1 * weight.into_inner()
                });
            result.push((region.clone(), delta.round_ties_even()));
        }
        Ok(result)
    }

    /// Recompute a value at a location from deltas produced by [`Self::deltas`].
    pub fn interpolate_from_deltas(
        location: &NormalizedLocation,
        deltas: &[(VariationRegion, f64)],
    ) -> f64 {
        deltas
            .iter()
            .map(|(region, delta)| region.scalar_at(location).into_inner() * delta)
            .sum()
    }
}

/// Sorts locations, and thus regions, from most to least influential.
///
/// The default comes first, then masters on a single axis, then everything
/// else. Further keys break ties deterministically.
///
/// Follows getMasterLocationsSortKeyFunc in fontTools.varLib.models.
struct LocationSortingHat<'a> {
    axis_order: &'a [Tag],
    on_axis_points: HashMap<Tag, HashSet<NormalizedCoord>>,
}

impl<'a> LocationSortingHat<'a> {
    fn new(locations: &[NormalizedLocation], axis_order: &'a [Tag]) -> LocationSortingHat<'a> {
        let mut on_axis_points: HashMap<Tag, HashSet<NormalizedCoord>> = HashMap::new();
        for location in locations {
            let mut non_zero = location.iter().filter(|(_, pos)| pos.into_inner() != ZERO);
            if let (Some((tag, pos)), None) = (non_zero.next(), non_zero.next()) {
                on_axis_points.entry(*tag).or_default().insert(*pos);
            }
        }
        LocationSortingHat {
            axis_order,
            on_axis_points,
        }
    }

    fn key_for(&self, location: &NormalizedLocation) -> LocationSortKey {
        let ordered_axes: Vec<Tag> = self
            .axis_order
            .iter()
            .filter(|tag| location.has_non_zero(**tag))
            .copied()
            .collect();
        let known_axes = self
            .axis_order
            .iter()
            .enumerate()
            .filter(|(_, tag)| location.has_non_zero(**tag))
            .map(|(idx, _)| idx)
            .collect();

        let rank = ordered_axes.len();
        let on_axis_points = location
            .iter()
            .filter(|(tag, pos)| {
                self.on_axis_points
                    .get(*tag)
                    .map(|points| points.contains(*pos))
                    .unwrap_or_default()
            })
            .count() as i16;

        let axis_value_signs = ordered_axes
            .iter()
            .map(|tag| match location.get(*tag).unwrap_or_default().into_inner().cmp(&ZERO) {
                Ordering::Greater => 1_i8,
                Ordering::Less => -1_i8,
                Ordering::Equal => 0_i8,
            })
            .collect();
        let axis_value_abs = ordered_axes
            .iter()
            .map(|tag| OrderedFloat(location.get(*tag).unwrap_or_default().to_f64().abs()))
            .collect();

        let key = LocationSortKey {
            rank,
            on_axis_points: -on_axis_points,
            known_axes,
            ordered_axes,
            axis_value_signs,
            axis_value_abs,
        };
        trace!("key for {location:?} is {key:?}");
        key
    }
}

/// Sort key for a location; only axes with a non-zero position matter.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct LocationSortKey {
    // number of non-zero axes
    rank: usize,
    // -1 for each position shared with a master that lies on that axis alone
    on_axis_points: i16,
    // index of each non-zero axis in axis order
    known_axes: Vec<usize>,
    ordered_axes: Vec<Tag>,
    axis_value_signs: Vec<i8>,
    axis_value_abs: Vec<OrderedFloat<f64>>,
}

/// A chunk of variation space characterized by a set of per-axis tents.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct VariationRegion {
    axis_tents: BTreeMap<Tag, Tent>,
    active_axes: HashSet<Tag>,
}

impl VariationRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scalar multiplier for this region at the provided location.
    ///
    /// Follows supportScalar in fontTools.varLib.models, without extrapolation.
    pub fn scalar_at(&self, location: &NormalizedLocation) -> OrderedFloat<f64> {
        self.axis_tents
            .iter()
            .filter(|(_, tent)| tent.validate())
            .fold(ONE, |scalar, (tag, tent)| {
                if scalar == ZERO {
                    return ZERO;
                }
                let v = location.get(*tag).unwrap_or_default().into_inner();
                let (min, peak, max) = (
                    tent.min.into_inner(),
                    tent.peak.into_inner(),
                    tent.max.into_inner(),
                );

                // at the peak, or a tent that is zero everywhere, is full influence
                if v == peak || peak == ZERO {
                    return scalar;
                }
                if v <= min || max <= v {
                    return ZERO;
                }
                let edge = if v < peak { min } else { max };
                scalar * (v - edge) / (peak - edge)
            })
    }

    pub fn insert(&mut self, tag: Tag, tent: Tent) {
        if tent.has_non_zero() {
            self.active_axes.insert(tag);
        } else {
            self.active_axes.remove(&tag);
        }
        self.axis_tents.insert(tag, tent);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Tent)> {
        self.axis_tents.iter()
    }

    pub fn get(&self, tag: Tag) -> Option<&Tent> {
        self.axis_tents.get(&tag)
    }

    /// True for the region that applies everywhere
    pub fn is_default(&self) -> bool {
        self.active_axes.is_empty()
    }

    /// Convert to a write-fonts region with one tent per font axis, in font order.
    ///
    /// Axes the region doesn't mention do not participate (all zero).
    pub fn to_write_fonts_region(
        &self,
        axes: &Axes,
    ) -> write_fonts::tables::variations::VariationRegion {
        let zeroes = Tent::zeroes();
        let region_axes = axes
            .iter()
            .map(|axis| self.get(axis.tag).unwrap_or(&zeroes).to_region_axis_coords())
            .collect();
        write_fonts::tables::variations::VariationRegion { region_axes }
    }
}

/// The min/peak/max of a master's influence along one axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tent {
    pub min: NormalizedCoord,
    pub peak: NormalizedCoord,
    pub max: NormalizedCoord,
}

impl Tent {
    /// A tent never straddles zero; the side away from the peak is pinned to 0.
    pub fn new(mut min: NormalizedCoord, peak: NormalizedCoord, mut max: NormalizedCoord) -> Self {
        let zero = NormalizedCoord::new(0.0);
        if peak > zero {
            min = zero;
        } else {
            max = zero;
        }
        Tent { min, peak, max }
    }

    pub fn zeroes() -> Tent {
        let zero = NormalizedCoord::new(0.0);
        Tent::new(zero, zero, zero)
    }

    // whether the tent can have any influence under OpenType rules
    fn validate(&self) -> bool {
        let (min, peak, max) = (
            self.min.into_inner(),
            self.peak.into_inner(),
            self.max.into_inner(),
        );
        !(min > peak || peak > max || (min < ZERO && max > ZERO))
    }

    pub fn has_non_zero(&self) -> bool {
        *self != Tent::zeroes()
    }

    pub fn to_region_axis_coords(&self) -> RegionAxisCoordinates {
        RegionAxisCoordinates {
            start_coord: F2Dot14::from(self.min),
            peak_coord: F2Dot14::from(self.peak),
            end_coord: F2Dot14::from(self.max),
        }
    }
}

impl Debug for Tent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Tent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tent {{{}, {}, {}}}",
            self.min.to_f64(),
            self.peak.to_f64(),
            self.max.to_f64()
        )
    }
}

impl From<(f64, f64, f64)> for Tent {
    fn from(value: (f64, f64, f64)) -> Self {
        Tent::new(
            NormalizedCoord::new(value.0),
            NormalizedCoord::new(value.1),
            NormalizedCoord::new(value.2),
        )
    }
}

/// One region per location, reaching out to the furthest master on each axis.
///
/// VariationModel._locationsToRegions in fontTools.
fn regions_for(axis_order: &[Tag], locations: &[NormalizedLocation]) -> Vec<VariationRegion> {
    let mut minmax = HashMap::<Tag, (NormalizedCoord, NormalizedCoord)>::new();
    for (tag, value) in locations.iter().flat_map(|loc| loc.iter()) {
        let (min, max) = minmax.entry(*tag).or_default();
        *min = (*min).min(*value);
        *max = (*max).max(*value);
    }

    locations
        .iter()
        .map(|location| {
            let mut region = VariationRegion::new();
            for tag in axis_order {
                let value = location.get(*tag).unwrap_or_default();
                let (min, max) = if value.into_inner() == ZERO {
                    Default::default()
                } else {
                    minmax.get(tag).copied().unwrap_or_default()
                };
                region.insert(*tag, Tent::new(min, value, max));
            }
            region
        })
        .collect()
}

/// Shrink each region so it doesn't overlap earlier regions on the same axes.
///
/// The regions must be in model order. VariationModel._computeMasterSupports in fontTools.
fn master_influence(axis_order: &[Tag], regions: &[VariationRegion]) -> Vec<VariationRegion> {
    let mut influence: Vec<VariationRegion> = Vec::with_capacity(regions.len());
    for region in regions.iter() {
        let mut region = region.clone();
        // compare against the already-shrunk earlier regions, fontTools mutates in place
        for prev in influence.iter() {
            if region.active_axes != prev.active_axes {
                continue;
            }
            let overlaps = region.iter().all(|(tag, tent)| {
                let prev_peak = prev.get(*tag).copied().unwrap_or_else(Tent::zeroes).peak;
                prev_peak == tent.peak || (tent.min < prev_peak && prev_peak < tent.max)
            });
            if !overlaps {
                continue;
            }

            // cut along the axis (or axes, on a tie) with the largest range ratio
            let mut cuts: Vec<(Tag, Tent)> = Vec::new();
            let mut best_ratio = OrderedFloat(-1.0);
            for tag in axis_order.iter().filter(|t| region.active_axes.contains(*t)) {
                let Some(prev_tent) = prev.get(*tag) else {
                    continue;
                };
                let prev_peak = prev_tent.peak;
                let Some(mut tent) = region.get(*tag).copied() else {
                    continue;
                };
                let ratio = match prev_peak.cmp(&tent.peak) {
                    Ordering::Less => {
                        let ratio = (prev_peak - tent.peak).into_inner()
                            / (tent.min - tent.peak).into_inner();
                        tent.min = prev_peak;
                        ratio
                    }
                    Ordering::Greater => {
                        let ratio = (prev_peak - tent.peak).into_inner()
                            / (tent.max - tent.peak).into_inner();
                        tent.max = prev_peak;
                        ratio
                    }
                    Ordering::Equal => continue,
                };
                if ratio > best_ratio {
                    cuts.clear();
                    best_ratio = ratio;
                }
                if ratio == best_ratio {
                    cuts.push((*tag, tent));
                }
            }
            for (tag, tent) in cuts {
                region.insert(tag, tent);
            }
        }
        influence.push(region);
    }
    influence
}

/// For each location, the weight of every earlier master active there.
///
/// VariationModel._computeDeltaWeights in fontTools.
fn delta_weights(
    locations: &[NormalizedLocation],
    influence: &[VariationRegion],
) -> Vec<Vec<(usize, OrderedFloat<f64>)>> {
    locations
        .iter()
        .enumerate()
        .map(|(loc_idx, location)| {
            let weights: Vec<_> = influence[..loc_idx]
                .iter()
                .enumerate()
                .filter_map(|(idx, region)| {
                    let scalar = region.scalar_at(location);
                    (scalar != ZERO).then_some((idx, scalar))
                })
                .collect();
            trace!("  weights at {location:?}: {weights:?}");
            weights
        })
        .collect()
}
