//! Coordinates and locations, typed by the space they live in.
//!
//! Mixing up user and normalized values is an easy mistake to make; the
//! space is part of the type so the compiler catches it.

use std::{
    collections::BTreeMap,
    fmt::{Debug, Write},
    marker::PhantomData,
    ops::Sub,
};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use write_fonts::types::{F2Dot14, Tag};

use crate::{error::Error, types::Axes};

/// A coordinate space that may be visible to the end user.
///
/// For instance a weight value in CSS is expressed in user coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserSpace;

/// A space containing only values in the range `-1..=1`.
///
/// The default value is always at `0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedSpace;

/// A coordinate in some coordinate space.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord<Space> {
    coord: OrderedFloat<f64>,
    // covariant, Send + Sync
    space: PhantomData<fn() -> Space>,
}

/// A coordinate in user space
pub type UserCoord = Coord<UserSpace>;
/// A coordinate in normalized space
pub type NormalizedCoord = Coord<NormalizedSpace>;

// derive would require Space: Clone/Copy
impl<Space> Clone for Coord<Space> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Space> Copy for Coord<Space> {}

impl<Space> Coord<Space> {
    /// Create a new coordinate.
    ///
    /// Note that we do *not* impl From because we want conversion to be explicit.
    pub fn new(value: impl Into<OrderedFloat<f64>>) -> Self {
        Coord {
            coord: value.into(),
            space: PhantomData,
        }
    }

    pub fn into_inner(self) -> OrderedFloat<f64> {
        self.coord
    }

    pub fn to_f64(&self) -> f64 {
        self.coord.into_inner()
    }
}

impl<Space> Sub<Coord<Space>> for Coord<Space> {
    type Output = Coord<Space>;

    fn sub(self, rhs: Coord<Space>) -> Self::Output {
        Coord::new(self.to_f64() - rhs.to_f64())
    }
}

impl From<NormalizedCoord> for F2Dot14 {
    fn from(value: NormalizedCoord) -> Self {
        F2Dot14::from_f32(value.to_f64() as f32)
    }
}

/// A set of per-axis coordinates that define a specific location in a coordinate system.
///
/// Hashable so it can be the key for a map of masters by location.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location<Space>(BTreeMap<Tag, Coord<Space>>);

/// A location in [`UserSpace`].
pub type UserLocation = Location<UserSpace>;
/// A location in [`NormalizedSpace`].
pub type NormalizedLocation = Location<NormalizedSpace>;

impl<Space> FromIterator<(Tag, Coord<Space>)> for Location<Space> {
    fn from_iter<I: IntoIterator<Item = (Tag, Coord<Space>)>>(iter: I) -> Self {
        Location(iter.into_iter().collect())
    }
}

impl<Space> Location<Space> {
    pub fn new() -> Location<Space> {
        Location(Default::default())
    }

    /// For testing only, make a location from raw tags + values
    #[doc(hidden)]
    pub fn for_pos(positions: &[(&str, f64)]) -> Self {
        positions
            .iter()
            .map(|(tag, value)| {
                let tag = tag.parse::<Tag>().unwrap();
                (tag, Coord::new(*value))
            })
            .collect()
    }

    pub fn insert(&mut self, tag: Tag, pos: Coord<Space>) -> &mut Location<Space> {
        self.0.insert(tag, pos);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Coord<Space>)> {
        self.0.iter()
    }

    pub fn axis_tags(&self) -> impl Iterator<Item = &Tag> {
        self.0.keys()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn get(&self, tag: Tag) -> Option<Coord<Space>> {
        self.0.get(&tag).copied()
    }

    pub fn retain(&mut self, pred: impl Fn(&Tag, &mut Coord<Space>) -> bool) {
        self.0.retain(pred);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Location<UserSpace> {
    /// Normalize every coordinate against the matching font axis.
    pub fn to_normalized(&self, axes: &Axes) -> Result<NormalizedLocation, Error> {
        self.0
            .iter()
            .map(|(tag, coord)| {
                let axis = axes.get(*tag).ok_or(Error::UnknownAxis(*tag))?;
                Ok((*tag, axis.normalize(*coord)))
            })
            .collect()
    }
}

// methods we only want available on NormalizedSpace
impl Location<NormalizedSpace> {
    pub fn has_non_zero(&self, tag: Tag) -> bool {
        self.get(tag).unwrap_or_default().to_f64() != 0.0
    }

    pub fn has_any_non_zero(&self) -> bool {
        self.0.values().any(|v| v.to_f64() != 0.0)
    }

    /// Returns true if all normalized coordinates are zero
    pub fn is_default(&self) -> bool {
        !self.has_any_non_zero()
    }

    /// Drop all coordinates at zero, the canonical form of a normalized location.
    pub fn without_zeros(&self) -> NormalizedLocation {
        self.0
            .iter()
            .filter(|(_, coord)| coord.to_f64() != 0.0)
            .map(|(tag, coord)| (*tag, *coord))
            .collect()
    }

    /// Coordinates for every font axis, in font axis order, missing axes at 0.
    pub fn to_f2dot14_coords(&self, axes: &Axes) -> Vec<F2Dot14> {
        axes.iter()
            .map(|axis| self.get(axis.tag).unwrap_or_default().into())
            .collect()
    }
}

impl<Space> Debug for Location<Space> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Location(")?;
        for (i, (tag, coord)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}: {}", coord.to_f64())?;
        }
        f.write_char(')')
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{Axes, Axis};

    #[test]
    fn default_ignores_zeros() {
        assert!(NormalizedLocation::new().is_default());
        assert!(NormalizedLocation::for_pos(&[("wght", 0.0)]).is_default());
        assert!(!NormalizedLocation::for_pos(&[("wght", 0.0), ("wdth", -0.5)]).is_default());
    }

    #[test]
    fn without_zeros_is_canonical() {
        let loc = NormalizedLocation::for_pos(&[("wght", 0.0), ("wdth", 1.0)]);
        assert_eq!(
            NormalizedLocation::for_pos(&[("wdth", 1.0)]),
            loc.without_zeros()
        );
    }

    #[test]
    fn user_to_normalized() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let loc = UserLocation::for_pos(&[("wght", 700.0)]);
        assert_eq!(
            NormalizedLocation::for_pos(&[("wght", 1.0)]),
            loc.to_normalized(&axes).unwrap()
        );
        let loc = UserLocation::for_pos(&[("wght", 350.0)]);
        assert_eq!(
            NormalizedLocation::for_pos(&[("wght", -0.5)]),
            loc.to_normalized(&axes).unwrap()
        );
    }

    #[test]
    fn unknown_axis_fails_normalization() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let loc = UserLocation::for_pos(&[("wdth", 75.0)]);
        assert!(matches!(
            loc.to_normalized(&axes),
            Err(Error::UnknownAxis(tag)) if tag == Tag::new(b"wdth")
        ));
    }

    #[test]
    fn coords_in_font_axis_order() {
        let axes = Axes::new(vec![
            Axis::for_test("wght", 300.0, 400.0, 700.0),
            Axis::for_test("wdth", 50.0, 100.0, 100.0),
        ])
        .unwrap();
        let loc = NormalizedLocation::for_pos(&[("wdth", -1.0)]);
        assert_eq!(
            vec![F2Dot14::from_f32(0.0), F2Dot14::from_f32(-1.0)],
            loc.to_f2dot14_coords(&axes)
        );
    }
}
