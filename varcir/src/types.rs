//! Basic types shared by the front and back end.

use std::fmt::{Debug, Display};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use write_fonts::types::Tag;

use crate::{
    coords::{NormalizedCoord, UserCoord},
    error::Error,
};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlyphName(SmolStr);

impl GlyphName {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(SmolStr::new(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for GlyphName {
    fn from(value: String) -> Self {
        GlyphName(value.into())
    }
}

impl From<&str> for GlyphName {
    fn from(value: &str) -> Self {
        GlyphName(value.into())
    }
}

impl Debug for GlyphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for GlyphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for GlyphName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// lets a map keyed by GlyphName be queried with &str
impl std::borrow::Borrow<str> for GlyphName {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<&str> for GlyphName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// The font's glyphs, in glyph id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphOrder(IndexSet<GlyphName>);

impl GlyphOrder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Append a name, returning false if it was already present.
    pub fn insert(&mut self, name: GlyphName) -> bool {
        self.0.insert(name)
    }

    pub fn glyph_id(&self, name: &str) -> Option<usize> {
        self.0.get_index_of(name)
    }

    pub fn glyph_name(&self, gid: usize) -> Option<&GlyphName> {
        self.0.get_index(gid)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<GlyphName> for GlyphOrder {
    fn from_iter<T: IntoIterator<Item = GlyphName>>(iter: T) -> Self {
        GlyphOrder(iter.into_iter().collect())
    }
}

/// A variation axis, in user units.
///
/// Hidden axes are local to the glyphs that use them; they still occupy a
/// slot in the font's axis order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub tag: Tag,
    pub min: UserCoord,
    pub default: UserCoord,
    pub max: UserCoord,
    pub hidden: bool,
}

impl Axis {
    #[doc(hidden)]
    pub fn for_test(tag: &str, min: f64, default: f64, max: f64) -> Axis {
        Axis {
            tag: tag.parse().unwrap(),
            min: UserCoord::new(min),
            default: UserCoord::new(default),
            max: UserCoord::new(max),
            hidden: false,
        }
    }

    pub fn is_point(&self) -> bool {
        self.min == self.default && self.max == self.default
    }

    /// Map a user value onto `-1..=1`, with the default at 0.
    ///
    /// Values outside the axis range are clamped first.
    pub fn normalize(&self, value: UserCoord) -> NormalizedCoord {
        let value = value.to_f64();
        let min = self.min.to_f64();
        let default = self.default.to_f64();
        let max = self.max.to_f64();
        let value = value.clamp(min, max);
        let normalized = if value < default {
            if default == min {
                0.0
            } else {
                (value - default) / (default - min)
            }
        } else if value > default {
            if max == default {
                0.0
            } else {
                (value - default) / (max - default)
            }
        } else {
            0.0
        };
        NormalizedCoord::new(normalized)
    }
}

/// Every axis in the font, in font order.
///
/// The position of an axis in this list is the axis index stored in
/// component records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Axes(Vec<Axis>);

impl Axes {
    pub fn new(axes: Vec<Axis>) -> Result<Self, Error> {
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|prev| prev.tag == axis.tag) {
                return Err(Error::DuplicateAxis(axis.tag));
            }
            if axis.min > axis.default || axis.default > axis.max {
                return Err(Error::InvalidAxisRange {
                    tag: axis.tag,
                    min: axis.min.to_f64(),
                    default: axis.default.to_f64(),
                    max: axis.max.to_f64(),
                });
            }
        }
        Ok(Axes(axes))
    }

    pub fn get(&self, tag: Tag) -> Option<&Axis> {
        self.0.iter().find(|axis| axis.tag == tag)
    }

    /// The index of the axis in font order
    pub fn index_of(&self, tag: Tag) -> Option<usize> {
        self.0.iter().position(|axis| axis.tag == tag)
    }

    pub fn axis_at(&self, index: usize) -> Option<&Axis> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> {
        self.0.iter()
    }

    /// Axes visible to the user, that is those not marked hidden
    pub fn global(&self) -> impl Iterator<Item = &Axis> {
        self.0.iter().filter(|axis| !axis.hidden)
    }

    /// Tags of axes along which something can vary, in font order
    pub fn axis_order(&self) -> Vec<Tag> {
        self.0
            .iter()
            .filter(|axis| !axis.is_point())
            .map(|axis| axis.tag)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
