//! Per-master variable component data, validated and ready for compilation.

use std::collections::BTreeMap;

use kurbo::Affine;
use log::trace;
use serde::{Deserialize, Serialize};
use write_fonts::types::Tag;

use crate::{
    coords::NormalizedLocation,
    error::{Error, GlyphProblem},
    types::{Axes, GlyphName, GlyphOrder},
};

/// The transform fields stored in the table, in the order the table stores them.
///
/// Translation is not among them, it varies along with the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformField {
    Rotation,
    ScaleX,
    ScaleY,
    SkewX,
    SkewY,
    TCenterX,
    TCenterY,
}

impl TransformField {
    pub const ALL: [TransformField; 7] = [
        TransformField::Rotation,
        TransformField::ScaleX,
        TransformField::ScaleY,
        TransformField::SkewX,
        TransformField::SkewY,
        TransformField::TCenterX,
        TransformField::TCenterY,
    ];

    /// Position in [`Self::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn default_value(self) -> f64 {
        match self {
            TransformField::ScaleX | TransformField::ScaleY => 1.0,
            _ => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformField::Rotation => "rotation",
            TransformField::ScaleX => "scaleX",
            TransformField::ScaleY => "scaleY",
            TransformField::SkewX => "skewX",
            TransformField::SkewY => "skewY",
            TransformField::TCenterX => "tCenterX",
            TransformField::TCenterY => "tCenterY",
        }
    }
}

impl std::fmt::Display for TransformField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decomposed component transform.
///
/// Angles are in degrees. The center is the point rotation, scale and skew
/// happen around.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub t_center_x: f64,
    pub t_center_y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            t_center_x: 0.0,
            t_center_y: 0.0,
        }
    }
}

impl Transform {
    pub fn get(&self, field: TransformField) -> f64 {
        match field {
            TransformField::Rotation => self.rotation,
            TransformField::ScaleX => self.scale_x,
            TransformField::ScaleY => self.scale_y,
            TransformField::SkewX => self.skew_x,
            TransformField::SkewY => self.skew_y,
            TransformField::TCenterX => self.t_center_x,
            TransformField::TCenterY => self.t_center_y,
        }
    }

    pub fn set(&mut self, field: TransformField, value: f64) {
        let slot = match field {
            TransformField::Rotation => &mut self.rotation,
            TransformField::ScaleX => &mut self.scale_x,
            TransformField::ScaleY => &mut self.scale_y,
            TransformField::SkewX => &mut self.skew_x,
            TransformField::SkewY => &mut self.skew_y,
            TransformField::TCenterX => &mut self.t_center_x,
            TransformField::TCenterY => &mut self.t_center_y,
        };
        *slot = value;
    }

    /// The matrix this transform describes.
    ///
    /// Moves the center to the origin, skews, scales, rotates, then moves
    /// back and translates.
    pub fn to_affine(&self) -> Affine {
        let center = (self.t_center_x, self.t_center_y);
        let skew = Affine::new([
            1.0,
            self.skew_y.to_radians().tan(),
            (-self.skew_x).to_radians().tan(),
            1.0,
            0.0,
            0.0,
        ]);
        Affine::translate((self.x + center.0, self.y + center.1))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * skew
            * Affine::translate((-center.0, -center.1))
    }
}

/// One component of one master.
///
/// `coord` holds normalized positions on the axes of the base glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSource {
    pub base: GlyphName,
    pub coord: BTreeMap<Tag, f64>,
    pub transform: Transform,
}

impl ComponentSource {
    pub fn new(base: impl Into<GlyphName>) -> Self {
        ComponentSource {
            base: base.into(),
            coord: Default::default(),
            transform: Default::default(),
        }
    }
}

/// A glyph's components at one location in design space.
#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub location: NormalizedLocation,
    pub components: Vec<ComponentSource>,
}

/// A glyph built from variable components.
///
/// Masters are structurally identical: the same number of components with
/// the same base glyphs in the same order. The default master is first.
#[derive(Debug, Clone, PartialEq)]
pub struct VarcGlyph {
    pub name: GlyphName,
    masters: Vec<Master>,
}

impl VarcGlyph {
    pub fn new(name: GlyphName, mut masters: Vec<Master>) -> Result<Self, Error> {
        let fail = |problem| Err(Error::GlyphError(name.clone(), problem));
        if masters.is_empty() {
            return fail(GlyphProblem::NoMasters);
        }
        for master in masters.iter_mut() {
            master.location = master.location.without_zeros();
        }

        let mut defaults = masters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.location.is_default())
            .map(|(i, _)| i);
        let default_idx = match (defaults.next(), defaults.next()) {
            (None, _) => return fail(GlyphProblem::MissingDefault),
            (Some(_), Some(_)) => return fail(GlyphProblem::MultipleDefaults),
            (Some(idx), None) => idx,
        };
        let default = masters.remove(default_idx);
        masters.insert(0, default);

        for (i, master) in masters.iter().enumerate() {
            if master
                .location
                .iter()
                .any(|(_, pos)| !(-1.0..=1.0).contains(&pos.to_f64()))
            {
                return fail(GlyphProblem::LocationOutOfRange(master.location.clone()));
            }
            if masters[..i].iter().any(|m| m.location == master.location) {
                return fail(GlyphProblem::DuplicateLocation(master.location.clone()));
            }
        }

        let (neutral, others) = masters.split_at_mut(1);
        let neutral = &neutral[0];
        for master in others.iter_mut() {
            if master.components.len() != neutral.components.len() {
                return fail(GlyphProblem::InconsistentComponentCount {
                    location: master.location.clone(),
                    expected: neutral.components.len(),
                    actual: master.components.len(),
                });
            }
            for (index, (component, expected)) in master
                .components
                .iter_mut()
                .zip(neutral.components.iter())
                .enumerate()
            {
                if component.base != expected.base {
                    return fail(GlyphProblem::InconsistentBaseGlyph {
                        index,
                        expected: expected.base.clone(),
                        actual: component.base.clone(),
                    });
                }
                // a coordinate only the neutral sets holds still across masters
                for (tag, value) in expected.coord.iter() {
                    component.coord.entry(*tag).or_insert_with(|| {
                        trace!("{name} component {index} takes {tag} from the default master");
                        *value
                    });
                }
            }
        }

        Ok(VarcGlyph { name, masters })
    }

    /// The default master
    pub fn default_master(&self) -> &Master {
        &self.masters[0]
    }

    /// All masters, the default first
    pub fn masters(&self) -> &[Master] {
        &self.masters
    }

    pub fn locations(&self) -> impl Iterator<Item = &NormalizedLocation> {
        self.masters.iter().map(|m| &m.location)
    }

    pub fn num_components(&self) -> usize {
        self.default_master().components.len()
    }

    /// The sources for the component at `index`, one per master, default first.
    pub fn component_masters(&self, index: usize) -> impl Iterator<Item = &ComponentSource> {
        self.masters.iter().filter_map(move |m| m.components.get(index))
    }
}

/// Everything needed to build a VarC table.
#[derive(Debug, Clone, PartialEq)]
pub struct VarcSources {
    pub axes: Axes,
    pub glyph_order: GlyphOrder,
    glyphs: BTreeMap<GlyphName, VarcGlyph>,
}

impl VarcSources {
    pub fn new(
        axes: Axes,
        glyph_order: GlyphOrder,
        glyphs: impl IntoIterator<Item = VarcGlyph>,
    ) -> Result<Self, Error> {
        let glyphs: BTreeMap<_, _> = glyphs.into_iter().map(|g| (g.name.clone(), g)).collect();
        for glyph in glyphs.values() {
            if !glyph_order.contains(glyph.name.as_str()) {
                return Err(Error::NotInGlyphOrder(glyph.name.clone()));
            }
            for master in glyph.masters() {
                if let Some(tag) = master.location.axis_tags().find(|t| axes.get(**t).is_none()) {
                    return Err(Error::UnknownAxis(*tag));
                }
                for (index, component) in master.components.iter().enumerate() {
                    if let Some(tag) = component.coord.keys().find(|t| axes.get(**t).is_none()) {
                        return Err(Error::GlyphError(
                            glyph.name.clone(),
                            GlyphProblem::UnknownCoordinateAxis { index, tag: *tag },
                        ));
                    }
                }
            }
        }
        Ok(VarcSources {
            axes,
            glyph_order,
            glyphs,
        })
    }

    /// Glyphs in name order
    pub fn glyphs(&self) -> impl Iterator<Item = &VarcGlyph> {
        self.glyphs.values()
    }

    pub fn glyph(&self, name: &str) -> Option<&VarcGlyph> {
        self.glyphs.get(name)
    }

    /// The number of components of every composite glyph.
    pub fn component_counts(&self) -> BTreeMap<GlyphName, usize> {
        self.glyphs
            .values()
            .map(|g| (g.name.clone(), g.num_components()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::Axis;

    fn component(base: &str, coord: &[(&str, f64)]) -> ComponentSource {
        let mut component = ComponentSource::new(base);
        component.coord = coord
            .iter()
            .map(|(tag, v)| (tag.parse().unwrap(), *v))
            .collect();
        component
    }

    fn master(loc: &[(&str, f64)], components: Vec<ComponentSource>) -> Master {
        Master {
            location: NormalizedLocation::for_pos(loc),
            components,
        }
    }

    fn problem(result: Result<VarcGlyph, Error>) -> GlyphProblem {
        match result {
            Err(Error::GlyphError(_, problem)) => problem,
            other => panic!("expected a glyph problem, got {other:?}"),
        }
    }

    #[test]
    fn default_master_moves_first() {
        let glyph = VarcGlyph::new(
            "A".into(),
            vec![
                master(&[("wght", 1.0)], vec![component("dot", &[])]),
                master(&[("wght", 0.0)], vec![component("dot", &[])]),
            ],
        )
        .unwrap();
        assert!(glyph.default_master().location.is_default());
        assert_eq!(2, glyph.locations().count());
    }

    #[test]
    fn missing_default() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![master(&[("wght", 1.0)], vec![component("dot", &[])])],
        );
        assert_eq!(GlyphProblem::MissingDefault, problem(result));
    }

    #[test]
    fn two_defaults() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![master(&[], vec![]), master(&[("wght", 0.0)], vec![])],
        );
        assert_eq!(GlyphProblem::MultipleDefaults, problem(result));
    }

    #[test]
    fn duplicate_location() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![
                master(&[], vec![]),
                master(&[("wght", 1.0)], vec![]),
                master(&[("wght", 1.0), ("wdth", 0.0)], vec![]),
            ],
        );
        assert!(matches!(problem(result), GlyphProblem::DuplicateLocation(..)));
    }

    #[test]
    fn location_out_of_range() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![master(&[], vec![]), master(&[("wght", 1.5)], vec![])],
        );
        assert!(matches!(problem(result), GlyphProblem::LocationOutOfRange(..)));
    }

    #[test]
    fn inconsistent_component_count() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![
                master(&[], vec![component("dot", &[])]),
                master(&[("wght", 1.0)], vec![]),
            ],
        );
        assert!(matches!(
            problem(result),
            GlyphProblem::InconsistentComponentCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn inconsistent_base_glyph() {
        let result = VarcGlyph::new(
            "A".into(),
            vec![
                master(&[], vec![component("dot", &[])]),
                master(&[("wght", 1.0)], vec![component("bar", &[])]),
            ],
        );
        assert_eq!(
            GlyphProblem::InconsistentBaseGlyph {
                index: 0,
                expected: "dot".into(),
                actual: "bar".into(),
            },
            problem(result)
        );
    }

    #[test]
    fn missing_coordinates_come_from_default() {
        let glyph = VarcGlyph::new(
            "A".into(),
            vec![
                master(&[], vec![component("dot", &[("wght", 0.25), ("wdth", 0.5)])]),
                master(&[("wght", 1.0)], vec![component("dot", &[("wght", 1.0)])]),
            ],
        )
        .unwrap();
        let coords: Vec<_> = glyph
            .component_masters(0)
            .map(|c| c.coord.get(&Tag::new(b"wdth")).copied())
            .collect();
        assert_eq!(vec![Some(0.5), Some(0.5)], coords);
    }

    #[test]
    fn sources_reject_glyph_not_in_order() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let glyph = VarcGlyph::new("A".into(), vec![master(&[], vec![])]).unwrap();
        let result = VarcSources::new(axes, GlyphOrder::new(), vec![glyph]);
        assert!(matches!(result, Err(Error::NotInGlyphOrder(..))));
    }

    #[test]
    fn sources_reject_unknown_coordinate_axis() {
        let axes = Axes::new(vec![Axis::for_test("wght", 300.0, 400.0, 700.0)]).unwrap();
        let order: GlyphOrder = ["A", "dot"].into_iter().map(GlyphName::from).collect();
        let glyph = VarcGlyph::new(
            "A".into(),
            vec![master(&[], vec![component("dot", &[("ZZZZ", 0.5)])])],
        )
        .unwrap();
        assert!(matches!(
            VarcSources::new(axes, order, vec![glyph]),
            Err(Error::GlyphError(
                _,
                GlyphProblem::UnknownCoordinateAxis { index: 0, .. }
            ))
        ));
    }

    #[test]
    fn identity_transform() {
        assert_eq!(Affine::IDENTITY, Transform::default().to_affine());
    }

    #[test]
    fn rotate_about_center() {
        let transform = Transform {
            rotation: 90.0,
            t_center_x: 100.0,
            t_center_y: 100.0,
            ..Default::default()
        };
        let p = transform.to_affine() * Point::new(200.0, 100.0);
        assert!((p - Point::new(100.0, 200.0)).hypot() < 1e-9, "{p:?}");
    }

    #[test]
    fn scale_then_translate() {
        let transform = Transform {
            x: 10.0,
            y: 20.0,
            scale_x: 2.0,
            scale_y: 0.5,
            ..Default::default()
        };
        assert_eq!(
            Point::new(12.0, 20.5),
            transform.to_affine() * Point::new(1.0, 1.0)
        );
    }

    #[test]
    fn positive_skew_x_shears_left() {
        let transform = Transform {
            skew_x: 45.0,
            ..Default::default()
        };
        let p = transform.to_affine() * Point::new(0.0, 100.0);
        assert!((p.x + 100.0).abs() < 1e-9, "{p:?}");
    }
}
