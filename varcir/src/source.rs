//! Reading variable component sources from YAML.
//!
//! Master locations are given in user space, component coordinates are
//! already normalized:
//!
//! ```yaml
//! axes:
//!   - { tag: wght, min: 300, default: 400, max: 700 }
//! glyph_order: [.notdef, A, dot]
//! glyphs:
//!   A:
//!     - components:
//!         - { base: dot, coord: { wght: 0.0 } }
//!     - location: { wght: 700 }
//!       components:
//!         - { base: dot, coord: { wght: 1.0 }, transform: { scaleX: 1.5 } }
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use log::debug;
use serde::Deserialize;
use write_fonts::types::Tag;

use crate::{
    coords::{UserCoord, UserLocation},
    error::Error,
    ir::{ComponentSource, Master, Transform, VarcGlyph, VarcSources},
    types::{Axes, Axis, GlyphName, GlyphOrder},
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceFile {
    #[serde(default)]
    axes: Vec<AxisSource>,
    glyph_order: Vec<String>,
    #[serde(default)]
    glyphs: BTreeMap<String, Vec<MasterSource>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AxisSource {
    tag: String,
    min: f64,
    default: f64,
    max: f64,
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MasterSource {
    #[serde(default)]
    location: BTreeMap<String, f64>,
    #[serde(default)]
    components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ComponentEntry {
    base: String,
    #[serde(default)]
    coord: BTreeMap<String, f64>,
    #[serde(default)]
    transform: Transform,
}

fn parse_tag(raw: &str) -> Result<Tag, Error> {
    raw.parse::<Tag>()
        .map_err(|_| Error::InvalidTag(raw.to_string()))
}

impl SourceFile {
    fn into_sources(self) -> Result<VarcSources, Error> {
        let axes = Axes::new(
            self.axes
                .into_iter()
                .map(|a| {
                    Ok(Axis {
                        tag: parse_tag(&a.tag)?,
                        min: UserCoord::new(a.min),
                        default: UserCoord::new(a.default),
                        max: UserCoord::new(a.max),
                        hidden: a.hidden,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?,
        )?;

        let mut glyph_order = GlyphOrder::new();
        for name in self.glyph_order {
            let name = GlyphName::from(name);
            if !glyph_order.insert(name.clone()) {
                return Err(Error::DuplicateGlyphName(name));
            }
        }

        let mut glyphs = Vec::with_capacity(self.glyphs.len());
        for (name, masters) in self.glyphs {
            let masters = masters
                .into_iter()
                .map(|m| m.into_master(&axes))
                .collect::<Result<Vec<_>, Error>>()?;
            glyphs.push(VarcGlyph::new(name.into(), masters)?);
        }
        debug!(
            "Loaded {} axes, {} glyphs, {} with components",
            axes.len(),
            glyph_order.len(),
            glyphs.len()
        );
        VarcSources::new(axes, glyph_order, glyphs)
    }
}

impl MasterSource {
    fn into_master(self, axes: &Axes) -> Result<Master, Error> {
        let location = self
            .location
            .iter()
            .map(|(tag, value)| Ok((parse_tag(tag)?, UserCoord::new(*value))))
            .collect::<Result<UserLocation, Error>>()?
            .to_normalized(axes)?;
        let components = self
            .components
            .into_iter()
            .map(|c| {
                Ok(ComponentSource {
                    base: c.base.into(),
                    coord: c
                        .coord
                        .iter()
                        .map(|(tag, value)| Ok((parse_tag(tag)?, *value)))
                        .collect::<Result<_, Error>>()?,
                    transform: c.transform,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Master {
            location,
            components,
        })
    }
}

impl VarcSources {
    pub fn from_yaml_str(yaml: &str) -> Result<VarcSources, Error> {
        let file: SourceFile = serde_yaml::from_str(yaml)?;
        file.into_sources()
    }

    pub fn from_yaml_file(path: &Path) -> Result<VarcSources, Error> {
        let raw = fs::read_to_string(path)?;
        let file: SourceFile =
            serde_yaml::from_str(&raw).map_err(|e| Error::ParseError(path.to_path_buf(), e))?;
        file.into_sources()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{coords::NormalizedLocation, test_util::testdata_dir};

    #[test]
    fn read_scale_glyph() {
        let sources = VarcSources::from_yaml_file(&testdata_dir().join("scale.yaml")).unwrap();
        assert_eq!(1, sources.axes.len());
        assert_eq!(Some(1), sources.glyph_order.glyph_id("A"));

        let glyph = sources.glyph("A").unwrap();
        assert_eq!(
            vec![
                NormalizedLocation::new(),
                NormalizedLocation::for_pos(&[("wght", 1.0)])
            ],
            glyph.locations().cloned().collect::<Vec<_>>()
        );
        let scales: Vec<_> = glyph
            .component_masters(0)
            .map(|c| c.transform.scale_x)
            .collect();
        assert_eq!(vec![1.0, 1.5], scales);
    }

    #[test]
    fn transform_fields_default() {
        let sources = VarcSources::from_yaml_str(
            r#"
            axes: []
            glyph_order: [A, B]
            glyphs:
              A:
                - components:
                    - base: B
                      transform: { rotation: 30, tCenterX: 5 }
            "#,
        )
        .unwrap();
        let component = &sources.glyph("A").unwrap().default_master().components[0];
        assert_eq!(
            Transform {
                rotation: 30.0,
                t_center_x: 5.0,
                ..Default::default()
            },
            component.transform
        );
    }

    #[test]
    fn bad_tag() {
        let result = VarcSources::from_yaml_str(
            r#"
            axes:
              - { tag: "toolong", min: 0, default: 0, max: 1 }
            glyph_order: []
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidTag(t)) if t == "toolong"));
    }

    #[test]
    fn duplicate_glyph_name() {
        let result = VarcSources::from_yaml_str("glyph_order: [A, A]");
        assert!(matches!(result, Err(Error::DuplicateGlyphName(..))));
    }

    #[test]
    fn location_on_unknown_axis() {
        let result = VarcSources::from_yaml_str(
            r#"
            glyph_order: [A]
            glyphs:
              A:
                - location: { wdth: 75 }
            "#,
        );
        assert!(matches!(result, Err(Error::UnknownAxis(..))));
    }

    #[test]
    fn parse_error_names_file() {
        let path = testdata_dir().join("not_yaml.txt");
        let result = VarcSources::from_yaml_file(&path);
        assert!(matches!(result, Err(Error::ParseError(p, _)) if p == path));
    }
}
