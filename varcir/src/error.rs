use std::{fmt::Display, io, path::PathBuf};

use thiserror::Error;
use write_fonts::types::Tag;

use crate::{coords::NormalizedLocation, types::GlyphName};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO failure")]
    IoError(#[from] io::Error),
    #[error("Unable to parse {0:?}")]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("Unable to parse sources")]
    YamlError(#[from] serde_yaml::Error),
    #[error("'{0}' is not a valid axis tag")]
    InvalidTag(String),
    #[error("Axis {0} is defined more than once")]
    DuplicateAxis(Tag),
    #[error("Axis {tag} must satisfy min <= default <= max, got {min}, {default}, {max}")]
    InvalidAxisRange {
        tag: Tag,
        min: f64,
        default: f64,
        max: f64,
    },
    #[error("Location involves undefined axis {0}")]
    UnknownAxis(Tag),
    #[error("'{0}' is listed more than once in the glyph order")]
    DuplicateGlyphName(GlyphName),
    #[error("'{0}' has no entry in glyph order")]
    NotInGlyphOrder(GlyphName),
    #[error("'{0}' {1}")]
    GlyphError(GlyphName, GlyphProblem),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlyphProblem {
    NoMasters,
    MissingDefault,
    MultipleDefaults,
    DuplicateLocation(NormalizedLocation),
    LocationOutOfRange(NormalizedLocation),
    InconsistentComponentCount {
        location: NormalizedLocation,
        expected: usize,
        actual: usize,
    },
    InconsistentBaseGlyph {
        index: usize,
        expected: GlyphName,
        actual: GlyphName,
    },
    UnknownCoordinateAxis {
        index: usize,
        tag: Tag,
    },
}

impl Display for GlyphProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphProblem::NoMasters => f.write_str("has no masters"),
            GlyphProblem::MissingDefault => f.write_str("has no default master"),
            GlyphProblem::MultipleDefaults => f.write_str("has more than one default master"),
            GlyphProblem::DuplicateLocation(loc) => {
                write!(f, "has more than one master at {loc:?}")
            }
            GlyphProblem::LocationOutOfRange(loc) => {
                write!(f, "has a master outside the normalized range: {loc:?}")
            }
            GlyphProblem::InconsistentComponentCount {
                location,
                expected,
                actual,
            } => write!(
                f,
                "has {actual} components at {location:?} but {expected} at the default"
            ),
            GlyphProblem::InconsistentBaseGlyph {
                index,
                expected,
                actual,
            } => write!(
                f,
                "has different components at different points in designspace: \
                 component {index} is '{actual}', expected '{expected}'"
            ),
            GlyphProblem::UnknownCoordinateAxis { index, tag } => {
                write!(f, "component {index} sets undefined axis {tag}")
            }
        }
    }
}
