use std::fmt::Display;

use thiserror::Error;
use varcir::{
    error::GlyphProblem as SourceProblem,
    types::GlyphName,
    variations::{DeltaError, VariationModelError},
};
use write_fonts::{read::ReadError, types::Tag};

use crate::var_idx::VarIdx;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid sources")]
    SourceError(#[from] varcir::error::Error),
    #[error("Unknown VarC version {0:#010x}")]
    UnknownVersion(u32),
    #[error("Unable to read {context}: {source}")]
    ReadError { context: String, source: ReadError },
    #[error("Offset {offset} to {context} is out of bounds for {len} bytes")]
    OffsetOutOfBounds {
        context: &'static str,
        offset: usize,
        len: usize,
    },
    #[error("Offsets in {context} must not decrease, found {offsets:?}")]
    DecreasingOffsets {
        context: &'static str,
        offsets: Vec<u32>,
    },
    #[error("Glyph data has {entries} entries but the font has only {glyphs} glyphs")]
    TooManyGlyphEntries { entries: usize, glyphs: usize },
    #[error("Variation index entries of {0} bytes are not supported")]
    InvalidEntrySize(u8),
    #[error("Component flags {0:#06x} set reserved bits")]
    ReservedFlags(u16),
    #[error("Component references axis {0} which is not in the font")]
    InvalidAxisIndex(u16),
    #[error("Component references axis {0} more than once")]
    DuplicateAxisIndex(u16),
    #[error("Shared component {index} requested, only {available} exist")]
    InvalidSharedIndex { index: usize, available: usize },
    #[error("Shared component {0} is itself a reference to shared data")]
    NestedSharedReference(usize),
    #[error("{context} has {unread} bytes left over after decoding")]
    TrailingData { context: String, unread: usize },
    #[error("Invalid variation store")]
    InvalidVariationStore(#[source] ReadError),
    #[error("Variation index {0} used but the table has no variation store")]
    NoVariationStore(VarIdx),
    #[error("'{0}' {1}")]
    GlyphError(GlyphName, GlyphProblem),
    #[error("Component coordinate on axis {0} which is not in the font")]
    UnknownAxis(Tag),
    #[error("'{0}' has transform fields with and without variation indices")]
    MixedTransformVariations(GlyphName),
    #[error("'{glyph}' {field} of {value} does not fit in 16 bits as fixed point")]
    FixedOverflow {
        glyph: GlyphName,
        field: String,
        value: f64,
    },
    #[error("'{glyph}' scale range {min}..={max} cannot be represented")]
    ScaleOutOfRange { glyph: GlyphName, min: f64, max: f64 },
    #[error("'{glyph}' needs {bits} integer bits for scale, the flags hold at most 7")]
    ScaleBitsOverflow { glyph: GlyphName, bits: u8 },
    #[error("Axis index {0} does not fit in 15 bits")]
    AxisIndexOverflow(usize),
    #[error("Shared component index {0} does not fit in 30 bits")]
    SharedIndexOverflow(usize),
    #[error("{0} offsets do not fit in 30 bits")]
    TooManyOffsets(usize),
    #[error("Stored base {actual} does not match the default master's {expected}")]
    BaseMismatch { expected: i32, actual: i32 },
    #[error("No temporary delta set {0} in the variation store remapping")]
    UnmappedVarIdx(u32),
    #[error("Masters submitted before a model was set")]
    NoModel,
    #[error("Model has {expected} masters, {actual} values were submitted")]
    WrongNumberOfMasters { expected: usize, actual: usize },
    #[error("Unable to model variation")]
    VariationModelError(#[from] VariationModelError),
    #[error("Unable to compute deltas")]
    DeltaError(#[from] DeltaError),
    #[error("Unable to dump VarC")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Generating bytes for {context} failed: {message}")]
    DumpTableError { context: String, message: String },
}

/// The broad classes of failure.
///
/// Every one of them aborts the table; no partial output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes are not a table we can read
    Format,
    /// The table and the rest of the font, or the masters of a glyph, disagree
    StructuralMismatch,
    /// A value can't be represented in the space the format allows
    Range,
    /// We broke an invariant of our own
    InternalConsistency,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceError(e) => source_error_kind(e),
            Error::UnknownVersion(..)
            | Error::ReadError { .. }
            | Error::OffsetOutOfBounds { .. }
            | Error::DecreasingOffsets { .. }
            | Error::TooManyGlyphEntries { .. }
            | Error::InvalidEntrySize(..)
            | Error::ReservedFlags(..)
            | Error::InvalidAxisIndex(..)
            | Error::DuplicateAxisIndex(..)
            | Error::InvalidSharedIndex { .. }
            | Error::NestedSharedReference(..)
            | Error::TrailingData { .. }
            | Error::InvalidVariationStore(..)
            | Error::NoVariationStore(..) => ErrorKind::Format,
            Error::GlyphError(..)
            | Error::UnknownAxis(..)
            | Error::MixedTransformVariations(..) => ErrorKind::StructuralMismatch,
            Error::FixedOverflow { .. }
            | Error::ScaleOutOfRange { .. }
            | Error::ScaleBitsOverflow { .. }
            | Error::AxisIndexOverflow(..)
            | Error::SharedIndexOverflow(..)
            | Error::TooManyOffsets(..) => ErrorKind::Range,
            Error::BaseMismatch { .. }
            | Error::UnmappedVarIdx(..)
            | Error::NoModel
            | Error::WrongNumberOfMasters { .. }
            | Error::VariationModelError(..)
            | Error::DeltaError(..)
            | Error::YamlError(..)
            | Error::DumpTableError { .. } => ErrorKind::InternalConsistency,
        }
    }

    pub(crate) fn read(context: impl Into<String>) -> impl FnOnce(ReadError) -> Error {
        let context = context.into();
        move |source| Error::ReadError { context, source }
    }
}

fn source_error_kind(error: &varcir::error::Error) -> ErrorKind {
    use varcir::error::Error as SourceError;
    match error {
        SourceError::GlyphError(_, problem) => match problem {
            SourceProblem::InconsistentComponentCount { .. }
            | SourceProblem::InconsistentBaseGlyph { .. } => ErrorKind::StructuralMismatch,
            SourceProblem::LocationOutOfRange(..) => ErrorKind::Range,
            _ => ErrorKind::Format,
        },
        SourceError::NotInGlyphOrder(..) => ErrorKind::StructuralMismatch,
        _ => ErrorKind::Format,
    }
}

/// Ways a glyph's VarC data can disagree with the rest of the font
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphProblem {
    NotInGlyphOrder,
    NotAComposite,
    ComponentCountMismatch { expected: usize, actual: usize },
}

impl Display for GlyphProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphProblem::NotInGlyphOrder => f.write_str("has no entry in glyph order"),
            GlyphProblem::NotAComposite => {
                f.write_str("has variable components but is not a composite")
            }
            GlyphProblem::ComponentCountMismatch { expected, actual } => write!(
                f,
                "has {actual} variable components but {expected} composite components"
            ),
        }
    }
}
