//! Conversions between floating point values and the fixed point integers the
//! table stores.
//!
//! Every stored value is an `i16`; what differs between fields is how many of
//! its bits are fraction.

use log::warn;
use varcir::ir::TransformField;

/// Fraction bits used for component coordinates
pub const COORD_PRECISION_BITS: u8 = 12;

/// Units per degree for angles; a full turn spans the signed 16 bit range.
pub const ANGLE_SCALE: f64 = 0x8000 as f64 / 360.0;

/// Largest value of `numIntBitsForScale`, it has 3 bits in the flags
pub const MAX_INT_BITS_FOR_SCALE: u8 = 7;

/// Round `value * 2^precision_bits` half away from zero.
///
/// No range check; see [`to_i16`].
pub fn to_fixed(value: f64, precision_bits: u8) -> i32 {
    (value * (1_i64 << precision_bits) as f64).round() as i32
}

pub fn from_fixed(value: i32, precision_bits: u8) -> f64 {
    value as f64 / (1_i64 << precision_bits) as f64
}

/// Bring an angle into `(-360, 360)`.
pub fn wrap_degrees(degrees: f64) -> f64 {
    if degrees >= 360.0 || degrees <= -360.0 {
        // % keeps the sign of the dividend so this covers both directions
        let wrapped = degrees % 360.0;
        warn!("Angle {degrees} wrapped to {wrapped}");
        wrapped
    } else {
        degrees
    }
}

pub fn degrees_to_fixed(degrees: f64) -> i32 {
    (wrap_degrees(degrees) * ANGLE_SCALE).round() as i32
}

pub fn fixed_to_degrees(value: i32) -> f64 {
    value as f64 * 360.0 / 0x8000 as f64
}

/// The value if it fits in an `i16`
pub fn to_i16(value: i32) -> Option<i16> {
    i16::try_from(value).ok()
}

/// The smallest count of integer bits at which both ends of a scale range fit
/// in an `i16` with `16 - n` fraction bits, if any.
pub fn num_int_bits_for_scale(min: f64, max: f64) -> Option<u8> {
    (0..=MAX_INT_BITS_FOR_SCALE).find(|n| {
        let bits = 16 - n;
        to_fixed(min, bits) >= i16::MIN as i32 && to_fixed(max, bits) <= i16::MAX as i32
    })
}

/// How a given value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// A fixed number of fraction bits
    Fraction(u8),
    /// Degrees, scaled by [`ANGLE_SCALE`]
    Angle,
}

impl Precision {
    pub const COORD: Precision = Precision::Fraction(COORD_PRECISION_BITS);

    pub fn for_field(field: TransformField, num_int_bits_for_scale: u8) -> Precision {
        match field {
            TransformField::Rotation | TransformField::SkewX | TransformField::SkewY => {
                Precision::Angle
            }
            TransformField::ScaleX | TransformField::ScaleY => {
                Precision::Fraction(16_u8.saturating_sub(num_int_bits_for_scale))
            }
            TransformField::TCenterX | TransformField::TCenterY => Precision::Fraction(0),
        }
    }

    pub fn to_fixed(self, value: f64) -> i32 {
        match self {
            Precision::Fraction(bits) => to_fixed(value, bits),
            Precision::Angle => degrees_to_fixed(value),
        }
    }

    pub fn from_fixed(self, value: i32) -> f64 {
        match self {
            Precision::Fraction(bits) => from_fixed(value, bits),
            Precision::Angle => fixed_to_degrees(value),
        }
    }

    /// The size of one step of the stored integer
    pub fn resolution(self) -> f64 {
        self.from_fixed(1)
    }
}
