//! IEEE 754-2008 128-bit decimal values (BID encoding).
//!
//! A `Decimal128` is kept as its raw bits. Comparisons and conversions work on
//! an explicit decomposition into sign, exponent and a 113-bit coefficient
//! taken from the high and low 64-bit words:
//!
//! ```text
//! high word:  s | G (combination field, 17 bits incl. exponent) | coefficient bits 64..112
//! low word:   coefficient bits 0..63
//! ```
//!
//! When the two leading combination bits are `11` the exponent is shifted two
//! bits right and the coefficient carries an implicit `100` prefix; such
//! coefficients always exceed 10^34 - 1 and are non-canonical, so they read
//! as zero. The five combination bits `11110` and `11111` mark infinity and
//! NaN.

use std::cmp::Ordering;
use std::fmt;

const SIGN_MASK: u64 = 1 << 63;
const COMBINATION_SHIFT: u32 = 58;
const COMBINATION_MASK: u64 = 0x1F;
const COMBINATION_INFINITY: u64 = 0x1E;
const COMBINATION_NAN: u64 = 0x1F;
const LARGE_FORM_SHIFT: u32 = 61;
const LARGE_FORM_MARK: u64 = 0b11;
const EXPONENT_MASK: u64 = 0x3FFF;
const EXPONENT_SHIFT: u32 = 49;
const LARGE_EXPONENT_SHIFT: u32 = 47;
const COEFFICIENT_HIGH_MASK: u64 = (1 << 49) - 1;
const EXPONENT_BIAS: i32 = 6176;
const MAX_EXPONENT: i32 = 6111;
const MIN_EXPONENT: i32 = -6176;
const MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999;

/// A 128-bit decimal as stored in BSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    high: u64,
    low: u64,
}

/// Decomposed form of a [`Decimal128`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalParts {
    pub negative: bool,
    pub kind: DecimalKind,
}

/// The class of a decomposed decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalKind {
    Finite { exponent: i32, coefficient: u128 },
    Infinity,
    NaN,
}

impl Decimal128 {
    /// Builds a decimal from its 16 little-endian wire bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut low = [0u8; 8];
        let mut high = [0u8; 8];
        low.copy_from_slice(&bytes[..8]);
        high.copy_from_slice(&bytes[8..]);
        Self {
            high: u64::from_le_bytes(high),
            low: u64::from_le_bytes(low),
        }
    }

    /// The 16 little-endian wire bytes.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.low.to_le_bytes());
        bytes[8..].copy_from_slice(&self.high.to_le_bytes());
        bytes
    }

    /// Encodes `(-1)^negative * coefficient * 10^exponent`.
    ///
    /// Returns `None` when the coefficient has more than 34 digits or the
    /// exponent is out of range.
    pub fn from_parts(negative: bool, exponent: i32, coefficient: u128) -> Option<Self> {
        if coefficient > MAX_COEFFICIENT || !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
            return None;
        }
        let biased = (exponent + EXPONENT_BIAS) as u64;
        let mut high = (biased & EXPONENT_MASK) << EXPONENT_SHIFT;
        high |= ((coefficient >> 64) as u64) & COEFFICIENT_HIGH_MASK;
        if negative {
            high |= SIGN_MASK;
        }
        Some(Self {
            high,
            low: coefficient as u64,
        })
    }

    /// Converts a double through its shortest round-trip decimal form.
    pub fn from_f64(x: f64) -> Option<Self> {
        if x.is_nan() {
            return Some(Self::nan());
        }
        if x.is_infinite() {
            return Some(Self::infinity(x < 0.0));
        }
        let text = format!("{:e}", x.abs());
        let (mantissa, exponent) = text.split_once('e')?;
        let exponent: i32 = exponent.parse().ok()?;
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let coefficient: u128 = format!("{int_part}{frac_part}").parse().ok()?;
        Self::from_parts(
            x.is_sign_negative(),
            exponent - frac_part.len() as i32,
            coefficient,
        )
    }

    /// Positive or negative infinity.
    pub fn infinity(negative: bool) -> Self {
        let mut high = COMBINATION_INFINITY << COMBINATION_SHIFT;
        if negative {
            high |= SIGN_MASK;
        }
        Self { high, low: 0 }
    }

    /// A quiet NaN.
    pub fn nan() -> Self {
        Self {
            high: COMBINATION_NAN << COMBINATION_SHIFT,
            low: 0,
        }
    }

    /// The high (most significant) 64-bit word.
    pub fn high(&self) -> u64 {
        self.high
    }

    /// The low 64-bit word.
    pub fn low(&self) -> u64 {
        self.low
    }

    /// Splits the raw bits into sign, exponent and coefficient.
    pub fn parts(&self) -> DecimalParts {
        let negative = self.high & SIGN_MASK != 0;
        let combination = (self.high >> COMBINATION_SHIFT) & COMBINATION_MASK;
        let kind = if combination == COMBINATION_NAN {
            DecimalKind::NaN
        } else if combination == COMBINATION_INFINITY {
            DecimalKind::Infinity
        } else if (self.high >> LARGE_FORM_SHIFT) & LARGE_FORM_MARK == LARGE_FORM_MARK {
            let biased = (self.high >> LARGE_EXPONENT_SHIFT) & EXPONENT_MASK;
            DecimalKind::Finite {
                exponent: biased as i32 - EXPONENT_BIAS,
                coefficient: 0,
            }
        } else {
            let biased = (self.high >> EXPONENT_SHIFT) & EXPONENT_MASK;
            let coefficient =
                (((self.high & COEFFICIENT_HIGH_MASK) as u128) << 64) | self.low as u128;
            DecimalKind::Finite {
                exponent: biased as i32 - EXPONENT_BIAS,
                coefficient: if coefficient > MAX_COEFFICIENT {
                    0
                } else {
                    coefficient
                },
            }
        };
        DecimalParts { negative, kind }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.parts().kind, DecimalKind::NaN)
    }

    /// Nearest `f64`. Precision beyond 17 significant digits is lost.
    pub fn to_f64(&self) -> f64 {
        let parts = self.parts();
        let magnitude = match parts.kind {
            DecimalKind::NaN => return f64::NAN,
            DecimalKind::Infinity => f64::INFINITY,
            DecimalKind::Finite {
                exponent,
                coefficient,
            } => format!("{coefficient}e{exponent}")
                .parse::<f64>()
                .unwrap_or(f64::NAN),
        };
        if parts.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Numeric ordering: NaN < -Infinity < finite values < +Infinity.
    ///
    /// Unlike the derived equality, which compares bits, values with
    /// different exponents compare equal when they denote the same number
    /// (`1.0 == 1.00`, `-0 == 0`).
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.parts(), other.parts());
        let rank_a = rank(&a);
        let rank_b = rank(&b);
        if rank_a != rank_b {
            return rank_a.cmp(&rank_b);
        }
        match (a.kind, b.kind) {
            (
                DecimalKind::Finite {
                    exponent: ea,
                    coefficient: ca,
                },
                DecimalKind::Finite {
                    exponent: eb,
                    coefficient: cb,
                },
            ) => {
                let magnitude = cmp_magnitude(ca, ea, cb, eb);
                if a.negative && ca != 0 {
                    magnitude.reverse()
                } else {
                    magnitude
                }
            }
            _ => Ordering::Equal,
        }
    }
}

/// Coarse ordering class: 0 NaN, 1 -inf, 2 negative, 3 zero, 4 positive, 5 +inf.
fn rank(parts: &DecimalParts) -> u8 {
    match parts.kind {
        DecimalKind::NaN => 0,
        DecimalKind::Infinity if parts.negative => 1,
        DecimalKind::Infinity => 5,
        DecimalKind::Finite { coefficient: 0, .. } => 3,
        DecimalKind::Finite { .. } if parts.negative => 2,
        DecimalKind::Finite { .. } => 4,
    }
}

fn digit_count(mut value: u128) -> i32 {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

fn cmp_magnitude(ca: u128, ea: i32, cb: u128, eb: i32) -> Ordering {
    match (ca == 0, cb == 0) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let adjusted_a = digit_count(ca) + ea;
    let adjusted_b = digit_count(cb) + eb;
    if adjusted_a != adjusted_b {
        return adjusted_a.cmp(&adjusted_b);
    }
    // Same leading digit position: the scaled coefficient has at most as many
    // digits as the other one, so it fits in 34 digits.
    if ea >= eb {
        (ca * 10u128.pow((ea - eb) as u32)).cmp(&cb)
    } else {
        ca.cmp(&(cb * 10u128.pow((eb - ea) as u32)))
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.parts();
        let (exponent, coefficient) = match parts.kind {
            DecimalKind::NaN => return f.write_str("NaN"),
            DecimalKind::Infinity if parts.negative => return f.write_str("-Infinity"),
            DecimalKind::Infinity => return f.write_str("Infinity"),
            DecimalKind::Finite {
                exponent,
                coefficient,
            } => (exponent, coefficient),
        };
        if parts.negative {
            f.write_str("-")?;
        }
        let digits = coefficient.to_string();
        let adjusted = exponent + digits.len() as i32 - 1;
        if exponent <= 0 && adjusted >= -6 {
            if exponent == 0 {
                return f.write_str(&digits);
            }
            let point = digits.len() as i32 + exponent;
            if point > 0 {
                let (int_part, frac_part) = digits.split_at(point as usize);
                write!(f, "{int_part}.{frac_part}")
            } else {
                write!(f, "0.{}{digits}", "0".repeat((-point) as usize))
            }
        } else {
            let (first, rest) = digits.split_at(1);
            f.write_str(first)?;
            if !rest.is_empty() {
                write!(f, ".{rest}")?;
            }
            if adjusted >= 0 {
                write!(f, "E+{adjusted}")
            } else {
                write!(f, "E{adjusted}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(negative: bool, exponent: i32, coefficient: u128) -> Decimal128 {
        Decimal128::from_parts(negative, exponent, coefficient).unwrap()
    }

    #[test]
    fn test_bytes_round_trip_preserves_bits() {
        let value = dec(true, -3, 123_456);
        assert_eq!(Decimal128::from_bytes(value.to_bytes()), value);
    }

    #[test]
    fn test_parts_of_known_encoding() {
        // 1 is encoded as 0x3040000000000000_0000000000000001.
        let one = Decimal128::from_bytes({
            let mut b = [0u8; 16];
            b[0] = 1;
            b[14] = 0x40;
            b[15] = 0x30;
            b
        });
        assert_eq!(
            one.parts(),
            DecimalParts {
                negative: false,
                kind: DecimalKind::Finite {
                    exponent: 0,
                    coefficient: 1
                }
            }
        );
        assert_eq!(one.to_string(), "1");
    }

    #[test]
    fn test_special_values() {
        assert!(Decimal128::nan().is_nan());
        assert_eq!(Decimal128::infinity(false).to_string(), "Infinity");
        assert_eq!(Decimal128::infinity(true).to_string(), "-Infinity");
        assert_eq!(Decimal128::infinity(true).to_f64(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_compare_across_exponents() {
        assert_eq!(dec(false, -1, 10).total_cmp(&dec(false, -2, 100)), Ordering::Equal);
        assert_eq!(dec(false, 0, 2).total_cmp(&dec(false, -1, 15)), Ordering::Greater);
        assert_eq!(dec(false, 3, 1).total_cmp(&dec(false, 0, 999)), Ordering::Greater);
        assert_eq!(dec(true, 0, 5).total_cmp(&dec(true, 0, 3)), Ordering::Less);
        assert_eq!(dec(true, 0, 0).total_cmp(&dec(false, 4, 0)), Ordering::Equal);
        assert_eq!(
            dec(false, 6000, MAX_COEFFICIENT).total_cmp(&Decimal128::infinity(false)),
            Ordering::Less
        );
        assert_eq!(
            Decimal128::nan().total_cmp(&Decimal128::infinity(true)),
            Ordering::Less
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(dec(false, -2, 12345).to_string(), "123.45");
        assert_eq!(dec(true, -5, 12).to_string(), "-0.00012");
        assert_eq!(dec(false, 2, 15).to_string(), "1.5E+3");
        assert_eq!(dec(false, -10, 7).to_string(), "7E-10");
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(dec(false, -2, 12345).to_f64(), 123.45);
        assert_eq!(dec(true, 1, 3).to_f64(), -30.0);
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(Decimal128::from_f64(123.45).unwrap().to_string(), "123.45");
        assert_eq!(Decimal128::from_f64(-0.5).unwrap().to_string(), "-0.5");
        assert_eq!(Decimal128::from_f64(3000.0).unwrap().to_f64(), 3000.0);
        assert!(Decimal128::from_f64(f64::NAN).unwrap().is_nan());
        assert_eq!(
            Decimal128::from_f64(f64::NEG_INFINITY).unwrap().to_string(),
            "-Infinity"
        );
    }

    #[test]
    fn test_non_canonical_reads_as_zero() {
        let value = Decimal128::from_bytes({
            let mut b = [0xFFu8; 16];
            b[15] = 0x6C; // 0b0110_1100: large form, not inf/NaN
            b
        });
        assert!(matches!(
            value.parts().kind,
            DecimalKind::Finite { coefficient: 0, .. }
        ));
    }
}
