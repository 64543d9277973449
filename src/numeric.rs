//! Fixed-point numeric kernel
//!
//! All quantities that feed a downstream payout (mining deltas, XP, RP,
//! accumulators) are represented as [`Fixed`], an `i128` scaled by
//! `10^18` (18 fractional digits). Every operation here is checked:
//! overflow is a [`NumericError`], never a silent wraparound.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCALE: i128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NumericError {
    #[error("fixed-point overflow")]
    Overflow,
    #[error("division by zero")]
    DivByZero,
}

/// A non-negative-or-negative fixed-point number with 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixed(i128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    pub fn from_f64(v: f64) -> Fixed {
        // Splitting the integer and fractional parts keeps the common case
        // (large whole-number RP/XP totals) exact — `v * SCALE as f64`
        // alone loses precision past a few significant digits once `v`
        // exceeds a few thousand, since the product no longer fits in an
        // `f64` mantissa.
        let int_part = v.trunc() as i128;
        let frac_part = (v.fract() * SCALE as f64).round() as i128;
        Fixed(int_part * SCALE + frac_part)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn from_i64(v: i64) -> Fixed {
        Fixed(v as i128 * SCALE)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Fixed) -> Result<Fixed, NumericError> {
        self.0
            .checked_add(rhs.0)
            .map(Fixed)
            .ok_or(NumericError::Overflow)
    }

    pub fn checked_sub(self, rhs: Fixed) -> Result<Fixed, NumericError> {
        self.0
            .checked_sub(rhs.0)
            .map(Fixed)
            .ok_or(NumericError::Overflow)
    }

    pub fn checked_mul(self, rhs: Fixed) -> Result<Fixed, NumericError> {
        let wide = self.0.checked_mul(rhs.0).ok_or(NumericError::Overflow)?;
        Ok(Fixed(wide / SCALE))
    }

    pub fn checked_div(self, rhs: Fixed) -> Result<Fixed, NumericError> {
        if rhs.0 == 0 {
            return Err(NumericError::DivByZero);
        }
        let wide = self.0.checked_mul(SCALE).ok_or(NumericError::Overflow)?;
        Ok(Fixed(wide / rhs.0))
    }

    pub fn saturating_add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_mul(self, rhs: Fixed) -> Fixed {
        match self.checked_mul(rhs) {
            Ok(v) => v,
            Err(_) => {
                if (self.0 < 0) != (rhs.0 < 0) {
                    Fixed(i128::MIN)
                } else {
                    Fixed(i128::MAX)
                }
            }
        }
    }

    pub fn clamp(self, lo: Fixed, hi: Fixed) -> Fixed {
        debug_assert!(lo <= hi, "clamp bounds must be ordered");
        if self < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }

    /// `pow_frac(base, exponent)` for small bounded exponents, evaluated via
    /// `f64` (the kernel doesn't need more than a handful of significant
    /// digits for the regression/decay curves in the spec) and re-quantized.
    pub fn pow_frac(base: Fixed, exponent: f64) -> Fixed {
        Fixed::from_f64(base.to_f64().max(0.0).powf(exponent))
    }
}

/// `exp(-x)` bounded for `x in [0, 50]`; returns `0` outside that domain, per
/// the numeric kernel contract. Implemented directly in `f64` and
/// re-quantized into [`Fixed`] — the bound keeps the series well away from
/// the regions where `f64::exp` loses precision.
pub fn exp_neg(x: Fixed) -> Fixed {
    let v = x.to_f64();
    if !(0.0..=50.0).contains(&v) {
        return Fixed::ZERO;
    }
    Fixed::from_f64((-v).exp())
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.18}", self.to_f64())
    }
}

impl From<f64> for Fixed {
    fn from(v: f64) -> Fixed {
        Fixed::from_f64(v)
    }
}

impl From<i64> for Fixed {
    fn from(v: i64) -> Fixed {
        Fixed::from_i64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_roundtrip() {
        let a = Fixed::from_f64(1.5);
        let b = Fixed::from_f64(0.25);
        assert_eq!(a.checked_add(b).unwrap().to_f64(), 1.75);
        assert_eq!(a.checked_sub(b).unwrap().to_f64(), 1.25);
    }

    #[test]
    fn mul_div_roundtrip() {
        let a = Fixed::from_f64(2.0);
        let b = Fixed::from_f64(3.0);
        assert_eq!(a.checked_mul(b).unwrap().to_f64(), 6.0);
        assert_eq!(b.checked_div(a).unwrap().to_f64(), 1.5);
    }

    #[test]
    fn div_by_zero_errors() {
        let a = Fixed::from_f64(1.0);
        assert_eq!(
            a.checked_div(Fixed::ZERO).unwrap_err(),
            NumericError::DivByZero
        );
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let huge = Fixed(i128::MAX - 1);
        assert_eq!(
            huge.checked_add(Fixed::from_i64(1000)).unwrap_err(),
            NumericError::Overflow
        );
    }

    #[test]
    fn exp_neg_bounds() {
        assert_eq!(exp_neg(Fixed::from_f64(0.0)).to_f64(), 1.0);
        assert_eq!(exp_neg(Fixed::from_f64(51.0)), Fixed::ZERO);
        assert!(exp_neg(Fixed::from_f64(-1.0)) == Fixed::ZERO);
        assert!((exp_neg(Fixed::from_f64(1.0)).to_f64() - 0.367_879).abs() < 1e-4);
    }

    #[test]
    fn clamp_respects_bounds() {
        let v = Fixed::from_f64(3.0);
        assert_eq!(
            v.clamp(Fixed::from_f64(0.5), Fixed::from_f64(2.0)).to_f64(),
            2.0
        );
    }
}
