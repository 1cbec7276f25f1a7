//! Float decoding: sentinel fast paths and the full bit-extraction scheme.
//!
//! Most floats in a ccbi stream are one of a handful of constants and encode
//! as a single tag byte. The full encoding stores an IEEE-754 single in a
//! 4-byte window whose bytes are indexed from the tail backward; that
//! traversal order is part of the wire format and is reproduced here verbatim
//! rather than rewritten as a plain memory reinterpretation.

use crate::util::Result;

use super::BitCursor;

/// Tag bytes selecting the float representation.
const FLOAT_0: u8 = 0;
const FLOAT_1: u8 = 1;
const FLOAT_MINUS1: u8 = 2;
const FLOAT_05: u8 = 3;
const FLOAT_INTEGER: u8 = 4;

const MANTISSA_BITS: u32 = 23;
const EXPONENT_BITS: u32 = 8;
const EXPONENT_BIAS: i32 = 127;

impl BitCursor<'_> {
    /// Read a float: a tag byte selects a one-byte sentinel constant, a signed
    /// variable-length integer cast to float, or the full 4-byte encoding.
    pub fn read_float(&mut self) -> Result<f32> {
        match self.read_byte()? {
            FLOAT_0 => Ok(0.0),
            FLOAT_1 => Ok(1.0),
            FLOAT_MINUS1 => Ok(-1.0),
            FLOAT_05 => Ok(0.5),
            FLOAT_INTEGER => Ok(self.read_int()? as f32),
            _ => self.read_full_float(),
        }
    }

    /// Sign, exponent and mantissa windows extracted tail-first from the
    /// 4-byte footprint, then rebuilt by the IEEE-754 rules (NaN and the
    /// infinities at the all-ones exponent, subnormals at exponent zero).
    fn read_full_float(&mut self) -> Result<f32> {
        let size = ((MANTISSA_BITS + EXPONENT_BITS + 1) / 8) as usize;
        let window = self.read_bytes(size)?;

        let sign = extract_bits(window, MANTISSA_BITS + EXPONENT_BITS, 1);
        let exponent = extract_bits(window, MANTISSA_BITS, EXPONENT_BITS);
        let mantissa = extract_bits(window, 0, MANTISSA_BITS);

        let fraction = f64::from(mantissa) / f64::from(1u32 << MANTISSA_BITS);
        let sign_mul = if sign != 0 { -1.0f64 } else { 1.0 };
        let max_exponent = (1u32 << EXPONENT_BITS) - 1;

        let value = if exponent == max_exponent {
            if mantissa != 0 {
                f64::NAN
            } else if sign != 0 {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        } else if exponent == 0 {
            if mantissa == 0 {
                sign_mul * 0.0
            } else {
                sign_mul * 2f64.powi(1 - EXPONENT_BIAS) * fraction
            }
        } else {
            sign_mul * 2f64.powi(exponent as i32 - EXPONENT_BIAS) * (1.0 + fraction)
        };

        Ok(value as f32)
    }
}

/// Byte `i` of the window counted from its tail.
#[inline]
fn tail_byte(window: &[u8], i: usize) -> u8 {
    window[window.len() - i - 1]
}

/// Read `length` bits starting `start` bits from the low end of the window.
///
/// A window spanning a byte boundary combines the low bits of the far byte
/// with the high bits of the near byte.
fn extract_bits(window: &[u8], start: u32, length: u32) -> u32 {
    let size = window.len() as i32;
    let offset_left = (start + length) % 8;
    let offset_right = start % 8;
    let cur_byte = size - (start as i32 >> 3) - 1;
    let mut last_byte = size + (-((start + length) as i32)).div_euclid(8);
    let mut diff = cur_byte - last_byte;

    let head_width = if diff != 0 { 8 - offset_right } else { length };
    let mut sum = (u32::from(tail_byte(window, cur_byte as usize)) >> offset_right)
        & ((1u32 << head_width) - 1);

    if diff != 0 && offset_left != 0 {
        sum += (u32::from(tail_byte(window, last_byte as usize)) & ((1 << offset_left) - 1))
            << ((diff << 3) as u32 - offset_right);
        last_byte += 1;
        diff -= 1;
    }
    while diff != 0 {
        sum += u32::from(tail_byte(window, last_byte as usize)) << ((diff << 3) as u32 - offset_right);
        last_byte += 1;
        diff -= 1;
    }
    sum
}
