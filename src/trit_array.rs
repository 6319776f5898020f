//! TritArray - Packed fixed-length trit sequences
//!
//! ## Packing
//!
//! Four trits per byte, 2 bits each, least significant trit in the low bits:
//!
//! ```text
//! byte = [t3:2][t2:2][t1:2][t0:2]     00 = 0, 01 = +1, 10 = -1, 11 = invalid
//! ```
//!
//! Index 0 is the least significant position, so the numeric value is
//! `n = Σ d_i · 3^i`. Text form prints the most significant trit first.
//!
//! ## Example
//! ```
//! use teros::{Trit, TritArray};
//!
//! let five = TritArray::from_int(5);
//! assert_eq!(five.to_vec(), vec![Trit::Neg, Trit::Neg, Trit::Pos]);
//! assert_eq!(five.to_i64().unwrap(), 5);
//! assert_eq!(five.to_string(), "+--");
//! ```

use crate::error::{Result, TernaryError};
use crate::gate::{DyadicGate, MonadicGate};
use crate::trit::Trit;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Trits packed into one byte
pub const TRITS_PER_BYTE: usize = 4;

/// 3^width as i128, None once it no longer fits
pub fn pow3(width: usize) -> Option<i128> {
    3i128.checked_pow(width as u32)
}

/// Largest magnitude representable in `width` trits: (3^width - 1) / 2
pub fn max_magnitude(width: usize) -> Option<i128> {
    pow3(width).map(|p| (p - 1) / 2)
}

/// Bytes needed to pack `len` trits
pub const fn packed_len(len: usize) -> usize {
    len.div_ceil(TRITS_PER_BYTE)
}

/// Fixed-length packed trit sequence
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TritArray {
    len: usize,
    bytes: Vec<u8>,
}

impl TritArray {
    /// All-zero array of `len` trits
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            bytes: vec![0; packed_len(len)],
        }
    }

    /// Build from trits, index 0 least significant
    pub fn from_trits(trits: &[Trit]) -> Self {
        let mut array = Self::zeros(trits.len());
        for (i, &t) in trits.iter().enumerate() {
            array.set(i, t);
        }
        array
    }

    /// Minimal balanced-ternary representation of `n` (zero is one `0` trit)
    pub fn from_int(n: i64) -> Self {
        let trits = int_to_trits(n as i128);
        if trits.is_empty() {
            Self::zeros(1)
        } else {
            Self::from_trits(&trits)
        }
    }

    /// Representation of `n` zero-extended to exactly `width` trits
    pub fn from_int_width(n: i64, width: usize) -> Result<Self> {
        let trits = int_to_trits(n as i128);
        if trits.len() > width {
            return Err(TernaryError::overflow(format!("{} trits", width)));
        }
        let mut array = Self::zeros(width);
        for (i, &t) in trits.iter().enumerate() {
            array.set(i, t);
        }
        Ok(array)
    }

    /// Reduce `value` modulo 3^width into the balanced range.
    ///
    /// Returns the wrapped array and the overflow direction
    /// (+1 when `value` was above the range, -1 when below).
    pub fn wrapping(value: i128, width: usize) -> (Self, Trit) {
        let Some(modulus) = pow3(width) else {
            // Wider than i128 can express: nothing can overflow
            return (Self::from_i128_unchecked(value, width), Trit::Zero);
        };
        let half = (modulus - 1) / 2;
        let wrapped = (value + half).rem_euclid(modulus) - half;
        let overflow = Trit::signum(((value - wrapped) / modulus).signum() as i64);
        (Self::from_i128_unchecked(wrapped, width), overflow)
    }

    fn from_i128_unchecked(value: i128, width: usize) -> Self {
        let trits = int_to_trits(value);
        let mut array = Self::zeros(width);
        for (i, &t) in trits.iter().take(width).enumerate() {
            array.set(i, t);
        }
        array
    }

    // =========================================================================
    // Element access
    // =========================================================================

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Trit at position `index`, None when out of range
    pub fn get(&self, index: usize) -> Option<Trit> {
        if index >= self.len {
            return None;
        }
        let code = (self.bytes[index / TRITS_PER_BYTE] >> ((index % TRITS_PER_BYTE) * 2)) & 0b11;
        // Only set() writes codes and it never writes 0b11
        Some(Trit::from_code(code).unwrap_or(Trit::Zero))
    }

    /// Trit at position `index`
    ///
    /// # Panics
    /// Panics when `index >= len`, like slice indexing.
    pub fn trit(&self, index: usize) -> Trit {
        match self.get(index) {
            Some(t) => t,
            None => panic!("trit index {} out of range for length {}", index, self.len),
        }
    }

    /// Overwrite position `index`; length never changes
    ///
    /// # Panics
    /// Panics when `index >= len`.
    pub fn set(&mut self, index: usize, trit: Trit) {
        assert!(index < self.len, "trit index {} out of range for length {}", index, self.len);
        let shift = (index % TRITS_PER_BYTE) * 2;
        let byte = &mut self.bytes[index / TRITS_PER_BYTE];
        *byte = (*byte & !(0b11 << shift)) | (trit.code() << shift);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Trit> + ExactSizeIterator + '_ {
        (0..self.len).map(move |i| self.trit(i))
    }

    pub fn to_vec(&self) -> Vec<Trit> {
        self.iter().collect()
    }

    /// Trit at the highest non-zero position (zero for the all-zero array)
    pub fn sign(&self) -> Trit {
        self.iter().rev().find(|t| !t.is_zero()).unwrap_or(Trit::Zero)
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    // =========================================================================
    // Numeric interpretation
    // =========================================================================

    /// Σ d_i · 3^i, failing with `Overflow` if it does not fit in i64
    pub fn to_i64(&self) -> Result<i64> {
        let value = self.to_i128()?;
        i64::try_from(value).map_err(|_| TernaryError::overflow("i64"))
    }

    /// Σ d_i · 3^i, failing with `Overflow` if it does not fit in i32
    pub fn to_i32(&self) -> Result<i32> {
        let value = self.to_i128()?;
        i32::try_from(value).map_err(|_| TernaryError::overflow("i32"))
    }

    /// Horner evaluation from the most significant trit
    pub fn to_i128(&self) -> Result<i128> {
        let mut acc: i128 = 0;
        for t in self.iter().rev() {
            acc = acc
                .checked_mul(3)
                .and_then(|v| v.checked_add(t.as_i8() as i128))
                .ok_or_else(|| TernaryError::overflow("i128"))?;
        }
        Ok(acc)
    }

    // =========================================================================
    // Slicing and shape
    // =========================================================================

    /// Copy of positions `range`
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len {
            return Err(TernaryError::LengthMismatch {
                left: self.len,
                right: range.end,
            });
        }
        let trits: Vec<Trit> = range.map(|i| self.trit(i)).collect();
        Ok(Self::from_trits(&trits))
    }

    /// `self` in the low positions, `high` above it
    pub fn concat(&self, high: &Self) -> Self {
        let mut trits = self.to_vec();
        trits.extend(high.iter());
        Self::from_trits(&trits)
    }

    /// Truncate or zero-extend to `width`
    pub fn resized(&self, width: usize) -> Self {
        let mut out = Self::zeros(width);
        for i in 0..width.min(self.len) {
            out.set(i, self.trit(i));
        }
        out
    }

    /// Multiply by 3^n, dropping trits shifted past the top
    pub fn shift_up(&self, n: usize) -> Self {
        let mut out = Self::zeros(self.len);
        for i in n..self.len {
            out.set(i, self.trit(i - n));
        }
        out
    }

    /// Drop the lowest `n` trits (balanced division by 3^n, rounding to nearest)
    pub fn shift_down(&self, n: usize) -> Self {
        let mut out = Self::zeros(self.len);
        for i in n..self.len {
            out.set(i - n, self.trit(i));
        }
        out
    }

    // =========================================================================
    // Elementwise logic
    // =========================================================================

    fn check_len(&self, other: &Self) -> Result<()> {
        if self.len != other.len {
            return Err(TernaryError::LengthMismatch {
                left: self.len,
                right: other.len,
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(Trit, Trit) -> Trit) -> Result<Self> {
        self.check_len(other)?;
        let mut out = Self::zeros(self.len);
        for i in 0..self.len {
            out.set(i, f(self.trit(i), other.trit(i)));
        }
        Ok(out)
    }

    fn map(&self, f: impl Fn(Trit) -> Trit) -> Self {
        let mut out = Self::zeros(self.len);
        for i in 0..self.len {
            out.set(i, f(self.trit(i)));
        }
        out
    }

    pub fn and(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, Trit::and)
    }

    pub fn or(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, Trit::or)
    }

    pub fn xor(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, Trit::xor)
    }

    pub fn not(&self) -> Self {
        self.map(Trit::not)
    }

    /// Apply a monadic gate to every position
    pub fn map_monadic(&self, gate: MonadicGate) -> Self {
        self.map(|t| gate.apply(t))
    }

    /// Apply a dyadic gate to each pair of corresponding positions
    pub fn zip_dyadic(&self, gate: DyadicGate, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| gate.apply(a, b))
    }

    // =========================================================================
    // Word arithmetic
    // =========================================================================

    /// Negation flips every trit
    pub fn neg(&self) -> Self {
        self.map(Trit::neg)
    }

    /// Ripple-carry addition; returns (sum, carry out of the top position)
    pub fn add_with_carry(&self, other: &Self) -> Result<(Self, Trit)> {
        self.check_len(other)?;
        let mut out = Self::zeros(self.len);
        let mut carry = Trit::Zero;
        for i in 0..self.len {
            let (digit, next) = self.trit(i).add3(other.trit(i), carry);
            out.set(i, digit);
            carry = next;
        }
        Ok((out, carry))
    }

    /// Ripple-carry subtraction; returns (difference, borrow out of the top)
    pub fn sub_with_borrow(&self, other: &Self) -> Result<(Self, Trit)> {
        self.add_with_carry(&other.neg())
    }

    // =========================================================================
    // Byte packing
    // =========================================================================

    /// Packed bytes (4 trits per byte, unused high bits zero)
    pub fn to_packed_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unpack `len` trits, rejecting the invalid `11` code and stray high bits
    pub fn from_packed_bytes(bytes: &[u8], len: usize) -> Result<Self> {
        let need = packed_len(len);
        if bytes.len() < need {
            return Err(TernaryError::LengthMismatch {
                left: need,
                right: bytes.len(),
            });
        }
        let mut array = Self::zeros(len);
        for i in 0..need * TRITS_PER_BYTE {
            let code = (bytes[i / TRITS_PER_BYTE] >> ((i % TRITS_PER_BYTE) * 2)) & 0b11;
            let trit = Trit::from_code(code)?;
            if i < len {
                array.set(i, trit);
            } else if !trit.is_zero() {
                return Err(TernaryError::InvalidTrit(code as i16));
            }
        }
        Ok(array)
    }
}

/// Balanced-ternary digits of `n`, least significant first (empty for zero)
fn int_to_trits(n: i128) -> Vec<Trit> {
    if n < 0 {
        return int_to_trits(-n).into_iter().map(Trit::neg).collect();
    }
    let mut digits = Vec::new();
    let mut n = n;
    while n != 0 {
        match n % 3 {
            2 => {
                digits.push(Trit::Neg);
                n = (n + 1) / 3;
            }
            1 => {
                digits.push(Trit::Pos);
                n /= 3;
            }
            _ => {
                digits.push(Trit::Zero);
                n /= 3;
            }
        }
    }
    digits
}

impl fmt::Display for TritArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.iter().rev() {
            write!(f, "{}", t.symbol())?;
        }
        Ok(())
    }
}

impl fmt::Debug for TritArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i128() {
            Ok(n) => write!(f, "TritArray[{}]({} = {})", self.len, self, n),
            Err(_) => write!(f, "TritArray[{}]({})", self.len, self),
        }
    }
}

impl FromStr for TritArray {
    type Err = TernaryError;

    /// Parse the text form, most significant trit first (`+0-`)
    fn from_str(s: &str) -> Result<Self> {
        let mut trits = Vec::with_capacity(s.len());
        for c in s.chars().rev() {
            let t = Trit::from_symbol(c).ok_or_else(|| TernaryError::Parse {
                line: 0,
                message: format!("invalid trit character '{}'", c),
            })?;
            trits.push(t);
        }
        Ok(Self::from_trits(&trits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_from_int_five() {
        let five = TritArray::from_int(5);
        assert_eq!(five.to_vec(), vec![Trit::Neg, Trit::Neg, Trit::Pos]);
        assert_eq!(TritArray::from_trits(&[Trit::Neg, Trit::Neg, Trit::Pos]).to_i64().unwrap(), 5);
    }

    #[test]
    fn test_negative_and_zero() {
        let minus_five = TritArray::from_int(-5);
        assert_eq!(minus_five.to_vec(), vec![Trit::Pos, Trit::Pos, Trit::Neg]);
        assert_eq!(TritArray::from_int(0).len(), 1);
        assert!(TritArray::from_int(0).is_zero());
    }

    #[test]
    fn test_int_roundtrip_random() {
        let mut rng = StdRng::seed_from_u64(0x7e705);
        let limit = max_magnitude(27).unwrap() as i64;
        for _ in 0..500 {
            let n = rng.gen_range(-limit..=limit);
            let word = TritArray::from_int_width(n, 27).unwrap();
            assert_eq!(word.len(), 27);
            assert_eq!(word.to_i64().unwrap(), n);
        }
        for n in [i64::MIN, i64::MAX, -1, 1] {
            assert_eq!(TritArray::from_int(n).to_i64().unwrap(), n);
        }
    }

    #[test]
    fn test_width_overflow() {
        assert!(TritArray::from_int_width(13, 3).is_ok());
        assert!(TritArray::from_int_width(14, 3).is_err());
        let wide = TritArray::from_int_width(i64::MAX, 60).unwrap();
        assert!(wide.to_i32().is_err());
        assert_eq!(wide.to_i64().unwrap(), i64::MAX);
    }

    #[test]
    fn test_sign() {
        assert_eq!(TritArray::from_int(5).sign(), Trit::Pos);
        assert_eq!(TritArray::from_int(-4).sign(), Trit::Neg);
        assert_eq!(TritArray::zeros(9).sign(), Trit::Zero);
        // Top trit decides even when lower trits disagree
        assert_eq!(TritArray::from_int(2).to_vec(), vec![Trit::Neg, Trit::Pos]);
        assert_eq!(TritArray::from_int(2).sign(), Trit::Pos);
    }

    #[test]
    fn test_length_mismatch() {
        let a = TritArray::zeros(3);
        let b = TritArray::zeros(4);
        assert!(matches!(
            a.and(&b),
            Err(TernaryError::LengthMismatch { left: 3, right: 4 })
        ));
        assert!(a.add_with_carry(&b).is_err());
    }

    #[test]
    fn test_elementwise_logic() {
        let a: TritArray = "+0-".parse().unwrap();
        let b: TritArray = "-+-".parse().unwrap();
        assert_eq!(a.and(&b).unwrap().to_string(), "-0-");
        assert_eq!(a.or(&b).unwrap().to_string(), "++-");
        assert_eq!(a.not().to_string(), "-0+");
    }

    #[test]
    fn test_add_with_carry() {
        let one = TritArray::from_int_width(1, 27).unwrap();
        let (two, carry) = one.add_with_carry(&one).unwrap();
        assert_eq!(two.to_i64().unwrap(), 2);
        assert_eq!(two.trit(0), Trit::Neg);
        assert_eq!(two.trit(1), Trit::Pos);
        assert_eq!(carry, Trit::Zero);

        let top = TritArray::from_int_width(13, 3).unwrap();
        let one = TritArray::from_int_width(1, 3).unwrap();
        let (wrapped, carry) = top.add_with_carry(&one).unwrap();
        assert_eq!(carry, Trit::Pos);
        assert_eq!(wrapped.to_i64().unwrap(), -13);
    }

    #[test]
    fn test_wrapping() {
        let (w, ov) = TritArray::wrapping(14, 3);
        assert_eq!(w.to_i64().unwrap(), -13);
        assert_eq!(ov, Trit::Pos);
        let (w, ov) = TritArray::wrapping(-14, 3);
        assert_eq!(w.to_i64().unwrap(), 13);
        assert_eq!(ov, Trit::Neg);
        let (w, ov) = TritArray::wrapping(7, 3);
        assert_eq!(w.to_i64().unwrap(), 7);
        assert_eq!(ov, Trit::Zero);
    }

    #[test]
    fn test_slice_concat_shift() {
        let n = TritArray::from_int_width(100, 9).unwrap();
        let low = n.slice(0..4).unwrap();
        let high = n.slice(4..9).unwrap();
        assert_eq!(low.concat(&high), n);
        assert!(n.slice(3..12).is_err());

        let three = TritArray::from_int_width(1, 9).unwrap().shift_up(1);
        assert_eq!(three.to_i64().unwrap(), 3);
        assert_eq!(three.shift_down(1).to_i64().unwrap(), 1);
        assert_eq!(n.resized(20).to_i64().unwrap(), 100);
    }

    #[test]
    fn test_packed_bytes() {
        let n = TritArray::from_int_width(-1234, 27).unwrap();
        assert_eq!(n.to_packed_bytes().len(), 7);
        let back = TritArray::from_packed_bytes(n.to_packed_bytes(), 27).unwrap();
        assert_eq!(back, n);
        assert!(TritArray::from_packed_bytes(&[0b11], 4).is_err());
        // Stray bits beyond len are rejected
        assert!(TritArray::from_packed_bytes(&[0b0100], 1).is_err());
    }

    #[test]
    fn test_text_form() {
        let n: TritArray = "+-0".parse().unwrap();
        assert_eq!(n.to_i64().unwrap(), 6);
        assert!("+x".parse::<TritArray>().is_err());
        assert_eq!(format!("{:?}", TritArray::from_int(5)), "TritArray[3](+-- = 5)");
    }
}
