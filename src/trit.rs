//! Trit - The balanced-ternary digit
//!
//! A trit is strictly one of {-1, 0, +1}, ordered by numeric value.
//!
//! # Logic
//!
//! Kleene three-valued logic over the ordering `Neg < Zero < Pos`:
//! `and = min`, `or = max`, `not = negate`.
//!
//! # Arithmetic
//!
//! Balanced addition produces a sum digit and a carry digit:
//!
//! ```text
//!  a + b | -1     0     +1
//! -------+------------------
//!   -1   | +1/-1  -1/0  0/0
//!    0   | -1/0   0/0   +1/0
//!   +1   | 0/0    +1/0  -1/+1      (sum/carry)
//! ```
//!
//! # Example
//! ```
//! use teros::Trit;
//!
//! let (sum, carry) = Trit::Pos.add(Trit::Pos);
//! assert_eq!(sum, Trit::Neg);
//! assert_eq!(carry, Trit::Pos);
//!
//! assert_eq!(Trit::Neg.and(Trit::Pos), Trit::Neg);
//! assert_eq!(Trit::Neg.or(Trit::Zero), Trit::Zero);
//! ```

use crate::error::TernaryError;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A balanced-ternary digit - strictly {-1, 0, +1}
///
/// Using this enum instead of raw i8 makes invalid states like 2 unrepresentable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i8)]
pub enum Trit {
    /// -1 (false in Kleene logic)
    Neg = -1,
    /// 0 (unknown in Kleene logic)
    #[default]
    Zero = 0,
    /// +1 (true in Kleene logic)
    Pos = 1,
}

impl Trit {
    /// All trits in ascending order
    pub const ALL: [Trit; 3] = [Trit::Neg, Trit::Zero, Trit::Pos];

    /// Convert to i8
    #[inline]
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// Try to convert from i8, returns None for invalid values
    #[inline]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Self::Neg),
            0 => Some(Self::Zero),
            1 => Some(Self::Pos),
            _ => None,
        }
    }

    /// Sign of an integer as a trit
    #[inline]
    pub const fn signum(value: i64) -> Self {
        if value > 0 {
            Self::Pos
        } else if value < 0 {
            Self::Neg
        } else {
            Self::Zero
        }
    }

    /// Digit used by gate indices: -1 → 0, 0 → 1, +1 → 2
    #[inline]
    pub const fn digit(self) -> u8 {
        (self as i8 + 1) as u8
    }

    /// Inverse of [`Trit::digit`]
    #[inline]
    pub const fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Neg),
            1 => Some(Self::Zero),
            2 => Some(Self::Pos),
            _ => None,
        }
    }

    /// 2-bit packed code: 00 = 0, 01 = +1, 10 = -1 (11 is invalid)
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            Self::Zero => 0b00,
            Self::Pos => 0b01,
            Self::Neg => 0b10,
        }
    }

    /// Decode a 2-bit packed code
    #[inline]
    pub fn from_code(code: u8) -> Result<Self, TernaryError> {
        match code {
            0b00 => Ok(Self::Zero),
            0b01 => Ok(Self::Pos),
            0b10 => Ok(Self::Neg),
            other => Err(TernaryError::InvalidTrit(other as i16)),
        }
    }

    /// Character form used in trit strings
    #[inline]
    pub const fn symbol(self) -> char {
        match self {
            Self::Neg => '-',
            Self::Zero => '0',
            Self::Pos => '+',
        }
    }

    /// Parse from `-`, `0` or `+` (`T` is accepted for -1, `1` for +1)
    #[inline]
    pub const fn from_symbol(c: char) -> Option<Self> {
        match c {
            '-' | 'T' => Some(Self::Neg),
            '0' => Some(Self::Zero),
            '+' | '1' => Some(Self::Pos),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        matches!(self, Self::Zero)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Negate: -a
    #[inline]
    pub const fn neg(self) -> Self {
        match self {
            Self::Neg => Self::Pos,
            Self::Zero => Self::Zero,
            Self::Pos => Self::Neg,
        }
    }

    /// Balanced addition: returns (sum, carry)
    #[inline]
    pub const fn add(self, other: Self) -> (Self, Self) {
        Self::split(self as i8 + other as i8)
    }

    /// Full adder: a + b + carry_in, returns (sum, carry)
    #[inline]
    pub const fn add3(self, other: Self, carry_in: Self) -> (Self, Self) {
        Self::split(self as i8 + other as i8 + carry_in as i8)
    }

    /// Subtraction: a + (-b), returns (difference, borrow)
    #[inline]
    pub const fn sub(self, other: Self) -> (Self, Self) {
        self.add(other.neg())
    }

    /// Multiplication (closed, no carry)
    #[inline]
    pub const fn mul(self, other: Self) -> Self {
        match self as i8 * other as i8 {
            -1 => Self::Neg,
            0 => Self::Zero,
            _ => Self::Pos,
        }
    }

    /// Split a small sum in -3..=3 into a balanced (digit, carry) pair
    const fn split(total: i8) -> (Self, Self) {
        match total {
            -3 => (Self::Zero, Self::Neg),
            -2 => (Self::Pos, Self::Neg),
            -1 => (Self::Neg, Self::Zero),
            0 => (Self::Zero, Self::Zero),
            1 => (Self::Pos, Self::Zero),
            2 => (Self::Neg, Self::Pos),
            _ => (Self::Zero, Self::Pos),
        }
    }

    // =========================================================================
    // Kleene logic
    // =========================================================================

    /// Kleene AND = min
    #[inline]
    pub fn and(self, other: Self) -> Self {
        self.min(other)
    }

    /// Kleene OR = max
    #[inline]
    pub fn or(self, other: Self) -> Self {
        self.max(other)
    }

    /// Kleene NOT = negate
    #[inline]
    pub const fn not(self) -> Self {
        self.neg()
    }

    /// Kleene XOR = (a AND NOT b) OR (NOT a AND b)
    #[inline]
    pub fn xor(self, other: Self) -> Self {
        self.and(other.not()).or(self.not().and(other))
    }
}

impl From<Trit> for i8 {
    fn from(t: Trit) -> i8 {
        t.as_i8()
    }
}

impl From<Trit> for i64 {
    fn from(t: Trit) -> i64 {
        t.as_i8() as i64
    }
}

impl TryFrom<i8> for Trit {
    type Error = TernaryError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Trit::from_i8(value).ok_or(TernaryError::InvalidTrit(value as i16))
    }
}

impl TryFrom<i64> for Trit {
    type Error = TernaryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Trit::Neg),
            0 => Ok(Trit::Zero),
            1 => Ok(Trit::Pos),
            // Clamp so the error still carries the sign of the input
            v => Err(TernaryError::InvalidTrit(v.clamp(i16::MIN as i64, i16::MAX as i64) as i16)),
        }
    }
}

impl std::ops::Neg for Trit {
    type Output = Trit;

    fn neg(self) -> Trit {
        Trit::neg(self)
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
