// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp::Ordering;
use core::fmt::{self, Debug, Display, Formatter};
use core::str::FromStr;
use std::rc::Rc;

use num_bigint::BigInt as NumBigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::ser::Serializer;
use serde::Serialize;

use crate::error::{Error, Result};

pub type BigInt = NumBigInt;

/// Numeric values produced by literals, variables and arithmetic.
///
/// Integer arithmetic that overflows `i64` is promoted to `BigInt`.
/// Any operation involving a `Float` is carried out in `f64`.
#[derive(Clone)]
pub enum Number {
    Int(i64),
    Float(f64),
    BigInt(Rc<BigInt>),
}

impl Number {
    fn from_bigint_owned(value: BigInt) -> Self {
        match value.to_i64() {
            Some(i) => Number::Int(i),
            None => Number::BigInt(Rc::new(value)),
        }
    }

    fn to_bigint_owned(&self) -> Option<BigInt> {
        match self {
            Number::Int(v) => Some(BigInt::from(*v)),
            Number::BigInt(v) => Some((**v).clone()),
            Number::Float(_) => None,
        }
    }

    /// Lossy conversion used by floating point arithmetic and comparisons.
    pub fn to_f64_lossy(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
            Number::BigInt(v) => match v.to_f64() {
                Some(f) => f,
                None if v.is_negative() => f64::NEG_INFINITY,
                None => f64::INFINITY,
            },
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, Number::Float(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(v) => *v == 0,
            Number::Float(f) => *f == 0.0,
            Number::BigInt(v) => v.is_zero(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(*v),
            Number::BigInt(v) => v.to_i64(),
            Number::Float(f) => {
                if f.is_finite()
                    && f.fract() == 0.0
                    && *f >= i64::MIN as f64
                    && *f <= i64::MAX as f64
                {
                    Some(*f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.to_f64_lossy()
    }

    pub fn as_big(&self) -> Option<BigInt> {
        self.to_bigint_owned()
    }

    /// Decimal text without exponent for integers, shortest round-trip text
    /// for floats.
    pub fn format_decimal(&self) -> String {
        match self {
            Number::Int(v) => v.to_string(),
            Number::BigInt(v) => v.to_string(),
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 => {
                format!("{f:.1}")
            }
            Number::Float(f) => f.to_string(),
        }
    }

    fn int_op(
        &self,
        rhs: &Self,
        checked: fn(i64, i64) -> Option<i64>,
        big: fn(BigInt, BigInt) -> BigInt,
    ) -> Number {
        if let (Number::Int(a), Number::Int(b)) = (self, rhs) {
            if let Some(v) = checked(*a, *b) {
                return Number::Int(v);
            }
        }
        match (self.to_bigint_owned(), rhs.to_bigint_owned()) {
            (Some(a), Some(b)) => Number::from_bigint_owned(big(a, b)),
            _ => Number::Float(f64::NAN),
        }
    }

    fn any_float(&self, rhs: &Self) -> bool {
        matches!(self, Number::Float(_)) || matches!(rhs, Number::Float(_))
    }

    pub fn add(&self, rhs: &Self) -> Number {
        if self.any_float(rhs) {
            return Number::Float(self.to_f64_lossy() + rhs.to_f64_lossy());
        }
        self.int_op(rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Self) -> Number {
        if self.any_float(rhs) {
            return Number::Float(self.to_f64_lossy() - rhs.to_f64_lossy());
        }
        self.int_op(rhs, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Self) -> Number {
        if self.any_float(rhs) {
            return Number::Float(self.to_f64_lossy() * rhs.to_f64_lossy());
        }
        self.int_op(rhs, i64::checked_mul, |a, b| a * b)
    }

    /// Division always produces a float, like `div` in EL.
    pub fn divide(&self, rhs: &Self) -> Number {
        Number::Float(self.to_f64_lossy() / rhs.to_f64_lossy())
    }

    pub fn modulo(&self, rhs: &Self) -> Result<Number> {
        if self.any_float(rhs) {
            return Ok(Number::Float(self.to_f64_lossy() % rhs.to_f64_lossy()));
        }
        if rhs.is_zero() {
            return Err(Error::evaluation("modulo by zero"));
        }
        Ok(self.int_op(rhs, i64::checked_rem, |a, b| a % b))
    }

    pub fn neg(&self) -> Number {
        match self {
            Number::Int(v) => match v.checked_neg() {
                Some(n) => Number::Int(n),
                None => Number::from_bigint_owned(-BigInt::from(*v)),
            },
            Number::Float(f) => Number::Float(-f),
            Number::BigInt(v) => Number::from_bigint_owned(-(**v).clone()),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Number::Int(v) => serializer.serialize_i64(*v),
            Number::Float(f) => serializer.serialize_f64(*f),
            // Without arbitrary precision json numbers cannot hold it.
            Number::BigInt(v) => match v.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&v.to_string()),
            },
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(value as i64)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(v) => Number::Int(v),
            Err(_) => Number::from_bigint_owned(BigInt::from(value)),
        }
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Number::Int(v),
            Err(_) => Number::from_bigint_owned(BigInt::from(value)),
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl From<BigInt> for Number {
    fn from(value: BigInt) -> Self {
        Number::from_bigint_owned(value)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseNumberError;

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseNumberError);
        }

        let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(v) = trimmed.parse::<i64>() {
                return Ok(Number::Int(v));
            }
            if let Some(v) = BigInt::parse_bytes(trimmed.as_bytes(), 10) {
                return Ok(Number::from_bigint_owned(v));
            }
        }

        trimmed
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| ParseNumberError)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.to_bigint_owned(), other.to_bigint_owned()) {
            return a == b;
        }
        self.to_f64_lossy() == other.to_f64_lossy()
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.to_bigint_owned(), other.to_bigint_owned()) {
            return Some(a.cmp(&b));
        }
        self.to_f64_lossy().partial_cmp(&other.to_f64_lossy())
    }
}
