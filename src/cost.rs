//! Cost Computation and Input Validation
//!
//! Validated wrappers for the price multiplier and counter delta, plus the
//! `{count, cost}` payload shared by API responses and broadcasts.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwearError};

/// Largest delta magnitude accepted (integers are exact in f64 up to 2^53)
pub const MAX_DELTA: f64 = 9_007_199_254_740_991.0;

/// Largest accepted price per swear
///
/// Any stored count times this, in cents, is still a finite `f64`.
pub const MAX_PRICE: f64 = 1_000_000.0;

/// Round `count * price` to cents, half away from zero
pub fn cost(count: u64, price: PriceMultiplier) -> f64 {
    (count as f64 * price.get() * 100.0).round() / 100.0
}

/// A strictly positive price per counted swear, at most [`MAX_PRICE`]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct PriceMultiplier(f64);

impl PriceMultiplier {
    /// Validate a raw price multiplier
    pub fn new(raw: f64) -> Result<Self> {
        if !raw.is_finite() || raw <= 0.0 || raw > MAX_PRICE {
            return Err(SwearError::InvalidPrice);
        }
        Ok(Self(raw))
    }

    /// Parse a price multiplier from a query parameter
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let value = raw
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or(SwearError::InvalidPrice)?;
        Self::new(value)
    }

    /// Raw multiplier value
    pub fn get(self) -> f64 {
        self.0
    }
}

/// A signed integer change to the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delta(i64);

impl Delta {
    /// Validate a raw delta; it must be a finite integer
    pub fn new(raw: f64) -> Result<Self> {
        if !raw.is_finite() || raw.fract() != 0.0 || raw.abs() > MAX_DELTA {
            return Err(SwearError::InvalidDelta);
        }
        Ok(Self(raw as i64))
    }

    /// Parse a delta from a query parameter such as `by=-1`
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let value = raw
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or(SwearError::InvalidDelta)?;
        Self::new(value)
    }

    /// Raw delta value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Delta {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Counter value with its cost at one subscriber's price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    /// Current counter value
    pub count: u64,
    /// `count * price`, rounded to two decimals
    pub cost: f64,
}

impl Tally {
    /// Price `count` at `price`
    pub fn priced(count: u64, price: PriceMultiplier) -> Self {
        Self {
            count,
            cost: cost(count, price),
        }
    }

    /// The zero tally, identical at every price
    pub fn zero() -> Self {
        Self { count: 0, cost: 0.0 }
    }
}
