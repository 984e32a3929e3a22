//! # Money Module
//!
//! Provides the `Money` type and the rounding collaborator used for every
//! monetary output of the engine.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    100.00 × 8.25 / 100 = 8.250000000000002  ❌ WRONG!                   │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 decimal                                          │
//! │    100.00 × 8.25 / 100 = 8.2500 exactly                                 │
//! │    Rounding happens ONCE, explicitly, with a named mode                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use levy_core::money::{round, Money, RoundingMode};
//! use rust_decimal::Decimal;
//!
//! let price = Money::from_cents(10000); // 100.00
//! let tax = price.percent_of(Decimal::new(825, 2)); // 8.25%
//! assert_eq!(round(tax, 2, RoundingMode::HalfUp), Money::from_cents(825));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::CoreError;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// 10^18, the largest magnitude accepted for a line total, subtotal,
/// shipping or discount amount.
const MAX_SUPPORTED_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the transaction's working currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: Allows negative values for refunds and discounts
/// - **Single field tuple struct**: Zero-cost abstraction over `Decimal`
/// - **Serialized as a string**: No precision loss through JSON
///
/// Currency is deliberately not part of the type: amounts reaching the
/// engine are already converted into one working currency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from cents (two implied decimal places).
    ///
    /// ## Example
    /// ```rust
    /// use levy_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.to_string(), "10.99");
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a percentage rate: `amount × rate / 100`.
    ///
    /// The result is NOT rounded. Callers pass it through [`round`] once
    /// all arithmetic for a tax line is done.
    ///
    /// ## Example
    /// ```rust
    /// use levy_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let base = Money::from_cents(10500); // 105.00
    /// let tax = base.percent_of(Decimal::TEN);
    /// assert_eq!(tax, Money::from_cents(1050));
    /// ```
    pub fn percent_of(&self, rate: Decimal) -> Money {
        Money(self.0 * rate / ONE_HUNDRED)
    }

    /// Largest amount the calculator accepts as input.
    ///
    /// Rates applied to anything at or below this stay well inside
    /// `Decimal`'s range, so tax arithmetic never overflows.
    pub const MAX_SUPPORTED: Money = Money(MAX_SUPPORTED_AMOUNT);

    /// Multiplies money by a quantity.
    ///
    /// Panics on overflow; use [`checked_mul_quantity`](Self::checked_mul_quantity)
    /// for caller-supplied values.
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// `self × qty`, or `None` on overflow.
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(Decimal::from(qty)).map(Money)
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// True when the magnitude is above [`Money::MAX_SUPPORTED`].
    #[inline]
    pub fn exceeds_supported(&self) -> bool {
        self.0.abs() > MAX_SUPPORTED_AMOUNT
    }

    /// Multiplies money by an arbitrary decimal factor.
    #[inline]
    pub fn scale(&self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }

    /// Returns `self / other`, or zero when `other` is zero.
    ///
    /// Every ratio in the engine (effective rates, proration shares) goes
    /// through this so that no division-by-zero can escape.
    pub fn ratio_of(&self, other: Money) -> Decimal {
        if other.is_zero() {
            Decimal::ZERO
        } else {
            self.0 / other.0
        }
    }

    /// Rounds this amount with the given precision and mode.
    #[inline]
    pub fn round(&self, precision: u32, mode: RoundingMode) -> Money {
        round(*self, precision, mode)
    }
}

// =============================================================================
// Rounding Collaborator
// =============================================================================

/// How a monetary amount is rounded to its final precision.
///
/// ```text
/// ┌──────────────┬──────────┬──────────┬──────────┐
/// │ mode         │  2.345   │  2.355   │ -2.341   │
/// ├──────────────┼──────────┼──────────┼──────────┤
/// │ half_up      │  2.35    │  2.36    │ -2.34    │
/// │ half_down    │  2.34    │  2.35    │ -2.34    │
/// │ half_even    │  2.34    │  2.36    │ -2.34    │
/// │ up           │  2.35    │  2.36    │ -2.35    │
/// │ down         │  2.34    │  2.35    │ -2.34    │
/// │ ceiling      │  2.35    │  2.36    │ -2.34    │
/// │ floor        │  2.34    │  2.35    │ -2.35    │
/// └──────────────┴──────────┴──────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Midpoint rounds away from zero.
    #[default]
    HalfUp,
    /// Midpoint rounds toward zero.
    HalfDown,
    /// Midpoint rounds to the nearest even digit (banker's rounding).
    HalfEven,
    /// Always away from zero.
    Up,
    /// Always toward zero (truncation).
    Down,
    /// Toward positive infinity.
    Ceiling,
    /// Toward negative infinity.
    Floor,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::HalfUp => "half_up",
            RoundingMode::HalfDown => "half_down",
            RoundingMode::HalfEven => "half_even",
            RoundingMode::Up => "up",
            RoundingMode::Down => "down",
            RoundingMode::Ceiling => "ceiling",
            RoundingMode::Floor => "floor",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoundingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "half_up" => Ok(RoundingMode::HalfUp),
            "half_down" => Ok(RoundingMode::HalfDown),
            "half_even" | "bankers" | "banker" => Ok(RoundingMode::HalfEven),
            "up" => Ok(RoundingMode::Up),
            "down" | "truncate" => Ok(RoundingMode::Down),
            "ceiling" | "ceil" => Ok(RoundingMode::Ceiling),
            "floor" => Ok(RoundingMode::Floor),
            other => Err(CoreError::UnknownVariant {
                kind: "rounding mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Rounds `amount` to `precision` decimal places using `mode`.
///
/// This is the single rounding entry point: the calculator applies it to
/// every tax line and total it produces.
pub fn round(amount: Money, precision: u32, mode: RoundingMode) -> Money {
    Money(amount.0.round_dp_with_strategy(precision, mode.strategy()))
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
