use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::{ValueError, ValueResult};
use super::quantity::{join_suffix, magnitude_ops, Magnitude, Quantity};

/// A percentage such as `19 %`.
///
/// The readable magnitude is the percent number while the internal value is the fraction: `19 %`
/// holds `0.19`. Arithmetic works on the fraction, so multiplying a quantity of `10` by `10 %`
/// yields `1.0`. The readable form is always re-derived as a whole percent number.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Percentage {
    quantity: Quantity,
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::from_fraction(Decimal::ZERO)
    }
}

fn hundred() -> Decimal {
    Decimal::from(100)
}

impl Percentage {
    /// A percentage holding `fraction` internally, formatted with the default `%` suffix.
    pub fn from_fraction(fraction: Decimal) -> Self {
        Percentage {
            quantity: Quantity::with_suffix(fraction, "%"),
        }
    }

    pub fn from_percent(percent: Decimal) -> Self {
        Percentage::from_fraction((percent / hundred()).normalize())
    }

    /// Parses `19 %`, `19%` or a bare `19`. A missing suffix becomes `%`.
    pub fn parse(input: &str) -> ValueResult<Self> {
        let mut quantity = Quantity::parse(input)?;
        quantity.set_value((quantity.value() / hundred()).normalize());
        quantity.set_colon_notation(false);
        if quantity.suffix().is_empty() {
            quantity.set_suffix("%");
            quantity.set_separator(" ");
        }
        Ok(Percentage { quantity })
    }

    /// The internal fraction (`0.19` for `19 %`).
    pub fn value(&self) -> Decimal {
        self.quantity.value()
    }

    pub fn set_value(&mut self, fraction: Decimal) {
        self.quantity.set_value(fraction);
    }

    /// The readable percent number, rounded to a whole number.
    pub fn percent(&self) -> Decimal {
        (self.value() * hundred())
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
    }

    pub fn suffix(&self) -> &str {
        self.quantity.suffix()
    }

    pub fn separator(&self) -> &str {
        self.quantity.separator()
    }

    pub fn format(&self) -> String {
        join_suffix(&self.percent().to_string(), self.separator(), self.suffix())
    }

    pub fn divide<M: Magnitude>(&self, rhs: M) -> ValueResult<Percentage> {
        self.quantity
            .divide(rhs)
            .map(|quantity| Percentage { quantity })
    }

    fn with_value(&self, value: Decimal) -> Percentage {
        Percentage {
            quantity: self.quantity.with_value(value),
        }
    }
}

magnitude_ops!(Percentage, Percentage::with_value);

impl Magnitude for Percentage {
    fn magnitude(&self) -> Decimal {
        self.value()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl FromStr for Percentage {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Percentage::parse(s)
    }
}
