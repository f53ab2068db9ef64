use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::{ValueError, ValueResult};
use super::quantity::{join_suffix, magnitude_ops, Magnitude, Quantity};

/// A money amount, e.g. `1.75 €`.
///
/// A price always holds exactly two fractional digits. Parsing, every setter and every
/// arithmetic result round half-up (away from zero) right away, so rounding accumulates step by
/// step rather than only when the price is displayed.
#[derive(Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub struct Price {
    quantity: Quantity,
}

fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

impl Price {
    pub fn new<S: Into<String>>(value: Decimal, currency: S) -> Self {
        Price::from_quantity(Quantity::with_suffix(value, currency))
    }

    pub fn parse(input: &str) -> ValueResult<Self> {
        Quantity::parse(input).map(Price::from_quantity)
    }

    fn from_quantity(mut quantity: Quantity) -> Self {
        quantity.set_value(round_money(quantity.value()));
        quantity.set_colon_notation(false);
        Price { quantity }
    }

    pub fn value(&self) -> Decimal {
        self.quantity.value()
    }

    pub fn set_value(&mut self, value: Decimal) {
        self.quantity.set_value(round_money(value));
    }

    pub fn currency(&self) -> &str {
        self.quantity.suffix()
    }

    pub fn set_currency<S: Into<String>>(&mut self, currency: S) {
        self.quantity.set_suffix(currency);
    }

    pub fn separator(&self) -> &str {
        self.quantity.separator()
    }

    pub fn set_separator<S: Into<String>>(&mut self, separator: S) {
        self.quantity.set_separator(separator);
    }

    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn format(&self) -> String {
        let number = round_money(self.value()).to_string();
        join_suffix(&number, self.separator(), self.currency())
    }

    pub fn divide<M: Magnitude>(&self, rhs: M) -> ValueResult<Price> {
        self.quantity.divide(rhs).map(Price::from_quantity)
    }

    pub fn as_quantity(&self) -> &Quantity {
        &self.quantity
    }

    fn with_value(&self, value: Decimal) -> Price {
        Price::from_quantity(self.quantity.with_value(value))
    }
}

magnitude_ops!(Price, Price::with_value);

impl Magnitude for Price {
    fn magnitude(&self) -> Decimal {
        self.value()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl FromStr for Price {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s)
    }
}

impl From<Price> for Quantity {
    fn from(price: Price) -> Self {
        price.quantity
    }
}
