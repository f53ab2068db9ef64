use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use pest::Parser;
use pest_derive::Parser as PestParser;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::{ValueError, ValueResult};

#[derive(PestParser)]
#[grammar = "quantity.pest"]
struct QuantityParser;

/// Anything that carries a decimal magnitude and may appear on the right-hand side of the
/// arithmetic operators of [`Quantity`], [`Price`](crate::Price) and
/// [`Percentage`](crate::Percentage).
pub trait Magnitude {
    fn magnitude(&self) -> Decimal;
}

impl Magnitude for Decimal {
    fn magnitude(&self) -> Decimal {
        *self
    }
}

macro_rules! integer_magnitude {
    ( $($ty:ty),* ) => {
        $(
            impl Magnitude for $ty {
                fn magnitude(&self) -> Decimal {
                    Decimal::from(*self)
                }
            }
        )*
    };
}

integer_magnitude!(i32, i64, u32, u64);

impl<M: Magnitude + ?Sized> Magnitude for &M {
    fn magnitude(&self) -> Decimal {
        (**self).magnitude()
    }
}

/// A decimal magnitude with a unit suffix, e.g. `3 h`, `1:45 min` or `12.5 kg`.
///
/// The whitespace between the number and the suffix is kept verbatim so that formatting
/// reproduces what was parsed. Numbers written as `H:MM` set the colon notation flag; the
/// quantity is then formatted in the same notation.
///
/// Equality and ordering only look at the magnitude, the suffix is ignored.
#[derive(Clone, Debug)]
pub struct Quantity {
    value: Decimal,
    suffix: String,
    separator: String,
    colon_notation: bool,
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::new(Decimal::ZERO)
    }
}

impl Quantity {
    pub fn new(value: Decimal) -> Self {
        Quantity {
            value,
            suffix: String::new(),
            separator: " ".to_string(),
            colon_notation: false,
        }
    }

    pub fn with_suffix<S: Into<String>>(value: Decimal, suffix: S) -> Self {
        Quantity {
            suffix: suffix.into(),
            ..Quantity::new(value)
        }
    }

    /// Parses strings such as `5`, `-2.5 kg`, `1:30 h` or `1:30h`.
    ///
    /// Fails when the string does not start with a number, when the number is not a valid
    /// decimal or when it contains more than one colon.
    pub fn parse(input: &str) -> ValueResult<Self> {
        let trimmed = input.trim();
        let pair = QuantityParser::parse(Rule::quantity, trimmed)
            .map_err(|_| ValueError::format(input, "expected a leading number"))?
            .next()
            .ok_or_else(|| ValueError::format(input, "empty parse result"))?;

        let mut quantity = Quantity::default();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::number => {
                    let (value, colon_notation) = parse_number(input, part.as_str())?;
                    quantity.value = value;
                    quantity.colon_notation = colon_notation;
                }
                Rule::separator => quantity.separator = part.as_str().to_string(),
                Rule::suffix => quantity.suffix = part.as_str().to_string(),
                _ => {}
            }
        }
        if quantity.suffix.is_empty() {
            quantity.separator = " ".to_string();
        }
        Ok(quantity)
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn set_value(&mut self, value: Decimal) {
        self.value = value;
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn set_suffix<S: Into<String>>(&mut self, suffix: S) {
        self.suffix = suffix.into();
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn set_separator<S: Into<String>>(&mut self, separator: S) {
        self.separator = separator.into();
    }

    pub fn uses_colon_notation(&self) -> bool {
        self.colon_notation
    }

    pub fn set_colon_notation(&mut self, colon_notation: bool) {
        self.colon_notation = colon_notation;
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// The readable form: number, separator and suffix. A bare number is written without a
    /// trailing separator.
    pub fn format(&self) -> String {
        let number = if self.colon_notation {
            colon_notation(self.value)
        } else {
            self.value.to_string()
        };
        join_suffix(&number, &self.separator, &self.suffix)
    }

    /// Divides the magnitude, keeping the unit of `self`.
    pub fn divide<M: Magnitude>(&self, rhs: M) -> ValueResult<Quantity> {
        let divisor = rhs.magnitude();
        if divisor.is_zero() {
            return Err(ValueError::DivisionByZero);
        }
        self.value
            .checked_div(divisor)
            .map(|value| self.with_value(value))
            .ok_or_else(|| ValueError::format(self.format(), "division overflows"))
    }

    /// A copy of `self` (suffix, separator, notation) holding another magnitude.
    pub(crate) fn with_value(&self, value: Decimal) -> Quantity {
        Quantity {
            value,
            suffix: self.suffix.clone(),
            separator: self.separator.clone(),
            colon_notation: self.colon_notation,
        }
    }
}

pub(crate) fn join_suffix(number: &str, separator: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        number.to_string()
    } else {
        format!("{}{}{}", number, separator, suffix)
    }
}

fn parse_number(input: &str, number: &str) -> ValueResult<(Decimal, bool)> {
    if !number.bytes().any(|b| b.is_ascii_digit()) {
        return Err(ValueError::format(input, "expected at least one digit"));
    }
    match number.matches(':').count() {
        0 => Decimal::from_str(number)
            .map(|value| (value, false))
            .map_err(|e| ValueError::format(input, e)),
        1 => parse_colon_notation(input, number).map(|value| (value, true)),
        n => Err(ValueError::format(
            input,
            format!("expected at most one ':' but found {}", n),
        )),
    }
}

fn parse_colon_notation(input: &str, number: &str) -> ValueResult<Decimal> {
    let (negative, unsigned) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number),
    };
    let (units, minutes) = unsigned
        .split_once(':')
        .ok_or_else(|| ValueError::format(input, "expected 'H:MM'"))?;
    let decimal = |s: &str| -> ValueResult<Decimal> {
        if s.is_empty() {
            Ok(Decimal::ZERO)
        } else {
            Decimal::from_str(s).map_err(|e| ValueError::format(input, e))
        }
    };
    let (units, minutes) = (decimal(units)?, decimal(minutes)?);
    let value = minutes
        .checked_div(Decimal::from(60))
        .and_then(|fraction| units.checked_add(fraction))
        .ok_or_else(|| ValueError::format(input, "magnitude out of range"))?;
    Ok(if negative { -value } else { value })
}

fn colon_notation(value: Decimal) -> String {
    let sixty = Decimal::from(60);
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    let magnitude = value.abs();
    let mut units = magnitude.trunc();
    let mut minutes = ((magnitude - units) * sixty)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if minutes >= sixty {
        units += Decimal::ONE;
        minutes -= sixty;
    }
    format!(
        "{}{}:{:0>2}",
        sign,
        units.normalize(),
        minutes.normalize().to_string()
    )
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl FromStr for Quantity {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::parse(s)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Quantity::new(value)
    }
}

impl Magnitude for Quantity {
    fn magnitude(&self) -> Decimal {
        self.value
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl PartialEq<Decimal> for Quantity {
    fn eq(&self, other: &Decimal) -> bool {
        self.value == *other
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// Implements `checked_add`, `checked_sub` and `checked_mul`, which report overflow as a
/// [`ValueError::Format`], plus `+`, `-` and `*` against any [`Magnitude`] for an owned value
/// and a reference. The operators panic on overflow. `$finish` rebuilds the receiver's type
/// around the computed decimal.
macro_rules! magnitude_ops {
    ( $ty:ty, $finish:path ) => {
        impl $ty {
            magnitude_ops!(@checked $finish, checked_add, "addition overflows");
            magnitude_ops!(@checked $finish, checked_sub, "subtraction overflows");
            magnitude_ops!(@checked $finish, checked_mul, "multiplication overflows");
        }

        magnitude_ops!(@op $ty, $finish, Add, add, +);
        magnitude_ops!(@op $ty, $finish, Sub, sub, -);
        magnitude_ops!(@op $ty, $finish, Mul, mul, *);
    };
    ( @checked $finish:path, $method:ident, $reason:expr ) => {
        pub fn $method<M: $crate::quantity::Magnitude>(
            &self,
            rhs: M,
        ) -> $crate::error::ValueResult<Self> {
            $crate::quantity::Magnitude::magnitude(self)
                .$method(rhs.magnitude())
                .map(|value| $finish(self, value))
                .ok_or_else(|| $crate::error::ValueError::format(self.format(), $reason))
        }
    };
    ( @op $ty:ty, $finish:path, $tr:ident, $method:ident, $op:tt ) => {
        impl<M: $crate::quantity::Magnitude> std::ops::$tr<M> for $ty {
            type Output = $ty;

            fn $method(self, rhs: M) -> $ty {
                let value = $crate::quantity::Magnitude::magnitude(&self) $op rhs.magnitude();
                $finish(&self, value)
            }
        }

        impl<'a, M: $crate::quantity::Magnitude> std::ops::$tr<M> for &'a $ty {
            type Output = $ty;

            fn $method(self, rhs: M) -> $ty {
                let value = $crate::quantity::Magnitude::magnitude(self) $op rhs.magnitude();
                $finish(self, value)
            }
        }
    };
}

pub(crate) use magnitude_ops;

magnitude_ops!(Quantity, Quantity::with_value);

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    macro_rules! parse_ok {
        ( $input:expr, $value:expr, $suffix:expr ) => {
            let q = Quantity::parse($input).unwrap();
            assert_eq!(q.value(), dec($value), "value of {:?}", $input);
            assert_eq!(q.suffix(), $suffix, "suffix of {:?}", $input);
        };
    }

    macro_rules! parse_fail {
        ( $input:expr ) => {
            assert!(Quantity::parse($input).is_err(), "{:?} should not parse", $input);
        };
    }

    #[test]
    fn parse() {
        parse_ok!("5", "5", "");
        parse_ok!("-2.5 kg", "-2.5", "kg");
        parse_ok!("12h", "12", "h");
        parse_ok!("  3   pieces  ", "3", "pieces");
        parse_ok!("1.75 €", "1.75", "€");
        parse_ok!("4 x 2", "4", "x 2");
        parse_ok!("1-2", "1", "-2");

        parse_fail!("");
        parse_fail!("abc");
        parse_fail!("- 5");
        parse_fail!(".");
        parse_fail!("1.2.3 m");
    }

    #[test]
    fn separator_is_kept() {
        let q = Quantity::parse("3   pieces").unwrap();
        assert_eq!(q.separator(), "   ");
        assert_eq!(q.format(), "3   pieces");

        let q = Quantity::parse("3pieces").unwrap();
        assert_eq!(q.separator(), "");
        assert_eq!(q.format(), "3pieces");
    }

    #[test]
    fn colon_notation() {
        let q = Quantity::parse("1:30").unwrap();
        assert_eq!(q.value(), dec("1.5"));
        assert!(q.uses_colon_notation());
        assert_eq!(q.format(), "1:30");

        let q = Quantity::parse("1:45 min").unwrap();
        assert_eq!(q.value(), dec("1.75"));
        assert_eq!(q.format(), "1:45 min");

        let q = Quantity::parse("-0:15 h").unwrap();
        assert_eq!(q.value(), dec("-0.25"));
        assert_eq!(q.format(), "-0:15 h");

        let q = Quantity::parse("1:20").unwrap();
        assert_eq!(q.format(), "1:20");

        parse_fail!("1:30:00");
        parse_fail!("1::30");
        parse_fail!("79228162514264337593543950335:59 h");
        parse_fail!("-79228162514264337593543950335:59 h");
    }

    #[test]
    fn colon_notation_format() {
        let mut q = Quantity::new(dec("1.5"));
        q.set_colon_notation(true);
        assert_eq!(q.format(), "1:30");

        q.set_value(dec("2.9999"));
        assert_eq!(q.format(), "3:00");

        q.set_value(dec("0.05"));
        q.set_suffix("h");
        assert_eq!(q.format(), "0:03 h");
    }

    #[test]
    fn round_trip() {
        for input in &["5", "-2.50 kg", "1:30 h", "0.125", "7 pieces", "3:07"] {
            let q = Quantity::parse(input).unwrap();
            let again = Quantity::parse(&q.format()).unwrap();
            assert_eq!(q.value(), again.value(), "round trip of {:?}", input);
            assert_eq!(q.format(), again.format());
        }
    }

    #[test]
    fn arithmetic_keeps_left_unit() {
        let hours = Quantity::parse("1:30 h").unwrap();
        let sum = &hours + Quantity::parse("2 min").unwrap();
        assert_eq!(sum.value(), dec("3.5"));
        assert_eq!(sum.suffix(), "h");
        assert!(sum.uses_colon_notation());
        assert_eq!(sum.format(), "3:30 h");

        let diff = Quantity::parse("10 kg").unwrap() - 4;
        assert_eq!(diff.format(), "6 kg");

        let product = Quantity::parse("2.5 m").unwrap() * dec("2");
        assert_eq!(product.value(), dec("5"));
        assert_eq!(product.suffix(), "m");
    }

    #[test]
    fn checked_arithmetic() {
        let hours = Quantity::parse("1:30 h").unwrap();
        assert_eq!(hours.checked_add(dec("0.5")).unwrap().format(), "2:00 h");
        assert_eq!(hours.checked_sub(2).unwrap().format(), "-0:30 h");
        assert_eq!(hours.checked_mul(&hours).unwrap().value(), dec("2.25"));

        let huge = Quantity::parse("79228162514264337593543950335 h").unwrap();
        assert!(matches!(huge.checked_mul(2), Err(ValueError::Format { .. })));
        assert!(matches!(huge.checked_add(&huge), Err(ValueError::Format { .. })));
        let negative = Quantity::parse("-79228162514264337593543950335 h").unwrap();
        assert!(matches!(negative.checked_sub(1), Err(ValueError::Format { .. })));
    }

    #[test]
    fn division() {
        let q = Quantity::parse("9 h").unwrap();
        assert_eq!(q.divide(3).unwrap().format(), "3 h");
        assert_eq!(q.divide(Decimal::ZERO), Err(ValueError::DivisionByZero));
        assert_eq!(
            q.divide(Quantity::parse("0 min").unwrap()),
            Err(ValueError::DivisionByZero)
        );
    }

    #[test]
    fn comparison_ignores_suffix() {
        let a = Quantity::parse("2 h").unwrap();
        let b = Quantity::parse("2.0 kg").unwrap();
        let c = Quantity::parse("3").unwrap();
        assert_eq!(a, b);
        assert!(a < c);
        assert!(c > b);
        assert_eq!(a.clone().max(c.clone()), c);
    }
}
