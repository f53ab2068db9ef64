use thiserror::Error;

pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised by the numeric value types.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ValueError {
    /// The input string does not follow the quantity grammar.
    #[error("could not parse {input:?}: {reason}")]
    Format { input: String, reason: String },
    #[error("division by zero")]
    DivisionByZero,
}

impl ValueError {
    pub(crate) fn format<I: ToString, R: ToString>(input: I, reason: R) -> ValueError {
        ValueError::Format {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A readable value could not be turned into the internal form of a field type (or back).
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConversionError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: &'static str, found: String },
}

impl ConversionError {
    pub(crate) fn mismatch<T: ToString>(expected: &'static str, found: T) -> ConversionError {
        ConversionError::Mismatch {
            expected,
            found: found.to_string(),
        }
    }
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum FieldError {
    #[error("field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },
    #[error("'{0}' is not a field of this document")]
    UnknownField(String),
}

impl FieldError {
    pub(crate) fn conversion<F: ToString>(field: F, source: ConversionError) -> FieldError {
        FieldError::Conversion {
            field: field.to_string(),
            source,
        }
    }
}
