use std::fmt;

use billfold_core::FieldError;
use billfold_parser::error::ParseError;
use thiserror::Error;

/// A placeholder expression could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("unknown method '{method}' on {target}")]
    UnknownMethod { method: String, target: &'static str },
    #[error("'{name}' takes {expected} argument(s), {found} given")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },
    #[error("invalid number literal '{0}'")]
    Number(String),
    #[error("could not write rendered text")]
    Fmt(#[from] fmt::Error),
}

/// A field that could not be populated. The field keeps its previous value.
#[derive(Error, Debug)]
pub enum PopulateError {
    #[error("field '{field}': {source}")]
    Syntax {
        field: String,
        #[source]
        source: ParseError,
    },
    #[error("field '{field}': {source}")]
    Evaluation {
        field: String,
        #[source]
        source: EvalError,
    },
    #[error("field '{field}': expanded value rejected: {source}")]
    Conversion {
        field: String,
        #[source]
        source: FieldError,
    },
    #[error("cyclic reference between fields {}", .fields.join(", "))]
    CyclicReference { fields: Vec<String> },
}

impl PopulateError {
    /// The field the error is about; the first field of the cycle for cyclic references.
    pub fn field(&self) -> &str {
        match self {
            PopulateError::Syntax { field, .. }
            | PopulateError::Evaluation { field, .. }
            | PopulateError::Conversion { field, .. } => field,
            PopulateError::CyclicReference { fields } => {
                fields.first().map(String::as_str).unwrap_or_default()
            }
        }
    }
}

/// Something worth knowing about a successful population run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateNotice {
    /// The fields reference each other; they were expanded with the values they had before the
    /// run, so the result depends on expansion order.
    CyclicReference { fields: Vec<String> },
}

impl fmt::Display for PopulateNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulateNotice::CyclicReference { fields } => write!(
                f,
                "cyclic reference between fields {}, expanded with previous values",
                fields.join(", ")
            ),
        }
    }
}
