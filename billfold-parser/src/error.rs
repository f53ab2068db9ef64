use std::error::Error;
use std::fmt;

use pest::Span;

use super::Rule;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
pub enum ParseErrorKind {
    /// Input is invalid in some way.
    InvalidInput { message: String },
    /// Parser has reached an invalid state (most likely a bug in the parser).
    InvalidParserState { message: String },
}

#[derive(Debug)]
pub struct ParseError {
    /// The type of error.
    pub kind: ParseErrorKind,
    /// The (line, column) location of the error in the input.
    pub location: (usize, usize),
    source: Option<Box<dyn Error + 'static + Send + Sync>>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::InvalidInput { message } => {
                write!(f, "Invalid template: {}", message)?;
            }
            ParseErrorKind::InvalidParserState { message } => {
                write!(f, "Parser has reached an invalid state (please report this as a bug): expected {}", message)?;
            }
        }
        write!(f, " at line {} column {}", self.location.0, self.location.1)
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl ParseError {
    pub(crate) fn invalid_state<T: ToString>(msg: T) -> ParseError {
        ParseError {
            kind: ParseErrorKind::InvalidParserState {
                message: msg.to_string(),
            },
            location: (0, 0),
            source: None,
        }
    }

    pub(crate) fn invalid_state_with_span<T: ToString>(msg: T, span: Span) -> ParseError {
        ParseError {
            kind: ParseErrorKind::InvalidParserState {
                message: msg.to_string(),
            },
            location: span.start_pos().line_col(),
            source: None,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let err = err.renamed_rules(|rule| match *rule {
            Rule::EOI => "end of input".to_string(),
            Rule::WHITESPACE => "whitespace".to_string(),
            Rule::template => "template".to_string(),
            Rule::text => "text".to_string(),
            Rule::raw_block => "raw block".to_string(),
            Rule::raw_body => "raw block content".to_string(),
            Rule::placeholder => "placeholder ('{{ ... }}')".to_string(),
            Rule::expression => "expression".to_string(),
            Rule::filtered => "expression".to_string(),
            Rule::filter => "filter ('| name')".to_string(),
            Rule::path => "name".to_string(),
            Rule::call => "method call".to_string(),
            Rule::attribute => "attribute".to_string(),
            Rule::index => "index ('[...]')".to_string(),
            Rule::arguments => "argument list".to_string(),
            Rule::string => "quoted string".to_string(),
            Rule::single_quoted | Rule::double_quoted => "string content".to_string(),
            Rule::number => "number".to_string(),
            Rule::boolean => "boolean value".to_string(),
            Rule::none => "'none'".to_string(),
            Rule::identifier => "identifier".to_string(),
            #[allow(unreachable_patterns)]
            other => format!("{:?}", other),
        });
        let location = match &err.line_col {
            pest::error::LineColLocation::Pos(ref p) => *p,
            pest::error::LineColLocation::Span(ref p, _) => *p,
        };
        ParseError {
            kind: ParseErrorKind::InvalidInput {
                message: format!("{}", err),
            },
            location,
            source: Some(Box::new(err)),
        }
    }
}
