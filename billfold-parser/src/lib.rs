//! Parser for the template text stored in billfold document fields.
//!
//! A field value such as `Invoice {{ this.get('number') }} for {{ client.name | upper }}` is
//! parsed into a [`Template`](ast::Template) of text, placeholders and raw blocks. Evaluation
//! lives in `billfold-render`; this crate only knows the syntax.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser as PestParser;

use ast::{Accessor, Expr, Filter, Literal, Segment, Template};
use error::{ParseError, ParseResult};

pub mod ast;
pub mod error;
pub mod references;

pub use references::referenced_fields;

#[derive(PestParser)]
#[grammar = "template.pest"]
pub struct TemplateParser;

fn optional_rule<'i>(rule: Rule, pairs: &mut Pairs<'i, Rule>) -> Option<Pair<'i, Rule>> {
    match pairs.peek() {
        Some(ref p) if p.as_rule() == rule => pairs.next(),
        _ => None,
    }
}

fn next_pair<'i>(
    pairs: &mut Pairs<'i, Rule>,
    expected: &str,
    parent: &Pair<'i, Rule>,
) -> ParseResult<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| ParseError::invalid_state_with_span(expected, parent.as_span()))
}

/// Parses a whole field value.
pub fn parse(input: &str) -> ParseResult<Template<'_>> {
    let parsed = TemplateParser::parse(Rule::template, input)?
        .next()
        .ok_or_else(|| ParseError::invalid_state("non-empty parse result"))?;

    let mut segments = Vec::new();
    for pair in parsed.into_inner() {
        match pair.as_rule() {
            Rule::EOI => break,
            Rule::text => segments.push(Segment::Text(pair.as_str())),
            Rule::placeholder => {
                let source = pair.as_str();
                let mut inner = pair.clone().into_inner();
                let expr = expression(next_pair(&mut inner, "expression", &pair)?)?;
                segments.push(Segment::Placeholder { source, expr });
            }
            Rule::raw_block => {
                let source = pair.as_str();
                let mut inner = pair.clone().into_inner();
                let body = next_pair(&mut inner, "raw block content", &pair)?.as_str();
                segments.push(Segment::Raw { source, body });
            }
            _ => {
                return Err(ParseError::invalid_state_with_span(
                    "text, placeholder or raw block",
                    pair.as_span(),
                ))
            }
        }
    }

    Ok(Template {
        source: input,
        segments,
    })
}

/// Parses a single expression, as it would appear between `{{` and `}}`.
pub fn parse_expression(input: &str) -> ParseResult<Expr<'_>> {
    let wrapped = TemplateParser::parse(Rule::expression, input)?
        .next()
        .ok_or_else(|| ParseError::invalid_state("non-empty parse result"))?;
    if wrapped.as_str().len() != input.trim_end().len() {
        let trailing = &input[wrapped.as_str().len()..];
        return Err(ParseError::from(pest::error::Error::new_from_pos(
            pest::error::ErrorVariant::<Rule>::CustomError {
                message: format!("unexpected trailing input '{}'", trailing.trim()),
            },
            wrapped.as_span().end_pos(),
        )));
    }
    expression(wrapped)
}

/// Removes one level of raw blocks from `input` and keeps everything else verbatim.
pub fn unescape(input: &str) -> ParseResult<String> {
    Ok(parse(input)?.unescaped())
}

fn expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair.as_span();
    let mut parts = pair
        .into_inner()
        .map(filtered)
        .collect::<ParseResult<Vec<_>>>()?;
    match parts.len() {
        0 => Err(ParseError::invalid_state_with_span("operand", span)),
        1 => Ok(parts.remove(0)),
        _ => Ok(Expr::Concat(parts)),
    }
}

fn filtered(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let operand = pairs
        .next()
        .ok_or_else(|| ParseError::invalid_state_with_span("operand", span))?;
    let expr = primary(operand)?;
    let filters = pairs.map(filter).collect::<ParseResult<Vec<_>>>()?;
    if filters.is_empty() {
        Ok(expr)
    } else {
        Ok(Expr::Filtered {
            expr: Box::new(expr),
            filters,
        })
    }
}

fn primary(pair: Pair<Rule>) -> ParseResult<Expr> {
    Ok(match pair.as_rule() {
        Rule::string => Expr::Literal(Literal::Str(string(pair)?)),
        Rule::number => Expr::Literal(Literal::Number(pair.as_str())),
        Rule::boolean => Expr::Literal(Literal::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::none => Expr::Literal(Literal::None),
        Rule::path => path(pair)?,
        Rule::expression => expression(pair)?,
        _ => {
            return Err(ParseError::invalid_state_with_span(
                "literal, name or parenthesized expression",
                pair.as_span(),
            ))
        }
    })
}

fn string(pair: Pair<Rule>) -> ParseResult<&str> {
    let span = pair.as_span();
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str())
        .ok_or_else(|| ParseError::invalid_state_with_span("string content", span))
}

fn path(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let root = pairs
        .next()
        .ok_or_else(|| ParseError::invalid_state_with_span("identifier", span.clone()))?
        .as_str();

    let mut accessors = Vec::new();
    for accessor in pairs {
        let accessor_span = accessor.as_span();
        let rule = accessor.as_rule();
        let mut inner = accessor.into_inner();
        accessors.push(match rule {
            Rule::attribute => Accessor::Attribute(
                inner
                    .next()
                    .ok_or_else(|| ParseError::invalid_state_with_span("attribute name", accessor_span))?
                    .as_str(),
            ),
            Rule::call => {
                let method = inner
                    .next()
                    .ok_or_else(|| {
                        ParseError::invalid_state_with_span("method name", accessor_span.clone())
                    })?
                    .as_str();
                let args = match optional_rule(Rule::arguments, &mut inner) {
                    Some(args) => arguments(args)?,
                    None => {
                        return Err(ParseError::invalid_state_with_span(
                            "argument list",
                            accessor_span,
                        ))
                    }
                };
                Accessor::Call { method, args }
            }
            Rule::index => Accessor::Index(expression(
                inner
                    .next()
                    .ok_or_else(|| ParseError::invalid_state_with_span("index", accessor_span))?,
            )?),
            _ => {
                return Err(ParseError::invalid_state_with_span(
                    "attribute, call or index",
                    accessor_span,
                ))
            }
        });
    }

    Ok(Expr::Path { root, accessors })
}

fn filter(pair: Pair<Rule>) -> ParseResult<Filter> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let name = pairs
        .next()
        .ok_or_else(|| ParseError::invalid_state_with_span("filter name", span))?
        .as_str();
    let args = match optional_rule(Rule::arguments, &mut pairs) {
        Some(args) => arguments(args)?,
        None => Vec::new(),
    };
    Ok(Filter { name, args })
}

fn arguments(pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
    pair.into_inner().map(expression).collect()
}
