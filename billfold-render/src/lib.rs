//! Placeholder population for billfold documents.
//!
//! Text fields may contain `{{ expression }}` placeholders that read other fields of the same
//! document through `this.get('field')` or caller-supplied bindings. [`Populator`] expands them
//! in dependency order and writes the results back through the document's field types.

use std::fmt::Write;

use billfold_parser::ast::Template;

pub use error::{EvalError, PopulateError, PopulateNotice};
pub use graph::ReferenceGraph;
pub use populate::{CyclePolicy, PopulateReport, Populator};
pub use scope::{to_text, Scope};
pub use source::FieldSource;

pub mod error;
pub mod graph;
pub mod populate;
pub mod scope;
pub mod source;


pub trait Renderer<T, W: Write> {
    type Error;
    fn render(&self, renderable: T, write: &mut W) -> Result<(), Self::Error>;
}

/// Renders `template` into `w` with the names visible in `scope`.
pub fn render<W: Write>(w: &mut W, template: &Template<'_>, scope: &Scope<'_>) -> Result<(), EvalError> {
    scope.render(template, w)
}
