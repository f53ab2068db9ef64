use std::collections::HashSet;

use billfold_core::{Readable, ReadableMap};
use billfold_parser::ast::Segment;
use billfold_parser::parse;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{PopulateError, PopulateNotice};
use crate::graph::ReferenceGraph;
use crate::scope::Scope;
use crate::source::FieldSource;

/// What to do with fields that reference each other in a loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Expand anyway, each field seeing the values the others had before the run, and report a
    /// [`PopulateNotice::CyclicReference`].
    Preserve,
    /// Leave the fields untouched and report a [`PopulateError::CyclicReference`].
    Reject,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::Preserve
    }
}

/// Outcome of a population run. Errors are per field; every other field was still processed.
#[derive(Debug, Default)]
pub struct PopulateReport {
    pub errors: Vec<PopulateError>,
    pub notices: Vec<PopulateNotice>,
    /// Fields whose value changed, in the order they were written.
    pub updated: Vec<String>,
}

impl PopulateReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn failed_fields(&self) -> HashSet<String> {
        self.errors
            .iter()
            .flat_map(|e| match e {
                PopulateError::CyclicReference { fields } => fields.clone(),
                other => vec![other.field().to_string()],
            })
            .collect()
    }

    fn merge(&mut self, other: PopulateReport) {
        self.errors.extend(other.errors);
        self.notices.extend(other.notices);
        for field in other.updated {
            if !self.updated.contains(&field) {
                self.updated.push(field);
            }
        }
    }
}

/// Expands the placeholders in a document's text fields.
///
/// ```ignore
/// let report = Populator::new()
///     .with_binding("company", json!({ "name": "Billfold Ltd." }))
///     .populate(&mut record, &ReadableMap::new());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Populator {
    bindings: ReadableMap,
    cycle_policy: CyclePolicy,
}

impl Populator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `value` visible to every template under `name`.
    pub fn with_binding<S: Into<String>>(mut self, name: S, value: Readable) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_bindings(mut self, bindings: ReadableMap) -> Self {
        self.bindings.extend(bindings);
        self
    }

    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }

    pub fn bindings(&self) -> &ReadableMap {
        &self.bindings
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        self.cycle_policy
    }

    /// Expands then unescapes once. A placeholder inside a raw block therefore comes out as
    /// literal text and is expanded by the next call.
    pub fn populate<S>(&self, data: &mut S, extra: &ReadableMap) -> PopulateReport
    where
        S: FieldSource,
    {
        let mut report = self.expand(data, extra);
        let skip = report.failed_fields();
        report.merge(self.unescape_fields(data, &skip));
        debug!(
            updated = report.updated.len(),
            errors = report.errors.len(),
            notices = report.notices.len(),
            "populated"
        );
        report
    }

    /// Replaces every placeholder outside raw blocks with its rendered value.
    ///
    /// Fields are expanded so that a field is rendered after the fields it reads through
    /// `this.get(...)`, and `this` sees values already expanded in this run.
    pub fn expand<S>(&self, data: &mut S, extra: &ReadableMap) -> PopulateReport
    where
        S: FieldSource,
    {
        let mut report = PopulateReport::default();
        let templates = template_fields(data);
        let graph = ReferenceGraph::new(
            templates
                .iter()
                .map(|(field, text)| (field.as_str(), text.as_str())),
        );

        let mut skip = HashSet::new();
        for cycle in graph.cycles() {
            let fields: Vec<String> = cycle.iter().map(|f| f.to_string()).collect();
            match self.cycle_policy {
                CyclePolicy::Preserve => {
                    debug!(fields = ?fields, "expanding cyclic references with previous values");
                    report
                        .notices
                        .push(PopulateNotice::CyclicReference { fields });
                }
                CyclePolicy::Reject => {
                    debug!(fields = ?fields, "skipping cyclic references");
                    skip.extend(cycle);
                    report.errors.push(PopulateError::CyclicReference { fields });
                }
            }
        }

        for field in graph.expansion_order() {
            if skip.contains(field) {
                continue;
            }
            let text = match templates.iter().find(|(name, _)| name == field) {
                Some((_, text)) => text,
                None => continue,
            };
            let template = match parse(text) {
                Ok(template) => template,
                Err(source) => {
                    report.errors.push(PopulateError::Syntax {
                        field: field.to_string(),
                        source,
                    });
                    continue;
                }
            };
            let has_placeholders = template
                .segments
                .iter()
                .any(|s| matches!(s, Segment::Placeholder { .. }));
            if !has_placeholders {
                continue;
            }

            let rendered = {
                let this: &dyn FieldSource = &*data;
                Scope::new(this, &self.bindings, extra).render_to_string(&template)
            };
            match rendered {
                Ok(rendered) => {
                    trace!(field, rendered = %rendered, "expanded");
                    write_back(data, field, rendered, &mut report);
                }
                Err(source) => report.errors.push(PopulateError::Evaluation {
                    field: field.to_string(),
                    source,
                }),
            }
        }
        report
    }

    /// Removes one level of raw blocks from every text field.
    pub fn unescape<S>(&self, data: &mut S) -> PopulateReport
    where
        S: FieldSource,
    {
        self.unescape_fields(data, &HashSet::new())
    }

    fn unescape_fields<S>(&self, data: &mut S, skip: &HashSet<String>) -> PopulateReport
    where
        S: FieldSource,
    {
        let mut report = PopulateReport::default();
        for (field, text) in template_fields(data) {
            if skip.contains(&field) || !text.contains("{%") {
                continue;
            }
            match parse(&text) {
                Ok(template) if template.has_raw_blocks() => {
                    let unescaped = template.unescaped();
                    trace!(field = %field, unescaped = %unescaped, "unescaped");
                    write_back(data, &field, unescaped, &mut report);
                }
                Ok(_) => {}
                Err(source) => report.errors.push(PopulateError::Syntax { field, source }),
            }
        }
        report
    }
}

/// Text fields that contain template syntax, in declaration order.
fn template_fields<S>(data: &S) -> Vec<(String, String)>
where
    S: FieldSource,
{
    data.field_names()
        .into_iter()
        .filter_map(|field| match data.get_readable(&field) {
            Some(Readable::String(text)) if text.contains("{{") || text.contains("{%") => {
                Some((field, text))
            }
            _ => None,
        })
        .collect()
}

fn write_back<S>(data: &mut S, field: &str, text: String, report: &mut PopulateReport)
where
    S: FieldSource,
{
    match data.set_readable(field, Readable::String(text)) {
        Ok(()) => report.updated.push(field.to_string()),
        Err(source) => report.errors.push(PopulateError::Conversion {
            field: field.to_string(),
            source,
        }),
    }
}
