//! Syntax tree of a parsed template. Every node borrows from the template source.

/// A parsed field value: literal text, placeholders and raw blocks, in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct Template<'i> {
    pub source: &'i str,
    pub segments: Vec<Segment<'i>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Segment<'i> {
    Text(&'i str),
    /// `{{ expr }}`; `source` is the whole placeholder including the braces.
    Placeholder { source: &'i str, expr: Expr<'i> },
    /// `{% raw %}body{% endraw %}`; `body` may itself contain raw blocks.
    Raw { source: &'i str, body: &'i str },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr<'i> {
    Literal(Literal<'i>),
    /// A binding followed by attribute lookups, indexing and method calls: `client.address[0]`,
    /// `this.get('total')`.
    Path {
        root: &'i str,
        accessors: Vec<Accessor<'i>>,
    },
    /// `a ~ b ~ c`
    Concat(Vec<Expr<'i>>),
    /// `expr | upper | default('n/a')`
    Filtered {
        expr: Box<Expr<'i>>,
        filters: Vec<Filter<'i>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal<'i> {
    Str(&'i str),
    /// Kept as written; the evaluator decides how to represent it.
    Number(&'i str),
    Bool(bool),
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Accessor<'i> {
    Attribute(&'i str),
    Index(Expr<'i>),
    Call { method: &'i str, args: Vec<Expr<'i>> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter<'i> {
    pub name: &'i str,
    pub args: Vec<Expr<'i>>,
}

impl<'i> Template<'i> {
    /// True when the template contains neither placeholders nor raw blocks.
    pub fn is_plain(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }

    pub fn has_raw_blocks(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Raw { .. }))
    }

    /// The source with one level of raw blocks removed; placeholders and text are kept verbatim.
    pub fn unescaped(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder { source, .. } => out.push_str(source),
                Segment::Raw { body, .. } => out.push_str(body),
            }
        }
        out
    }

    /// Fields the placeholders read from `this`, in order of first appearance: `this.name`,
    /// `this['name']` and `this.get('name')`. Raw blocks are not looked into, and keys that are
    /// only known at render time are not reported.
    pub fn referenced_fields(&self) -> Vec<&'i str> {
        let mut fields = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { expr, .. } = segment {
                expr.collect_references(&mut fields);
            }
        }
        fields
    }
}

impl<'i> Expr<'i> {
    fn collect_references(&self, fields: &mut Vec<&'i str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path { root, accessors } => {
                if *root == "this" {
                    if let Some(field) = accessors.first().and_then(Accessor::field_name) {
                        if !fields.contains(&field) {
                            fields.push(field);
                        }
                    }
                }
                for accessor in accessors {
                    match accessor {
                        Accessor::Attribute(_) => {}
                        Accessor::Index(key) => key.collect_references(fields),
                        Accessor::Call { args, .. } => {
                            args.iter().for_each(|a| a.collect_references(fields))
                        }
                    }
                }
            }
            Expr::Concat(parts) => parts.iter().for_each(|p| p.collect_references(fields)),
            Expr::Filtered { expr, filters } => {
                expr.collect_references(fields);
                for filter in filters {
                    filter.args.iter().for_each(|a| a.collect_references(fields));
                }
            }
        }
    }

    fn as_str_literal(&self) -> Option<&'i str> {
        match self {
            Expr::Literal(Literal::Str(s)) => Some(*s),
            _ => None,
        }
    }
}

impl<'i> Accessor<'i> {
    /// The field named by the first accessor after `this`.
    fn field_name(&self) -> Option<&'i str> {
        match self {
            Accessor::Attribute(name) => Some(*name),
            Accessor::Index(key) => key.as_str_literal(),
            Accessor::Call { method, args } if *method == "get" => {
                args.first().and_then(Expr::as_str_literal)
            }
            Accessor::Call { .. } => None,
        }
    }
}
