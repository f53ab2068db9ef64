use std::fmt::Write;

use billfold_core::{Readable, ReadableMap};
use billfold_parser::ast::{Accessor, Expr, Filter, Literal, Segment, Template};
use tracing::trace;

use crate::error::EvalError;
use crate::source::FieldSource;
use crate::Renderer;

/// Name under which templates see the document being populated.
pub const THIS: &str = "this";

/// The names a template can see while it is rendered: `this` (the live document), the
/// per-call bindings and the populator's own bindings, in that order of precedence.
pub struct Scope<'a> {
    this: &'a dyn FieldSource,
    extra: &'a ReadableMap,
    bindings: &'a ReadableMap,
}

enum Target {
    This,
    Value(Readable),
}

impl<'a> Scope<'a> {
    pub fn new(
        this: &'a dyn FieldSource,
        bindings: &'a ReadableMap,
        extra: &'a ReadableMap,
    ) -> Scope<'a> {
        Scope {
            this,
            extra,
            bindings,
        }
    }

    /// Value bound to `name`, `Null` when nothing is.
    pub fn lookup(&self, name: &str) -> Readable {
        self.extra
            .get(name)
            .or_else(|| self.bindings.get(name))
            .cloned()
            .unwrap_or(Readable::Null)
    }

    pub fn render_to_string(&self, template: &Template<'_>) -> Result<String, EvalError> {
        let mut rendered = String::with_capacity(template.source.len());
        self.render(template, &mut rendered)?;
        Ok(rendered)
    }

    pub fn eval(&self, expr: &Expr<'_>) -> Result<Readable, EvalError> {
        match expr {
            Expr::Literal(literal) => literal_value(literal),
            Expr::Path { root, accessors } => self.eval_path(root, accessors),
            Expr::Concat(parts) => {
                let mut joined = String::new();
                for part in parts {
                    joined.push_str(&to_text(&self.eval(part)?));
                }
                Ok(Readable::String(joined))
            }
            Expr::Filtered { expr, filters } => {
                let mut value = self.eval(expr)?;
                for filter in filters {
                    value = self.apply_filter(value, filter)?;
                }
                Ok(value)
            }
        }
    }

    fn field(&self, name: &str) -> Readable {
        match self.this.get_readable(name) {
            Some(value) => value,
            None => {
                trace!(field = name, "reference to unknown field");
                Readable::Null
            }
        }
    }

    fn eval_path(&self, root: &str, accessors: &[Accessor<'_>]) -> Result<Readable, EvalError> {
        let mut target = if root == THIS {
            Target::This
        } else {
            Target::Value(self.lookup(root))
        };

        for accessor in accessors {
            target = Target::Value(match (target, accessor) {
                (Target::This, Accessor::Attribute(name)) => self.field(name),
                (Target::This, Accessor::Index(key)) => self.field(&to_text(&self.eval(key)?)),
                (Target::This, Accessor::Call { method, args }) if *method == "get" => {
                    let (key, default) = self.get_arguments(args)?;
                    match self.field(&key) {
                        Readable::Null => default,
                        value => value,
                    }
                }
                (Target::This, Accessor::Call { method, .. }) => {
                    return Err(EvalError::UnknownMethod {
                        method: method.to_string(),
                        target: THIS,
                    })
                }
                (Target::Value(value), Accessor::Attribute(name)) => attribute(&value, name),
                (Target::Value(value), Accessor::Index(key)) => index(&value, &self.eval(key)?),
                (Target::Value(value), Accessor::Call { method, args }) if *method == "get" => {
                    let (key, default) = self.get_arguments(args)?;
                    match attribute(&value, &key) {
                        Readable::Null => default,
                        found => found,
                    }
                }
                (Target::Value(value), Accessor::Call { method, .. }) => {
                    return Err(EvalError::UnknownMethod {
                        method: method.to_string(),
                        target: kind_name(&value),
                    })
                }
            });
        }

        Ok(match target {
            Target::This => Readable::Object(
                self.this
                    .field_names()
                    .into_iter()
                    .map(|name| {
                        let value = self.field(&name);
                        (name, value)
                    })
                    .collect(),
            ),
            Target::Value(value) => value,
        })
    }

    /// `get(key)` or `get(key, default)`.
    fn get_arguments(&self, args: &[Expr<'_>]) -> Result<(String, Readable), EvalError> {
        match args {
            [key] => Ok((to_text(&self.eval(key)?), Readable::Null)),
            [key, default] => Ok((to_text(&self.eval(key)?), self.eval(default)?)),
            _ => Err(EvalError::Arity {
                name: "get".to_string(),
                expected: "1 or 2",
                found: args.len(),
            }),
        }
    }

    fn apply_filter(&self, value: Readable, filter: &Filter<'_>) -> Result<Readable, EvalError> {
        let args = filter
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let arity = |expected: usize, label: &'static str| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(EvalError::Arity {
                    name: filter.name.to_string(),
                    expected: label,
                    found: args.len(),
                })
            }
        };

        Ok(match filter.name {
            "upper" => {
                arity(0, "0")?;
                Readable::String(to_text(&value).to_uppercase())
            }
            "lower" => {
                arity(0, "0")?;
                Readable::String(to_text(&value).to_lowercase())
            }
            "trim" => {
                arity(0, "0")?;
                Readable::String(to_text(&value).trim().to_string())
            }
            "title" => {
                arity(0, "0")?;
                Readable::String(title_case(&to_text(&value)))
            }
            "default" => {
                arity(1, "1")?;
                match value {
                    Readable::Null => args[0].clone(),
                    Readable::String(ref s) if s.is_empty() => args[0].clone(),
                    value => value,
                }
            }
            "replace" => {
                arity(2, "2")?;
                Readable::String(to_text(&value).replace(&to_text(&args[0]), &to_text(&args[1])))
            }
            "length" => {
                arity(0, "0")?;
                let length = match &value {
                    Readable::Null => 0,
                    Readable::String(s) => s.chars().count(),
                    Readable::Array(items) => items.len(),
                    Readable::Object(map) => map.len(),
                    other => to_text(other).chars().count(),
                };
                Readable::from(length as u64)
            }
            other => return Err(EvalError::UnknownFilter(other.to_string())),
        })
    }
}

impl<'t, W: Write> Renderer<&'t Template<'_>, W> for Scope<'_> {
    type Error = EvalError;
    fn render(&self, template: &'t Template<'_>, write: &mut W) -> Result<(), Self::Error> {
        for segment in &template.segments {
            self.render(segment, write)?;
        }
        Ok(())
    }
}

impl<'t, W: Write> Renderer<&'t Segment<'_>, W> for Scope<'_> {
    type Error = EvalError;
    fn render(&self, segment: &'t Segment<'_>, write: &mut W) -> Result<(), Self::Error> {
        match segment {
            Segment::Text(text) => write.write_str(text)?,
            Segment::Placeholder { expr, .. } => {
                let value = self.eval(expr)?;
                self.render(&value, write)?;
            }
            // Expansion leaves raw blocks alone; unescaping is a separate pass.
            Segment::Raw { source, .. } => write.write_str(source)?,
        }
        Ok(())
    }
}

impl<'t, W: Write> Renderer<&'t Readable, W> for Scope<'_> {
    type Error = EvalError;
    fn render(&self, value: &'t Readable, write: &mut W) -> Result<(), Self::Error> {
        match value {
            Readable::Null => {}
            Readable::String(s) => write.write_str(s)?,
            other => write.write_str(&other.to_string())?,
        }
        Ok(())
    }
}

/// Text a value renders as: nothing for null, strings unquoted, everything else as compact JSON.
pub fn to_text(value: &Readable) -> String {
    match value {
        Readable::Null => String::new(),
        Readable::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn literal_value(literal: &Literal<'_>) -> Result<Readable, EvalError> {
    Ok(match literal {
        Literal::Str(s) => Readable::String(s.to_string()),
        Literal::Number(n) => match n.parse::<i64>() {
            Ok(int) => Readable::from(int),
            Err(_) => n
                .parse::<f64>()
                .map(Readable::from)
                .map_err(|_| EvalError::Number(n.to_string()))?,
        },
        Literal::Bool(b) => Readable::Bool(*b),
        Literal::None => Readable::Null,
    })
}

fn attribute(value: &Readable, name: &str) -> Readable {
    match value {
        Readable::Object(map) => map.get(name).cloned().unwrap_or(Readable::Null),
        _ => Readable::Null,
    }
}

fn index(value: &Readable, key: &Readable) -> Readable {
    match (value, key) {
        (Readable::Array(items), Readable::Number(n)) => {
            let position = n.as_i64().and_then(|i| {
                if i < 0 {
                    items.len().checked_sub(i.unsigned_abs() as usize)
                } else {
                    Some(i as usize)
                }
            });
            position
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Readable::Null)
        }
        (Readable::Object(_), key) => attribute(value, &to_text(key)),
        _ => Readable::Null,
    }
}

fn kind_name(value: &Readable) -> &'static str {
    match value {
        Readable::Null => "none",
        Readable::Bool(_) => "boolean",
        Readable::Number(_) => "number",
        Readable::String(_) => "string",
        Readable::Array(_) => "list",
        Readable::Object(_) => "mapping",
    }
}

fn title_case(text: &str) -> String {
    let mut titled = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if word_start {
                titled.extend(c.to_uppercase());
            } else {
                titled.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            titled.push(c);
            word_start = true;
        }
    }
    titled
}

#[cfg(test)]
mod tests {
    use super::*;
    use billfold_parser::{parse, parse_expression};
    use serde_json::json;

    fn map(value: Readable) -> ReadableMap {
        serde_json::from_value(value).unwrap()
    }

    fn eval(expr: &str, this: &ReadableMap, bindings: &ReadableMap) -> Readable {
        Scope::new(this, bindings, &ReadableMap::new())
            .eval(&parse_expression(expr).unwrap())
            .unwrap()
    }

    #[test]
    fn paths_and_calls() {
        let this = map(json!({ "total": "10.00 €", "lines": [1, 2, 3] }));
        let bindings = map(json!({ "client": { "name": "ACME", "tags": ["a", "b"] } }));

        assert_eq!(eval("this.get('total')", &this, &bindings), json!("10.00 €"));
        assert_eq!(eval("this.total", &this, &bindings), json!("10.00 €"));
        assert_eq!(eval("this['lines'][-1]", &this, &bindings), json!(3));
        assert_eq!(eval("this.get('nope')", &this, &bindings), Readable::Null);
        assert_eq!(eval("this.get('nope', 'n/a')", &this, &bindings), json!("n/a"));
        assert_eq!(eval("client.name", &this, &bindings), json!("ACME"));
        assert_eq!(eval("client.tags[1]", &this, &bindings), json!("b"));
        assert_eq!(eval("client.get('name')", &this, &bindings), json!("ACME"));
        assert_eq!(eval("client.missing.deeper", &this, &bindings), Readable::Null);
        assert_eq!(eval("nobody", &this, &bindings), Readable::Null);
    }

    #[test]
    fn per_call_bindings_win() {
        let this = ReadableMap::new();
        let bindings = map(json!({ "who": "default" }));
        let extra = map(json!({ "who": "override" }));
        let scope = Scope::new(&this, &bindings, &extra);
        assert_eq!(
            scope.eval(&parse_expression("who").unwrap()).unwrap(),
            json!("override")
        );
    }

    #[test]
    fn filters() {
        let this = ReadableMap::new();
        let bindings = map(json!({ "name": "  acme corp  ", "empty": "", "items": [1, 2] }));
        assert_eq!(eval("name | trim | upper", &this, &bindings), json!("ACME CORP"));
        assert_eq!(eval("name | trim | title", &this, &bindings), json!("Acme Corp"));
        assert_eq!(eval("'MiXed' | lower", &this, &bindings), json!("mixed"));
        assert_eq!(eval("empty | default('none given')", &this, &bindings), json!("none given"));
        assert_eq!(eval("missing | default(0)", &this, &bindings), json!(0));
        assert_eq!(eval("'a-b-c' | replace('-', '/')", &this, &bindings), json!("a/b/c"));
        assert_eq!(eval("items | length", &this, &bindings), json!(2));
        assert_eq!(eval("'héllo' | length", &this, &bindings), json!(5));
    }

    #[test]
    fn filter_errors() {
        let this = ReadableMap::new();
        let bindings = ReadableMap::new();
        let scope = Scope::new(&this, &bindings, &bindings);
        assert_eq!(
            scope.eval(&parse_expression("'x' | shout").unwrap()),
            Err(EvalError::UnknownFilter("shout".into()))
        );
        assert!(matches!(
            scope.eval(&parse_expression("'x' | replace('a')").unwrap()),
            Err(EvalError::Arity { found: 1, .. })
        ));
        assert!(matches!(
            scope.eval(&parse_expression("this.keys()").unwrap()),
            Err(EvalError::UnknownMethod { target: "this", .. })
        ));
    }

    #[test]
    fn renders_values_as_text() {
        let this = map(json!({ "n": 3, "ok": true, "list": [1, "a"], "nothing": null }));
        let bindings = ReadableMap::new();
        let scope = Scope::new(&this, &bindings, &bindings);
        let template =
            parse("{{ this.n }}|{{ this.ok }}|{{ this.list }}|{{ this.nothing }}|{{ 1.5 }}")
                .unwrap();
        assert_eq!(
            scope.render_to_string(&template).unwrap(),
            r#"3|true|[1,"a"]||1.5"#
        );
    }

    #[test]
    fn concatenation_and_raw() {
        let this = map(json!({ "number": "2024-001" }));
        let bindings = ReadableMap::new();
        let scope = Scope::new(&this, &bindings, &bindings);
        let template =
            parse("{{ 'Invoice ' ~ this.number }} {% raw %}{{ kept }}{% endraw %}").unwrap();
        assert_eq!(
            scope.render_to_string(&template).unwrap(),
            "Invoice 2024-001 {% raw %}{{ kept }}{% endraw %}"
        );
    }
}
