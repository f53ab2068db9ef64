use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FIELD_REFERENCE: Regex =
        Regex::new(r#"this\s*\.\s*get\(\s*(?:'([^']*)'|"([^"]*)")\s*\)"#)
            .expect("field reference pattern is valid");
}

/// Names of the fields `text` reads from `this`, in order of first appearance.
///
/// Templates that parse are walked as a syntax tree, see [`Template::referenced_fields`]. Text
/// that does not parse is scanned for `this.get('name')` calls instead, raw blocks included.
///
/// [`Template::referenced_fields`]: crate::ast::Template::referenced_fields
pub fn referenced_fields(text: &str) -> Vec<&str> {
    match crate::parse(text) {
        Ok(template) => template.referenced_fields(),
        Err(_) => scan_get_calls(text),
    }
}

fn scan_get_calls(text: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = Vec::new();
    for captures in FIELD_REFERENCE.captures_iter(text) {
        if let Some(name) = captures.get(1).or_else(|| captures.get(2)) {
            if !fields.contains(&name.as_str()) {
                fields.push(name.as_str());
            }
        }
    }
    fields
}
