use std::collections::HashSet;

use billfold_parser::referenced_fields;
use indexmap::IndexSet;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::DfsPostOrder;

/// Which template fields read which other fields of `this`.
///
/// An edge `a -> b` means the text of `a` references `b`, so `b` has to be expanded first.
#[derive(Debug, Default)]
pub struct ReferenceGraph<'f> {
    fields: Vec<&'f str>,
    graph: DiGraphMap<&'f str, ()>,
}

impl<'f> ReferenceGraph<'f> {
    /// Builds the graph over `templates`, given as (field, text) pairs in declaration order.
    pub fn new<I>(templates: I) -> Self
    where
        I: IntoIterator<Item = (&'f str, &'f str)>,
    {
        let mut fields = Vec::new();
        let mut graph = DiGraphMap::new();
        for (field, text) in templates {
            fields.push(field);
            graph.add_node(field);
            for referenced in referenced_fields(text) {
                graph.add_edge(field, referenced, ());
            }
        }
        ReferenceGraph { fields, graph }
    }

    pub fn references(&self, field: &str) -> Vec<&'f str> {
        match self.fields.iter().find(|f| **f == field) {
            Some(&field) => self.graph.neighbors(field).collect(),
            None => Vec::new(),
        }
    }

    /// Expansion order: a depth-first post-order from every field that references another,
    /// followed by the fields that were not reached, in declaration order. Referenced names
    /// that are not template fields are left out.
    pub fn expansion_order(&self) -> Vec<&'f str> {
        let templates: HashSet<&str> = self.fields.iter().copied().collect();
        let mut order = IndexSet::with_capacity(self.fields.len());
        let mut dfs = DfsPostOrder::empty(&self.graph);

        for &start in &self.fields {
            if self.graph.neighbors(start).next().is_none() {
                continue;
            }
            dfs.move_to(start);
            while let Some(field) = dfs.next(&self.graph) {
                if templates.contains(field) {
                    order.insert(field);
                }
            }
        }
        order.extend(self.fields.iter().copied());
        order.into_iter().collect()
    }

    /// Groups of template fields that reference each other, directly or through other fields.
    /// A field referencing itself forms a group of one. Each group lists its fields in
    /// declaration order; groups are ordered by their first field.
    pub fn cycles(&self) -> Vec<Vec<&'f str>> {
        let position = |field: &str| self.fields.iter().position(|f| *f == field);
        let mut cycles: Vec<Vec<&'f str>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map_or(false, |&f| self.graph.contains_edge(f, f))
            })
            .map(|mut component| {
                component.retain(|f| position(*f).is_some());
                component.sort_by_key(|f| position(*f));
                component
            })
            .filter(|component| !component.is_empty())
            .collect();
        cycles.sort_by_key(|component| component.first().and_then(|f| position(*f)));
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_come_first() {
        let graph = ReferenceGraph::new(vec![
            ("greeting", "Dear {{ this.get('name') }}"),
            ("subject", "{{ this.get('greeting') }} re {{ this.get('number') }}"),
            ("name", "ACME"),
            ("number", "2024-{{ this.get('serial') }}"),
        ]);
        assert_eq!(
            graph.expansion_order(),
            vec!["name", "greeting", "number", "subject"]
        );
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn attribute_access_is_a_reference() {
        let graph = ReferenceGraph::new(vec![
            ("a", "{{ this.get('c') }}/{{ this.b }}"),
            ("b", "{{ this['c'] }}!"),
            ("c", "x"),
        ]);
        assert_eq!(graph.references("a"), vec!["c", "b"]);
        assert_eq!(graph.expansion_order(), vec!["c", "b", "a"]);
    }

    #[test]
    fn unreferenced_fields_keep_declaration_order() {
        let graph = ReferenceGraph::new(vec![("b", "plain"), ("a", "also plain")]);
        assert_eq!(graph.expansion_order(), vec!["b", "a"]);
    }

    #[test]
    fn unknown_targets_are_not_ordered() {
        let graph = ReferenceGraph::new(vec![("a", "{{ this.get('ghost') }}")]);
        assert_eq!(graph.references("a"), vec!["ghost"]);
        assert_eq!(graph.expansion_order(), vec!["a"]);
    }

    #[test]
    fn finds_cycles() {
        let graph = ReferenceGraph::new(vec![
            ("x", "plain"),
            ("b", "{{ this.get('a') }}"),
            ("a", "{{ this.get('b') }}"),
            ("me", "{{ this.get('me') }}"),
            ("c", "{{ this.get('a') }}"),
        ]);
        assert_eq!(graph.cycles(), vec![vec!["b", "a"], vec!["me"]]);
        let order = graph.expansion_order();
        assert_eq!(order.len(), 5);
        assert_eq!(order.last(), Some(&"x"));
    }
}
