//! # Dependency Graph
//!
//! An explicit adjacency structure keyed by rule ID, with the two graph
//! passes the engine needs:
//!
//! - [`DependencyGraph::resolve`]: three-colour depth-first traversal from
//!   one rule, yielding its transitive dependencies before it. Meeting a
//!   node that is still on the traversal path (grey) is a cycle.
//! - [`DependencyGraph::execution_order`]: Kahn's algorithm over the graph
//!   restricted to a set of rules. The ready queue is ordered, so the
//!   output is deterministic.
//!
//! Both passes are pure: the graph is materialized from the store first.

use std::collections::{BTreeMap, BTreeSet};

use lce_core::{LceError, LceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Edges from each rule to the rules it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule and its direct dependencies, replacing any previous entry.
    pub fn insert(&mut self, rule_id: impl Into<String>, dependencies: BTreeSet<String>) {
        self.edges.insert(rule_id.into(), dependencies);
    }

    /// Whether the rule is in the graph.
    pub fn contains(&self, rule_id: &str) -> bool {
        self.edges.contains_key(rule_id)
    }

    /// Direct dependencies of a rule.
    pub fn dependencies(&self, rule_id: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(rule_id)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Transitive dependencies of `root` in an order where no rule precedes
    /// one it depends on, ending with `root` itself.
    ///
    /// Fails with `NotFound` when a reachable dependency is not in the
    /// graph and `CircularDependency` when the traversal revisits a rule on
    /// its current path.
    pub fn resolve(&self, root: &str) -> LceResult<Vec<String>> {
        if !self.contains(root) {
            return Err(LceError::not_found("rule", root));
        }
        let mut colour: BTreeMap<&str, Colour> = BTreeMap::new();
        let mut path: Vec<&str> = Vec::new();
        let mut order = Vec::new();
        self.visit(root, &mut colour, &mut path, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        colour: &mut BTreeMap<&'a str, Colour>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> LceResult<()> {
        match colour.get(node).copied().unwrap_or(Colour::White) {
            Colour::Black => return Ok(()),
            Colour::Grey => {
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(node.to_string());
                return Err(LceError::CircularDependency { path: cycle });
            }
            Colour::White => {}
        }

        let deps = self
            .edges
            .get(node)
            .ok_or_else(|| LceError::not_found("rule", node))?;
        colour.insert(node, Colour::Grey);
        path.push(node);
        for dep in deps {
            self.visit(dep, colour, path, order)?;
        }
        path.pop();
        colour.insert(node, Colour::Black);
        order.push(node.to_string());
        Ok(())
    }

    /// Order `rule_ids` so that every rule follows its in-set dependencies.
    ///
    /// Dependencies outside the set are ignored. Every ID must be in the
    /// graph. If a cycle leaves rules unordered the call fails with
    /// `CircularDependency` naming them, and no partial order is returned.
    pub fn execution_order(&self, rule_ids: &BTreeSet<String>) -> LceResult<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for id in rule_ids {
            let deps = self
                .edges
                .get(id)
                .ok_or_else(|| LceError::not_found("rule", id.as_str()))?;
            let in_set: Vec<&str> = deps
                .iter()
                .filter(|d| rule_ids.contains(*d))
                .map(String::as_str)
                .collect();
            in_degree.insert(id.as_str(), in_set.len());
            for dep in in_set {
                dependents.entry(dep).or_default().push(id.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(rule_ids.len());
        while let Some(next) = ready.pop_first() {
            order.push(next.to_string());
            for dependent in dependents.get(next).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() < rule_ids.len() {
            let unresolved: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(LceError::CircularDependency { path: unresolved });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (id, deps) in edges {
            g.insert(*id, set(deps));
        }
        g
    }

    #[test]
    fn resolve_lists_dependencies_first() {
        let g = graph(&[("C", &["B"]), ("B", &["A"]), ("A", &[])]);
        assert_eq!(g.resolve("C").unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn resolve_visits_shared_dependency_once() {
        let g = graph(&[("D", &["B", "C"]), ("B", &["A"]), ("C", &["A"]), ("A", &[])]);
        assert_eq!(g.resolve("D").unwrap(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn resolve_reports_cycle_path() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        match g.resolve("A").unwrap_err() {
            LceError::CircularDependency { path } => assert_eq!(path, vec!["A", "B", "C", "A"]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn resolve_missing_dependency_is_not_found() {
        let g = graph(&[("A", &["GHOST"])]);
        assert!(matches!(g.resolve("A"), Err(LceError::NotFound { .. })));
    }

    #[test]
    fn kahn_order_is_deterministic() {
        let g = graph(&[("Z", &[]), ("A", &["Z"]), ("M", &[]), ("B", &["A", "M"])]);
        let order = g.execution_order(&set(&["Z", "A", "M", "B"])).unwrap();
        assert_eq!(order, vec!["M", "Z", "A", "B"]);
    }

    #[test]
    fn kahn_ignores_dependencies_outside_the_set() {
        let g = graph(&[("A", &["OUT"]), ("B", &["A"])]);
        assert_eq!(g.execution_order(&set(&["A", "B"])).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn kahn_cycle_names_unresolved_rules() {
        let g = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &[])]);
        match g.execution_order(&set(&["A", "B", "C"])).unwrap_err() {
            LceError::CircularDependency { path } => assert_eq!(path, vec!["A", "B"]),
            other => panic!("unexpected error {other}"),
        }
    }

    // Random DAGs: node i may only depend on nodes j < i.
    fn arb_dag() -> impl Strategy<Value = DependencyGraph> {
        (1usize..12).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
                move |matrix| {
                    let mut g = DependencyGraph::new();
                    for i in 0..n {
                        let deps = (0..i)
                            .filter(|j| matrix[i][*j])
                            .map(|j| format!("R{j:02}"))
                            .collect();
                        g.insert(format!("R{i:02}"), deps);
                    }
                    g
                },
            )
        })
    }

    proptest! {
        #[test]
        fn acyclic_sets_order_every_rule_after_its_dependencies(g in arb_dag()) {
            let ids: BTreeSet<String> = g.edges.keys().cloned().collect();
            let order = g.execution_order(&ids).unwrap();
            prop_assert_eq!(order.len(), ids.len());
            let position: BTreeMap<&str, usize> =
                order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
            for (id, deps) in &g.edges {
                for dep in deps {
                    prop_assert!(position[dep.as_str()] < position[id.as_str()]);
                }
            }
        }

        #[test]
        fn adding_a_back_edge_always_fails(g in arb_dag()) {
            let n = g.len();
            prop_assume!(n >= 2);
            let mut cyclic = g.clone();
            let last = format!("R{:02}", n - 1);
            let first = "R00".to_string();
            // Make the first node depend on the last, then close the loop.
            cyclic.insert(first.clone(), BTreeSet::from([last.clone()]));
            let mut last_deps = g.dependencies(&last).cloned().unwrap_or_default();
            last_deps.insert(first);
            cyclic.insert(last, last_deps);
            let ids: BTreeSet<String> = cyclic.edges.keys().cloned().collect();
            let is_cycle = matches!(
                cyclic.execution_order(&ids),
                Err(LceError::CircularDependency { .. })
            );
            prop_assert!(is_cycle);
        }

        #[test]
        fn resolve_ends_with_root_and_respects_edges(g in arb_dag(), pick in 0usize..12) {
            let root = format!("R{:02}", pick % g.len());
            let order = g.resolve(&root).unwrap();
            prop_assert_eq!(order.last(), Some(&root));
            for (i, id) in order.iter().enumerate() {
                for dep in g.dependencies(id).into_iter().flatten() {
                    let dep_pos = order.iter().position(|x| x == dep);
                    prop_assert!(matches!(dep_pos, Some(p) if p < i));
                }
            }
        }
    }
}
