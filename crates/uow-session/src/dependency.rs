//! Dependency solver: three independent edge categories, one topological
//! sort algorithm (§4.5).

use std::collections::HashMap;

use uow_core::Error;

use crate::handle::EntityHandle;

/// The three independent dependency categories a flush consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyCategory {
    Insertion,
    Update,
    Deletion,
}

/// Holds `dependent -> dependency` edges per category. An edge means the
/// dependency must be processed before the dependent.
#[derive(Debug, Default)]
pub struct DependencySolver {
    edges: HashMap<DependencyCategory, HashMap<EntityHandle, Vec<EntityHandle>>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

impl DependencySolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    pub fn add_edge(
        &mut self,
        category: DependencyCategory,
        dependent: EntityHandle,
        dependency: EntityHandle,
    ) {
        self.edges
            .entry(category)
            .or_default()
            .entry(dependent)
            .or_default()
            .push(dependency);
    }

    /// Remove every edge in every category that mentions `handle`, either as
    /// a dependent or as a dependency.
    pub fn clear_dependencies(&mut self, handle: &EntityHandle) {
        for by_dependent in self.edges.values_mut() {
            by_dependent.remove(handle);
            for deps in by_dependent.values_mut() {
                deps.retain(|d| d != handle);
            }
        }
    }

    /// Topologically order `nodes` against the edges registered for
    /// `category`. Nodes with no edges are placed last, after every node
    /// that participates in an edge.
    ///
    /// Uses three-color DFS (§4.5): a node hit while `Visiting` closes a
    /// cycle; a node already `Visited` is skipped, not an error, since
    /// sharing a dependency across multiple dependents is expected.
    ///
    /// `include_partial_order` controls whether a raised `CyclicDependency`
    /// carries the best-effort ordering computed before the cycle closed
    /// (§6 `fail_on_cyclic_dependency: false`); when `false` the error's
    /// `partial_order` is always empty.
    pub fn order(
        &self,
        category: DependencyCategory,
        nodes: &[EntityHandle],
        include_partial_order: bool,
    ) -> Result<Vec<EntityHandle>, Error> {
        let empty = HashMap::new();
        let by_dependent = self.edges.get(&category).unwrap_or(&empty);

        let participates = |n: &EntityHandle| -> bool {
            by_dependent.get(n).is_some_and(|deps| !deps.is_empty())
                || by_dependent.values().any(|deps| deps.contains(n))
        };
        let mut connected = Vec::with_capacity(nodes.len());
        let mut isolated = Vec::new();
        for node in nodes {
            if participates(node) {
                connected.push(node.clone());
            } else {
                isolated.push(node.clone());
            }
        }

        let mut marks: HashMap<EntityHandle, Mark> = nodes
            .iter()
            .map(|n| (n.clone(), Mark::Unvisited))
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        let mut stack: Vec<EntityHandle> = Vec::new();

        for node in &connected {
            if matches!(marks.get(node), Some(Mark::Unvisited) | None) {
                visit(node, by_dependent, &mut marks, &mut stack, &mut order, include_partial_order)?;
            }
        }
        order.extend(isolated);
        Ok(order)
    }
}

fn visit(
    node: &EntityHandle,
    by_dependent: &HashMap<EntityHandle, Vec<EntityHandle>>,
    marks: &mut HashMap<EntityHandle, Mark>,
    stack: &mut Vec<EntityHandle>,
    order: &mut Vec<EntityHandle>,
    include_partial_order: bool,
) -> Result<(), Error> {
    match marks.get(node) {
        Some(Mark::Visited) => return Ok(()),
        Some(Mark::Visiting) => {
            let mut cycle: Vec<String> = stack
                .iter()
                .skip_while(|h| *h != node)
                .map(|h| format!("{:?}", h))
                .collect();
            cycle.push(format!("{node:?}"));
            let partial_order = if include_partial_order {
                order.iter().map(|h| format!("{h:?}")).collect()
            } else {
                Vec::new()
            };
            return Err(Error::CyclicDependency {
                cycle_path: cycle,
                partial_order,
            });
        }
        _ => {}
    }

    marks.insert(node.clone(), Mark::Visiting);
    stack.push(node.clone());

    if let Some(deps) = by_dependent.get(node) {
        for dep in deps {
            visit(dep, by_dependent, marks, stack, order, include_partial_order)?;
        }
    }

    stack.pop();
    marks.insert(node.clone(), Mark::Visited);
    order.push(node.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use uow_core::Value;

    #[derive(Debug, Clone)]
    struct Dummy;

    impl uow_core::Entity for Dummy {
        fn class_name(&self) -> &'static str {
            "Dummy"
        }
        fn primary_key(&self) -> Option<Vec<Value>> {
            None
        }
        fn current_fields(&self) -> Map<String, Value> {
            Map::new()
        }
        fn apply_fields(&mut self, _values: &Map<String, Value>) {}
    }

    fn h() -> EntityHandle {
        EntityHandle::new(Dummy)
    }

    #[test]
    fn dependency_precedes_dependent() {
        let order_item = h();
        let order = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(
            DependencyCategory::Insertion,
            order_item.clone(),
            order.clone(),
        );
        let result = solver
            .order(DependencyCategory::Insertion, &[order.clone(), order_item.clone()], false)
            .unwrap();
        let order_pos = result.iter().position(|h| *h == order).unwrap();
        let item_pos = result.iter().position(|h| *h == order_item).unwrap();
        assert!(order_pos < item_pos);
    }

    #[test]
    fn node_with_no_edges_still_appears() {
        let solver = DependencySolver::new();
        let a = h();
        let result = solver.order(DependencyCategory::Insertion, &[a.clone()], false).unwrap();
        assert_eq!(result, vec![a]);
    }

    #[test]
    fn cycle_is_detected() {
        let x = h();
        let y = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, x.clone(), y.clone());
        solver.add_edge(DependencyCategory::Insertion, y.clone(), x.clone());
        let err = solver
            .order(DependencyCategory::Insertion, &[x, y], false)
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn shared_dependency_is_not_an_error() {
        let base = h();
        let a = h();
        let b = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, a.clone(), base.clone());
        solver.add_edge(DependencyCategory::Insertion, b.clone(), base.clone());
        let result = solver
            .order(DependencyCategory::Insertion, &[a.clone(), b.clone(), base.clone()], false)
            .unwrap();
        assert_eq!(result.len(), 3);
        let base_pos = result.iter().position(|h| *h == base).unwrap();
        assert!(base_pos < result.iter().position(|h| *h == a).unwrap());
        assert!(base_pos < result.iter().position(|h| *h == b).unwrap());
    }

    #[test]
    fn clear_dependencies_removes_all_edges_for_handle() {
        let x = h();
        let y = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, x.clone(), y.clone());
        solver.clear_dependencies(&y);
        let result = solver
            .order(DependencyCategory::Insertion, &[x.clone(), y.clone()], false)
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn partial_order_is_empty_unless_requested() {
        let x = h();
        let y = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, x.clone(), y.clone());
        solver.add_edge(DependencyCategory::Insertion, y.clone(), x.clone());
        let err = solver
            .order(DependencyCategory::Insertion, &[x.clone(), y.clone()], false)
            .unwrap_err();
        match err {
            Error::CyclicDependency { partial_order, .. } => assert!(partial_order.is_empty()),
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn isolated_nodes_are_placed_last() {
        // §4.5: insertion set [A(no edges), B, C] with edge B -> C yields
        // [C, B, A] — A last, after every node that participates in an edge.
        let a = h();
        let b = h();
        let c = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, b.clone(), c.clone());
        let result = solver
            .order(DependencyCategory::Insertion, &[a.clone(), b.clone(), c.clone()], false)
            .unwrap();
        assert_eq!(result, vec![c, b, a]);
    }

    #[test]
    fn partial_order_is_populated_when_requested() {
        let x = h();
        let y = h();
        let mut solver = DependencySolver::new();
        solver.add_edge(DependencyCategory::Insertion, x.clone(), y.clone());
        solver.add_edge(DependencyCategory::Insertion, y.clone(), x.clone());
        let err = solver
            .order(DependencyCategory::Insertion, &[x.clone(), y.clone()], true)
            .unwrap_err();
        match err {
            Error::CyclicDependency { cycle_path, .. } => assert_eq!(cycle_path.len(), 3),
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }
}
