//! Directed multigraph of file/scope dependencies, with transitive
//! subscription notification (spec.md §4.3).

use crate::events::{SignalBus, SubscriptionHandle};
use std::collections::{HashMap, HashSet};

/// Emitted once per affected node when `notify` walks the transitive
/// closure of dependents reachable from a changed node.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub node: String,
}

#[derive(Default)]
struct NodeEntry {
    /// Edges pointing *away* from this node (this node depends on them).
    depends_on: Vec<String>,
    /// Edges pointing *at* this node (these nodes depend on it).
    dependents: Vec<String>,
    bus: SignalBus<ChangeEvent>,
}

/// A directed multigraph keyed by string id. `add_edge(a, b)` records that
/// `a` depends on `b`; `notify(b)` walks from `b` to every node reachable by
/// following "depends on me" edges and emits a [`ChangeEvent`] to each
/// node's subscribers exactly once, in reverse-edge BFS order.
#[derive(Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, NodeEntry>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>) {
        self.nodes.entry(id.into()).or_default();
    }

    pub fn remove_node(&mut self, id: &str) {
        let Some(entry) = self.nodes.remove(id) else { return };
        for dep in &entry.depends_on {
            if let Some(dep_entry) = self.nodes.get_mut(dep) {
                dep_entry.dependents.retain(|d| d != id);
            }
        }
        for dependent in &entry.dependents {
            if let Some(dependent_entry) = self.nodes.get_mut(dependent) {
                dependent_entry.depends_on.retain(|d| d != id);
            }
        }
    }

    /// Records that `from` depends on `to`. Both nodes must already exist
    /// (multigraph: calling this twice for the same pair records two edges).
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if let Some(entry) = self.nodes.get_mut(from) {
            entry.depends_on.push(to.to_string());
        }
        if let Some(entry) = self.nodes.get_mut(to) {
            entry.dependents.push(from.to_string());
        }
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(entry) = self.nodes.get_mut(from) {
            if let Some(pos) = entry.depends_on.iter().position(|d| d == to) {
                entry.depends_on.remove(pos);
            }
        }
        if let Some(entry) = self.nodes.get_mut(to) {
            if let Some(pos) = entry.dependents.iter().position(|d| d == from) {
                entry.dependents.remove(pos);
            }
        }
    }

    pub fn subscribe(&mut self, id: &str, listener: impl FnMut(&ChangeEvent) + 'static) -> Option<SubscriptionHandle<ChangeEvent>> {
        self.nodes.get(id).map(|entry| entry.bus.subscribe(listener))
    }

    pub fn depends_on(&self, id: &str) -> &[String] {
        self.nodes.get(id).map(|e| e.depends_on.as_slice()).unwrap_or(&[])
    }

    pub fn dependents(&self, id: &str) -> &[String] {
        self.nodes.get(id).map(|e| e.dependents.as_slice()).unwrap_or(&[])
    }

    /// Notifies `changed` and, transitively, every node that (directly or
    /// indirectly) depends on it. Visits each node at most once even across
    /// multigraph edges or cycles (spec.md §4.3 "transitive notification,
    /// cycle-safe").
    pub fn notify(&self, changed: &str) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(changed.to_string());
        visited.insert(changed.to_string());
        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.nodes.get(&id) else { continue };
            entry.bus.emit(&ChangeEvent { node: id.clone() });
            for dependent in &entry.dependents {
                if visited.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }

    /// Topologically ordered ancestors-before-descendants traversal
    /// starting from every root (node with no incoming edges), used by
    /// [`crate::program::Program`] to validate scopes in dependency order
    /// (spec.md §5 "ancestors validated before descendants").
    pub fn ancestors_first_order(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = self.nodes.keys().map(|k| (k.as_str(), 0)).collect();
        for entry in self.nodes.values() {
            for dependent in &entry.dependents {
                if let Some(count) = in_degree.get_mut(dependent.as_str()) {
                    *count += 1;
                }
            }
        }
        let mut queue: std::collections::VecDeque<String> =
            in_degree.iter().filter(|(_, c)| **c == 0).map(|(k, _)| k.to_string()).collect();
        let mut order = Vec::new();
        let mut remaining = in_degree;
        let mut seen = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            if let Some(entry) = self.nodes.get(&id) {
                for dependent in &entry.dependents {
                    if let Some(count) = remaining.get_mut(dependent.as_str()) {
                        if *count > 0 {
                            *count -= 1;
                        }
                        if *count == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
        }
        // Any node left unvisited sits on a cycle; append it anyway so every
        // known node is validated, just not in a meaningful order.
        for id in self.nodes.keys() {
            if !seen.contains(id) {
                order.push(id.clone());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notify_reaches_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        graph.add_node("base");
        graph.add_node("mid");
        graph.add_node("leaf");
        graph.add_edge("mid", "base");
        graph.add_edge("leaf", "mid");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let _h1 = graph.subscribe("mid", {
            let seen = seen.clone();
            move |e| seen.borrow_mut().push(e.node.clone())
        });
        let _h2 = graph.subscribe("leaf", move |e| seen2.borrow_mut().push(e.node.clone()));

        graph.notify("base");
        assert_eq!(*seen.borrow(), vec!["mid".to_string(), "leaf".to_string()]);
    }

    #[test]
    fn notify_visits_each_node_once_through_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");

        let count = Rc::new(RefCell::new(0));
        let count2 = count.clone();
        let _h = graph.subscribe("a", move |_| *count2.borrow_mut() += 1);
        graph.notify("b");
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn remove_node_detaches_all_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_edge("a", "b");
        graph.remove_node("b");
        assert!(graph.depends_on("a").is_empty());
    }

    #[test]
    fn ancestors_first_order_respects_dependency_direction() {
        let mut graph = DependencyGraph::new();
        graph.add_node("base");
        graph.add_node("child");
        graph.add_edge("child", "base");
        let order = graph.ancestors_first_order();
        let base_idx = order.iter().position(|n| n == "base").unwrap();
        let child_idx = order.iter().position(|n| n == "child").unwrap();
        assert!(base_idx < child_idx);
    }
}
