//! Storage of the task graph.
//!
//! The graph is stored in a [`petgraph`] `DiGraph`, where each node carries its
//! [`NodeId`] and [`NodeAttrs`], and each edge carries the [`LinkAttrs`] of a
//! link. Nodes are addressed by id from the outside, an auxiliary map
//! translates ids into petgraph indices.
//!
//! There is at most one edge for every ordered pair of nodes. Adding a second
//! link between the same two nodes merges its attributes into the existing
//! one, which flattens multigraph documents into a simple directed graph.
//!
//! Cycles are allowed in storage. Only operations which need an execution
//! order (sorting, instantiation, execution) refuse cyclic graphs.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::LookupError;
use crate::link::LinkAttrs;
use crate::node::{NodeAttrs, NodeId};

#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    pub id: NodeId,
    pub attrs: NodeAttrs,
}

#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    pub(crate) graph: DiGraph<NodeEntry, LinkAttrs>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or replaces the attributes of an existing one.
    pub fn add_node(&mut self, id: impl Into<NodeId>, attrs: NodeAttrs) {
        let id = id.into();
        match self.indices.get(&id) {
            Some(&index) => self.graph[index].attrs = attrs,
            None => {
                let index = self.graph.add_node(NodeEntry {
                    id: id.clone(),
                    attrs,
                });
                self.indices.insert(id, index);
            }
        }
    }

    /// Adds a link between two existing nodes. A link that already exists
    /// between the same pair absorbs the new attributes.
    pub fn add_link(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        attrs: LinkAttrs,
    ) -> Result<(), LookupError> {
        let source = self.require(&source.into())?;
        let target = self.require(&target.into())?;

        match self.graph.find_edge(source, target) {
            Some(edge) => self.graph[edge].merge(attrs),
            None => {
                self.graph.add_edge(source, target, attrs);
            }
        }

        Ok(())
    }

    pub(crate) fn index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.indices.get(id).copied()
    }

    pub(crate) fn require(&self, id: &NodeId) -> Result<NodeIndex, LookupError> {
        self.index(id).ok_or_else(|| LookupError::NodeNotFound(id.clone()))
    }

    pub(crate) fn id_of(&self, index: NodeIndex) -> &NodeId {
        &self.graph[index].id
    }

    pub(crate) fn link_at(&self, source: NodeIndex, target: NodeIndex) -> Option<&LinkAttrs> {
        self.graph.find_edge(source, target).map(|edge| &self.graph[edge])
    }

    /// Neighbors of a node in one direction, ordered by id.
    pub(crate) fn neighbors(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<_> = self.graph.neighbors_directed(index, direction).collect();
        neighbors.sort_by(|a, b| self.id_of(*a).cmp(self.id_of(*b)));
        neighbors.dedup();
        neighbors
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.indices.contains_key(id)
    }

    /// The node whose id is `key` in its JSON object key form.
    pub fn find_by_key(&self, key: &str) -> Option<&NodeId> {
        self.node_ids().find(|id| id.key() == key)
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeAttrs> {
        self.index(id).map(|index| &self.graph[index].attrs)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut NodeAttrs> {
        let index = self.index(id)?;
        Some(&mut self.graph[index].attrs)
    }

    pub fn link(&self, source: &NodeId, target: &NodeId) -> Option<&LinkAttrs> {
        self.link_at(self.index(source)?, self.index(target)?)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.graph.node_weights().map(|entry| &entry.id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &NodeAttrs)> {
        self.graph
            .node_weights()
            .map(|entry| (&entry.id, &entry.attrs))
    }

    pub fn links(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &LinkAttrs)> {
        self.graph.edge_references().map(|edge| {
            (
                self.id_of(edge.source()),
                self.id_of(edge.target()),
                edge.weight(),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    pub fn has_conditional_links(&self) -> bool {
        self.graph.edge_weights().any(|link| link.is_conditional())
    }

    /// Kahn's algorithm, where among the nodes that are ready at the same
    /// time the one with the smallest id goes first. Returns `None` when the
    /// graph has a cycle.
    pub(crate) fn toposort(&self) -> Option<Vec<NodeIndex>> {
        let mut pending: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let count = self
                    .graph
                    .edges_directed(index, Direction::Incoming)
                    .count();
                (index, count)
            })
            .collect();

        let mut ready: BTreeMap<&NodeId, NodeIndex> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&index, _)| (self.id_of(index), index))
            .collect();

        let mut sorted = Vec::with_capacity(self.len());

        while let Some((_, index)) = ready.pop_first() {
            sorted.push(index);

            for edge in self.graph.edges_directed(index, Direction::Outgoing) {
                let target = edge.target();
                if let Some(count) = pending.get_mut(&target) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(self.id_of(target), target);
                    }
                }
            }
        }

        (sorted.len() == self.len()).then_some(sorted)
    }

    /// Number of outgoing links for every node that has at least one.
    pub fn successor_counter(&self) -> HashMap<NodeId, usize> {
        let mut counter = HashMap::new();
        for edge in self.graph.edge_references() {
            *counter
                .entry(self.id_of(edge.source()).clone())
                .or_insert(0) += 1;
        }
        counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::chain;

    #[test]
    fn test_parallel_links_are_merged() {
        let mut model = GraphModel::new();
        model.add_node("a", NodeAttrs::new("t"));
        model.add_node("b", NodeAttrs::new("t"));
        model.add_link("a", "b", LinkAttrs::new().map("x", "x")).unwrap();
        model.add_link("a", "b", LinkAttrs::new().map("y", "y")).unwrap();

        assert_eq!(model.link_count(), 1);
        let link = model.link(&"a".into(), &"b".into()).unwrap();
        assert_eq!(link.data_mapping.len(), 2);
    }

    #[test]
    fn test_link_to_unknown_node() {
        let mut model = GraphModel::new();
        model.add_node("a", NodeAttrs::new("t"));
        assert_eq!(
            model.add_link("a", "nope", LinkAttrs::new()),
            Err(LookupError::NodeNotFound("nope".into()))
        );
    }

    #[test]
    fn test_toposort_respects_links() {
        let mut model = GraphModel::new();
        for id in ["d", "c", "b", "a", "e"] {
            model.add_node(id, NodeAttrs::new("t"));
        }
        model.add_link("d", "a", LinkAttrs::new()).unwrap();
        model.add_link("c", "a", LinkAttrs::new()).unwrap();
        model.add_link("a", "b", LinkAttrs::new()).unwrap();
        model.add_link("e", "b", LinkAttrs::new()).unwrap();

        let order: Vec<_> = model
            .toposort()
            .unwrap()
            .into_iter()
            .map(|index| model.id_of(index).clone())
            .collect();

        assert_eq!(order.len(), 5);
        let position = |id: &str| order.iter().position(|n| *n == NodeId::from(id)).unwrap();
        for (source, target, _) in model.links() {
            let source = order.iter().position(|n| n == source).unwrap();
            let target = order.iter().position(|n| n == target).unwrap();
            assert!(source < target);
        }
        // ties are broken by id
        assert_eq!(position("c"), 0);
        assert_eq!(position("d"), 1);
        assert_eq!(position("a"), 2);
    }

    #[test]
    fn test_cycle_detection() {
        let mut model = chain(&["a", "b", "c"]);
        assert!(!model.is_cyclic());
        assert!(model.toposort().is_some());

        model.add_link("c", "a", LinkAttrs::new()).unwrap();
        assert!(model.is_cyclic());
        assert!(model.toposort().is_none());
    }

    #[test]
    fn test_self_loop_is_cyclic() {
        let mut model = chain(&["a"]);
        model.add_link("a", "a", LinkAttrs::new()).unwrap();
        assert!(model.is_cyclic());
        assert!(model.toposort().is_none());
    }

    #[test]
    fn test_successor_counter() {
        let mut model = chain(&["a", "b", "c"]);
        model.add_link("a", "c", LinkAttrs::new()).unwrap();

        let counter = model.successor_counter();
        assert_eq!(counter.get(&"a".into()), Some(&2));
        assert_eq!(counter.get(&"b".into()), Some(&1));
        assert_eq!(counter.get(&"c".into()), None);
    }
}
