//! Neighborhood queries on the task graph.
//!
//! The recursive queries walk the graph depth-first and evaluate the
//! [`Filter`] on every hop, but a hop which doesn't match the filter doesn't
//! stop the walk: recursion only ends at nodes which were already visited or
//! which have no further neighbors. This means that a filtered ancestor query
//! answers "is there a matching link anywhere upstream", not "along every
//! path".

use std::collections::HashSet;
use std::ops::ControlFlow;

use petgraph::Direction;
use petgraph::graph::NodeIndex;

use crate::filter::Filter;
use crate::graph::GraphModel;
use crate::node::NodeId;

impl GraphModel {
    pub fn successors(&self, id: &NodeId, filter: &Filter) -> Vec<NodeId> {
        self.collect(id, Direction::Outgoing, false, filter)
    }

    pub fn predecessors(&self, id: &NodeId, filter: &Filter) -> Vec<NodeId> {
        self.collect(id, Direction::Incoming, false, filter)
    }

    /// All nodes reachable from `id`, never including `id` itself.
    pub fn descendants(&self, id: &NodeId, filter: &Filter) -> Vec<NodeId> {
        self.collect(id, Direction::Outgoing, true, filter)
    }

    /// All nodes from which `id` can be reached, never including `id` itself.
    pub fn ancestors(&self, id: &NodeId, filter: &Filter) -> Vec<NodeId> {
        self.collect(id, Direction::Incoming, true, filter)
    }

    pub fn has_successors(&self, id: &NodeId, filter: &Filter) -> bool {
        self.any(id, Direction::Outgoing, false, filter)
    }

    pub fn has_predecessors(&self, id: &NodeId, filter: &Filter) -> bool {
        self.any(id, Direction::Incoming, false, filter)
    }

    pub fn has_descendants(&self, id: &NodeId, filter: &Filter) -> bool {
        self.any(id, Direction::Outgoing, true, filter)
    }

    pub fn has_ancestors(&self, id: &NodeId, filter: &Filter) -> bool {
        self.any(id, Direction::Incoming, true, filter)
    }

    fn collect(
        &self,
        id: &NodeId,
        direction: Direction,
        recursive: bool,
        filter: &Filter,
    ) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(id, direction, recursive, filter, |index| {
            found.push(self.id_of(index).clone());
            ControlFlow::Continue(())
        });
        found
    }

    fn any(&self, id: &NodeId, direction: Direction, recursive: bool, filter: &Filter) -> bool {
        let mut found = false;
        self.walk(id, direction, recursive, filter, |_| {
            found = true;
            ControlFlow::Break(())
        });
        found
    }

    /// Depth-first walk with an explicit stack, so that long pipelines can't
    /// overflow the call stack. Every matching node is reported once, in
    /// pre-order.
    fn walk(
        &self,
        id: &NodeId,
        direction: Direction,
        recursive: bool,
        filter: &Filter,
        mut report: impl FnMut(NodeIndex) -> ControlFlow<()>,
    ) {
        let Some(origin) = self.index(id) else {
            return;
        };

        let mut visited = HashSet::from([origin]);
        let mut reported = HashSet::new();
        let mut stack = vec![(origin, self.neighbors(origin, direction).into_iter())];

        while let Some((current, next_nodes)) = stack.last_mut() {
            let current = *current;
            let Some(next) = next_nodes.next() else {
                stack.pop();
                continue;
            };

            let (source, target) = match direction {
                Direction::Outgoing => (current, next),
                Direction::Incoming => (next, current),
            };

            if next != origin
                && filter.matches_node(self, next)
                && filter.matches_link(self, source, target)
                && reported.insert(next)
                && report(next).is_break()
            {
                return;
            }

            if recursive && visited.insert(next) {
                stack.push((next, self.neighbors(next, direction).into_iter()));
            }
        }
    }
}
