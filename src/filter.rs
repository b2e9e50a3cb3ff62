use petgraph::Direction;
use petgraph::graph::NodeIndex;

use crate::graph::GraphModel;
use crate::node::NodeId;

type NodePredicate<'a> = Box<dyn Fn(&NodeId) -> bool + 'a>;
type LinkPredicate<'a> = Box<dyn Fn(&NodeId, &NodeId) -> bool + 'a>;

/// Selection of the nodes reported by a traversal.
///
/// Every criterion is optional and all criteria which are set must hold, so
/// `Filter::default()` lets everything through. Node criteria apply to the
/// node reached by a hop, link criteria to the link traversed by that hop.
///
/// ```rust
/// use kairo::Filter;
///
/// // conditional links which are not explicitly required
/// let optional = Filter::new()
///     .link_has_required(false)
///     .link_is_conditional(true);
/// ```
#[derive(Default)]
pub struct Filter<'a> {
    node_filter: Option<NodePredicate<'a>>,
    node_has_predecessors: Option<bool>,
    node_has_successors: Option<bool>,
    link_filter: Option<LinkPredicate<'a>>,
    link_has_on_error: Option<bool>,
    link_has_conditions: Option<bool>,
    link_is_conditional: Option<bool>,
    link_has_required: Option<bool>,
}

impl<'a> Filter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_filter(mut self, predicate: impl Fn(&NodeId) -> bool + 'a) -> Self {
        self.node_filter = Some(Box::new(predicate));
        self
    }

    pub fn node_has_predecessors(mut self, value: bool) -> Self {
        self.node_has_predecessors = Some(value);
        self
    }

    pub fn node_has_successors(mut self, value: bool) -> Self {
        self.node_has_successors = Some(value);
        self
    }

    /// Called with `(source, target)` of the traversed link, regardless of
    /// the direction of the traversal.
    pub fn link_filter(mut self, predicate: impl Fn(&NodeId, &NodeId) -> bool + 'a) -> Self {
        self.link_filter = Some(Box::new(predicate));
        self
    }

    pub fn link_has_on_error(mut self, value: bool) -> Self {
        self.link_has_on_error = Some(value);
        self
    }

    pub fn link_has_conditions(mut self, value: bool) -> Self {
        self.link_has_conditions = Some(value);
        self
    }

    pub fn link_is_conditional(mut self, value: bool) -> Self {
        self.link_is_conditional = Some(value);
        self
    }

    /// Matches on the explicit `required` attribute of the link only.
    pub fn link_has_required(mut self, value: bool) -> Self {
        self.link_has_required = Some(value);
        self
    }

    pub(crate) fn matches_node(&self, model: &GraphModel, index: NodeIndex) -> bool {
        if let Some(predicate) = &self.node_filter
            && !predicate(model.id_of(index))
        {
            return false;
        }
        if let Some(expected) = self.node_has_predecessors
            && has_neighbors(model, index, Direction::Incoming) != expected
        {
            return false;
        }
        if let Some(expected) = self.node_has_successors
            && has_neighbors(model, index, Direction::Outgoing) != expected
        {
            return false;
        }
        true
    }

    pub(crate) fn matches_link(
        &self,
        model: &GraphModel,
        source: NodeIndex,
        target: NodeIndex,
    ) -> bool {
        if let Some(predicate) = &self.link_filter
            && !predicate(model.id_of(source), model.id_of(target))
        {
            return false;
        }

        let Some(link) = model.link_at(source, target) else {
            return false;
        };

        let checks = [
            (self.link_has_on_error, link.on_error),
            (self.link_has_conditions, link.has_conditions()),
            (self.link_is_conditional, link.is_conditional()),
            (self.link_has_required, link.required),
        ];

        checks
            .into_iter()
            .all(|(expected, actual)| expected.is_none_or(|expected| expected == actual))
    }
}

fn has_neighbors(model: &GraphModel, index: NodeIndex, direction: Direction) -> bool {
    model
        .graph
        .neighbors_directed(index, direction)
        .next()
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkAttrs;
    use crate::node::NodeAttrs;

    fn model() -> GraphModel {
        let mut model = GraphModel::new();
        model.add_node("a", NodeAttrs::new("t"));
        model.add_node("b", NodeAttrs::new("t"));
        model
            .add_link("a", "b", LinkAttrs::new().when("ok", true))
            .unwrap();
        model
    }

    #[test]
    fn test_default_matches_everything() {
        let model = model();
        let a = model.index(&"a".into()).unwrap();
        let b = model.index(&"b".into()).unwrap();

        assert!(Filter::default().matches_node(&model, a));
        assert!(Filter::default().matches_link(&model, a, b));
    }

    #[test]
    fn test_criteria_are_combined() {
        let model = model();
        let a = model.index(&"a".into()).unwrap();
        let b = model.index(&"b".into()).unwrap();

        let filter = Filter::new()
            .link_has_conditions(true)
            .link_is_conditional(true);
        assert!(filter.matches_link(&model, a, b));

        let filter = filter.link_has_required(true);
        assert!(!filter.matches_link(&model, a, b));

        let filter = Filter::new().link_filter(|source, _| *source == NodeId::from("b"));
        assert!(!filter.matches_link(&model, a, b));
    }

    #[test]
    fn test_on_error_criterion() {
        let mut model = model();
        model.add_node("c", NodeAttrs::new("t"));
        model.add_link("a", "c", LinkAttrs::new().on_error()).unwrap();
        let a = model.index(&"a".into()).unwrap();
        let b = model.index(&"b".into()).unwrap();
        let c = model.index(&"c".into()).unwrap();

        let handlers = Filter::new().link_has_on_error(true);
        assert!(handlers.matches_link(&model, a, c));
        assert!(!handlers.matches_link(&model, a, b));

        let regular = Filter::new().link_has_on_error(false);
        assert!(regular.matches_link(&model, a, b));
        assert!(!regular.matches_link(&model, a, c));
    }

    #[test]
    fn test_node_criteria() {
        let model = model();
        let a = model.index(&"a".into()).unwrap();
        let b = model.index(&"b".into()).unwrap();

        let roots = Filter::new().node_has_predecessors(false);
        assert!(roots.matches_node(&model, a));
        assert!(!roots.matches_node(&model, b));

        let leaves = Filter::new().node_has_successors(false);
        assert!(leaves.matches_node(&model, b));
        assert!(!leaves.matches_node(&model, a));

        let named = Filter::new().node_filter(|id| *id == NodeId::from("b"));
        assert!(named.matches_node(&model, b));
        assert!(!named.matches_node(&model, a));
    }
}
