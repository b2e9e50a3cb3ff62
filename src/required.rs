use crate::filter::Filter;
use crate::graph::GraphModel;
use crate::node::NodeId;

impl GraphModel {
    /// Whether the target can't complete without this link being followed.
    ///
    /// An explicit `required` attribute always wins. Otherwise conditional
    /// links are optional, and unconditional links are as required as their
    /// source node.
    pub fn link_is_required(&self, source: &NodeId, target: &NodeId) -> bool {
        let Some(link) = self.link(source, target) else {
            return false;
        };
        if link.required {
            return true;
        }
        if link.is_conditional() {
            return false;
        }
        self.node_is_required(source)
    }

    /// A node is required unless an optional conditional link exists
    /// anywhere upstream of it.
    pub fn node_is_required(&self, id: &NodeId) -> bool {
        let optional = Filter::new()
            .link_has_required(false)
            .link_is_conditional(true);
        !self.has_ancestors(id, &optional)
    }

    pub fn required_predecessors(&self, target: &NodeId) -> Vec<NodeId> {
        self.predecessors(target, &Filter::default())
            .into_iter()
            .filter(|source| self.link_is_required(source, target))
            .collect()
    }

    pub fn has_required_predecessors(&self, target: &NodeId) -> bool {
        self.predecessors(target, &Filter::default())
            .iter()
            .any(|source| self.link_is_required(source, target))
    }
}

#[cfg(test)]
mod tests {
    use crate::link::LinkAttrs;
    use crate::node::NodeId;
    use crate::test_support::{ids, model};

    fn id(value: &str) -> NodeId {
        NodeId::from(value)
    }

    #[test]
    fn test_plain_chain_is_required() {
        let model = crate::test_support::chain(&["a", "b", "c"]);
        assert!(model.link_is_required(&id("a"), &id("b")));
        assert!(model.link_is_required(&id("b"), &id("c")));
        assert!(model.node_is_required(&id("c")));
    }

    #[test]
    fn test_conditional_link_is_optional() {
        let model = model(
            &["a", "b", "c"],
            &[
                ("a", "b", LinkAttrs::new().when("ok", true)),
                ("b", "c", LinkAttrs::new()),
            ],
        );
        assert!(!model.link_is_required(&id("a"), &id("b")));
        // optionality propagates through unconditional links downstream
        assert!(!model.node_is_required(&id("b")));
        assert!(!model.link_is_required(&id("b"), &id("c")));
        assert!(model.required_predecessors(&id("c")).is_empty());
    }

    #[test]
    fn test_explicit_required_wins() {
        let model = model(
            &["a", "b", "c"],
            &[
                ("a", "b", LinkAttrs::new().on_error().required()),
                ("b", "c", LinkAttrs::new().required()),
            ],
        );
        assert!(model.link_is_required(&id("a"), &id("b")));
        assert!(model.node_is_required(&id("b")));
        assert_eq!(model.required_predecessors(&id("c")), ids(&["b"]));
        assert!(model.has_required_predecessors(&id("c")));
    }

    #[test]
    fn test_repeated_calls_agree() {
        let model = model(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", LinkAttrs::new().when("x", false)),
                ("b", "d", LinkAttrs::new()),
                ("c", "d", LinkAttrs::new()),
            ],
        );
        for (source, target, _) in model.links() {
            let first = model.link_is_required(source, target);
            for _ in 0..3 {
                assert_eq!(model.link_is_required(source, target), first);
            }
        }
        assert!(model.link_is_required(&id("c"), &id("d")));
        assert!(!model.link_is_required(&id("b"), &id("d")));
    }

    #[test]
    fn test_missing_link_is_not_required() {
        let model = crate::test_support::chain(&["a", "b"]);
        assert!(!model.link_is_required(&id("b"), &id("a")));
    }
}
