//! Analysis of conditional branching.
//!
//! The engine does not follow conditional links at run time, but it can tell
//! whether the conditional links leaving a node cover every outcome. The
//! check is a pairwise heuristic: each branch needs one sibling branch which
//! is its complement, it does not prove coverage over every combination of
//! values.

use std::collections::{BTreeMap, BTreeSet};

use crate::filter::Filter;
use crate::graph::GraphModel;
use crate::link::ConditionValue;
use crate::node::NodeId;

/// The conditions of one branch, keyed by the output they test.
pub type Branch = BTreeMap<String, ConditionValue>;

impl GraphModel {
    /// Conditions of every outgoing conditional link of `id`, padded so that
    /// all branches test the same outputs. Outputs a branch doesn't test are
    /// filled in with [`ConditionValue::Else`].
    pub fn expanded_conditions(&self, id: &NodeId) -> Vec<Branch> {
        let filter = Filter::new().link_has_conditions(true);

        let mut branches: Vec<Branch> = self
            .successors(id, &filter)
            .iter()
            .filter_map(|target| self.link(id, target))
            .map(|link| {
                link.conditions
                    .iter()
                    .map(|condition| (condition.source_output.clone(), condition.value.clone()))
                    .collect()
            })
            .collect();

        let names: BTreeSet<String> = branches
            .iter()
            .flat_map(|branch| branch.keys().cloned())
            .collect();

        for branch in &mut branches {
            for name in &names {
                branch
                    .entry(name.clone())
                    .or_insert(ConditionValue::Else);
            }
        }

        branches
    }

    /// Whether some outcome of the conditional links leaving `id` is not
    /// handled by any of them.
    pub fn node_has_noncovered_conditions(&self, id: &NodeId) -> bool {
        let branches = self.expanded_conditions(id);
        let mut has_complement = vec![false; branches.len()];

        for i in 0..branches.len() {
            if has_complement[i] {
                continue;
            }
            for j in (i + 1)..branches.len() {
                if are_complementary(&branches[i], &branches[j]) {
                    has_complement[i] = true;
                    has_complement[j] = true;
                    break;
                }
            }
            if !has_complement[i] {
                return true;
            }
        }

        false
    }

    /// Nodes without successors. When every node has one, the nodes whose
    /// conditional links leave some outcome unhandled.
    pub fn end_nodes(&self) -> BTreeSet<NodeId> {
        let all = Filter::default();

        let nodes: BTreeSet<NodeId> = self
            .node_ids()
            .filter(|id| !self.has_successors(id, &all))
            .cloned()
            .collect();

        if !nodes.is_empty() {
            return nodes;
        }

        self.node_ids()
            .filter(|id| self.node_has_noncovered_conditions(id))
            .cloned()
            .collect()
    }
}

fn are_complementary(first: &Branch, second: &Branch) -> bool {
    first.iter().all(|(name, value)| match value.complements() {
        None => true,
        Some(complements) => second
            .get(name)
            .is_some_and(|other| complements.contains(other)),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::link::LinkAttrs;
    use crate::test_support::{chain, model};

    fn id(value: &str) -> NodeId {
        NodeId::from(value)
    }

    #[test]
    fn test_expansion_pads_missing_names() {
        let model = model(
            &["src", "x", "y"],
            &[
                ("src", "x", LinkAttrs::new().when("a", true)),
                ("src", "y", LinkAttrs::new().when("b", json!(1))),
            ],
        );

        let branches = model.expanded_conditions(&id("src"));
        assert_eq!(branches.len(), 2);
        for branch in &branches {
            assert_eq!(branch.keys().collect::<Vec<_>>(), ["a", "b"]);
        }
        assert_eq!(branches[0]["b"], ConditionValue::Else);
        assert_eq!(branches[1]["a"], ConditionValue::Else);
    }

    #[test]
    fn test_true_false_pair_is_covered() {
        let model = model(
            &["src", "x", "y"],
            &[
                ("src", "x", LinkAttrs::new().when("v", true)),
                ("src", "y", LinkAttrs::new().when("v", false)),
            ],
        );
        assert!(!model.node_has_noncovered_conditions(&id("src")));
    }

    #[test]
    fn test_single_branch_is_not_covered() {
        let model = model(
            &["src", "x"],
            &[("src", "x", LinkAttrs::new().when("v", true))],
        );
        assert!(model.node_has_noncovered_conditions(&id("src")));
    }

    #[test]
    fn test_else_branch_covers_values() {
        let model = model(
            &["src", "x", "y"],
            &[
                ("src", "x", LinkAttrs::new().when("v", json!("red"))),
                ("src", "y", LinkAttrs::new().when("v", ConditionValue::Else)),
            ],
        );
        assert!(!model.node_has_noncovered_conditions(&id("src")));
    }

    #[test]
    fn test_two_values_are_not_complementary() {
        let model = model(
            &["src", "x", "y"],
            &[
                ("src", "x", LinkAttrs::new().when("v", json!("red"))),
                ("src", "y", LinkAttrs::new().when("v", json!("blue"))),
            ],
        );
        assert!(model.node_has_noncovered_conditions(&id("src")));
    }

    #[test]
    fn test_unconditional_node_is_covered() {
        let model = chain(&["a", "b"]);
        assert!(!model.node_has_noncovered_conditions(&id("a")));
    }

    #[test]
    fn test_end_nodes() {
        let model = chain(&["a", "b", "c"]);
        assert_eq!(model.end_nodes(), BTreeSet::from([id("c")]));
    }

    #[test]
    fn test_end_nodes_of_a_loop() {
        // a -> b, b -(v == true)-> a: nothing handles v == false
        let model = model(
            &["a", "b"],
            &[
                ("a", "b", LinkAttrs::new()),
                ("b", "a", LinkAttrs::new().when("v", true)),
            ],
        );
        assert_eq!(model.end_nodes(), BTreeSet::from([id("b")]));
    }
}
