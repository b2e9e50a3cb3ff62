use std::sync::Arc;

use serde_json::json;

use crate::graph::GraphModel;
use crate::link::LinkAttrs;
use crate::node::{NodeAttrs, NodeId};
use crate::task::{Outputs, Registry};
use crate::taskgraph::TaskGraph;

pub fn ids(values: &[&str]) -> Vec<NodeId> {
    values.iter().map(|&value| NodeId::from(value)).collect()
}

/// Passthrough nodes linked one after another.
pub fn chain(nodes: &[&str]) -> GraphModel {
    let links: Vec<_> = nodes
        .windows(2)
        .map(|pair| (pair[0], pair[1], LinkAttrs::new()))
        .collect();
    model(nodes, &links)
}

/// Passthrough nodes joined by the given links.
pub fn model(nodes: &[&str], links: &[(&str, &str, LinkAttrs)]) -> GraphModel {
    let mut model = GraphModel::new();
    for &node in nodes {
        model.add_node(node, NodeAttrs::new("tasks.passthrough"));
    }
    for (source, target, attrs) in links {
        model.add_link(*source, *target, attrs.clone()).unwrap();
    }
    model
}

/// `tasks.passthrough` returns its inputs, `tasks.add` sums `a` and `b`,
/// `tasks.fail` always fails.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register("tasks.passthrough", &[], |inputs| Ok(inputs.clone()))
        .register("tasks.add", &["a", "b"], |inputs| {
            let a = inputs["a"].as_i64().unwrap_or_default();
            let b = inputs["b"].as_i64().unwrap_or_default();
            Ok(Outputs::from([("result".to_string(), json!(a + b))]))
        })
        .register("tasks.fail", &[], |_| anyhow::bail!("intentional failure"));
    registry
}

pub fn taskgraph(model: GraphModel) -> TaskGraph {
    TaskGraph::new(model, Arc::new(registry())).unwrap()
}
