use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a node in the task graph.
///
/// Graph documents may name their nodes with strings, integers, or arrays of
/// those (subgraph nodes are typically addressed as `[graph, node]`), so the
/// identifier is a small closed tree of these shapes. The derived ordering is
/// used to break ties when sorting the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Str(String),
    Tuple(Vec<NodeId>),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(value) => write!(f, "{value}"),
            NodeId::Str(value) => write!(f, "'{value}'"),
            NodeId::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Str(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::Str(value)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Int(value)
    }
}

impl NodeId {
    /// The id as it appears as an object key in JSON documents: strings as
    /// they are, everything else in its JSON form (`2`, `["sub",1]`).
    pub fn key(&self) -> String {
        match self {
            NodeId::Str(value) => value.clone(),
            other => other.to_value().to_string(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            NodeId::Int(value) => Value::from(*value),
            NodeId::Str(value) => Value::from(value.as_str()),
            NodeId::Tuple(items) => Value::Array(items.iter().map(NodeId::to_value).collect()),
        }
    }
}

impl<T: Into<NodeId>> From<Vec<T>> for NodeId {
    fn from(value: Vec<T>) -> Self {
        NodeId::Tuple(value.into_iter().map(Into::into).collect())
    }
}

/// A single statically known input of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    pub name: String,
    pub value: Value,
}

impl InputItem {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Attributes of a graph node, i.e. the description of one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_inputs: Vec<InputItem>,
    /// Declares that `default_inputs` already hold every required input,
    /// for tasks whose required inputs can't be introspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_complete: Option<bool>,
    /// Attributes the engine doesn't interpret, kept for the task factory.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeAttrs {
    pub fn new(task_identifier: impl Into<String>) -> Self {
        Self {
            task_identifier: Some(task_identifier.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_inputs.push(InputItem::new(name, value));
        self
    }

    pub fn with_inputs_complete(mut self, complete: bool) -> Self {
        self.inputs_complete = Some(complete);
        self
    }

    /// Human readable name of the node: the explicit label, then the task
    /// identifier, and finally the node id itself.
    pub fn label_or(&self, id: &NodeId) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        if let Some(identifier) = &self.task_identifier {
            return identifier.clone();
        }
        match id {
            NodeId::Str(value) => value.clone(),
            other => other.to_string(),
        }
    }

    /// Merge inputs into `default_inputs`: existing names are overwritten in
    /// place, new names are appended.
    pub fn merge_default_inputs(&mut self, inputs: impl IntoIterator<Item = InputItem>) {
        for input in inputs {
            match self
                .default_inputs
                .iter_mut()
                .find(|existing| existing.name == input.name)
            {
                Some(existing) => existing.value = input.value,
                None => self.default_inputs.push(input),
            }
        }
    }
}
