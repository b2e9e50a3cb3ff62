//! Selecting, renaming and extracting the outputs of an execution.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, KindError, LookupError};
use crate::node::NodeId;
use crate::task::Task;
use crate::taskgraph::TaskGraph;

/// A requested output value, which the task may not have produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Value(Value),
    /// Stands in for a requested output the task did not produce.
    Missing,
}

impl OutputValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            OutputValue::Value(value) => Some(value),
            OutputValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, OutputValue::Missing)
    }
}

impl From<Value> for OutputValue {
    fn from(value: Value) -> Self {
        OutputValue::Value(value)
    }
}

/// Select output `name` of a node and report it as `new_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRename {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

impl OutputRename {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            new_name: None,
        }
    }

    pub fn to(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// Outputs to extract from one node, `None` meaning all of them.
pub type OutputMap = Option<Vec<OutputRename>>;

/// How the nodes of a selection are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeIdentifier {
    /// No node is named, the selection applies to a default set of nodes.
    None,
    #[default]
    Id,
    Label,
}

impl FromStr for NodeIdentifier {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(NodeIdentifier::None),
            "id" => Ok(NodeIdentifier::Id),
            "label" => Ok(NodeIdentifier::Label),
            other => Err(KindError::NodeIdentifier(other.to_string())),
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIdentifier::None => write!(f, "none"),
            NodeIdentifier::Id => write!(f, "id"),
            NodeIdentifier::Label => write!(f, "label"),
        }
    }
}

/// Which outputs of which nodes an execution should return.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSelection {
    ById(BTreeMap<NodeId, OutputMap>),
    ByLabel(BTreeMap<String, OutputMap>),
    /// The same map for every end node, or every output of every node when
    /// the map is `None`.
    Default(OutputMap),
}

impl OutputSelection {
    /// Interpret a JSON document the way `identifier` prescribes:
    /// an object keyed by node id or by node label, or a single output map.
    pub fn from_json(value: Value, identifier: NodeIdentifier) -> Result<Self, EngineError> {
        let selection = match identifier {
            NodeIdentifier::Id => {
                let map: BTreeMap<String, OutputMap> = parse(value, identifier)?;
                OutputSelection::ById(
                    map.into_iter()
                        .map(|(id, output_map)| (NodeId::from(id), output_map))
                        .collect(),
                )
            }
            NodeIdentifier::Label => OutputSelection::ByLabel(parse(value, identifier)?),
            NodeIdentifier::None => OutputSelection::Default(parse(value, identifier)?),
        };
        Ok(selection)
    }
}

pub(crate) fn parse<T: serde::de::DeserializeOwned>(
    value: Value,
    identifier: NodeIdentifier,
) -> Result<T, KindError> {
    serde_json::from_value(value)
        .map_err(|err| KindError::Selection {
            identifier: identifier.to_string(),
            reason: err.to_string(),
        })
}

/// Output maps keyed by the id of the node they apply to.
pub type ResolvedOutputs = HashMap<NodeId, OutputMap>;

impl TaskGraph {
    /// Resolve a selection into output maps keyed by node id.
    pub fn parse_outputs(
        &self,
        selection: &OutputSelection,
    ) -> Result<ResolvedOutputs, EngineError> {
        let resolved = match selection {
            OutputSelection::ById(map) => map
                .iter()
                .map(|(id, output_map)| Ok((self.resolve_node(id)?, output_map.clone())))
                .collect::<Result<_, LookupError>>()?,
            OutputSelection::ByLabel(map) => {
                let labels: Vec<&str> = map.keys().map(String::as_str).collect();
                self.get_node_ids(&labels)?
                    .into_iter()
                    .zip(map.values().cloned())
                    .collect()
            }
            OutputSelection::Default(None) => self
                .graph()
                .node_ids()
                .map(|id| (id.clone(), None))
                .collect(),
            OutputSelection::Default(Some(output_map)) => self
                .graph()
                .end_nodes()
                .into_iter()
                .map(|id| (id, Some(output_map.clone())))
                .collect(),
        };
        Ok(resolved)
    }
}

/// The values `outputs` asks of the node, renamed as requested. A requested
/// output the task didn't produce is reported as [`OutputValue::Missing`].
pub fn extract_output_values(
    id: &NodeId,
    task: &dyn Task,
    outputs: &ResolvedOutputs,
) -> BTreeMap<String, OutputValue> {
    let Some(output_map) = outputs.get(id) else {
        return BTreeMap::new();
    };

    let values = task.output_values();

    match output_map {
        None => values
            .iter()
            .map(|(name, value)| (name.clone(), OutputValue::Value(value.clone())))
            .collect(),
        Some(renames) => renames
            .iter()
            .map(|rename| {
                let value = values
                    .get(&rename.name)
                    .cloned()
                    .map_or(OutputValue::Missing, OutputValue::Value);
                let name = rename.new_name.as_ref().unwrap_or(&rename.name);
                (name.clone(), value)
            })
            .collect(),
    }
}
