use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ConfigError, EngineError, LookupError, StructuralError};
use crate::filter::Filter;
use crate::graph::GraphModel;
use crate::inputs::merge_static_inputs;
use crate::node::{InputItem, NodeId};
use crate::outputs::{NodeIdentifier, parse};
use crate::task::{Inputs, Task, TaskFactory, VarInfo};

pub(crate) const DEFAULT_ID: &str = "kairo::TaskGraph";

/// A validated task graph, ready to be executed.
///
/// The graph is validated once, when it is constructed. Afterwards its
/// topology can't change, only the default inputs of its nodes can be
/// updated with [`TaskGraph::update_default_inputs`].
pub struct TaskGraph {
    id: String,
    label: Option<String>,
    model: GraphModel,
    factory: Arc<dyn TaskFactory>,
}

impl TaskGraph {
    pub fn new(model: GraphModel, factory: Arc<dyn TaskFactory>) -> Result<Self, ConfigError> {
        Self::with_identity(model, factory, DEFAULT_ID, None)
    }

    pub fn with_identity(
        model: GraphModel,
        factory: Arc<dyn TaskFactory>,
        id: impl Into<String>,
        label: Option<String>,
    ) -> Result<Self, ConfigError> {
        let graph = Self {
            id: id.into(),
            label,
            model,
            factory,
        };

        graph.validate()?;

        tracing::debug!(
            "loaded graph {} with {} nodes and {} links",
            graph,
            graph.model.len(),
            graph.model.link_count()
        );

        Ok(graph)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The label, falling back to the id.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn graph(&self) -> &GraphModel {
        &self.model
    }

    pub fn factory(&self) -> &dyn TaskFactory {
        self.factory.as_ref()
    }

    pub fn is_cyclic(&self) -> bool {
        self.model.is_cyclic()
    }

    /// Check the node specifications and the wiring of the graph.
    ///
    /// * every node must be accepted by the task factory,
    /// * no two required links may write the same input of a node,
    /// * no link may combine attributes which exclude each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, attrs) in self.model.nodes() {
            self.factory
                .validate_task_executable(attrs, id)
                .map_err(|reason| ConfigError::InvalidTask {
                    node: id.clone(),
                    reason,
                })?;

            let mut writers: HashMap<&str, NodeId> = HashMap::new();
            for source in self.model.required_predecessors(id) {
                let Some(link) = self.model.link(&source, id) else {
                    continue;
                };
                for mapping in &link.data_mapping {
                    if let Some(other) = writers.get(mapping.target_input.as_str()) {
                        return Err(ConfigError::AmbiguousInput {
                            first: other.clone(),
                            second: source.clone(),
                            target: id.clone(),
                            input: mapping.target_input.clone(),
                        });
                    }
                    writers.insert(&mapping.target_input, source.clone());
                }
            }
        }

        for (source, target, link) in self.model.links() {
            if let Some((first, second)) = link.conflicts() {
                return Err(ConfigError::ExclusiveAttributes {
                    origin: source.clone(),
                    target: target.clone(),
                    first,
                    second,
                });
            }
        }

        Ok(())
    }

    pub fn topological_sort(&self) -> Result<Vec<NodeId>, StructuralError> {
        let order = self
            .model
            .toposort()
            .ok_or_else(|| StructuralError::Cyclic(self.to_string()))?;

        Ok(order
            .into_iter()
            .map(|index| self.model.id_of(index).clone())
            .collect())
    }

    /// Whether the default inputs of a node cover all of its required
    /// inputs. An explicit `inputs_complete` attribute takes precedence.
    pub fn has_required_static_inputs(&self, id: &NodeId) -> Result<bool, LookupError> {
        let attrs = self
            .model
            .node(id)
            .ok_or_else(|| LookupError::NodeNotFound(id.clone()))?;

        if let Some(complete) = attrs.inputs_complete {
            return Ok(complete);
        }

        let required = self.factory.required_input_names(attrs, id)?;
        let provided: BTreeSet<&str> = attrs
            .default_inputs
            .iter()
            .map(|item| item.name.as_str())
            .collect();

        Ok(required
            .iter()
            .all(|name| provided.contains(name.as_str())))
    }

    /// Nodes without predecessors. When every node has one, the nodes which
    /// can start from their default inputs alone and don't depend on any
    /// required link.
    pub fn start_nodes(&self) -> Result<BTreeSet<NodeId>, LookupError> {
        let all = Filter::default();

        let nodes: BTreeSet<NodeId> = self
            .model
            .node_ids()
            .filter(|id| !self.model.has_predecessors(id, &all))
            .cloned()
            .collect();

        if !nodes.is_empty() {
            return Ok(nodes);
        }

        let mut nodes = BTreeSet::new();
        for id in self.model.node_ids() {
            if self.has_required_static_inputs(id)? && !self.model.has_required_predecessors(id) {
                nodes.insert(id.clone());
            }
        }
        Ok(nodes)
    }

    pub fn end_nodes(&self) -> BTreeSet<NodeId> {
        self.model.end_nodes()
    }

    /// Instantiate the task of a node. `inputs` take priority over the
    /// default inputs of the node.
    pub fn instantiate_task(
        &self,
        id: &NodeId,
        varinfo: Option<&VarInfo>,
        inputs: Inputs,
    ) -> Result<Box<dyn Task>, LookupError> {
        let attrs = self
            .model
            .node(id)
            .ok_or_else(|| LookupError::NodeNotFound(id.clone()))?;

        let inputs = merge_static_inputs(attrs, inputs);
        self.factory.instantiate_task(attrs, id, varinfo, inputs)
    }

    /// Translate node labels into node ids. A label which is not the label
    /// of any node may still be the id of one.
    pub fn get_node_ids(&self, labels: &[&str]) -> Result<Vec<NodeId>, LookupError> {
        let mut nodes: Vec<_> = self.model.nodes().collect();
        nodes.sort_by(|a, b| a.0.cmp(b.0));

        labels
            .iter()
            .map(|&label| {
                if let Some((id, _)) = nodes
                    .iter()
                    .find(|(id, attrs)| attrs.label_or(id) == label)
                {
                    return Ok((*id).clone());
                }
                let id = NodeId::from(label);
                if self.model.contains(&id) {
                    return Ok(id);
                }
                Err(LookupError::UnknownLabel(label.to_string()))
            })
            .collect()
    }

    /// The node `id` refers to. Ids read from JSON object keys are always
    /// strings, so a string which isn't an id itself may still be the key
    /// form of an integer or tuple id.
    pub fn resolve_node(&self, id: &NodeId) -> Result<NodeId, LookupError> {
        if self.model.contains(id) {
            return Ok(id.clone());
        }
        if let NodeId::Str(key) = id
            && let Some(found) = self.model.find_by_key(key)
        {
            return Ok(found.clone());
        }
        Err(LookupError::NodeNotFound(id.clone()))
    }

    /// Resolve a default input selection into input lists keyed by node id.
    pub fn parse_default_inputs(
        &self,
        selection: &DefaultInputs,
    ) -> Result<HashMap<NodeId, Vec<InputItem>>, EngineError> {
        let resolved = match selection {
            DefaultInputs::ById(map) => map
                .iter()
                .map(|(id, inputs)| Ok((self.resolve_node(id)?, inputs.clone())))
                .collect::<Result<_, LookupError>>()?,
            DefaultInputs::ByLabel(map) => {
                let labels: Vec<&str> = map.keys().map(String::as_str).collect();
                self.get_node_ids(&labels)?
                    .into_iter()
                    .zip(map.values().cloned())
                    .collect()
            }
            DefaultInputs::StartNodes(inputs) => self
                .start_nodes()?
                .into_iter()
                .map(|id| (id, inputs.clone()))
                .collect(),
        };
        Ok(resolved)
    }

    /// Merge new default inputs into the nodes. Inputs with an existing name
    /// are overwritten, others are appended. The graph is not re-validated.
    pub fn update_default_inputs(&mut self, selection: &DefaultInputs) -> Result<(), EngineError> {
        let resolved = self.parse_default_inputs(selection)?;

        for (id, inputs) in resolved {
            if let Some(attrs) = self.model.node_mut(&id) {
                attrs.merge_default_inputs(inputs);
            }
        }

        Ok(())
    }
}

impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Default inputs to merge into the nodes of a graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultInputs {
    ById(BTreeMap<NodeId, Vec<InputItem>>),
    ByLabel(BTreeMap<String, Vec<InputItem>>),
    /// The same inputs for every start node.
    StartNodes(Vec<InputItem>),
}

impl DefaultInputs {
    /// Interpret a JSON document the way `identifier` prescribes:
    /// an object keyed by node id or by node label, or a single input list.
    pub fn from_json(value: Value, identifier: NodeIdentifier) -> Result<Self, EngineError> {
        let selection = match identifier {
            NodeIdentifier::Id => {
                let map: BTreeMap<String, Vec<InputItem>> = parse(value, identifier)?;
                DefaultInputs::ById(
                    map.into_iter()
                        .map(|(id, inputs)| (NodeId::from(id), inputs))
                        .collect(),
                )
            }
            NodeIdentifier::Label => DefaultInputs::ByLabel(parse(value, identifier)?),
            NodeIdentifier::None => DefaultInputs::StartNodes(parse(value, identifier)?),
        };
        Ok(selection)
    }
}
