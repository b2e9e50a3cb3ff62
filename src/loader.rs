//! Reading and writing task graphs in the node-link JSON format.
//!
//! ```json
//! {
//!   "directed": true,
//!   "multigraph": false,
//!   "graph": {"id": "demo", "label": "Demo"},
//!   "nodes": [{"id": "a", "task_identifier": "tasks.add"}],
//!   "links": [{"source": "a", "target": "b", "map_all_data": true}]
//! }
//! ```
//!
//! Every key except `directed` is optional. In multigraph documents the
//! attributes of parallel links are merged into a single link.

use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KindError, LoadError};
use crate::graph::GraphModel;
use crate::link::LinkAttrs;
use crate::node::{NodeAttrs, NodeId};
use crate::task::TaskFactory;
use crate::taskgraph::{DEFAULT_ID, TaskGraph};

/// The persistent forms a graph can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphRepresentation {
    JsonFile,
    JsonValue,
    JsonString,
}

impl FromStr for GraphRepresentation {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json_file" => Ok(GraphRepresentation::JsonFile),
            "json_dict" | "json_value" => Ok(GraphRepresentation::JsonValue),
            "json_string" => Ok(GraphRepresentation::JsonString),
            other => Err(KindError::Representation(other.to_string())),
        }
    }
}

impl fmt::Display for GraphRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphRepresentation::JsonFile => write!(f, "json_file"),
            GraphRepresentation::JsonValue => write!(f, "json_value"),
            GraphRepresentation::JsonString => write!(f, "json_string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphSource {
    File(Utf8PathBuf),
    Json(Value),
    Str(String),
}

impl GraphSource {
    /// Interpret a textual source. Without an explicit representation a
    /// source ending in `.json` is a path, anything else a JSON document.
    pub fn from_text(
        text: impl Into<String>,
        representation: Option<GraphRepresentation>,
    ) -> Result<Self, LoadError> {
        let text = text.into();
        let representation = representation.unwrap_or(if text.ends_with(".json") {
            GraphRepresentation::JsonFile
        } else {
            GraphRepresentation::JsonString
        });

        Ok(match representation {
            GraphRepresentation::JsonFile => GraphSource::File(text.into()),
            GraphRepresentation::JsonString => GraphSource::Str(text),
            GraphRepresentation::JsonValue => GraphSource::Json(serde_json::from_str(&text)?),
        })
    }

    pub fn representation(&self) -> GraphRepresentation {
        match self {
            GraphSource::File(_) => GraphRepresentation::JsonFile,
            GraphSource::Json(_) => GraphRepresentation::JsonValue,
            GraphSource::Str(_) => GraphRepresentation::JsonString,
        }
    }

    fn read(self) -> Result<Document, LoadError> {
        let value = match self {
            GraphSource::File(path) => {
                tracing::debug!("reading graph from {}", path);
                serde_json::from_str(&fs::read_to_string(&path)?)?
            }
            GraphSource::Str(text) if text.trim().is_empty() => Value::Null,
            GraphSource::Str(text) => serde_json::from_str(&text)?,
            GraphSource::Json(value) => value,
        };

        if value.is_null() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default = "directed")]
    directed: bool,
    #[serde(default)]
    multigraph: bool,
    #[serde(default)]
    graph: Identity,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    links: Vec<LinkRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            directed: true,
            multigraph: false,
            graph: Identity::default(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }
}

fn directed() -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: NodeId,
    #[serde(flatten)]
    attrs: NodeAttrs,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkRecord {
    source: NodeId,
    target: NodeId,
    #[serde(flatten)]
    attrs: LinkAttrs,
}

/// Load and validate a task graph.
pub fn load_graph(
    source: GraphSource,
    factory: Arc<dyn TaskFactory>,
) -> Result<TaskGraph, LoadError> {
    let document = source.read()?;

    if !document.directed {
        return Err(KindError::Undirected.into());
    }

    let mut model = GraphModel::new();
    for NodeRecord { id, attrs } in document.nodes {
        model.add_node(id, attrs);
    }
    for LinkRecord { source, target, mut attrs } in document.links {
        // parallel link keys are meaningless once the links are merged
        if document.multigraph {
            attrs.extra.remove("key");
        }
        model.add_link(source, target, attrs)?;
    }

    let Identity { id, label, .. } = document.graph;
    let id = id.unwrap_or_else(|| DEFAULT_ID.to_string());

    Ok(TaskGraph::with_identity(model, factory, id, label)?)
}

/// The node-link representation of a graph.
pub fn dump_graph(graph: &TaskGraph) -> Result<Value, LoadError> {
    let model = graph.graph();

    let mut nodes: Vec<_> = model
        .nodes()
        .map(|(id, attrs)| NodeRecord {
            id: id.clone(),
            attrs: attrs.clone(),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut links: Vec<_> = model
        .links()
        .map(|(source, target, attrs)| LinkRecord {
            source: source.clone(),
            target: target.clone(),
            attrs: attrs.clone(),
        })
        .collect();
    links.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

    let document = Document {
        directed: true,
        multigraph: false,
        graph: Identity {
            id: Some(graph.id().to_string()),
            label: Some(graph.label().to_string()),
            extra: Map::new(),
        },
        nodes,
        links,
    };

    Ok(serde_json::to_value(document)?)
}

pub fn dump_graph_file(graph: &TaskGraph, path: &Utf8Path) -> Result<(), LoadError> {
    let value = dump_graph(graph)?;
    fs::write(path, serde_json::to_string_pretty(&value)?)?;
    tracing::debug!("wrote graph {} to {}", graph, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::{ConfigError, LookupError};
    use crate::test_support::registry;

    fn load(value: Value) -> Result<TaskGraph, LoadError> {
        load_graph(GraphSource::Json(value), Arc::new(registry()))
    }

    fn document() -> Value {
        json!({
            "graph": {"id": "demo", "label": "Demo"},
            "nodes": [
                {"id": "a", "task_identifier": "tasks.add",
                 "default_inputs": [{"name": "a", "value": 1}, {"name": "b", "value": 2}]},
                {"id": "b", "task_identifier": "tasks.passthrough", "color": "red"}
            ],
            "links": [{
                "source": "a",
                "target": "b",
                "data_mapping": [{"source_output": "result", "target_input": "x"}]
            }]
        })
    }

    #[test]
    fn test_representation_from_str() {
        assert_eq!(
            "json_dict".parse::<GraphRepresentation>(),
            Ok(GraphRepresentation::JsonValue)
        );
        assert_eq!(
            "yaml".parse::<GraphRepresentation>(),
            Err(KindError::Representation("yaml".to_string()))
        );
    }

    #[test]
    fn test_source_from_text() {
        assert_eq!(
            GraphSource::from_text("graphs/demo.json", None).unwrap(),
            GraphSource::File("graphs/demo.json".into())
        );
        let source = GraphSource::from_text(r#"{"nodes": []}"#, None).unwrap();
        assert_eq!(source.representation(), GraphRepresentation::JsonString);
    }

    #[test]
    fn test_load() {
        let graph = load(document()).unwrap();

        assert_eq!(graph.id(), "demo");
        assert_eq!(graph.label(), "Demo");
        assert_eq!(graph.graph().len(), 2);

        let b = graph.graph().node(&NodeId::from("b")).unwrap();
        assert_eq!(b.extra["color"], json!("red"));
        let link = graph
            .graph()
            .link(&NodeId::from("a"), &NodeId::from("b"))
            .unwrap();
        assert_eq!(link.data_mapping[0].target_input, "x");
    }

    #[test]
    fn test_load_empty() {
        let graph = load(Value::Null).unwrap();
        assert!(graph.graph().is_empty());
        assert_eq!(graph.id(), DEFAULT_ID);

        let graph = load_graph(GraphSource::Str(String::new()), Arc::new(registry())).unwrap();
        assert!(graph.graph().is_empty());
    }

    #[test]
    fn test_multigraph_is_flattened() {
        let graph = load(json!({
            "multigraph": true,
            "nodes": [
                {"id": "a", "task_identifier": "tasks.passthrough"},
                {"id": "b", "task_identifier": "tasks.passthrough"}
            ],
            "links": [
                {"source": "a", "target": "b", "key": 0,
                 "data_mapping": [{"source_output": "x", "target_input": "x"}]},
                {"source": "a", "target": "b", "key": 1,
                 "data_mapping": [{"source_output": "y", "target_input": "y"}]}
            ]
        }))
        .unwrap();

        assert_eq!(graph.graph().link_count(), 1);
        let link = graph
            .graph()
            .link(&NodeId::from("a"), &NodeId::from("b"))
            .unwrap();
        assert_eq!(link.data_mapping.len(), 2);
        assert!(link.extra.is_empty());
    }

    #[test]
    fn test_link_attributes_survive_dump() {
        let graph = load(json!({
            "nodes": [
                {"id": "a", "task_identifier": "tasks.passthrough"},
                {"id": "b", "task_identifier": "tasks.passthrough"}
            ],
            "links": [{"source": "a", "target": "b", "map_all_data": true, "note": "x"}]
        }))
        .unwrap();

        let dumped = dump_graph(&graph).unwrap();
        assert_eq!(
            dumped["links"][0],
            json!({"source": "a", "target": "b", "map_all_data": true, "note": "x"})
        );
    }

    #[test]
    fn test_undirected_is_rejected() {
        assert!(matches!(
            load(json!({"directed": false})),
            Err(LoadError::Kind(KindError::Undirected))
        ));
    }

    #[test]
    fn test_invalid_graphs() {
        let err = load(json!({
            "nodes": [{"id": "a", "task_identifier": "tasks.passthrough"}],
            "links": [{"source": "a", "target": "z"}]
        }))
        .unwrap_err();
        assert!(matches!(err, LoadError::Lookup(LookupError::NodeNotFound(_))));

        let err = load(json!({
            "nodes": [{"id": "a", "task_identifier": "nope"}]
        }))
        .unwrap_err();
        assert!(matches!(err, LoadError::Config(ConfigError::InvalidTask { .. })));
    }

    #[test]
    fn test_dump_and_reload() {
        let graph = load(document()).unwrap();
        let dumped = dump_graph(&graph).unwrap();

        assert_eq!(dumped["graph"], json!({"id": "demo", "label": "Demo"}));
        assert_eq!(dumped["nodes"][1]["color"], json!("red"));

        let reloaded = load(dumped.clone()).unwrap();
        assert_eq!(dump_graph(&reloaded).unwrap(), dumped);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("kairo-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = Utf8PathBuf::try_from(dir.join("graph.json")).unwrap();

        let graph = load(document()).unwrap();
        dump_graph_file(&graph, &path).unwrap();

        let source = GraphSource::from_text(path.as_str(), None).unwrap();
        let reloaded = load_graph(source, Arc::new(registry())).unwrap();
        assert_eq!(reloaded.label(), "Demo");

        fs::remove_dir_all(&dir).unwrap();
    }
}
