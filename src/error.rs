pub use anyhow::Error as TaskError;
use thiserror::Error;

use crate::node::NodeId;

/// The graph shape does not allow the requested operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("Graph '{0}' is cyclic")]
    Cyclic(String),

    #[error("Graph '{0}' has conditional links, which cannot be executed")]
    ConditionalLinks(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Node {node} is not executable:\n{reason}")]
    InvalidTask { node: NodeId, reason: anyhow::Error },

    #[error("Node {first} and {second} both connect to the input '{input}' of {target}")]
    AmbiguousInput {
        first: NodeId,
        second: NodeId,
        target: NodeId,
        input: String,
    },

    #[error("Link {origin}->{target}: '{first}' and '{second}' cannot be used together")]
    ExclusiveAttributes {
        origin: NodeId,
        target: NodeId,
        first: &'static str,
        second: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("No node with label or id '{0}'")]
    UnknownLabel(String),

    #[error("Node {node}: task '{identifier}' is not registered")]
    UnknownTask { node: NodeId, identifier: String },

    #[error("Node {0} has no task identifier")]
    MissingIdentifier(NodeId),
}

/// An invalid literal for one of the closed enumerations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KindError {
    #[error("Unknown graph representation '{0}'")]
    Representation(String),

    #[error("Unknown node identifier kind '{0}'")]
    NodeIdentifier(String),

    #[error("Selection for node identifier '{identifier}' is malformed: {reason}")]
    Selection { identifier: String, reason: String },

    #[error("Only directed graphs are supported")]
    Undirected,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Couldn't read graph file.\n{0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse graph.\n{0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Kind(#[from] KindError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Loaded graph is invalid.\n{0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Kind(#[from] KindError),

    #[error("Task {node}:\n{error}")]
    Task { node: NodeId, error: TaskError },
}
