#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod conditions;
mod error;
mod executor;
mod filter;
mod graph;
mod inputs;
mod link;
pub mod loader;
mod node;
mod outputs;
mod required;
mod task;
mod taskgraph;
mod traversal;
mod utils;

#[cfg(test)]
mod test_support;

pub use crate::conditions::Branch;
pub use crate::error::*;
pub use crate::executor::{ExecuteOptions, ExecuteResult, ExecutionContext};
pub use crate::filter::Filter;
pub use crate::graph::GraphModel;
pub use crate::inputs::add_dynamic_inputs;
pub use crate::link::{CONDITIONS_ELSE_VALUE, Condition, ConditionValue, DataMapping, LinkAttrs};
pub use crate::loader::{GraphRepresentation, GraphSource, dump_graph, load_graph};
pub use crate::node::{InputItem, NodeAttrs, NodeId};
pub use crate::outputs::{
    NodeIdentifier, OutputMap, OutputRename, OutputSelection, OutputValue, ResolvedOutputs,
    extract_output_values,
};
pub use crate::task::{Inputs, Outputs, Registry, RegistryTask, Task, TaskFactory, VarInfo};
pub use crate::taskgraph::{DefaultInputs, TaskGraph};

#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
