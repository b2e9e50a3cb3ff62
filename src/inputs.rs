use serde_json::Value;

use crate::link::LinkAttrs;
use crate::node::NodeAttrs;
use crate::task::{Inputs, Outputs};

/// Apply the wiring of one link: merge the outputs of its source task into
/// the pending inputs of its target task.
///
/// With `map_all_data` every output is passed on under its own name.
/// Otherwise each entry of `data_mapping` copies one output to one input, or
/// the whole output map when the entry names no output. Outputs which the
/// source hasn't produced are skipped.
pub fn add_dynamic_inputs(accumulator: &mut Inputs, link: &LinkAttrs, source_outputs: &Outputs) {
    if link.map_all_data {
        accumulator.extend(
            source_outputs
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        return;
    }

    for mapping in &link.data_mapping {
        match &mapping.source_output {
            None => {
                let all = source_outputs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                accumulator.insert(mapping.target_input.clone(), Value::Object(all));
            }
            Some(name) => match source_outputs.get(name) {
                Some(value) => {
                    accumulator.insert(mapping.target_input.clone(), value.clone());
                }
                None => {
                    tracing::trace!(
                        "output '{}' not available for input '{}'",
                        name,
                        mapping.target_input
                    );
                }
            },
        }
    }
}

/// Static inputs of the node, overridden by the dynamic ones.
pub(crate) fn merge_static_inputs(attrs: &NodeAttrs, dynamic: Inputs) -> Inputs {
    let mut inputs: Inputs = attrs
        .default_inputs
        .iter()
        .map(|item| (item.name.clone(), item.value.clone()))
        .collect();
    inputs.extend(dynamic);
    inputs
}
