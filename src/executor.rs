use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

use tracing::Level;

use crate::error::{EngineError, StructuralError};
use crate::filter::Filter;
use crate::inputs::add_dynamic_inputs;
use crate::node::NodeId;
use crate::outputs::{OutputSelection, OutputValue, ResolvedOutputs, extract_output_values};
use crate::task::{Inputs, Task, VarInfo};
use crate::taskgraph::TaskGraph;

/// Tasks instantiated during one run.
///
/// With eviction enabled every node carries the number of its successors
/// which haven't consumed its outputs yet. Once that number drops to zero the
/// task is dropped from the context.
#[derive(Default)]
pub struct ExecutionContext {
    tasks: HashMap<NodeId, Box<dyn Task>>,
    evict: Option<HashMap<NodeId, usize>>,
}

impl ExecutionContext {
    /// Keep every task until the end of the run.
    pub fn retain_all() -> Self {
        Self::default()
    }

    /// Drop tasks once all of their successors have been instantiated.
    pub fn evicting(counter: HashMap<NodeId, usize>) -> Self {
        Self {
            tasks: HashMap::new(),
            evict: Some(counter),
        }
    }

    pub fn tasks(&self) -> &HashMap<NodeId, Box<dyn Task>> {
        &self.tasks
    }

    pub fn into_tasks(self) -> HashMap<NodeId, Box<dyn Task>> {
        self.tasks
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Record that one successor of `id` consumed its outputs.
    fn consume(&mut self, id: &NodeId) {
        if let Some(counter) = self.evict.as_mut()
            && let Some(count) = counter.get_mut(id)
        {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.tasks.remove(id);
                tracing::debug!("evicted task {}", id);
            }
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("evict", &self.evict)
            .finish()
    }
}

/// Options of a single [`TaskGraph::execute`] run.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub varinfo: Option<VarInfo>,
    /// Abort the run on the first failing task.
    pub raise_on_error: bool,
    /// Keep every task instead of only the last ones. Ignored when outputs
    /// are selected.
    pub results_of_all_nodes: bool,
    pub outputs: Option<OutputSelection>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            varinfo: None,
            raise_on_error: true,
            results_of_all_nodes: false,
            outputs: None,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varinfo(mut self, varinfo: VarInfo) -> Self {
        self.varinfo = Some(varinfo);
        self
    }

    pub fn raise_on_error(mut self, value: bool) -> Self {
        self.raise_on_error = value;
        self
    }

    pub fn results_of_all_nodes(mut self, value: bool) -> Self {
        self.results_of_all_nodes = value;
        self
    }

    pub fn outputs(mut self, selection: OutputSelection) -> Self {
        self.outputs = Some(selection);
        self
    }
}

/// What a run returns.
pub enum ExecuteResult {
    /// The tasks left in the execution context.
    Tasks(HashMap<NodeId, Box<dyn Task>>),
    /// The selected output values of all nodes, merged into one map.
    Values(BTreeMap<String, OutputValue>),
}

impl ExecuteResult {
    pub fn tasks(&self) -> Option<&HashMap<NodeId, Box<dyn Task>>> {
        match self {
            ExecuteResult::Tasks(tasks) => Some(tasks),
            ExecuteResult::Values(_) => None,
        }
    }

    pub fn values(&self) -> Option<&BTreeMap<String, OutputValue>> {
        match self {
            ExecuteResult::Tasks(_) => None,
            ExecuteResult::Values(values) => Some(values),
        }
    }
}

impl fmt::Debug for ExecuteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteResult::Tasks(tasks) => f
                .debug_tuple("Tasks")
                .field(&tasks.keys().collect::<Vec<_>>())
                .finish(),
            ExecuteResult::Values(values) => f.debug_tuple("Values").field(values).finish(),
        }
    }
}

impl TaskGraph {
    /// Instantiate the task of `id` together with every upstream task it
    /// depends on, wiring their outputs into its inputs.
    ///
    /// Tasks already present in `ctx` are reused. Afterwards `ctx` holds the
    /// new task and those upstream tasks which weren't evicted.
    pub fn instantiate_task_static<'a>(
        &self,
        id: &NodeId,
        ctx: &'a mut ExecutionContext,
        varinfo: Option<&VarInfo>,
    ) -> Result<&'a mut dyn Task, EngineError> {
        if self.is_cyclic() {
            return Err(StructuralError::Cyclic(self.to_string()).into());
        }
        self.instantiate(id, ctx, varinfo)
    }

    fn instantiate<'a>(
        &self,
        id: &NodeId,
        ctx: &'a mut ExecutionContext,
        varinfo: Option<&VarInfo>,
    ) -> Result<&'a mut dyn Task, EngineError> {
        let mut dynamic = Inputs::new();

        for source in self.graph().predecessors(id, &Filter::default()) {
            if !ctx.contains(&source) {
                self.instantiate(&source, ctx, varinfo)?;
            }
            if let Some(link) = self.graph().link(&source, id)
                && let Some(task) = ctx.tasks.get(&source)
            {
                add_dynamic_inputs(&mut dynamic, link, task.output_variables());
            }
            ctx.consume(&source);
        }

        let task = self.instantiate_task(id, varinfo, dynamic)?;
        tracing::debug!("instantiated task {}", id);

        let slot = match ctx.tasks.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(task);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(task),
        };
        Ok(slot.as_mut())
    }

    /// Run every task of the graph once, in topological order.
    ///
    /// Graphs with cycles or conditional links can't be executed. Without an
    /// output selection the result holds the tasks left after eviction, or
    /// all of them with `results_of_all_nodes`.
    pub fn execute(&self, options: ExecuteOptions) -> Result<ExecuteResult, EngineError> {
        if self.is_cyclic() {
            return Err(StructuralError::Cyclic(self.to_string()).into());
        }
        if self.graph().has_conditional_links() {
            return Err(StructuralError::ConditionalLinks(self.to_string()).into());
        }

        let outputs = match &options.outputs {
            Some(selection) => self.parse_outputs(selection)?,
            None => ResolvedOutputs::new(),
        };
        let selecting = !outputs.is_empty();

        let results_of_all_nodes = options.results_of_all_nodes && !selecting;
        let cleanup_references = !results_of_all_nodes;

        let mut ctx = if results_of_all_nodes {
            ExecutionContext::retain_all()
        } else {
            ExecutionContext::evicting(self.graph().successor_counter())
        };
        let mut values = BTreeMap::new();

        let start = Instant::now();
        tracing::info!("executing {} with {} tasks", self, self.graph().len());

        for id in self.topological_sort()? {
            let span = tracing::span!(Level::INFO, "task", node = %id);
            let _enter = span.enter();

            let task = self.instantiate(&id, &mut ctx, options.varinfo.as_ref())?;

            if let Err(error) = task.execute(options.raise_on_error, cleanup_references) {
                if options.raise_on_error {
                    return Err(EngineError::Task { node: id, error });
                }
                tracing::warn!("task {} failed: {error:#}", id);
            }

            if selecting {
                values.extend(extract_output_values(&id, &*task, &outputs));
            }
        }

        tracing::info!("finished {} in {:?}", self, start.elapsed());

        if selecting {
            Ok(ExecuteResult::Values(values))
        } else {
            Ok(ExecuteResult::Tasks(ctx.into_tasks()))
        }
    }
}
