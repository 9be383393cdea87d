//! Render graph compilation.
//!
//! This module turns a [`RenderGraph`] description into an immutable
//! [`CompiledPlan`]. The compiler performs:
//!
//! 1. **Dependency analysis** - a pass depends on every pass feeding one of
//!    its inputs, plus any explicit ordering dependency
//! 2. **Cycle detection** - the graph must be a DAG
//! 3. **Topological sort** - ties broken by declaration order, so identical
//!    descriptions always produce identical schedules
//! 4. **Input validation** - every required input must be connected
//! 5. **Output validation** - at least one output must be marked
//! 6. **Lifetime analysis and aliasing** - one logical resource per output
//!    port, mapped onto as few physical slots as non-overlapping lifetimes allow
//!
//! # Example
//!
//! ```ignore
//! let plan = compile(&graph)?;
//! for step in plan.steps() {
//!     println!("{}", step.pass);
//! }
//! ```

mod aliasing;

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::error::{GraphError, Result};
use crate::graph::{PortRef, RenderGraph};
use crate::resource::ResourceKind;

/// Identifier of a logical resource within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    /// Position in [`CompiledPlan::resources`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resource lifetime in terms of plan step indices, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

impl ResourceLifetime {
    /// Whether the resource is alive at `step`.
    pub fn contains(&self, step: usize) -> bool {
        step >= self.first_use && step <= self.last_use
    }

    /// Whether two lifetimes share at least one step.
    pub fn overlaps(&self, other: &ResourceLifetime) -> bool {
        self.first_use <= other.last_use && other.first_use <= self.last_use
    }
}

/// A resource produced by one output port and read by zero or more inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalResource {
    pub id: ResourceId,
    pub producer: PortRef,
    pub kind: ResourceKind,
    pub lifetime: ResourceLifetime,
    /// Marked outputs outlive the frame and never give up their slot.
    pub persistent: bool,
    /// Index of the physical slot backing this resource.
    pub slot: usize,
}

/// What an input port reads during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Resource(ResourceId),
    /// Unconnected optional input.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub port: String,
    pub binding: Binding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    pub port: String,
    pub resource: ResourceId,
}

/// One pass invocation in the compiled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub pass: String,
    /// Index of the pass in the graph's declaration order.
    pub(crate) node: usize,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
}

/// An immutable execution plan derived from a graph description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPlan {
    graph_id: u64,
    graph_name: String,
    revision: u64,
    steps: Vec<PlanStep>,
    resources: Vec<LogicalResource>,
    slots: Vec<ResourceKind>,
    outputs: Vec<(PortRef, ResourceId)>,
}

impl CompiledPlan {
    pub(crate) fn graph_id(&self) -> u64 {
        self.graph_id
    }

    /// Name of the graph this plan was compiled from.
    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Revision of the graph this plan was compiled from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Pass identifiers in execution order.
    pub fn pass_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.pass.as_str()).collect()
    }

    /// Position of a pass in the execution order.
    pub fn step_of(&self, pass: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.pass == pass)
    }

    /// Number of steps.
    pub fn pass_count(&self) -> usize {
        self.steps.len()
    }

    /// Logical resources, one per connected or marked output port.
    pub fn resources(&self) -> &[LogicalResource] {
        &self.resources
    }

    /// The logical resource with `id`, or `None` for an id from another plan.
    pub fn resource(&self, id: ResourceId) -> Option<&LogicalResource> {
        self.resources.get(id.index())
    }

    /// The logical resource produced by an output port.
    pub fn resource_for(&self, producer: &PortRef) -> Option<&LogicalResource> {
        self.resources.iter().find(|r| r.producer == *producer)
    }

    /// Kinds of the physical slots, indexed by [`LogicalResource::slot`].
    pub fn slots(&self) -> &[ResourceKind] {
        &self.slots
    }

    /// Number of physical slots after aliasing.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Marked outputs and the resources holding them.
    pub fn outputs(&self) -> &[(PortRef, ResourceId)] {
        &self.outputs
    }

    /// Check if a resource is alive at a given execution step.
    pub fn is_resource_alive(&self, id: ResourceId, step: usize) -> bool {
        self.resources
            .get(id.index())
            .is_some_and(|r| r.lifetime.contains(step))
    }
}

/// Compile a render graph into an execution plan.
///
/// # Returns
///
/// * `Ok(CompiledPlan)` - order, bindings and slot layout ready for execution
/// * `Err(GraphError::CyclicGraph)` - the dependency graph has a cycle
/// * `Err(GraphError::UnconnectedInput)` - a required input has no edge
/// * `Err(GraphError::NoOutputMarked)` - nothing is marked as output
pub fn compile(graph: &RenderGraph) -> Result<CompiledPlan> {
    let nodes = graph.passes();
    let n = nodes.len();

    let index_of = |id: &str| {
        graph
            .node_index(id)
            .ok_or_else(|| GraphError::UnknownPass(id.to_string()))
    };

    // (dependent, dependency) pairs; the set removes parallel edges
    let mut dependencies = BTreeSet::new();
    for edge in graph.edges() {
        dependencies.insert((index_of(&edge.dst.pass)?, index_of(&edge.src.pass)?));
    }
    for dependency in graph.dependencies() {
        dependencies.insert((index_of(&dependency.after)?, index_of(&dependency.before)?));
    }

    let cyclic = |remaining: Vec<usize>| GraphError::CyclicGraph {
        passes: remaining
            .into_iter()
            .map(|i| nodes[i].id().to_string())
            .collect(),
    };
    let order = topological_order(n, &dependencies).map_err(cyclic)?;

    for &index in &order {
        let node = &nodes[index];
        for port in node.inputs() {
            let reference = PortRef::new(node.id(), port.name.as_str());
            if !port.optional && graph.incoming_edge(&reference).is_none() {
                return Err(GraphError::UnconnectedInput(reference));
            }
        }
    }

    if graph.outputs().is_empty() {
        return Err(GraphError::NoOutputMarked);
    }

    // Logical resources in producer order
    let mut resources: Vec<LogicalResource> = Vec::new();
    let mut produced: HashMap<PortRef, ResourceId> = HashMap::new();
    let mut steps = Vec::with_capacity(n);

    for (step, &index) in order.iter().enumerate() {
        let node = &nodes[index];

        let mut inputs = Vec::new();
        for port in node.inputs() {
            let reference = PortRef::new(node.id(), port.name.as_str());
            let binding = match graph.incoming_edge(&reference) {
                Some(edge) => {
                    let id = produced[&edge.src];
                    let lifetime = &mut resources[id.index()].lifetime;
                    lifetime.last_use = lifetime.last_use.max(step);
                    Binding::Resource(id)
                }
                None => Binding::Absent,
            };
            inputs.push(InputBinding {
                port: port.name.clone(),
                binding,
            });
        }

        let mut outputs = Vec::new();
        for port in node.outputs() {
            let producer = PortRef::new(node.id(), port.name.as_str());
            let id = ResourceId(resources.len() as u32);
            resources.push(LogicalResource {
                id,
                persistent: graph.outputs().contains(&producer),
                producer: producer.clone(),
                kind: port.kind,
                lifetime: ResourceLifetime {
                    first_use: step,
                    last_use: step,
                },
                slot: 0,
            });
            produced.insert(producer, id);
            outputs.push(OutputBinding {
                port: port.name.clone(),
                resource: id,
            });
        }

        steps.push(PlanStep {
            pass: node.id().to_string(),
            node: index,
            inputs,
            outputs,
        });
    }

    // Marked outputs stay alive until the end of the frame
    let last_step = n.saturating_sub(1);
    for resource in resources.iter_mut().filter(|r| r.persistent) {
        resource.lifetime.last_use = last_step;
    }

    let slots = aliasing::assign_slots(&mut resources);

    let outputs = graph
        .outputs()
        .iter()
        .map(|reference| (reference.clone(), produced[reference]))
        .collect();

    log::info!(
        "compiled graph '{}' (revision {}): {} passes, {} resources in {} slots",
        graph.name(),
        graph.revision(),
        steps.len(),
        resources.len(),
        slots.len()
    );

    Ok(CompiledPlan {
        graph_id: graph.id(),
        graph_name: graph.name().to_string(),
        revision: graph.revision(),
        steps,
        resources,
        slots,
        outputs,
    })
}

/// Kahn's algorithm with a min-heap so that ready passes leave in declaration order.
///
/// On failure returns the passes that lie on or between cycles, in declaration order.
fn topological_order(
    n: usize,
    dependencies: &BTreeSet<(usize, usize)>,
) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0u32; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(dependent, dependency) in dependencies {
        in_degree[dependent] += 1;
        dependents[dependency].push(dependent);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    // Peel off passes that only sit downstream of a cycle
    let mut remaining: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
    let mut out_degree: Vec<usize> = (0..n)
        .map(|i| {
            if remaining[i] {
                dependents[i].iter().filter(|&&d| remaining[d]).count()
            } else {
                0
            }
        })
        .collect();
    let mut sinks: Vec<usize> = (0..n).filter(|&i| remaining[i] && out_degree[i] == 0).collect();
    while let Some(sink) = sinks.pop() {
        remaining[sink] = false;
        for &(dependent, dependency) in dependencies {
            if dependent == sink && remaining[dependency] {
                out_degree[dependency] -= 1;
                if out_degree[dependency] == 0 {
                    sinks.push(dependency);
                }
            }
        }
    }

    Err((0..n).filter(|&i| remaining[i]).collect())
}
