//! Per-frame execution of compiled plans.
//!
//! The executor owns the physical resources of a frame and drives the passes
//! of a [`RenderGraph`] in the order fixed by a [`CompiledPlan`].
//!
//! # Frame lifecycle
//!
//! | Step | Action |
//! |------|--------|
//! | Validate | Reject plans compiled from another graph or revision |
//! | Prepare | (Re)allocate physical slots when the layout or resolution changed |
//! | Run | For each step: check cancellation, bind ports, call `execute` |
//! | Publish | Remember where the marked outputs live for [`GraphExecutor::output`] |
//!
//! # Example
//!
//! ```ignore
//! let plan = graph.compile()?;
//! let mut executor = GraphExecutor::new(ExecutorConfig::default());
//! let report = executor.execute(&mut graph, &plan, &FrameContext::new(1280, 720))?;
//! let image = executor.output_texture("ToneMapper.dst");
//! ```

mod cancellation;

pub use cancellation::CancellationToken;

use crate::compiler::{Binding, CompiledPlan};
use crate::error::{GraphError, PassError, Result};
use crate::graph::{FrameDictionary, FrameInfo, PassContext, PortRef, RefreshFlags, RenderGraph};
use crate::resource::{Resource, ResourceKind, Texture};

/// What the executor does when a pass fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Return the failure as an error from [`GraphExecutor::execute`].
    #[default]
    FailFast,
    /// Log the failure, abandon the rest of the frame and report it in the [`FrameReport`].
    ReportAndSkip,
}

/// Executor configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub failure_policy: FailurePolicy,
}

impl ExecutorConfig {
    /// Replace the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Per-frame inputs to [`GraphExecutor::execute`].
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub width: u32,
    pub height: u32,
    pub cancellation: Option<CancellationToken>,
}

impl FrameContext {
    /// A frame at `width`x`height` without cancellation.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cancellation: None,
        }
    }

    /// Attach a token that is checked before every pass.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// How a frame ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// Every pass ran.
    Completed,
    /// The cancellation token was raised before all passes ran.
    Cancelled,
    /// A pass failed under [`FailurePolicy::ReportAndSkip`].
    Faulted { pass: String, cause: PassError },
}

/// Summary of one executed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Passes whose `execute` returned successfully.
    pub passes_executed: usize,
    pub status: FrameStatus,
}

impl FrameReport {
    /// Whether every pass ran.
    pub fn is_completed(&self) -> bool {
        self.status == FrameStatus::Completed
    }
}

/// Runs compiled plans frame after frame.
///
/// Resources persist across frames as long as the plan layout and the
/// resolution stay the same.
#[derive(Debug)]
pub struct GraphExecutor {
    config: ExecutorConfig,
    /// Physical slots; a slot is `None` only while its resource is lent to a pass.
    pool: Vec<Option<Resource>>,
    layout: Vec<ResourceKind>,
    resolution: Option<(u32, u32)>,
    /// Marked outputs of the last completed frame and the slots holding them.
    outputs: Vec<(PortRef, usize)>,
    /// Flags seeded into every frame until one completes.
    pending: RefreshFlags,
    frame_index: u64,
}

impl GraphExecutor {
    /// An executor with an empty resource pool.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            pool: Vec::new(),
            layout: Vec::new(),
            resolution: None,
            outputs: Vec::new(),
            pending: RefreshFlags::empty(),
            frame_index: 0,
        }
    }

    /// The configuration the executor was created with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Number of frames started so far.
    pub fn frames_executed(&self) -> u64 {
        self.frame_index
    }

    /// Execute one frame of `plan` against the passes of `graph`.
    ///
    /// # Returns
    ///
    /// * `Ok(FrameReport)` - the frame completed, was cancelled, or faulted under
    ///   [`FailurePolicy::ReportAndSkip`]
    /// * `Err(GraphError::StalePlan)` - `plan` was not compiled from the current `graph`
    /// * `Err(GraphError::PassExecutionFailure)` - a pass failed under [`FailurePolicy::FailFast`]
    pub fn execute(
        &mut self,
        graph: &mut RenderGraph,
        plan: &CompiledPlan,
        frame: &FrameContext,
    ) -> Result<FrameReport> {
        if plan.graph_id() != graph.id() || plan.revision() != graph.revision() {
            return Err(GraphError::StalePlan {
                plan_graph: plan.graph_name().to_string(),
                plan_revision: plan.revision(),
                graph: graph.name().to_string(),
                graph_revision: graph.revision(),
            });
        }

        if graph.take_reconfigured() {
            self.pending |= RefreshFlags::RENDER_OPTIONS_CHANGED;
        }
        let resolution = (frame.width, frame.height);
        if self.resolution.is_some_and(|previous| previous != resolution) {
            self.pending |= RefreshFlags::RESOLUTION_CHANGED;
        }
        self.prepare(plan, resolution);

        let mut dictionary = FrameDictionary::new();
        dictionary.raise(self.pending);

        let frame_index = self.frame_index;
        self.frame_index += 1;
        self.outputs.clear();

        let info = FrameInfo::new(frame_index, frame.width, frame.height);
        let nodes = graph.nodes_mut();
        let mut passes_executed = 0;

        for step in plan.steps() {
            if frame.is_cancelled() {
                log::debug!(
                    "frame {frame_index} cancelled after {passes_executed} of {} passes",
                    plan.pass_count()
                );
                return Ok(FrameReport {
                    frame_index,
                    passes_executed,
                    status: FrameStatus::Cancelled,
                });
            }

            // Lend the output slots to the pass; inputs stay in the pool.
            let mut lent = Vec::with_capacity(step.outputs.len());
            for output in &step.outputs {
                let Some(slot) = plan.resource(output.resource).map(|r| r.slot) else {
                    continue;
                };
                let Some(kind) = self.layout.get(slot).copied() else {
                    continue;
                };
                let resource = self.pool[slot]
                    .take()
                    .unwrap_or_else(|| Resource::allocate(kind, frame.width, frame.height));
                lent.push((output.port.as_str(), slot, resource));
            }

            let lent_slots: Vec<(&str, usize)> = lent
                .iter()
                .map(|(name, slot, _)| (*name, *slot))
                .collect();

            let mut ctx = PassContext::new(&step.pass, info, &mut dictionary);
            for input in &step.inputs {
                let resource = match input.binding {
                    Binding::Resource(id) => plan
                        .resource(id)
                        .and_then(|r| self.pool.get(r.slot))
                        .and_then(Option::as_ref),
                    Binding::Absent => None,
                };
                ctx = ctx.with_input(&input.port, resource);
            }
            for (port, _, resource) in lent {
                ctx = ctx.with_output(port, resource);
            }

            log::trace!("frame {frame_index}: executing '{}'", step.pass);
            let result = nodes[step.node].pass_mut().execute(&mut ctx);

            let returned: Vec<(usize, Resource)> = ctx
                .into_outputs()
                .into_iter()
                .filter_map(|(port, resource)| {
                    lent_slots
                        .iter()
                        .find(|(name, _)| *name == port)
                        .map(|(_, slot)| (*slot, resource))
                })
                .collect();
            for (slot, resource) in returned {
                self.pool[slot] = Some(resource);
            }

            if let Err(cause) = result {
                match self.config.failure_policy {
                    FailurePolicy::FailFast => {
                        return Err(GraphError::PassExecutionFailure {
                            pass: step.pass.clone(),
                            cause,
                        });
                    }
                    FailurePolicy::ReportAndSkip => {
                        log::error!("frame {frame_index}: pass '{}' failed: {cause}", step.pass);
                        return Ok(FrameReport {
                            frame_index,
                            passes_executed,
                            status: FrameStatus::Faulted {
                                pass: step.pass.clone(),
                                cause,
                            },
                        });
                    }
                }
            }
            passes_executed += 1;
        }

        self.outputs = plan
            .outputs()
            .iter()
            .filter_map(|(reference, id)| {
                let slot = plan.resource(*id)?.slot;
                Some((reference.clone(), slot))
            })
            .collect();
        self.pending = RefreshFlags::empty();

        Ok(FrameReport {
            frame_index,
            passes_executed,
            status: FrameStatus::Completed,
        })
    }

    /// Allocate the physical slots of `plan` unless they already match.
    fn prepare(&mut self, plan: &CompiledPlan, resolution: (u32, u32)) {
        if self.layout == plan.slots() && self.resolution == Some(resolution) {
            return;
        }

        let (width, height) = resolution;
        log::debug!(
            "allocating {} slots at {}x{} for '{}'",
            plan.slot_count(),
            width,
            height,
            plan.graph_name()
        );
        self.layout = plan.slots().to_vec();
        self.pool = self
            .layout
            .iter()
            .map(|kind| Some(Resource::allocate(*kind, width, height)))
            .collect();
        self.resolution = Some(resolution);
    }

    /// A marked output of the last completed frame, e.g. `"ToneMapper.dst"`.
    ///
    /// Returns `None` for unmarked ports, malformed references, or when the
    /// last frame did not complete.
    pub fn output(&self, reference: &str) -> Option<&Resource> {
        let reference = PortRef::parse(reference).ok()?;
        let (_, slot) = self.outputs.iter().find(|(r, _)| *r == reference)?;
        self.pool.get(*slot)?.as_ref()
    }

    /// Texture view of [`output`](Self::output).
    pub fn output_texture(&self, reference: &str) -> Option<&Texture> {
        self.output(reference)?.as_texture()
    }

    /// Buffer view of [`output`](Self::output).
    pub fn output_buffer(&self, reference: &str) -> Option<&[u8]> {
        self.output(reference)?.as_buffer()
    }
}
