//! # Lumen Graph
//!
//! Render graph engine for Lumen: passes are declared with named input and
//! output ports, wired together, compiled into an execution plan and run
//! once per frame.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`PassRegistry`] - Pass type name to factory table
//! - [`RenderPass`] - Trait implemented by every pass
//! - [`RenderGraph`] - Graph description and builder
//! - [`compiler`] - Ordering, validation, lifetimes and slot aliasing
//! - [`GraphExecutor`] - Per-frame execution of a [`CompiledPlan`]
//!
//! ## Example
//!
//! ```ignore
//! use lumen_graph::{
//!     ExecutorConfig, FrameContext, GraphExecutor, Options, PassRegistry, RenderGraph,
//! };
//!
//! let mut registry = PassRegistry::new();
//! lumen_passes::register_passes(&mut registry);
//!
//! let mut graph = RenderGraph::new("MyMISTracer");
//! graph.create_pass(&registry, "ToneMapper", "ToneMapper", Options::new())?;
//! // ... more passes and edges ...
//! graph.mark_output("ToneMapper.dst")?;
//!
//! let plan = graph.compile()?;
//! let mut executor = GraphExecutor::new(ExecutorConfig::default());
//! executor.execute(&mut graph, &plan, &FrameContext::new(1280, 720))?;
//! ```

pub mod compiler;
pub mod error;
pub mod executor;
pub mod graph;
pub mod options;
pub mod registry;
pub mod resource;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use compiler::{
    Binding, CompiledPlan, InputBinding, LogicalResource, OutputBinding, PlanStep, ResourceId,
    ResourceLifetime,
};
pub use error::{GraphError, PassError, Result};
pub use executor::{
    CancellationToken, ExecutorConfig, FailurePolicy, FrameContext, FrameReport, FrameStatus,
    GraphExecutor,
};
pub use graph::{
    Dependency, Edge, FrameDictionary, FrameInfo, PassContext, PassDescriptor, PassHandle,
    PassNode, PassReflection, PassType, PortDesc, PortDirection, PortRef, RefreshFlags,
    RenderGraph, RenderPass,
};
pub use options::{OptionReader, OptionValue, Options, Strictness};
pub use registry::{PassFactory, PassRegistry};
pub use resource::{Resource, ResourceKind, Texture, TextureFormat};

/// Graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graph subsystem.
pub fn init() {
    log::info!("Lumen Graph v{} initialized", VERSION);
}
