//! Render graph description and builder.
//!
//! A [`RenderGraph`] accumulates passes, port-to-port edges and marked outputs.
//! Every builder call validates eagerly, so a failing call leaves the graph
//! unchanged and the error points at the call that caused it.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = RenderGraph::new("MyMISTracer");
//! graph.create_pass(&registry, "AccumulatePass", "AccumulatePass", options)?;
//! graph.create_pass(&registry, "ToneMapper", "ToneMapper", Options::new())?;
//! graph.add_edge("AccumulatePass.output", "ToneMapper.src")?;
//! graph.mark_output("ToneMapper.dst")?;
//!
//! let plan = graph.compile()?;
//! ```

mod dictionary;
mod pass;
mod port;

pub use dictionary::{FrameDictionary, RefreshFlags};
pub use pass::{FrameInfo, PassContext, PassType, RenderPass};
pub use port::{PassReflection, PortDesc, PortDirection, PortRef};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compiler::{self, CompiledPlan};
use crate::error::{GraphError, Result};
use crate::options::Options;
use crate::registry::PassRegistry;

/// Handle to a pass in the render graph, in declaration order.
///
/// Only valid within the `RenderGraph` that created it, and only until a pass
/// is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the pass in declaration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The type name and configuration a pass was created from.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub type_name: String,
    pub options: Options,
}

/// A binding from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub src: PortRef,
    pub dst: PortRef,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// An ordering-only edge: `after` executes after `before`, no resource flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub before: String,
    pub after: String,
}

/// A pass together with its identifier and cached port declarations.
pub struct PassNode {
    id: String,
    descriptor: PassDescriptor,
    pass: Box<dyn RenderPass>,
    ports: Vec<PortDesc>,
    reconfigured: bool,
}

impl PassNode {
    /// Identifier the pass was added under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registered type the pass was created from.
    pub fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    /// Type name and options the pass was created with.
    pub fn descriptor(&self) -> &PassDescriptor {
        &self.descriptor
    }

    /// The pass instance.
    pub fn pass(&self) -> &dyn RenderPass {
        self.pass.as_ref()
    }

    pub(crate) fn pass_mut(&mut self) -> &mut dyn RenderPass {
        self.pass.as_mut()
    }

    /// All declared ports in declaration order.
    pub fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    /// Port named `name`, if declared.
    pub fn port(&self, name: &str) -> Option<&PortDesc> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Declared input ports.
    pub fn inputs(&self) -> impl Iterator<Item = &PortDesc> {
        self.ports.iter().filter(|p| p.is_input())
    }

    /// Declared output ports.
    pub fn outputs(&self) -> impl Iterator<Item = &PortDesc> {
        self.ports.iter().filter(|p| p.is_output())
    }
}

impl fmt::Debug for PassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassNode")
            .field("id", &self.id)
            .field("type_name", &self.descriptor.type_name)
            .field("ports", &self.ports)
            .finish()
    }
}

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Mutable graph description owned by its builder.
pub struct RenderGraph {
    id: u64,
    name: String,
    nodes: Vec<PassNode>,
    edges: Vec<Edge>,
    dependencies: Vec<Dependency>,
    outputs: Vec<PortRef>,
    /// Bumped on every structural change; plans record the revision they were compiled from.
    revision: u64,
}

impl RenderGraph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            dependencies: Vec::new(),
            outputs: Vec::new(),
            revision: 0,
        }
    }

    /// Display name of the graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique identity of this graph.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Structural revision, bumped on every edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Create a pass from the registry and add it under `identifier`.
    pub fn create_pass(
        &mut self,
        registry: &PassRegistry,
        type_name: &str,
        identifier: &str,
        options: Options,
    ) -> Result<PassHandle> {
        self.check_identifier(identifier)?;
        let pass = registry.create(type_name, &options)?;
        let descriptor = PassDescriptor {
            type_name: type_name.to_string(),
            options,
        };
        self.insert_node(pass, identifier, descriptor)
    }

    /// Add an already constructed pass under `identifier`.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>, identifier: &str) -> Result<PassHandle> {
        self.check_identifier(identifier)?;
        let descriptor = PassDescriptor {
            type_name: pass.type_name().to_string(),
            options: pass.properties(),
        };
        self.insert_node(pass, identifier, descriptor)
    }

    fn check_identifier(&self, identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.contains('.') {
            return Err(GraphError::InvalidIdentifier(identifier.to_string()));
        }
        if self.node_index(identifier).is_some() {
            return Err(GraphError::DuplicateIdentifier(identifier.to_string()));
        }
        Ok(())
    }

    fn insert_node(
        &mut self,
        pass: Box<dyn RenderPass>,
        identifier: &str,
        descriptor: PassDescriptor,
    ) -> Result<PassHandle> {
        let mut reflection = PassReflection::new();
        pass.reflect(&mut reflection);
        let ports = reflection.into_ports(identifier)?;

        log::debug!(
            "{}: add pass '{}' ({}) with {} ports",
            self.name,
            identifier,
            descriptor.type_name,
            ports.len()
        );

        let handle = PassHandle::new(self.nodes.len());
        self.nodes.push(PassNode {
            id: identifier.to_string(),
            descriptor,
            pass,
            ports,
            reconfigured: false,
        });
        self.revision += 1;
        Ok(handle)
    }

    /// Bind `src` (an output, `"<pass>.<port>"`) to `dst` (an input).
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<()> {
        let src = PortRef::parse(src)?;
        let dst = PortRef::parse(dst)?;

        let src_port = self.resolve_port(&src)?;
        if !src_port.is_output() {
            return Err(GraphError::NotAnOutputPort(src));
        }
        let dst_port = self.resolve_port(&dst)?;
        if !dst_port.is_input() {
            return Err(GraphError::NotAnInputPort(dst));
        }

        if let Some(existing) = self.incoming_edge(&dst) {
            return Err(GraphError::DuplicateInputBinding {
                existing: existing.src.clone(),
                dst,
            });
        }

        if !src_port.kind.is_compatible_with(&dst_port.kind) {
            return Err(GraphError::PortKindMismatch {
                src_kind: src_port.kind,
                dst_kind: dst_port.kind,
                src,
                dst,
            });
        }

        log::debug!("{}: add edge {} -> {}", self.name, src, dst);
        self.edges.push(Edge { src, dst });
        self.revision += 1;
        Ok(())
    }

    /// Require pass `after` to execute after pass `before`.
    pub fn add_dependency(&mut self, before: &str, after: &str) -> Result<()> {
        for id in [before, after] {
            if self.node_index(id).is_none() {
                return Err(GraphError::UnknownPass(id.to_string()));
            }
        }
        let dependency = Dependency {
            before: before.to_string(),
            after: after.to_string(),
        };
        if !self.dependencies.contains(&dependency) {
            log::debug!("{}: add dependency {} -> {}", self.name, before, after);
            self.dependencies.push(dependency);
            self.revision += 1;
        }
        Ok(())
    }

    /// Mark an output port as a final result of the graph.
    pub fn mark_output(&mut self, reference: &str) -> Result<()> {
        let reference = PortRef::parse(reference)?;
        if !self.resolve_port(&reference)?.is_output() {
            return Err(GraphError::NotAnOutputPort(reference));
        }
        if !self.outputs.contains(&reference) {
            log::debug!("{}: mark output {}", self.name, reference);
            self.outputs.push(reference);
            self.revision += 1;
        }
        Ok(())
    }

    /// Remove a marked output. Returns whether it was marked.
    pub fn unmark_output(&mut self, reference: &str) -> Result<bool> {
        let reference = PortRef::parse(reference)?;
        let before = self.outputs.len();
        self.outputs.retain(|r| *r != reference);
        let removed = self.outputs.len() != before;
        if removed {
            self.revision += 1;
        }
        Ok(removed)
    }

    /// Remove the edge feeding input `dst`, if any.
    pub fn remove_edge(&mut self, dst: &str) -> Result<Option<Edge>> {
        let dst = PortRef::parse(dst)?;
        let Some(index) = self.edges.iter().position(|e| e.dst == dst) else {
            return Ok(None);
        };
        self.revision += 1;
        Ok(Some(self.edges.remove(index)))
    }

    /// Remove a pass along with its edges, dependencies and marked outputs.
    pub fn remove_pass(&mut self, identifier: &str) -> Result<Box<dyn RenderPass>> {
        let index = self
            .node_index(identifier)
            .ok_or_else(|| GraphError::UnknownPass(identifier.to_string()))?;
        let node = self.nodes.remove(index);

        self.edges
            .retain(|e| e.src.pass != identifier && e.dst.pass != identifier);
        self.dependencies
            .retain(|d| d.before != identifier && d.after != identifier);
        self.outputs.retain(|r| r.pass != identifier);
        self.revision += 1;

        log::debug!("{}: removed pass '{}'", self.name, identifier);
        Ok(node.pass)
    }

    /// Reconfigure a pass in place.
    ///
    /// `options` is overlaid on the pass's current properties. Ports are not
    /// re-declared, so the compiled plan stays valid; the next frame is told
    /// that render options changed.
    pub fn update_pass(&mut self, identifier: &str, options: &Options) -> Result<()> {
        let name = &self.name;
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == identifier)
            .ok_or_else(|| GraphError::UnknownPass(identifier.to_string()))?;

        let merged = node.pass.properties().merged(options);
        node.pass.configure(&merged)?;
        log::debug!("{}: reconfigured '{}' with {}", name, identifier, merged);
        node.descriptor.options = merged;
        node.reconfigured = true;
        Ok(())
    }

    /// Take and clear the "a pass was reconfigured" state.
    pub(crate) fn take_reconfigured(&mut self) -> bool {
        let mut any = false;
        for node in &mut self.nodes {
            any |= std::mem::take(&mut node.reconfigured);
        }
        any
    }

    /// Resolve a port reference against the declared passes.
    pub fn resolve_port(&self, reference: &PortRef) -> Result<&PortDesc> {
        let node = self
            .pass(&reference.pass)
            .ok_or_else(|| GraphError::UnknownPass(reference.pass.clone()))?;
        node.port(&reference.port).ok_or_else(|| GraphError::UnknownPort {
            pass: reference.pass.clone(),
            port: reference.port.clone(),
        })
    }

    /// The edge feeding input `dst`, if any.
    pub fn incoming_edge(&self, dst: &PortRef) -> Option<&Edge> {
        self.edges.iter().find(|e| e.dst == *dst)
    }

    pub(crate) fn node_index(&self, identifier: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == identifier)
    }

    /// Pass added under `identifier`.
    pub fn pass(&self, identifier: &str) -> Option<&PassNode> {
        self.nodes.iter().find(|n| n.id == identifier)
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [PassNode] {
        &mut self.nodes
    }

    /// All passes in declaration order.
    pub fn passes(&self) -> &[PassNode] {
        &self.nodes
    }

    /// Number of passes.
    pub fn pass_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no passes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Descriptor of the pass added under `identifier`.
    pub fn descriptor(&self, identifier: &str) -> Option<&PassDescriptor> {
        self.pass(identifier).map(PassNode::descriptor)
    }

    /// Data edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Execution-only dependencies in insertion order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Ports marked as graph outputs.
    pub fn outputs(&self) -> &[PortRef] {
        &self.outputs
    }

    /// Compile the graph into an executable plan.
    pub fn compile(&self) -> Result<CompiledPlan> {
        compiler::compile(self)
    }
}

impl fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderGraph")
            .field("name", &self.name)
            .field("revision", &self.revision)
            .field("passes", &self.nodes)
            .field("edges", &self.edges)
            .field("dependencies", &self.dependencies)
            .field("outputs", &self.outputs)
            .finish()
    }
}
