//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use glam::Vec4;

use crate::error::{GraphError, PassError, Result};
use crate::graph::{PassContext, PassReflection, PortDirection, RenderGraph, RenderPass};
use crate::options::{OptionReader, Options, Strictness};
use crate::resource::{ResourceKind, TextureFormat};

/// Names of executed passes, in execution order.
pub(crate) type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// A configurable pass with arbitrary ports.
///
/// Each output texture is filled with `scale` plus the sum of the red channel
/// averages of all bound inputs.
pub(crate) struct StubPass {
    type_name: String,
    ports: Vec<(String, PortDirection, ResourceKind, bool)>,
    scale: f64,
    log: Option<ExecutionLog>,
    fail: bool,
}

impl StubPass {
    pub(crate) fn boxed(type_name: &str) -> Box<Self> {
        Box::new(Self {
            type_name: type_name.to_string(),
            ports: Vec::new(),
            scale: 1.0,
            log: None,
            fail: false,
        })
    }

    pub(crate) fn input(mut self: Box<Self>, name: &str, kind: ResourceKind) -> Box<Self> {
        self.ports
            .push((name.to_string(), PortDirection::Input, kind, false));
        self
    }

    pub(crate) fn optional_input(mut self: Box<Self>, name: &str, kind: ResourceKind) -> Box<Self> {
        self.ports
            .push((name.to_string(), PortDirection::Input, kind, true));
        self
    }

    pub(crate) fn output(mut self: Box<Self>, name: &str, kind: ResourceKind) -> Box<Self> {
        self.ports
            .push((name.to_string(), PortDirection::Output, kind, false));
        self
    }

    pub(crate) fn logging(mut self: Box<Self>, log: &ExecutionLog) -> Box<Self> {
        self.log = Some(Arc::clone(log));
        self
    }

    pub(crate) fn failing(mut self: Box<Self>) -> Box<Self> {
        self.fail = true;
        self
    }
}

/// A stub with one `in` input and one `out` output.
pub(crate) fn relay(type_name: &str) -> Box<StubPass> {
    StubPass::boxed(type_name)
        .input("in", RGBA32)
        .output("out", RGBA32)
}

impl RenderPass for StubPass {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        for (name, direction, kind, optional) in &self.ports {
            let port = match direction {
                PortDirection::Input => reflection.add_input(name.clone(), *kind),
                PortDirection::Output => reflection.add_output(name.clone(), *kind),
            };
            if *optional {
                port.optional();
            }
        }
    }

    fn configure(&mut self, options: &Options) -> Result<()> {
        let mut reader = OptionReader::new(&self.type_name, options);
        let scale = reader.float("scale", 1.0)?;
        reader.finish(Strictness::Strict)?;
        self.scale = scale;
        Ok(())
    }

    fn properties(&self) -> Options {
        Options::new().with("scale", self.scale)
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> std::result::Result<(), PassError> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(ctx.pass_id().to_string());
        }
        if self.fail {
            return Err(PassError::Failed("stub failure".into()));
        }

        let mut value = self.scale as f32;
        for (name, direction, _, _) in &self.ports {
            if *direction == PortDirection::Input {
                if let Some(texture) = ctx.optional_input_texture(name)? {
                    value += texture.average().x;
                }
            }
        }
        for (name, direction, kind, _) in &self.ports {
            if *direction == PortDirection::Output && matches!(kind, ResourceKind::Texture(_)) {
                ctx.output_texture_mut(name)?.fill(Vec4::splat(value));
            }
        }
        Ok(())
    }
}

pub(crate) const RGBA32: ResourceKind = ResourceKind::texture(TextureFormat::Rgba32Float);
pub(crate) const RG32UINT: ResourceKind = ResourceKind::texture(TextureFormat::Rg32Uint);
pub(crate) const RGBA8: ResourceKind = ResourceKind::texture(TextureFormat::Rgba8Unorm);
pub(crate) const R32: ResourceKind = ResourceKind::texture(TextureFormat::R32Float);

/// The four passes of the MIS tracer script, in script order, without edges.
pub(crate) fn mis_tracer_passes(log: Option<&ExecutionLog>) -> Result<RenderGraph> {
    let with_log = |pass: Box<StubPass>| match log {
        Some(log) => pass.logging(log),
        None => pass,
    };

    let mut graph = RenderGraph::new("MyMISTracer");
    graph.add_pass(
        with_log(
            StubPass::boxed("AccumulatePass")
                .input("input", RGBA32)
                .output("output", RGBA32),
        ),
        "AccumulatePass",
    )?;
    graph.add_pass(
        with_log(
            StubPass::boxed("ToneMapper")
                .input("src", RGBA32)
                .output("dst", RGBA8),
        ),
        "ToneMapper",
    )?;
    graph.add_pass(
        with_log(
            StubPass::boxed("MyMISTracer")
                .input("vbuffer", RG32UINT)
                .optional_input("viewW", RGBA32)
                .output("color", RGBA32),
        ),
        "MyPathTracer",
    )?;
    graph.add_pass(
        with_log(
            StubPass::boxed("VBufferRT")
                .output("vbuffer", RG32UINT)
                .output("viewW", RGBA32)
                .output("depth", R32),
        ),
        "VBufferRT",
    )?;
    Ok(graph)
}

/// Wire the script's edges.
pub(crate) fn wire_mis_tracer(graph: &mut RenderGraph) -> Result<()> {
    graph.add_edge("AccumulatePass.output", "ToneMapper.src")?;
    graph.add_edge("VBufferRT.vbuffer", "MyPathTracer.vbuffer")?;
    graph.add_edge("VBufferRT.viewW", "MyPathTracer.viewW")?;
    graph.add_edge("MyPathTracer.color", "AccumulatePass.input")?;
    Ok(())
}

/// The complete MIS tracer graph: passes, edges and the marked output.
pub(crate) fn mis_tracer_graph() -> RenderGraph {
    build_mis_tracer(None).unwrap()
}

pub(crate) fn build_mis_tracer(
    log: Option<&ExecutionLog>,
) -> std::result::Result<RenderGraph, GraphError> {
    let mut graph = mis_tracer_passes(log)?;
    wire_mis_tracer(&mut graph)?;
    graph.mark_output("ToneMapper.dst")?;
    Ok(graph)
}
