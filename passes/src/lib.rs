//! # Lumen Passes
//!
//! Standard pass types for the Lumen render graph.
//!
//! | Type name | Inputs | Outputs |
//! |-----------|--------|---------|
//! | `VBufferRT` | - | `vbuffer`, `viewW`, `depth` |
//! | `MyMISTracer` | `vbuffer`, `viewW` (optional) | `color`, `reservoirs` |
//! | `ReservoirsReuse` | `colorin`, `reservoirsin` | `colorout` |
//! | `AccumulatePass` | `input` | `output` |
//! | `ToneMapper` | `src` | `dst` |
//!
//! Call [`register_passes`] once at startup to make all of them available to
//! [`RenderGraph::create_pass`].

pub mod accumulate;
pub mod channels;
pub mod path_tracer;
pub mod reservoirs_reuse;
pub mod sampling;
pub mod tone_mapper;
pub mod vbuffer;

pub use accumulate::{AccumulateConfig, AccumulatePass, PrecisionMode};
pub use path_tracer::{MyMISTracer, TracerConfig};
pub use reservoirs_reuse::{Reservoir, ReservoirsReuse, ReuseConfig};
pub use tone_mapper::{Operator, ToneMapper, ToneMapperConfig};
pub use vbuffer::{SamplePattern, VBufferConfig, VBufferRT};

use lumen_graph::{Options, PassRegistry, RenderGraph, Result};

/// Register every pass type of this crate.
pub fn register_passes(registry: &mut PassRegistry) {
    registry.register_type::<AccumulatePass>();
    registry.register_type::<ToneMapper>();
    registry.register_type::<MyMISTracer>();
    registry.register_type::<ReservoirsReuse>();
    registry.register_type::<VBufferRT>();
    log::debug!(
        "standard passes registered, {} pass types available",
        registry.len()
    );
}

/// A registry holding the standard passes.
pub fn standard_registry() -> PassRegistry {
    let mut registry = PassRegistry::new();
    register_passes(&mut registry);
    registry
}

/// The MIS path tracing graph: visibility buffer, tracer, accumulation and tone mapping.
pub fn mis_tracer_graph(registry: &PassRegistry) -> Result<RenderGraph> {
    let mut g = RenderGraph::new("MyMISTracer");
    g.create_pass(
        registry,
        "AccumulatePass",
        "AccumulatePass",
        Options::new()
            .with("enabled", true)
            .with("precisionMode", "Single"),
    )?;
    g.create_pass(
        registry,
        "ToneMapper",
        "ToneMapper",
        Options::new()
            .with("autoExposure", false)
            .with("exposureCompensation", 0.0),
    )?;
    g.create_pass(registry, "MyMISTracer", "MyPathTracer", Options::new())?;
    g.create_pass(
        registry,
        "VBufferRT",
        "VBufferRT",
        Options::new()
            .with("samplePattern", "Stratified")
            .with("sampleCount", 16),
    )?;
    g.add_edge("AccumulatePass.output", "ToneMapper.src")?;
    g.add_edge("VBufferRT.vbuffer", "MyPathTracer.vbuffer")?;
    g.add_edge("VBufferRT.viewW", "MyPathTracer.viewW")?;
    g.add_edge("MyPathTracer.color", "AccumulatePass.input")?;
    g.mark_output("ToneMapper.dst")?;
    Ok(g)
}

/// The MIS tracer graph with ReSTIR reservoir reuse between tracing and accumulation.
pub fn restir_graph(registry: &PassRegistry) -> Result<RenderGraph> {
    let mut g = RenderGraph::new("MyReSTIR");
    g.create_pass(
        registry,
        "AccumulatePass",
        "AccumulatePass",
        Options::new()
            .with("enabled", true)
            .with("precisionMode", "Single"),
    )?;
    g.create_pass(
        registry,
        "ToneMapper",
        "ToneMapper",
        Options::new()
            .with("autoExposure", false)
            .with("exposureCompensation", 0.0),
    )?;
    g.create_pass(registry, "MyMISTracer", "MyPathTracer", Options::new())?;
    g.create_pass(registry, "ReservoirsReuse", "ReservoirsReuse", Options::new())?;
    g.create_pass(
        registry,
        "VBufferRT",
        "VBufferRT",
        Options::new()
            .with("samplePattern", "Stratified")
            .with("sampleCount", 16),
    )?;
    g.add_edge("VBufferRT.vbuffer", "MyPathTracer.vbuffer")?;
    g.add_edge("VBufferRT.viewW", "MyPathTracer.viewW")?;
    g.add_edge("MyPathTracer.color", "ReservoirsReuse.colorin")?;
    g.add_edge("MyPathTracer.reservoirs", "ReservoirsReuse.reservoirsin")?;
    g.add_edge("ReservoirsReuse.colorout", "AccumulatePass.input")?;
    g.add_edge("AccumulatePass.output", "ToneMapper.src")?;
    g.mark_output("ToneMapper.dst")?;
    Ok(g)
}
