//! Common utilities for graph integration tests.
//!
//! Small pass types registered through the public registry API. `Source`
//! fills its output with a constant and `Blit` scales its input. `Combine`
//! adds two inputs, the second one optional. `Tally` works on byte buffers
//! and increments every byte of its optional input.

use glam::Vec4;

use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassRegistry,
    PassType, RenderGraph, RenderPass, ResourceKind, Strictness, TextureFormat,
};

pub const RGBA32: ResourceKind = ResourceKind::texture(TextureFormat::Rgba32Float);
pub const COUNTERS: ResourceKind = ResourceKind::buffer(16);

/// Initialise logging once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Source {
    value: f32,
}

impl RenderPass for Source {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        reflection.add_output("dst", RGBA32);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        let mut reader = OptionReader::new(Self::TYPE_NAME, options);
        self.value = reader.float("value", 0.0)? as f32;
        reader.finish(Strictness::Strict)
    }

    fn properties(&self) -> Options {
        Options::new().with("value", self.value)
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        ctx.output_texture_mut("dst")?.fill(Vec4::splat(self.value));
        Ok(())
    }
}

impl PassType for Source {
    const TYPE_NAME: &'static str = "Source";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        let mut pass = Self { value: 0.0 };
        pass.configure(options)?;
        Ok(pass)
    }
}

pub struct Blit {
    gain: f32,
}

impl RenderPass for Blit {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        reflection.add_input("src", RGBA32);
        reflection.add_output("dst", RGBA32);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        let mut reader = OptionReader::new(Self::TYPE_NAME, options);
        self.gain = reader.float("gain", 1.0)? as f32;
        reader.finish(Strictness::Strict)
    }

    fn properties(&self) -> Options {
        Options::new().with("gain", self.gain)
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let src = ctx.input_texture("src")?;
        let gain = self.gain;
        let dst = ctx.output_texture_mut("dst")?;
        for (out, texel) in dst.texels_mut().iter_mut().zip(src.texels()) {
            *out = *texel * gain;
        }
        Ok(())
    }
}

impl PassType for Blit {
    const TYPE_NAME: &'static str = "Blit";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        let mut pass = Self { gain: 1.0 };
        pass.configure(options)?;
        Ok(pass)
    }
}

pub struct Combine;

impl RenderPass for Combine {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        reflection.add_input("a", RGBA32);
        reflection.add_input("b", RGBA32).optional();
        reflection.add_output("dst", RGBA32);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        OptionReader::new(Self::TYPE_NAME, options).finish(Strictness::Strict)
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let a = ctx.input_texture("a")?;
        let b = ctx.optional_input_texture("b")?;
        let dst = ctx.output_texture_mut("dst")?;
        for (i, out) in dst.texels_mut().iter_mut().enumerate() {
            *out = a.texels()[i] + b.map_or(Vec4::ZERO, |b| b.texels()[i]);
        }
        Ok(())
    }
}

impl PassType for Combine {
    const TYPE_NAME: &'static str = "Combine";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        let mut pass = Self;
        pass.configure(options)?;
        Ok(pass)
    }
}

pub struct Tally;

impl RenderPass for Tally {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        reflection.add_input("src", COUNTERS).optional();
        reflection.add_output("dst", COUNTERS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        OptionReader::new(Self::TYPE_NAME, options).finish(Strictness::Strict)
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let src = ctx.optional_input_buffer("src")?;
        let dst = ctx.output_buffer_mut("dst")?;
        for (i, out) in dst.iter_mut().enumerate() {
            *out = src.map_or(0, |src| src[i]).wrapping_add(1);
        }
        Ok(())
    }
}

impl PassType for Tally {
    const TYPE_NAME: &'static str = "Tally";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        let mut pass = Self;
        pass.configure(options)?;
        Ok(pass)
    }
}

pub fn registry() -> PassRegistry {
    let mut registry = PassRegistry::new();
    registry.register_type::<Source>();
    registry.register_type::<Blit>();
    registry.register_type::<Combine>();
    registry.register_type::<Tally>();
    registry
}

/// `Source` followed by `len - 1` chained `Blit` passes, last output marked.
#[allow(dead_code)]
pub fn chain(registry: &PassRegistry, len: usize, value: f64, gain: f64) -> RenderGraph {
    let mut graph = RenderGraph::new("chain");
    graph
        .create_pass(registry, "Source", "pass_0", Options::new().with("value", value))
        .unwrap();
    for i in 1..len {
        let id = format!("pass_{i}");
        graph
            .create_pass(registry, "Blit", &id, Options::new().with("gain", gain))
            .unwrap();
        graph
            .add_edge(&format!("pass_{}.dst", i - 1), &format!("{id}.src"))
            .unwrap();
    }
    graph.mark_output(&format!("pass_{}.dst", len - 1)).unwrap();
    graph
}

/// `len` chained `Tally` passes over byte buffers, last output marked.
#[allow(dead_code)]
pub fn buffer_chain(registry: &PassRegistry, len: usize) -> RenderGraph {
    let mut graph = RenderGraph::new("buffers");
    for i in 0..len {
        let id = format!("tally_{i}");
        graph
            .create_pass(registry, "Tally", &id, Options::new())
            .unwrap();
        if i > 0 {
            graph
                .add_edge(&format!("tally_{}.dst", i - 1), &format!("{id}.src"))
                .unwrap();
        }
    }
    graph
        .mark_output(&format!("tally_{}.dst", len - 1))
        .unwrap();
    graph
}
