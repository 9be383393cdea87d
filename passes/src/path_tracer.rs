//! `MyMISTracer`: a CPU stand-in for a multiple importance sampled path tracer.
//!
//! Reads the visibility buffer and shades every pixel with a noisy estimate of
//! an analytic radiance value. The noise is zero-mean, so averaging frames
//! (see [`AccumulatePass`](crate::AccumulatePass)) converges to the
//! noise-free image.
//!
//! Each pixel's estimate is also written as a single-candidate reservoir for
//! [`ReservoirsReuse`](crate::ReservoirsReuse).

use glam::{Vec3, Vec4};
use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassType,
    RefreshFlags, RenderPass, Strictness, TextureFormat,
};

use crate::channels::{self, Channel};
use crate::reservoirs_reuse::{Reservoir, luminance};
use crate::sampling::{SampleGenerator, hash_combine};

const INPUT_CHANNELS: &[Channel] = &[
    Channel::required("vbuffer", "Visibility buffer in packed format", TextureFormat::Rg32Uint),
    Channel::optional("viewW", "World-space view direction", TextureFormat::Rgba32Float),
];

const OUTPUT_CHANNELS: &[Channel] = &[
    Channel::required(
        "color",
        "Output color (sum of direct and indirect)",
        TextureFormat::Rgba32Float,
    ),
    Channel::required(
        "reservoirs",
        "Initial ReSTIR reservoirs",
        TextureFormat::Rgba32Float,
    ),
];

const SKY_ZENITH: Vec3 = Vec3::new(0.3, 0.5, 1.0);
const SKY_HORIZON: Vec3 = Vec3::ONE;
const ALBEDO: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct TracerConfig {
    pub samples_per_pixel: u32,
    pub max_bounces: u32,
    pub seed: u32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 1,
            max_bounces: 3,
            seed: 0,
        }
    }
}

impl TracerConfig {
    pub fn from_options(options: &Options) -> Result<Self, GraphError> {
        let defaults = Self::default();
        let mut reader = OptionReader::new(MyMISTracer::TYPE_NAME, options);
        let samples_per_pixel = reader.uint("samplesPerPixel", defaults.samples_per_pixel)?;
        let max_bounces = reader.uint("maxBounces", defaults.max_bounces)?;
        let seed = reader.uint("seed", defaults.seed)?;
        reader.finish(Strictness::Strict)?;

        if samples_per_pixel == 0 {
            return Err(GraphError::InvalidOptionValue {
                pass_type: MyMISTracer::TYPE_NAME.into(),
                option: "samplesPerPixel".into(),
                expected: "a positive int".into(),
            });
        }
        Ok(Self {
            samples_per_pixel,
            max_bounces,
            seed,
        })
    }

    pub fn to_options(&self) -> Options {
        Options::new()
            .with("samplesPerPixel", self.samples_per_pixel)
            .with("maxBounces", self.max_bounces)
            .with("seed", self.seed)
    }
}

#[derive(Debug, Default)]
pub struct MyMISTracer {
    config: TracerConfig,
    /// Set by `configure`, consumed by the next `execute`.
    options_changed: bool,
}

impl MyMISTracer {
    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Radiance arriving from the sky along `direction`.
    pub fn sky(direction: Vec3) -> Vec3 {
        let t = 0.5 * (direction.y + 1.0);
        SKY_HORIZON.lerp(SKY_ZENITH, t.clamp(0.0, 1.0))
    }

    /// Expected radiance of a surface hit: the sky seen over `max_bounces` diffuse bounces.
    pub fn surface_radiance(&self) -> Vec3 {
        let ambient = Self::sky(Vec3::Y) * 0.5 + Self::sky(Vec3::NEG_Y) * 0.5;
        let throughput: f32 = (1..=self.config.max_bounces).map(|b| ALBEDO.powi(b as i32)).sum();
        ambient * throughput
    }
}

impl RenderPass for MyMISTracer {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        channels::add_inputs(reflection, INPUT_CHANNELS);
        channels::add_outputs(reflection, OUTPUT_CHANNELS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        let config = TracerConfig::from_options(options)?;
        self.options_changed |= config != self.config;
        self.config = config;
        Ok(())
    }

    fn properties(&self) -> Options {
        self.config.to_options()
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        if std::mem::take(&mut self.options_changed) {
            ctx.dictionary_mut()
                .raise(RefreshFlags::RENDER_OPTIONS_CHANGED);
        }

        let frame = *ctx.frame();
        let vbuffer = ctx.input_texture("vbuffer")?;
        let view = ctx.optional_input_texture("viewW")?;
        for (port, texture) in [("vbuffer", Some(vbuffer)), ("viewW", view)] {
            if let Some(texture) = texture
                && texture.extent() != frame.resolution()
            {
                return Err(PassError::ResolutionMismatch {
                    port: port.into(),
                    width: frame.width,
                    height: frame.height,
                    found_width: texture.width(),
                    found_height: texture.height(),
                });
            }
        }

        for channel in OUTPUT_CHANNELS {
            let (found_width, found_height) = ctx.output_texture_mut(channel.name)?.extent();
            if (found_width, found_height) != frame.resolution() {
                return Err(PassError::ResolutionMismatch {
                    port: channel.name.into(),
                    width: frame.width,
                    height: frame.height,
                    found_width,
                    found_height,
                });
            }
        }

        let surface = self.surface_radiance();
        let samples = self.config.samples_per_pixel;
        let seed = self.config.seed;
        let color = ctx.output_texture_mut("color")?;

        for y in 0..frame.height {
            for x in 0..frame.width {
                let hit = vbuffer.get(x, y).x != 0.0;
                let direction = view.map_or(Vec3::NEG_Z, |v| v.get(x, y).truncate());
                let expected = if hit { surface } else { Self::sky(direction) };

                let mut generator =
                    SampleGenerator::new(hash_combine(&[seed, frame.index as u32, x, y]));
                let noise: f32 = (0..samples)
                    .map(|_| generator.next_f32() * 2.0 - 1.0)
                    .sum::<f32>()
                    / samples as f32;
                let radiance = expected * (1.0 + 0.5 * noise);
                color.set(x, y, radiance.extend(1.0));
            }
        }

        let candidates: Vec<Vec4> = color
            .texels()
            .iter()
            .map(|texel| Reservoir::candidate(0, luminance(*texel)).to_texel())
            .collect();
        ctx.output_texture_mut("reservoirs")?
            .texels_mut()
            .copy_from_slice(&candidates);
        Ok(())
    }
}

impl PassType for MyMISTracer {
    const TYPE_NAME: &'static str = "MyMISTracer";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        Ok(Self {
            config: TracerConfig::from_options(options)?,
            options_changed: false,
        })
    }
}
