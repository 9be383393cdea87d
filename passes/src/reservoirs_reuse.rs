//! ReSTIR reservoir reuse.
//!
//! `ReservoirsReuse` resamples each pixel's candidate against the pixel's own
//! history (temporal reuse) and against random neighbours (spatial reuse), then
//! shades the pixel with the sample that survived.
//!
//! Reservoir texels are packed as `(target, weight_sum, count, weight)`: the
//! target function value of the selected sample, the running sum of
//! resampling weights, the number of candidates seen and the unbiased
//! contribution weight. A texel with a zero count carries no candidate and the
//! pixel's own color is used instead.
//!
//! History lives in the pass and survives across frames. It is cleared when
//! the resolution changes or when render options change anywhere in the graph.

use glam::{Vec3, Vec4};
use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassType,
    RefreshFlags, RenderPass, Strictness, TextureFormat,
};

use crate::channels::{self, Channel};
use crate::sampling::{SampleGenerator, hash_combine};

const INPUT_CHANNELS: &[Channel] = &[
    Channel::required(
        "colorin",
        "Output color (sum of direct and indirect)",
        TextureFormat::Rgba32Float,
    ),
    Channel::required("reservoirsin", "ReSTIR reservoirs", TextureFormat::Rgba32Float),
];

const OUTPUT_CHANNELS: &[Channel] = &[Channel::required(
    "colorout",
    "Output color (sum of direct and indirect)",
    TextureFormat::Rgba32Float,
)];

/// Rec. 709 luma weights.
const LUMINANCE: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);
/// Temporal history is clamped to this multiple of the current candidate count.
const HISTORY_LIMIT: f32 = 20.0;
const MAX_SPATIAL_SAMPLES: u32 = 1 << 16;
/// Neighbourhood half-width for spatial reuse, in pixels.
const SPATIAL_RADIUS: i64 = 5;

/// Luminance of the color part of `texel`, never negative.
pub fn luminance(texel: Vec4) -> f32 {
    texel.truncate().dot(LUMINANCE).max(0.0)
}

/// Weighted reservoir holding one selected sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reservoir {
    /// Linear index of the pixel whose color was selected.
    pub sample: u32,
    pub target: f32,
    pub weight_sum: f32,
    pub count: f32,
}

impl Reservoir {
    /// A reservoir that has seen exactly one candidate, drawn with unit source pdf.
    pub fn candidate(sample: u32, target: f32) -> Self {
        Self {
            sample,
            target,
            weight_sum: target,
            count: 1.0,
        }
    }

    /// Reservoir of pixel `sample` as packed by an upstream pass.
    pub fn from_texel(sample: u32, texel: Vec4) -> Self {
        Self {
            sample,
            target: texel.x,
            weight_sum: texel.y,
            count: texel.z,
        }
    }

    pub fn to_texel(&self) -> Vec4 {
        Vec4::new(self.target, self.weight_sum, self.count, self.weight())
    }

    /// Unbiased contribution weight `weight_sum / (count * target)`.
    pub fn weight(&self) -> f32 {
        if self.target > 0.0 && self.count > 0.0 {
            self.weight_sum / (self.count * self.target)
        } else {
            0.0
        }
    }

    /// Stream one candidate with resampling weight `weight`; `u` is uniform in `[0, 1)`.
    fn update(&mut self, sample: u32, target: f32, weight: f32, count: f32, u: f32) {
        self.weight_sum += weight;
        self.count += count;
        if weight > 0.0 && u * self.weight_sum < weight {
            self.sample = sample;
            self.target = target;
        }
    }

    /// Fold `other` in, its sample evaluating to `target` at this pixel.
    fn merge(&mut self, other: &Reservoir, target: f32, u: f32) {
        let weight = target * other.weight() * other.count;
        self.update(other.sample, target, weight, other.count, u);
    }

    /// Limit the candidate count, keeping the contribution weight.
    fn clamped(mut self, limit: f32) -> Self {
        if self.count > limit {
            self.weight_sum *= limit / self.count;
            self.count = limit;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReuseConfig {
    /// Neighbours resampled per pixel and frame.
    pub spatial_samples: u32,
}

impl Default for ReuseConfig {
    fn default() -> Self {
        Self { spatial_samples: 4 }
    }
}

impl ReuseConfig {
    pub fn from_options(options: &Options) -> Result<Self, GraphError> {
        let defaults = Self::default();
        let mut reader = OptionReader::new(ReservoirsReuse::TYPE_NAME, options);
        let spatial_samples = reader.uint("spatialSamples", defaults.spatial_samples)?;
        reader.finish(Strictness::Strict)?;

        if spatial_samples > MAX_SPATIAL_SAMPLES {
            return Err(GraphError::InvalidOptionValue {
                pass_type: ReservoirsReuse::TYPE_NAME.into(),
                option: "spatialSamples".into(),
                expected: format!("an int in [0, {MAX_SPATIAL_SAMPLES}]"),
            });
        }
        Ok(Self { spatial_samples })
    }

    pub fn to_options(&self) -> Options {
        Options::new().with("spatialSamples", self.spatial_samples)
    }
}

#[derive(Debug, Default)]
pub struct ReservoirsReuse {
    config: ReuseConfig,
    /// One reservoir per pixel of `frame_dim`, kept from the previous frame.
    history: Vec<Reservoir>,
    frame_dim: (u32, u32),
    frame_count: u32,
    /// Set by `configure`, consumed by the next `execute`.
    options_changed: bool,
}

impl ReservoirsReuse {
    pub fn config(&self) -> &ReuseConfig {
        &self.config
    }

    /// Frames resampled since the history was last cleared.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Resolution of the stored history.
    pub fn frame_dim(&self) -> (u32, u32) {
        self.frame_dim
    }

    /// The stored reservoir of pixel `(x, y)`.
    pub fn reservoir(&self, x: u32, y: u32) -> Option<Reservoir> {
        let (width, height) = self.frame_dim;
        if x >= width || y >= height {
            return None;
        }
        self.history
            .get(y as usize * width as usize + x as usize)
            .copied()
    }

    /// Size the history for `extent`, clearing it on resize or after a reset.
    fn prepare_history(&mut self, extent: (u32, u32)) {
        if self.frame_dim != extent {
            self.frame_dim = extent;
            self.frame_count = 0;
        }
        let len = extent.0 as usize * extent.1 as usize;
        if self.frame_count == 0 || self.history.len() != len {
            self.history.clear();
            self.history.resize(len, Reservoir::default());
        }
    }

    /// A random pixel within [`SPATIAL_RADIUS`] of `(x, y)`, clamped to the frame.
    fn neighbour(generator: &mut SampleGenerator, x: u32, y: u32, (w, h): (u32, u32)) -> usize {
        let span = (2 * SPATIAL_RADIUS + 1) as f32;
        let mut offset = || (generator.next_f32() * span) as i64 - SPATIAL_RADIUS;
        let nx = (x as i64 + offset()).clamp(0, w as i64 - 1);
        let ny = (y as i64 + offset()).clamp(0, h as i64 - 1);
        ny as usize * w as usize + nx as usize
    }
}

impl RenderPass for ReservoirsReuse {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        channels::add_inputs(reflection, INPUT_CHANNELS);
        channels::add_outputs(reflection, OUTPUT_CHANNELS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        let config = ReuseConfig::from_options(options)?;
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
        let refresh = RefreshFlags::RENDER_OPTIONS_CHANGED | RefreshFlags::RESOLUTION_CHANGED;
        if ctx.dictionary().is_raised(refresh) {
            self.frame_count = 0;
        }

        let frame_index = ctx.frame().index as u32;
        let color = ctx.input_texture("colorin")?;
        let reservoirs = ctx.input_texture("reservoirsin")?;
        let output = ctx.output_texture_mut("colorout")?;
        let extent = output.extent();
        for (port, texture) in [("colorin", color), ("reservoirsin", reservoirs)] {
            if texture.extent() != extent {
                return Err(PassError::ResolutionMismatch {
                    port: port.into(),
                    width: extent.0,
                    height: extent.1,
                    found_width: texture.width(),
                    found_height: texture.height(),
                });
            }
        }

        self.prepare_history(extent);
        let (width, height) = extent;
        let colors = color.texels();

        // Candidates of every pixel, before any reuse
        let canonical: Vec<Reservoir> = reservoirs
            .texels()
            .iter()
            .zip(colors)
            .enumerate()
            .map(|(i, (texel, color))| {
                if texel.z > 0.0 {
                    Reservoir::from_texel(i as u32, *texel)
                } else {
                    Reservoir::candidate(i as u32, luminance(*color))
                }
            })
            .collect();

        let mut resampled = Vec::with_capacity(canonical.len());
        for y in 0..height {
            for x in 0..width {
                let pixel = y as usize * width as usize + x as usize;
                let mut generator =
                    SampleGenerator::new(hash_combine(&[frame_index, self.frame_count, x, y]));
                let own = &canonical[pixel];

                let mut reservoir = Reservoir::default();
                reservoir.merge(own, luminance(colors[pixel]), generator.next_f32());

                let previous = self.history[pixel].clamped(HISTORY_LIMIT * own.count.max(1.0));
                if previous.count > 0.0 {
                    let target = luminance(colors[previous.sample as usize]);
                    reservoir.merge(&previous, target, generator.next_f32());
                }

                for _ in 0..self.config.spatial_samples {
                    let q = Self::neighbour(&mut generator, x, y, extent);
                    if q != pixel {
                        let u = generator.next_f32();
                        reservoir.merge(&canonical[q], luminance(colors[q]), u);
                    }
                }
                resampled.push(reservoir);
            }
        }

        for ((out, reservoir), own) in output.texels_mut().iter_mut().zip(&resampled).zip(colors) {
            let selected = colors[reservoir.sample as usize];
            *out = (selected.truncate() * reservoir.weight()).extend(own.w);
        }
        self.history = resampled;
        self.frame_count += 1;
        log::trace!(
            "{}: frame {} of reservoir history",
            ctx.pass_id(),
            self.frame_count
        );
        Ok(())
    }
}

impl PassType for ReservoirsReuse {
    const TYPE_NAME: &'static str = "ReservoirsReuse";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        Ok(Self {
            config: ReuseConfig::from_options(options)?,
            ..Self::default()
        })
    }
}
