//! Visibility buffer generation.
//!
//! `VBufferRT` casts one primary ray per pixel into a fixed analytic scene
//! and writes what it hit:
//!
//! | Output | Format | Content |
//! |--------|--------|---------|
//! | `vbuffer` | `Rg32Uint` | instance id (0 = miss) and primitive id |
//! | `viewW` | `Rgba32Float` | world-space view direction |
//! | `depth` | `R32Float` | normalized hit distance, 1 on miss |
//!
//! The camera is jittered inside the pixel according to the sample pattern,
//! advancing one sample per frame.

use glam::{Vec2, Vec3, Vec4};
use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassType,
    RenderPass, Strictness, TextureFormat,
};

use crate::channels::{self, Channel};
use crate::sampling::halton;

const OUTPUT_CHANNELS: &[Channel] = &[
    Channel::required("vbuffer", "Visibility buffer", TextureFormat::Rg32Uint),
    Channel::required("viewW", "View direction in world space", TextureFormat::Rgba32Float),
    Channel::required("depth", "Normalized depth", TextureFormat::R32Float),
];

const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 0.0, -3.0);
const SPHERE_RADIUS: f32 = 1.0;
const FAR_PLANE: f32 = 100.0;
/// Primitives per axis of the sphere tessellation used for primitive ids.
const TESSELLATION: u32 = 16;

/// Sub-pixel sample placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePattern {
    /// Always the pixel center.
    #[default]
    Center,
    /// Cells of a square grid, one per frame.
    Stratified,
    /// Halton (2, 3) sequence.
    Halton,
}

impl SamplePattern {
    const CHOICES: &'static [(&'static str, SamplePattern)] = &[
        ("Center", SamplePattern::Center),
        ("Stratified", SamplePattern::Stratified),
        ("Halton", SamplePattern::Halton),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Center => "Center",
            Self::Stratified => "Stratified",
            Self::Halton => "Halton",
        }
    }

    /// Offset inside the pixel, in `[0, 1)^2`, for sample `index` of `count`.
    pub fn offset(self, index: u32, count: u32) -> Vec2 {
        let index = index % count.max(1);
        match self {
            Self::Center => Vec2::splat(0.5),
            Self::Stratified => {
                let side = (count as f32).sqrt().ceil().max(1.0) as u32;
                let cell = Vec2::new((index % side) as f32, (index / side) as f32);
                (cell + 0.5) / side as f32
            }
            Self::Halton => Vec2::new(halton(2, index + 1), halton(3, index + 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VBufferConfig {
    pub sample_pattern: SamplePattern,
    pub sample_count: u32,
    pub use_alpha_test: bool,
}

impl Default for VBufferConfig {
    fn default() -> Self {
        Self {
            sample_pattern: SamplePattern::Center,
            sample_count: 16,
            use_alpha_test: true,
        }
    }
}

impl VBufferConfig {
    pub fn from_options(options: &Options) -> Result<Self, GraphError> {
        let defaults = Self::default();
        let mut reader = OptionReader::new(VBufferRT::TYPE_NAME, options);
        let sample_pattern = reader.choice(
            "samplePattern",
            defaults.sample_pattern,
            SamplePattern::CHOICES,
        )?;
        let sample_count = reader.uint("sampleCount", defaults.sample_count)?;
        let use_alpha_test = reader.bool("useAlphaTest", defaults.use_alpha_test)?;
        reader.finish(Strictness::Strict)?;

        if sample_count == 0 {
            return Err(GraphError::InvalidOptionValue {
                pass_type: VBufferRT::TYPE_NAME.into(),
                option: "sampleCount".into(),
                expected: "a positive int".into(),
            });
        }
        Ok(Self {
            sample_pattern,
            sample_count,
            use_alpha_test,
        })
    }

    pub fn to_options(&self) -> Options {
        Options::new()
            .with("samplePattern", self.sample_pattern.name())
            .with("sampleCount", self.sample_count)
            .with("useAlphaTest", self.use_alpha_test)
    }
}

/// What a primary ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Hit {
    distance: f32,
    primitive: u32,
}

#[derive(Debug, Default)]
pub struct VBufferRT {
    config: VBufferConfig,
}

impl VBufferRT {
    pub fn config(&self) -> &VBufferConfig {
        &self.config
    }

    /// Primary ray direction through `uv` in `[0, 1]^2`, y pointing up.
    fn ray_direction(uv: Vec2, aspect: f32) -> Vec3 {
        let ndc = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
        Vec3::new(ndc.x * aspect, ndc.y, -1.0).normalize()
    }

    fn trace(&self, direction: Vec3) -> Option<Hit> {
        // Ray from the origin against the sphere
        let b = direction.dot(SPHERE_CENTER);
        let c = SPHERE_CENTER.length_squared() - SPHERE_RADIUS * SPHERE_RADIUS;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();

        [b - root, b + root]
            .into_iter()
            .filter(|&t| t > 0.0)
            .map(|t| {
                let normal = (direction * t - SPHERE_CENTER) / SPHERE_RADIUS;
                (t, normal)
            })
            .find(|(_, normal)| !(self.config.use_alpha_test && Self::is_cut_out(*normal)))
            .map(|(distance, normal)| Hit {
                distance,
                primitive: Self::primitive_id(normal),
            })
    }

    /// Alpha-tested hole in the cap facing the camera.
    fn is_cut_out(normal: Vec3) -> bool {
        normal.z > 0.95
    }

    fn primitive_id(normal: Vec3) -> u32 {
        let u = 0.5 + normal.z.atan2(normal.x) / std::f32::consts::TAU;
        let v = normal.y.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;
        let column = ((u * TESSELLATION as f32) as u32).min(TESSELLATION - 1);
        let row = ((v * TESSELLATION as f32) as u32).min(TESSELLATION - 1);
        row * TESSELLATION + column
    }
}

impl RenderPass for VBufferRT {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        channels::add_outputs(reflection, OUTPUT_CHANNELS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        self.config = VBufferConfig::from_options(options)?;
        Ok(())
    }

    fn properties(&self) -> Options {
        self.config.to_options()
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let frame = *ctx.frame();
        let (width, height) = frame.resolution();
        let jitter = self
            .config
            .sample_pattern
            .offset(frame.index as u32, self.config.sample_count);
        let aspect = width as f32 / height.max(1) as f32;

        for channel in OUTPUT_CHANNELS {
            let (found_width, found_height) = ctx.output_texture_mut(channel.name)?.extent();
            if (found_width, found_height) != (width, height) {
                return Err(PassError::ResolutionMismatch {
                    port: channel.name.into(),
                    width,
                    height,
                    found_width,
                    found_height,
                });
            }
        }

        let texel_count = width as usize * height as usize;
        let mut visibility = Vec::with_capacity(texel_count);
        let mut views = Vec::with_capacity(texel_count);
        let mut depths = Vec::with_capacity(texel_count);
        let extent = Vec2::new(width as f32, height as f32);
        for y in 0..height {
            for x in 0..width {
                let uv = (Vec2::new(x as f32, y as f32) + jitter) / extent;
                let direction = Self::ray_direction(uv, aspect);
                let hit = self.trace(direction);

                visibility.push(match hit {
                    Some(hit) => Vec4::new(1.0, hit.primitive as f32, 0.0, 0.0),
                    None => Vec4::ZERO,
                });
                views.push(direction.extend(0.0));
                let depth = hit.map_or(1.0, |hit| (hit.distance / FAR_PLANE).min(1.0));
                depths.push(Vec4::new(depth, 0.0, 0.0, 0.0));
            }
        }

        ctx.output_texture_mut("vbuffer")?
            .texels_mut()
            .copy_from_slice(&visibility);
        ctx.output_texture_mut("viewW")?
            .texels_mut()
            .copy_from_slice(&views);
        ctx.output_texture_mut("depth")?
            .texels_mut()
            .copy_from_slice(&depths);
        log::trace!("{}: jitter {:?}", ctx.pass_id(), jitter);
        Ok(())
    }
}

impl PassType for VBufferRT {
    const TYPE_NAME: &'static str = "VBufferRT";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        Ok(Self {
            config: VBufferConfig::from_options(options)?,
        })
    }
}
