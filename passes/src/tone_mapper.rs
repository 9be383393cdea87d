//! HDR to LDR tone mapping.

use glam::{Vec3, Vec4};
use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassType,
    RenderPass, Strictness, TextureFormat,
};

use crate::channels::{self, Channel};
use crate::reservoirs_reuse::luminance;

const INPUT_CHANNELS: &[Channel] = &[Channel::required(
    "src",
    "Source texture",
    TextureFormat::Rgba32Float,
)];
const OUTPUT_CHANNELS: &[Channel] = &[Channel::required(
    "dst",
    "Tone-mapped output texture",
    TextureFormat::Rgba8Unorm,
)];

/// Middle grey targeted by auto exposure.
const EXPOSURE_KEY: f32 = 0.18;
const MAX_EXPOSURE_COMPENSATION: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    Linear,
    Reinhard,
    /// Narkowicz fit of the ACES filmic curve.
    #[default]
    Aces,
}

impl Operator {
    const CHOICES: &'static [(&'static str, Operator)] = &[
        ("Linear", Operator::Linear),
        ("Reinhard", Operator::Reinhard),
        ("Aces", Operator::Aces),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Reinhard => "Reinhard",
            Self::Aces => "Aces",
        }
    }

    pub fn apply(self, color: Vec3) -> Vec3 {
        match self {
            Self::Linear => color,
            Self::Reinhard => color / (Vec3::ONE + color),
            Self::Aces => {
                let (a, b, c, d, e) = (2.51, 0.03, 2.43, 0.59, 0.14);
                (color * (color * a + b)) / (color * (color * c + d) + e)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneMapperConfig {
    pub auto_exposure: bool,
    /// Exposure offset in EV stops.
    pub exposure_compensation: f64,
    pub operator: Operator,
    pub clamp: bool,
}

impl Default for ToneMapperConfig {
    fn default() -> Self {
        Self {
            auto_exposure: false,
            exposure_compensation: 0.0,
            operator: Operator::Aces,
            clamp: true,
        }
    }
}

impl ToneMapperConfig {
    pub fn from_options(options: &Options) -> Result<Self, GraphError> {
        let defaults = Self::default();
        let mut reader = OptionReader::new(ToneMapper::TYPE_NAME, options);
        let config = Self {
            auto_exposure: reader.bool("autoExposure", defaults.auto_exposure)?,
            exposure_compensation: reader.float(
                "exposureCompensation",
                defaults.exposure_compensation,
            )?,
            operator: reader.choice("operator", defaults.operator, Operator::CHOICES)?,
            clamp: reader.bool("clamp", defaults.clamp)?,
        };
        reader.finish(Strictness::Strict)?;

        let max = MAX_EXPOSURE_COMPENSATION;
        if !(-max..=max).contains(&config.exposure_compensation) {
            return Err(GraphError::InvalidOptionValue {
                pass_type: ToneMapper::TYPE_NAME.into(),
                option: "exposureCompensation".into(),
                expected: format!("a number in [-{max}, {max}]"),
            });
        }
        Ok(config)
    }

    pub fn to_options(&self) -> Options {
        Options::new()
            .with("autoExposure", self.auto_exposure)
            .with("exposureCompensation", self.exposure_compensation)
            .with("operator", self.operator.name())
            .with("clamp", self.clamp)
    }
}

#[derive(Debug, Default)]
pub struct ToneMapper {
    config: ToneMapperConfig,
}

impl ToneMapper {
    pub fn config(&self) -> &ToneMapperConfig {
        &self.config
    }

    /// Log-average luminance of `texels`.
    fn average_luminance(texels: &[Vec4]) -> f32 {
        if texels.is_empty() {
            return EXPOSURE_KEY;
        }
        let log_sum: f32 = texels.iter().map(|t| (1e-4 + luminance(*t)).ln()).sum();
        (log_sum / texels.len() as f32).exp()
    }

    /// Linear scale applied before the operator.
    pub fn exposure(&self, texels: &[Vec4]) -> f32 {
        let mut scale = 2f32.powf(self.config.exposure_compensation as f32);
        if self.config.auto_exposure {
            scale *= EXPOSURE_KEY / Self::average_luminance(texels);
        }
        scale
    }
}

impl RenderPass for ToneMapper {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        channels::add_inputs(reflection, INPUT_CHANNELS);
        channels::add_outputs(reflection, OUTPUT_CHANNELS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        self.config = ToneMapperConfig::from_options(options)?;
        Ok(())
    }

    fn properties(&self) -> Options {
        self.config.to_options()
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let src = ctx.input_texture("src")?;
        let exposure = self.exposure(src.texels());
        let operator = self.config.operator;
        let clamp = self.config.clamp;

        let dst = ctx.output_texture_mut("dst")?;
        if src.extent() != dst.extent() {
            return Err(PassError::ResolutionMismatch {
                port: "src".into(),
                width: dst.width(),
                height: dst.height(),
                found_width: src.width(),
                found_height: src.height(),
            });
        }
        let quantize = dst.format() == TextureFormat::Rgba8Unorm;

        for (out, texel) in dst.texels_mut().iter_mut().zip(src.texels()) {
            let mut mapped = operator.apply(texel.truncate() * exposure).extend(texel.w);
            if clamp || quantize {
                mapped = mapped.clamp(Vec4::ZERO, Vec4::ONE);
            }
            if quantize {
                mapped = (mapped * 255.0).round() / 255.0;
            }
            *out = mapped;
        }
        log::trace!("{}: exposure {exposure}", ctx.pass_id());
        Ok(())
    }
}

impl PassType for ToneMapper {
    const TYPE_NAME: &'static str = "ToneMapper";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        Ok(Self {
            config: ToneMapperConfig::from_options(options)?,
        })
    }
}
