//! Temporal accumulation.
//!
//! `AccumulatePass` averages its input over consecutive frames. History is
//! discarded whenever the frame dictionary reports that render options or the
//! resolution changed, or when the pass itself is reconfigured.

use glam::{DVec4, Vec4};
use lumen_graph::{
    GraphError, OptionReader, Options, PassContext, PassError, PassReflection, PassType,
    RefreshFlags, RenderPass, Strictness, TextureFormat,
};

use crate::channels::{self, Channel};

const INPUT_CHANNELS: &[Channel] = &[Channel::required(
    "input",
    "Input data to be accumulated",
    TextureFormat::Rgba32Float,
)];
const OUTPUT_CHANNELS: &[Channel] = &[Channel::required(
    "output",
    "Output data that is accumulated",
    TextureFormat::Rgba32Float,
)];

/// Arithmetic used for the running sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionMode {
    /// Running average in single precision.
    #[default]
    Single,
    /// Sum in double precision.
    Double,
    /// Kahan-compensated sum in single precision.
    SingleCompensated,
}

impl PrecisionMode {
    const CHOICES: &'static [(&'static str, PrecisionMode)] = &[
        ("Single", PrecisionMode::Single),
        ("Double", PrecisionMode::Double),
        ("SingleCompensated", PrecisionMode::SingleCompensated),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Single => "Single",
            Self::Double => "Double",
            Self::SingleCompensated => "SingleCompensated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulateConfig {
    pub enabled: bool,
    pub precision_mode: PrecisionMode,
    /// Stop accumulating after this many frames; 0 means never stop.
    pub max_frame_count: u32,
}

impl Default for AccumulateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            precision_mode: PrecisionMode::Single,
            max_frame_count: 0,
        }
    }
}

impl AccumulateConfig {
    pub fn from_options(options: &Options) -> Result<Self, GraphError> {
        let defaults = Self::default();
        let mut reader = OptionReader::new(AccumulatePass::TYPE_NAME, options);
        let config = Self {
            enabled: reader.bool("enabled", defaults.enabled)?,
            precision_mode: reader.choice(
                "precisionMode",
                defaults.precision_mode,
                PrecisionMode::CHOICES,
            )?,
            max_frame_count: reader.uint("maxFrameCount", defaults.max_frame_count)?,
        };
        reader.finish(Strictness::Strict)?;
        Ok(config)
    }

    pub fn to_options(&self) -> Options {
        Options::new()
            .with("enabled", self.enabled)
            .with("precisionMode", self.precision_mode.name())
            .with("maxFrameCount", self.max_frame_count)
    }
}

/// Running state, one entry per texel.
#[derive(Debug, Clone, PartialEq)]
enum History {
    Single(Vec<Vec4>),
    Double(Vec<DVec4>),
    Compensated {
        sum: Vec<Vec4>,
        compensation: Vec<Vec4>,
    },
}

impl History {
    fn new(mode: PrecisionMode, len: usize) -> Self {
        match mode {
            PrecisionMode::Single => Self::Single(vec![Vec4::ZERO; len]),
            PrecisionMode::Double => Self::Double(vec![DVec4::ZERO; len]),
            PrecisionMode::SingleCompensated => Self::Compensated {
                sum: vec![Vec4::ZERO; len],
                compensation: vec![Vec4::ZERO; len],
            },
        }
    }

    /// Add `input` as the `frame_count`-th frame and write the average to `output`.
    fn accumulate(&mut self, input: &[Vec4], output: &mut [Vec4], frame_count: u32) {
        match self {
            Self::Single(average) => {
                let weight = 1.0 / frame_count as f32;
                for ((avg, x), out) in average.iter_mut().zip(input).zip(output) {
                    *avg += (*x - *avg) * weight;
                    *out = *avg;
                }
            }
            Self::Double(sum) => {
                let n = frame_count as f64;
                for ((s, x), out) in sum.iter_mut().zip(input).zip(output) {
                    *s += x.as_dvec4();
                    *out = (*s / n).as_vec4();
                }
            }
            Self::Compensated { sum, compensation } => {
                let n = frame_count as f32;
                let texels = sum
                    .iter_mut()
                    .zip(compensation.iter_mut())
                    .zip(input)
                    .zip(output);
                for (((s, c), x), out) in texels {
                    let y = *x - *c;
                    let t = *s + y;
                    *c = (t - *s) - y;
                    *s = t;
                    *out = *s / n;
                }
            }
        }
    }

    /// Write the current average without adding a frame.
    fn resolve(&self, output: &mut [Vec4], frame_count: u32) {
        match self {
            Self::Single(average) => output.copy_from_slice(average),
            Self::Double(sum) => {
                let n = frame_count as f64;
                for (s, out) in sum.iter().zip(output) {
                    *out = (*s / n).as_vec4();
                }
            }
            Self::Compensated { sum, .. } => {
                let n = frame_count as f32;
                for (s, out) in sum.iter().zip(output) {
                    *out = *s / n;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct AccumulatePass {
    config: AccumulateConfig,
    history: Option<History>,
    resolution: (u32, u32),
    frame_count: u32,
}

impl AccumulatePass {
    pub fn config(&self) -> &AccumulateConfig {
        &self.config
    }

    /// Frames currently averaged into the output.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn reset(&mut self) {
        self.history = None;
        self.frame_count = 0;
    }
}

impl RenderPass for AccumulatePass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self, reflection: &mut PassReflection) {
        channels::add_inputs(reflection, INPUT_CHANNELS);
        channels::add_outputs(reflection, OUTPUT_CHANNELS);
    }

    fn configure(&mut self, options: &Options) -> Result<(), GraphError> {
        let config = AccumulateConfig::from_options(options)?;
        if config != self.config {
            self.reset();
        }
        self.config = config;
        Ok(())
    }

    fn properties(&self) -> Options {
        self.config.to_options()
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        let refresh = RefreshFlags::RENDER_OPTIONS_CHANGED | RefreshFlags::RESOLUTION_CHANGED;
        if ctx.dictionary().is_raised(refresh) {
            self.reset();
        }

        let input = ctx.input_texture("input")?;
        let output = ctx.output_texture_mut("output")?;
        if input.extent() != output.extent() {
            return Err(PassError::ResolutionMismatch {
                port: "input".into(),
                width: output.width(),
                height: output.height(),
                found_width: input.width(),
                found_height: input.height(),
            });
        }

        if !self.config.enabled {
            self.reset();
            output.texels_mut().copy_from_slice(input.texels());
            return Ok(());
        }

        if self.resolution != input.extent() {
            self.reset();
            self.resolution = input.extent();
        }
        let mode = self.config.precision_mode;
        let history = self
            .history
            .get_or_insert_with(|| History::new(mode, input.texels().len()));

        let limit = self.config.max_frame_count;
        if limit > 0 && self.frame_count >= limit {
            history.resolve(output.texels_mut(), self.frame_count);
        } else {
            self.frame_count += 1;
            history.accumulate(input.texels(), output.texels_mut(), self.frame_count);
        }
        Ok(())
    }
}

impl PassType for AccumulatePass {
    const TYPE_NAME: &'static str = "AccumulatePass";

    fn from_options(options: &Options) -> Result<Self, GraphError> {
        Ok(Self {
            config: AccumulateConfig::from_options(options)?,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_graph::{FrameDictionary, FrameInfo, Resource, ResourceKind, Texture};
    use rstest::rstest;

    fn run(pass: &mut AccumulatePass, value: f32, flags: RefreshFlags) -> Vec4 {
        run_sized(pass, value, flags, (2, 2)).get(0, 0)
    }

    fn run_sized(
        pass: &mut AccumulatePass,
        value: f32,
        flags: RefreshFlags,
        (w, h): (u32, u32),
    ) -> Texture {
        let mut input = Texture::new(w, h, TextureFormat::Rgba32Float);
        input.fill(Vec4::splat(value));
        let input = Resource::Texture(input);

        let mut dictionary = FrameDictionary::new();
        dictionary.raise(flags);
        let output = Resource::allocate(ResourceKind::texture(TextureFormat::Rgba32Float), w, h);
        let mut ctx = PassContext::new("AccumulatePass", FrameInfo::new(0, w, h), &mut dictionary)
            .with_input("input", Some(&input))
            .with_output("output", output);
        pass.execute(&mut ctx).unwrap();
        match ctx.take_output("output") {
            Some(Resource::Texture(texture)) => texture,
            other => panic!("unexpected output {other:?}"),
        }
    }

    fn pass(options: Options) -> AccumulatePass {
        AccumulatePass::from_options(&options).unwrap()
    }

    #[test]
    fn test_script_options() {
        let pass = pass(
            Options::new()
                .with("enabled", true)
                .with("precisionMode", "Single"),
        );
        assert_eq!(pass.config(), &AccumulateConfig::default());
    }

    #[rstest]
    #[case::single("Single")]
    #[case::double("Double")]
    #[case::compensated("SingleCompensated")]
    fn test_running_average(#[case] mode: &str) {
        let mut pass = pass(Options::new().with("precisionMode", mode));
        assert_eq!(run(&mut pass, 1.0, RefreshFlags::empty()), Vec4::splat(1.0));
        assert_eq!(run(&mut pass, 3.0, RefreshFlags::empty()), Vec4::splat(2.0));
        assert_eq!(run(&mut pass, 5.0, RefreshFlags::empty()), Vec4::splat(3.0));
        assert_eq!(pass.frame_count(), 3);
    }

    #[rstest]
    #[case::options(RefreshFlags::RENDER_OPTIONS_CHANGED)]
    #[case::resolution(RefreshFlags::RESOLUTION_CHANGED)]
    fn test_refresh_flags_reset(#[case] flags: RefreshFlags) {
        let mut pass = pass(Options::new());
        run(&mut pass, 1.0, RefreshFlags::empty());
        run(&mut pass, 1.0, RefreshFlags::empty());
        assert_eq!(run(&mut pass, 7.0, flags), Vec4::splat(7.0));
        assert_eq!(pass.frame_count(), 1);
    }

    #[test]
    fn test_lighting_change_keeps_history() {
        let mut pass = pass(Options::new());
        run(&mut pass, 2.0, RefreshFlags::empty());
        assert_eq!(run(&mut pass, 4.0, RefreshFlags::LIGHTING_CHANGED), Vec4::splat(3.0));
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut pass = pass(Options::new().with("enabled", false));
        assert_eq!(run(&mut pass, 1.0, RefreshFlags::empty()), Vec4::splat(1.0));
        assert_eq!(run(&mut pass, 9.0, RefreshFlags::empty()), Vec4::splat(9.0));
        assert_eq!(pass.frame_count(), 0);
    }

    #[test]
    fn test_max_frame_count_freezes_result() {
        let mut pass = pass(Options::new().with("maxFrameCount", 2));
        run(&mut pass, 2.0, RefreshFlags::empty());
        run(&mut pass, 4.0, RefreshFlags::empty());
        assert_eq!(run(&mut pass, 100.0, RefreshFlags::empty()), Vec4::splat(3.0));
        assert_eq!(pass.frame_count(), 2);
    }

    #[test]
    fn test_reconfigure_resets() {
        let mut pass = pass(Options::new());
        run(&mut pass, 2.0, RefreshFlags::empty());
        pass.configure(&Options::new().with("precisionMode", "Double"))
            .unwrap();
        assert_eq!(pass.frame_count(), 0);
        assert_eq!(run(&mut pass, 6.0, RefreshFlags::empty()), Vec4::splat(6.0));

        // Same options again keep the history
        pass.configure(&pass.properties()).unwrap();
        assert_eq!(pass.frame_count(), 1);
    }

    #[test]
    fn test_resize_without_flag_resets() {
        let mut pass = pass(Options::new());
        run_sized(&mut pass, 2.0, RefreshFlags::empty(), (2, 2));
        let out = run_sized(&mut pass, 8.0, RefreshFlags::empty(), (4, 4));
        assert_eq!(out.get(3, 3), Vec4::splat(8.0));
    }

    #[test]
    fn test_compensated_sum_stays_accurate() {
        let mut single = pass(Options::new());
        let mut compensated = pass(Options::new().with("precisionMode", "SingleCompensated"));
        let mut last = (Vec4::ZERO, Vec4::ZERO);
        for i in 0..2000 {
            let value = if i % 2 == 0 { 0.1 } else { 0.3 };
            last = (
                run(&mut single, value, RefreshFlags::empty()),
                run(&mut compensated, value, RefreshFlags::empty()),
            );
        }
        assert!((last.1.x - 0.2).abs() < 1e-5);
        assert!((last.0.x - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_precision_mode() {
        assert!(matches!(
            AccumulatePass::from_options(&Options::new().with("precisionMode", "Half")),
            Err(GraphError::InvalidOptionValue { .. })
        ));
    }
}
