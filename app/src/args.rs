//! Command line arguments.

use clap::{Parser, ValueEnum};
use lumen_graph::FailurePolicy;

/// Pass failure handling selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliFailurePolicy {
    /// Stop at the first failing pass and exit with an error.
    #[default]
    FailFast,
    /// Log the failing pass, drop the rest of that frame and keep going.
    ReportAndSkip,
}

impl From<CliFailurePolicy> for FailurePolicy {
    fn from(cli: CliFailurePolicy) -> Self {
        match cli {
            CliFailurePolicy::FailFast => FailurePolicy::FailFast,
            CliFailurePolicy::ReportAndSkip => FailurePolicy::ReportAndSkip,
        }
    }
}

/// Which standard graph to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GraphChoice {
    /// Visibility buffer, MIS tracer, accumulation and tone mapping.
    #[default]
    MisTracer,
    /// The MIS tracer graph with ReSTIR reservoir reuse before accumulation.
    Restir,
}

/// Lumen render graph runner.
///
/// # Examples
///
/// ```bash
/// # Run 16 frames of the MIS tracer graph at 320x180
/// lumen --frames 16 --width 320 --height 180
///
/// # Run the ReSTIR variant
/// lumen --graph restir
///
/// # Show the registered pass types
/// lumen --list-passes
/// ```
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lumen",
    about = "Build, compile and run a standard render graph headless",
    version
)]
pub struct AppArgs {
    /// Graph to build and run.
    #[arg(long, default_value = "mis-tracer", value_enum)]
    pub graph: GraphChoice,

    /// Number of frames to execute.
    #[arg(long, default_value = "8")]
    pub frames: u64,

    /// Output width in pixels.
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Output height in pixels.
    #[arg(long, default_value = "36", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// What to do when a pass fails.
    #[arg(long, default_value = "fail-fast", value_enum)]
    pub failure_policy: CliFailurePolicy,

    /// Print the registered pass types and exit.
    #[arg(long)]
    pub list_passes: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

impl AppArgs {
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy.into()
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
