//! The headless runner behind the `lumen` binary.

use std::io::Write;

use lumen_graph::{
    CompiledPlan, ExecutorConfig, FrameContext, FrameReport, FrameStatus, GraphError,
    GraphExecutor, PassRegistry,
};

use crate::args::{AppArgs, GraphChoice};

/// The marked output whose average is printed after the last frame.
const PRESENTED_OUTPUT: &str = "ToneMapper.dst";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<FrameReport>,
    /// Average texel of the presented output after the last completed frame.
    pub average: Option<[f32; 4]>,
}

impl RunSummary {
    pub fn faulted_frames(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, FrameStatus::Faulted { .. }))
            .count()
    }
}

/// Builds one of the standard graphs from a registry and runs it frame by frame.
pub struct App {
    args: AppArgs,
    registry: PassRegistry,
}

impl App {
    pub fn new(args: AppArgs) -> Self {
        Self {
            args,
            registry: lumen_passes::standard_registry(),
        }
    }

    pub fn args(&self) -> &AppArgs {
        &self.args
    }

    /// Run the configured number of frames, writing the human-readable report to `out`.
    pub fn run(&self, out: &mut impl Write) -> Result<RunSummary, AppError> {
        if self.args.list_passes {
            for name in self.registry.type_names() {
                writeln!(out, "{name}")?;
            }
            return Ok(RunSummary::default());
        }

        let mut graph = match self.args.graph {
            GraphChoice::MisTracer => lumen_passes::mis_tracer_graph(&self.registry)?,
            GraphChoice::Restir => lumen_passes::restir_graph(&self.registry)?,
        };
        let plan = graph.compile()?;
        write_plan(out, &plan)?;

        let config = ExecutorConfig::default().with_failure_policy(self.args.failure_policy());
        let mut executor = GraphExecutor::new(config);
        let frame = FrameContext::new(self.args.width, self.args.height);

        let mut summary = RunSummary::default();
        for _ in 0..self.args.frames {
            let report = executor.execute(&mut graph, &plan, &frame)?;
            match &report.status {
                FrameStatus::Completed => log::debug!(
                    "frame {}: {} passes executed",
                    report.frame_index,
                    report.passes_executed
                ),
                FrameStatus::Cancelled => log::warn!("frame {}: cancelled", report.frame_index),
                FrameStatus::Faulted { pass, cause } => log::warn!(
                    "frame {}: skipped after '{pass}' failed: {cause}",
                    report.frame_index
                ),
            }
            summary.reports.push(report);
        }

        summary.average = executor
            .output_texture(PRESENTED_OUTPUT)
            .map(|t| t.average().to_array());

        writeln!(
            out,
            "{} frames at {}x{}, {} faulted",
            summary.reports.len(),
            self.args.width,
            self.args.height,
            summary.faulted_frames()
        )?;
        if let Some([r, g, b, a]) = summary.average {
            writeln!(out, "{PRESENTED_OUTPUT} average: ({r:.4}, {g:.4}, {b:.4}, {a:.4})")?;
        }
        Ok(summary)
    }
}

fn write_plan(out: &mut impl Write, plan: &CompiledPlan) -> std::io::Result<()> {
    writeln!(
        out,
        "graph '{}' (revision {}): {} passes, {} resources in {} slots",
        plan.graph_name(),
        plan.revision(),
        plan.pass_count(),
        plan.resources().len(),
        plan.slot_count()
    )?;
    for (index, pass) in plan.pass_order().into_iter().enumerate() {
        writeln!(out, "  {index}: {pass}")?;
    }
    for resource in plan.resources() {
        writeln!(
            out,
            "  {} {} steps {}..={} slot {}{}",
            resource.producer,
            resource.kind,
            resource.lifetime.first_use,
            resource.lifetime.last_use,
            resource.slot,
            if resource.persistent { " (output)" } else { "" }
        )?;
    }
    Ok(())
}
