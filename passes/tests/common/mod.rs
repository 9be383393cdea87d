//! Common utilities for pass integration tests.

use lumen_graph::{ExecutorConfig, FrameContext, GraphExecutor, RenderGraph, Texture};

/// Initialise logging once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Mean absolute per-channel difference of two equally sized textures.
#[allow(dead_code)]
pub fn mean_abs_diff(a: &Texture, b: &Texture) -> f32 {
    assert_eq!(a.extent(), b.extent());
    let total: f32 = a
        .texels()
        .iter()
        .zip(b.texels())
        .map(|(x, y)| (*x - *y).abs().element_sum())
        .sum();
    total / (a.texels().len() * 4) as f32
}

/// Compile `graph` and run `frames` frames at `width`x`height`.
#[allow(dead_code)]
pub fn run_frames(
    graph: &mut RenderGraph,
    frames: usize,
    width: u32,
    height: u32,
) -> GraphExecutor {
    let plan = graph.compile().unwrap();
    let mut executor = GraphExecutor::new(ExecutorConfig::default());
    for _ in 0..frames {
        let report = executor
            .execute(graph, &plan, &FrameContext::new(width, height))
            .unwrap();
        assert!(report.is_completed());
    }
    executor
}
