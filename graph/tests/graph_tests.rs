//! Graph integration tests.
//!
//! Graphs are built through the registry-backed configuration surface,
//! compiled, and executed with the public executor API. Tests are
//! parameterized using `rstest`.

mod common;

use common::{COUNTERS, RGBA32, buffer_chain, chain, init_logging, registry};
use glam::Vec4;
use lumen_graph::{
    Binding, ExecutorConfig, FrameContext, GraphError, GraphExecutor, Options, PortRef,
    RenderGraph, ResourceKind,
};
use rstest::rstest;

fn texel(executor: &GraphExecutor, reference: &str) -> Vec4 {
    executor.output_texture(reference).unwrap().get(0, 0)
}

// ============================================================================
// Ordering
// ============================================================================

#[rstest]
#[case::alphabetical(&["a", "b", "c"])]
#[case::reversed(&["c", "b", "a"])]
#[case::shuffled(&["mid", "first", "last", "zeta", "alpha"])]
fn test_edgeless_graph_keeps_declaration_order(#[case] names: &[&str]) {
    init_logging();
    let registry = registry();
    let mut graph = RenderGraph::new("edgeless");
    for name in names {
        graph
            .create_pass(&registry, "Source", name, Options::new())
            .unwrap();
    }
    graph.mark_output(&format!("{}.dst", names[0])).unwrap();

    let plan = graph.compile().unwrap();
    assert_eq!(plan.pass_order(), names.to_vec());
}

#[rstest]
#[case::self_loop(1)]
#[case::pair(2)]
#[case::triangle(3)]
#[case::ring_of_six(6)]
fn test_cycle_of_any_length(#[case] len: usize) {
    let registry = registry();
    let mut graph = RenderGraph::new("ring");
    let names: Vec<String> = (0..len).map(|i| format!("blit_{i}")).collect();
    for name in &names {
        graph
            .create_pass(&registry, "Blit", name, Options::new())
            .unwrap();
    }
    for i in 0..len {
        let next = (i + 1) % len;
        graph
            .add_edge(&format!("{}.dst", names[i]), &format!("{}.src", names[next]))
            .unwrap();
    }
    graph.mark_output("blit_0.dst").unwrap();

    assert_eq!(
        graph.compile().unwrap_err(),
        GraphError::CyclicGraph { passes: names }
    );
}

#[rstest]
#[case::first_then_second("x.dst", "y.dst")]
#[case::second_then_first("y.dst", "x.dst")]
fn test_duplicate_input_binding(#[case] first: &str, #[case] second: &str) {
    let registry = registry();
    let mut graph = RenderGraph::new("fan-in");
    graph
        .create_pass(&registry, "Source", "x", Options::new())
        .unwrap();
    graph
        .create_pass(&registry, "Source", "y", Options::new())
        .unwrap();
    graph
        .create_pass(&registry, "Blit", "blit", Options::new())
        .unwrap();

    graph.add_edge(first, "blit.src").unwrap();
    let revision = graph.revision();
    assert_eq!(
        graph.add_edge(second, "blit.src").unwrap_err(),
        GraphError::DuplicateInputBinding {
            dst: PortRef::new("blit", "src"),
            existing: PortRef::parse(first).unwrap(),
        }
    );
    assert_eq!(graph.revision(), revision);
    assert_eq!(graph.edges().len(), 1);
}

// ============================================================================
// Configuration surface
// ============================================================================

#[test]
fn test_unknown_pass_type() {
    let registry = registry();
    let mut graph = RenderGraph::new("unknown");
    assert_eq!(
        graph
            .create_pass(&registry, "Denoiser", "denoise", Options::new())
            .unwrap_err(),
        GraphError::UnknownPassType("Denoiser".into())
    );
    assert!(graph.is_empty());
}

#[rstest]
#[case::typo(Options::new().with("gian", 2.0), "gian")]
#[case::extra(Options::new().with("gain", 2.0).with("bias", 1.0), "bias")]
fn test_unrecognized_option(#[case] options: Options, #[case] option: &str) {
    let registry = registry();
    let mut graph = RenderGraph::new("options");
    assert_eq!(
        graph
            .create_pass(&registry, "Blit", "blit", options)
            .unwrap_err(),
        GraphError::UnrecognizedOption {
            pass_type: "Blit".into(),
            option: option.into(),
        }
    );
}

#[test]
fn test_wrongly_typed_option() {
    let registry = registry();
    let mut graph = RenderGraph::new("options");
    let err = graph
        .create_pass(&registry, "Blit", "blit", Options::new().with("gain", "loud"))
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidOptionValue { ref option, .. } if option == "gain"));
    assert!(err.is_structural());
}

#[test]
fn test_descriptor_keeps_options() {
    let registry = registry();
    let mut graph = RenderGraph::new("descriptor");
    let options = Options::new().with("value", 0.25);
    graph
        .create_pass(&registry, "Source", "src", options.clone())
        .unwrap();

    let descriptor = graph.descriptor("src").unwrap();
    assert_eq!(descriptor.type_name, "Source");
    assert_eq!(descriptor.options, options);
}

// ============================================================================
// Compilation
// ============================================================================

#[rstest]
#[case::single(1, 1)]
#[case::pair(2, 2)]
#[case::five(5, 2)]
#[case::sixteen(16, 2)]
fn test_chain_aliases_into_two_slots(#[case] len: usize, #[case] slots: usize) {
    let registry = registry();
    let graph = chain(&registry, len, 1.0, 1.0);
    let plan = graph.compile().unwrap();

    assert_eq!(plan.pass_count(), len);
    assert_eq!(plan.resources().len(), len);
    assert_eq!(plan.slot_count(), slots);
    for slot in plan.slots() {
        assert_eq!(*slot, RGBA32);
    }
}

#[rstest]
#[case::single(1, 1)]
#[case::pair(2, 2)]
#[case::six(6, 2)]
fn test_buffer_chain_aliases_into_two_slots(#[case] len: usize, #[case] slots: usize) {
    let registry = registry();
    let plan = buffer_chain(&registry, len).compile().unwrap();

    assert_eq!(plan.resources().len(), len);
    assert_eq!(plan.slot_count(), slots);
    for resource in plan.resources() {
        assert_eq!(resource.kind, COUNTERS);
    }
    for slot in plan.slots() {
        assert_eq!(*slot, ResourceKind::Buffer { size: 16 });
    }
}

#[test]
fn test_buffer_to_texture_edge_rejected() {
    let registry = registry();
    let mut graph = RenderGraph::new("mixed");
    graph
        .create_pass(&registry, "Tally", "tally", Options::new())
        .unwrap();
    graph
        .create_pass(&registry, "Blit", "blit", Options::new())
        .unwrap();

    assert_eq!(
        graph.add_edge("tally.dst", "blit.src").unwrap_err(),
        GraphError::PortKindMismatch {
            src: PortRef::new("tally", "dst"),
            src_kind: COUNTERS,
            dst: PortRef::new("blit", "src"),
            dst_kind: RGBA32,
        }
    );
}

#[test]
fn test_optional_input_absent_then_bound() {
    let registry = registry();
    let mut graph = RenderGraph::new("optional");
    graph
        .create_pass(&registry, "Source", "a", Options::new())
        .unwrap();
    graph
        .create_pass(&registry, "Combine", "sum", Options::new())
        .unwrap();
    graph.add_edge("a.dst", "sum.a").unwrap();
    graph.mark_output("sum.dst").unwrap();

    let plan = graph.compile().unwrap();
    let step = &plan.steps()[plan.step_of("sum").unwrap()];
    assert_eq!(step.inputs[1].binding, Binding::Absent);

    graph
        .create_pass(&registry, "Source", "b", Options::new())
        .unwrap();
    graph.add_edge("b.dst", "sum.b").unwrap();
    let plan = graph.compile().unwrap();
    assert_eq!(plan.pass_order(), vec!["a", "b", "sum"]);
    let step = &plan.steps()[2];
    assert!(matches!(step.inputs[1].binding, Binding::Resource(_)));
}

#[test]
fn test_required_input_unconnected() {
    let registry = registry();
    let mut graph = RenderGraph::new("unconnected");
    graph
        .create_pass(&registry, "Combine", "sum", Options::new())
        .unwrap();
    graph.mark_output("sum.dst").unwrap();
    assert_eq!(
        graph.compile().unwrap_err(),
        GraphError::UnconnectedInput(PortRef::new("sum", "a"))
    );
}

// ============================================================================
// Execution
// ============================================================================

#[rstest]
#[case::source_only(1, 0.5, 3.0, 0.5)]
#[case::double_once(2, 1.0, 2.0, 2.0)]
#[case::triple_twice(3, 1.0, 3.0, 9.0)]
#[case::halve_four_times(5, 8.0, 0.5, 0.5)]
fn test_chain_execution(
    #[case] len: usize,
    #[case] value: f64,
    #[case] gain: f64,
    #[case] expected: f32,
) {
    init_logging();
    let registry = registry();
    let mut graph = chain(&registry, len, value, gain);
    let plan = graph.compile().unwrap();
    let mut executor = GraphExecutor::new(ExecutorConfig::default());

    let report = executor
        .execute(&mut graph, &plan, &FrameContext::new(3, 2))
        .unwrap();
    assert!(report.is_completed());
    assert_eq!(report.passes_executed, len);
    assert_eq!(texel(&executor, &format!("pass_{}.dst", len - 1)), Vec4::splat(expected));
}

#[rstest]
#[case::single(1)]
#[case::pair(2)]
#[case::seven(7)]
fn test_buffer_chain_execution(#[case] len: usize) {
    init_logging();
    let registry = registry();
    let mut graph = buffer_chain(&registry, len);
    let plan = graph.compile().unwrap();
    let mut executor = GraphExecutor::new(ExecutorConfig::default());
    let last = format!("tally_{}.dst", len - 1);

    for _ in 0..2 {
        let report = executor
            .execute(&mut graph, &plan, &FrameContext::new(4, 4))
            .unwrap();
        assert!(report.is_completed());
        assert_eq!(report.passes_executed, len);
        let bytes = executor.output_buffer(&last).unwrap();
        assert_eq!(bytes, [len as u8; 16].as_slice());
    }
    assert!(executor.output_texture(&last).is_none());
}

#[test]
fn test_diamond_execution() {
    let registry = registry();
    let mut graph = RenderGraph::new("diamond");
    graph
        .create_pass(&registry, "Source", "src", Options::new().with("value", 1.0))
        .unwrap();
    graph
        .create_pass(&registry, "Blit", "left", Options::new().with("gain", 2.0))
        .unwrap();
    graph
        .create_pass(&registry, "Blit", "right", Options::new().with("gain", 3.0))
        .unwrap();
    graph
        .create_pass(&registry, "Combine", "sum", Options::new())
        .unwrap();
    graph.add_edge("src.dst", "left.src").unwrap();
    graph.add_edge("src.dst", "right.src").unwrap();
    graph.add_edge("left.dst", "sum.a").unwrap();
    graph.add_edge("right.dst", "sum.b").unwrap();
    graph.mark_output("sum.dst").unwrap();
    graph.mark_output("left.dst").unwrap();

    let plan = graph.compile().unwrap();
    let mut executor = GraphExecutor::new(ExecutorConfig::default());
    executor
        .execute(&mut graph, &plan, &FrameContext::new(2, 2))
        .unwrap();

    assert_eq!(texel(&executor, "sum.dst"), Vec4::splat(5.0));
    assert_eq!(texel(&executor, "left.dst"), Vec4::splat(2.0));
    assert!(executor.output("right.dst").is_none());
}

#[test]
fn test_update_pass_between_frames() {
    let registry = registry();
    let mut graph = chain(&registry, 2, 1.0, 2.0);
    let plan = graph.compile().unwrap();
    let mut executor = GraphExecutor::new(ExecutorConfig::default());

    executor
        .execute(&mut graph, &plan, &FrameContext::new(1, 1))
        .unwrap();
    assert_eq!(texel(&executor, "pass_1.dst"), Vec4::splat(2.0));

    graph
        .update_pass("pass_1", &Options::new().with("gain", 4.0))
        .unwrap();
    executor
        .execute(&mut graph, &plan, &FrameContext::new(1, 1))
        .unwrap();
    assert_eq!(texel(&executor, "pass_1.dst"), Vec4::splat(4.0));
}

#[test]
fn test_two_executors_share_a_plan() {
    let registry = registry();
    let mut first = chain(&registry, 3, 1.0, 2.0);
    let plan = first.compile().unwrap();

    let mut small = GraphExecutor::new(ExecutorConfig::default());
    let mut large = GraphExecutor::new(ExecutorConfig::default());
    small
        .execute(&mut first, &plan, &FrameContext::new(1, 1))
        .unwrap();
    large
        .execute(&mut first, &plan, &FrameContext::new(16, 16))
        .unwrap();

    assert_eq!(small.output_texture("pass_2.dst").unwrap().extent(), (1, 1));
    assert_eq!(large.output_texture("pass_2.dst").unwrap().extent(), (16, 16));
}
