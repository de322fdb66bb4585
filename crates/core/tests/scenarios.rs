//! End-to-end: build threads from symbolic stacks and check the call tree,
//! stack chart and flame graph produced from them.

use stackchart_core::model::{CallNodeInfo, compute_call_node_info};
use stackchart_core::{
    EngineConfig, Error, StackChartViewport, StackTimingSource, Thread, ThreadBuilder,
    compute_call_tree, flame_graph_timing, inverted_stack_timing_by_depth, stack_timing_by_depth,
};
use stackchart_protocol::{
    CallNodeIndex, Category, CategoryColor, FuncIndex, StackTimingRow, stack_timing_ancestors,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn categories() -> Vec<Category> {
    vec![
        Category::new("Other", CategoryColor::Grey),
        Category::new("JavaScript", CategoryColor::Yellow),
    ]
}

fn func(thread: &Thread, name: &str) -> FuncIndex {
    thread.func_by_name(name).unwrap()
}

fn name_of(thread: &Thread, func: FuncIndex) -> String {
    thread.func_name(func).to_string()
}

#[test]
fn two_samples_sharing_a_prefix() -> Result<(), Error> {
    init_tracing();
    let thread = ThreadBuilder::new()
        .sample(0.0, &["A", "B", "C"])
        .sample(1.0, &["A", "B", "D"])
        .build()?;
    let config = EngineConfig::from_json(br#"{"interval": 1.0}"#)?;
    let cats = categories();
    let info = compute_call_node_info(&thread, config.default_category)?;
    let tree = compute_call_tree(&thread, &cats, &info, &config);

    let [a] = tree.roots() else {
        panic!("expected a single root, got {:?}", tree.roots());
    };
    let a_data = tree.node_data(*a);
    assert_eq!(
        (a_data.func_name.as_str(), a_data.total, a_data.self_time),
        ("A", 2.0, 0.0)
    );

    let [b] = tree.children(*a) else {
        panic!("expected a single child of A");
    };
    let b_data = tree.node_data(*b);
    assert_eq!(
        (b_data.func_name.as_str(), b_data.total, b_data.self_time),
        ("B", 2.0, 0.0)
    );

    let leaves: Vec<(String, f64, f64)> = tree
        .children(*b)
        .iter()
        .map(|&node| {
            let data = tree.node_data(node);
            (data.func_name.to_string(), data.total, data.self_time)
        })
        .collect();
    assert_eq!(
        leaves,
        vec![("C".to_string(), 1.0, 1.0), ("D".to_string(), 1.0, 1.0)]
    );
    Ok(())
}

#[test]
fn empty_time_range_gives_empty_rows() -> Result<(), Error> {
    let thread = ThreadBuilder::new()
        .sample(0.0, &["A", "B", "C"])
        .sample(1.0, &["A"])
        .build()?;
    let info = compute_call_node_info(&thread, 0)?;
    let nodes = info.sample_call_nodes(&thread.samples);
    let config = EngineConfig::default();
    let source = StackTimingSource::new(&thread.samples, &nodes, info.call_node_table(), &config);

    let timing = stack_timing_by_depth(&source, &StackChartViewport::new(0.5, 0.5, 800.0), None);
    assert_eq!(timing.len(), 3);
    assert!(timing.iter().all(|row| row.length == 0));
    Ok(())
}

#[test]
fn single_path_flame_graph() -> Result<(), Error> {
    let thread = ThreadBuilder::new().sample(0.0, &["A", "B"]).build()?;
    let cats = categories();
    let info = compute_call_node_info(&thread, 0)?;
    let tree = compute_call_tree(&thread, &cats, &info, &EngineConfig::default());
    let timing = flame_graph_timing(&tree);

    assert_eq!(timing.len(), 2);
    for (depth, expected) in ["A", "B"].into_iter().enumerate() {
        let row = &timing[depth];
        assert_eq!(row.len(), 1);
        assert_eq!((row.start[0], row.end[0]), (0.0, 1.0));
        assert_eq!(tree.node_data(row.call_node[0]).func_name, expected);
    }
    Ok(())
}

#[test]
fn gap_splits_identical_samples() -> Result<(), Error> {
    let thread = ThreadBuilder::new()
        .sample(0.0, &["A", "B"])
        .gap(1.0)
        .sample(2.0, &["A", "B"])
        .build()?;
    let info = compute_call_node_info(&thread, 0)?;
    let nodes = info.sample_call_nodes(&thread.samples);
    assert_eq!(nodes[0], nodes[2]);

    let config = EngineConfig::default();
    let source = StackTimingSource::new(&thread.samples, &nodes, info.call_node_table(), &config);
    let timing = stack_timing_by_depth(&source, &StackChartViewport::new(0.0, 3.0, 600.0), None);
    for row in &timing {
        assert_eq!(row.len(), 2, "the gap must split every row");
        assert_eq!(row.end_dev[0], 200.0);
        assert_eq!(row.start_dev[1], 400.0);
    }
    Ok(())
}

#[test]
fn hit_testing_walks_to_the_root() -> Result<(), Error> {
    let thread = ThreadBuilder::new()
        .sample(0.0, &["main", "parse", "lex"])
        .sample(1.0, &["main", "parse", "emit"])
        .sample(2.0, &["main", "render"])
        .build()?;
    let info = compute_call_node_info(&thread, 0)?;
    let nodes = info.sample_call_nodes(&thread.samples);
    let config = EngineConfig::default();
    let source = StackTimingSource::new(&thread.samples, &nodes, info.call_node_table(), &config);
    let timing = stack_timing_by_depth(&source, &StackChartViewport::new(0.0, 3.0, 300.0), None);

    let index = timing[2].span_at(150.0).unwrap();
    let chain: Vec<String> = stack_timing_ancestors(&timing, 2, index)
        .map(|(depth, index)| name_of(&thread, timing[depth].span(index).func))
        .collect();
    assert_eq!(chain, ["emit", "parse", "main"]);
    assert_eq!(timing[2].span_at(250.0), None);
    Ok(())
}

#[test]
fn inverted_tree_and_chart_agree() -> Result<(), Error> {
    init_tracing();
    let thread = ThreadBuilder::new()
        .sample(0.0, &["main", "parse", "alloc"])
        .sample(1.0, &["main", "render", "alloc"])
        .sample(2.0, &["main", "render", "alloc"])
        .sample(3.0, &["main", "parse"])
        .frame_category("render", 1, 0)
        .build()?;
    let cats = categories();
    let config = EngineConfig::default();
    let info = compute_call_node_info(&thread, config.default_category)?;

    let non_inverted = compute_call_tree(&thread, &cats, &info, &config);
    let render_alloc = info
        .call_node_index_from_path(&[
            func(&thread, "main"),
            func(&thread, "render"),
            func(&thread, "alloc"),
        ])
        .unwrap();
    let heavy = non_inverted.find_heavy_path_to_same_function_after_inversion(Some(render_alloc));
    assert_eq!(heavy, vec![func(&thread, "alloc")]);

    let nodes = info.sample_call_nodes(&thread.samples);
    let source = StackTimingSource::new(&thread.samples, &nodes, info.call_node_table(), &config);
    let selected = [func(&thread, "alloc"), func(&thread, "render")];
    let viewport = StackChartViewport::new(0.0, 4.0, 400.0);
    let timing = inverted_stack_timing_by_depth(&source, &viewport, &selected, 2);

    // Row 0 is the running function: alloc for three samples, then parse.
    let row0: Vec<String> = timing[0].func.iter().map(|&f| name_of(&thread, f)).collect();
    assert_eq!(row0, ["alloc", "parse"]);
    assert_eq!(timing[0].end_dev[0], 300.0);
    // alloc inherits category 0 under parse and 1 under render.
    assert_eq!(timing[0].category, vec![2, 0]);
    let row1: Vec<(String, bool)> = timing[1]
        .spans()
        .map(|span| (name_of(&thread, span.func), span.is_selected_path))
        .collect();
    assert_eq!(
        row1,
        vec![
            ("parse".to_string(), false),
            ("render".to_string(), true),
            ("main".to_string(), false),
        ]
    );

    let inverted_info = info.invert(config.default_category);
    let inverted = compute_call_tree(&thread, &cats, &inverted_info, &config);
    let top = inverted.roots()[0];
    assert_eq!(inverted.node_data(top).func_name, "alloc");
    assert_eq!(inverted.node_data(top).self_time, 3.0);
    assert_eq!(inverted.display_data(top).total_percent, "75%");
    let heaviest: Vec<String> = inverted
        .find_heaviest_path_in_subtree(top)
        .into_iter()
        .map(|f| name_of(&thread, f))
        .collect();
    assert_eq!(heaviest, ["alloc", "render", "main"]);
    Ok(())
}

#[test]
fn rows_serialize_for_the_renderer() -> Result<(), Error> {
    let thread = ThreadBuilder::new().sample(0.0, &["A"]).build()?;
    let info = compute_call_node_info(&thread, 0)?;
    let nodes = info.sample_call_nodes(&thread.samples);
    let config = EngineConfig::default();
    let source = StackTimingSource::new(&thread.samples, &nodes, info.call_node_table(), &config);
    let viewport = StackChartViewport::new(0.0, 1.0, 10.0);
    let timing = stack_timing_by_depth(&source, &viewport, Some(CallNodeIndex(0)));

    let json = serde_json::to_value(&timing).unwrap();
    assert_eq!(json[0]["endDev"][0], 10.0);
    assert_eq!(json[0]["isSelectedPath"][0], true);
    assert_eq!(
        json[0]["parentIndexInPreviousRow"][0],
        serde_json::Value::Null
    );
    let back: Vec<StackTimingRow> = serde_json::from_value(json).unwrap();
    assert_eq!(back, timing);
    Ok(())
}

#[test]
fn bad_inputs_surface_as_errors() {
    let unsorted = ThreadBuilder::new().sample(2.0, &["A"]).sample(1.0, &["A"]).build();
    let err = Error::from(unsorted.unwrap_err());
    assert!(
        err.to_string()
            .contains("earlier than the sample before it")
    );

    let err = Error::from(EngineConfig::from_json(br#"{"interval": -1}"#).unwrap_err());
    assert!(matches!(err, Error::Config(_)));
}
