use approx::assert_relative_eq;

use spanforest::colors::{ServiceColors, DEFAULT_PALETTE, MISSING_SPAN_COLOR};
use spanforest::metadata::tree_levels_count;
use spanforest::persistent::DEFAULT_MISSING_SPAN_LABEL;
use spanforest::{annotate_forest, build_forest, TraceMetadata};

use test_helpers::*;

#[test]
fn test_simple_trace_metadata() {
    let spans = simple_trace();
    let colors = ServiceColors::from_spans(&spans, &DEFAULT_PALETTE);
    let forest = build_forest(&spans, DEFAULT_MISSING_SPAN_LABEL);
    forest.sort();

    let metadata = annotate_forest(&forest, &colors, MISSING_SPAN_COLOR);
    assert_eq!(
        metadata,
        TraceMetadata {
            global_start: Some(0.0),
            global_end: Some(110.0),
            total_spans: 3,
            levels: 1,
        }
    );
    assert_eq!(metadata.spread(), Some(110.0));

    let b = forest.lookup("B").unwrap();
    assert_eq!(b.level.get(), 1);
    assert_relative_eq!(b.relative_offset.get(), 10.0);
}

#[test]
fn test_placeholders_not_counted() {
    let spans = vec![create_test_span("X", "missing1", 0.0, 10.0)];
    let colors = ServiceColors::from_spans(&spans, &DEFAULT_PALETTE);
    let forest = build_forest(&spans, DEFAULT_MISSING_SPAN_LABEL);
    let metadata = annotate_forest(&forest, &colors, MISSING_SPAN_COLOR);

    assert_eq!(metadata.total_spans, 1);
    assert_eq!(metadata.levels, 1);
    assert_eq!(metadata.global_start, Some(0.0));
    assert_eq!(metadata.global_end, Some(10.0));

    let placeholder = forest.lookup("missing1").unwrap();
    assert_eq!(placeholder.color.get(), MISSING_SPAN_COLOR);
    assert_eq!(placeholder.level.get(), 0);
    assert_eq!(forest.lookup("X").unwrap().level.get(), 1);
}

#[test]
fn test_global_range_spans_both_trees() {
    let spans = trace_with_orphans();
    let colors = ServiceColors::from_spans(&spans, &DEFAULT_PALETTE);
    let forest = build_forest(&spans, DEFAULT_MISSING_SPAN_LABEL);
    forest.sort();
    let metadata = annotate_forest(&forest, &colors, MISSING_SPAN_COLOR);

    let min_start = spans.iter().map(|s| s.start_time).fold(f64::INFINITY, f64::min);
    let max_end = spans
        .iter()
        .map(|s| s.end_time())
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(metadata.global_start, Some(min_start));
    assert_eq!(metadata.global_end, Some(max_end));
    assert_eq!(metadata.total_spans, spans.len());
    assert_eq!(metadata.levels, 2);

    for node in all_nodes(&forest.span_tree) {
        assert_relative_eq!(node.relative_offset.get(), node.start_time - min_start);
    }
    let orphan_child = forest.lookup("orphan_child").unwrap();
    assert_eq!(orphan_child.level.get(), 2);
    assert_relative_eq!(orphan_child.relative_offset.get(), 125.0);
}

#[test]
fn test_colors_follow_service() {
    let spans = trace_with_orphans();
    let colors = ServiceColors::from_spans(&spans, &DEFAULT_PALETTE);
    let forest = build_forest(&spans, DEFAULT_MISSING_SPAN_LABEL);
    annotate_forest(&forest, &colors, MISSING_SPAN_COLOR);

    assert_eq!(colors.len(), 4);
    let auth = forest.lookup("auth").unwrap();
    let token = forest.lookup("token").unwrap();
    assert_eq!(auth.color.get(), token.color.get());
    assert_eq!(auth.color.get(), colors.get("auth"));
    assert_eq!(
        forest.lookup("db").unwrap().color.get(),
        colors.get("storage")
    );
}

#[test]
fn test_empty_forest_metadata() {
    let forest = build_forest(&[], DEFAULT_MISSING_SPAN_LABEL);
    let metadata = annotate_forest(&forest, &ServiceColors::default(), MISSING_SPAN_COLOR);
    assert_eq!(metadata.global_start, None);
    assert_eq!(metadata.global_end, None);
    assert_eq!(metadata.spread(), None);
    assert_eq!(metadata.total_spans, 0);
    assert_eq!(metadata.levels, 0);
}

#[test]
fn test_tree_levels_count() {
    let forest = build_forest(&trace_with_orphans(), DEFAULT_MISSING_SPAN_LABEL);
    assert_eq!(tree_levels_count(&forest.span_tree[0]), 2);
    assert_eq!(tree_levels_count(&forest.missing_span_tree[0]), 2);
    assert_eq!(tree_levels_count(&forest.lookup("token").unwrap()), 0);
}
