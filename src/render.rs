//! Plain text rendering of a trace view: a header, the timeline and one Gantt row per span.

use std::fmt::Write;
use std::rc::Rc;

use crate::forest::TreeNode;
use crate::metadata::tree_levels_count;
use crate::timeline::{format_global_start, IntervalUnit, Timeline};
use crate::types::{stringify_attributes, time_point_to_utc_string};
use crate::view::{TraceView, ViewState};

pub const MISSING_SPANS_MESSAGE: &str =
    "This trace has missing spans: some spans reference parents that were not received.";
pub const SUB_TREE_MESSAGE: &str =
    "The trace is too large, only a sub tree around the selected span is shown.";
/// Starts the section of one missing-span tree.
pub const MISSING_TREE_HEADER: &str = "Spans under missing parent";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Width of the bar column, in characters.
    pub width: usize,
    pub unit: Option<IntervalUnit>,
    pub is_sub_tree: bool,
}

/// Horizontal placement of a span bar, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarPosition {
    pub start: usize,
    pub length: usize,
}

/// Place a span of `duration` starting `offset` after the trace start on a bar of `width`
/// characters covering `spread`. Every span gets at least one character.
pub fn bar_position(offset: f64, duration: f64, spread: f64, width: usize) -> BarPosition {
    if width == 0 {
        return BarPosition {
            start: 0,
            length: 0,
        };
    }
    if spread <= 0.0 {
        return BarPosition {
            start: 0,
            length: width,
        };
    }

    let to_chars = |time: f64| (time / spread * width as f64).round().max(0.0) as usize;
    let start = to_chars(offset).min(width - 1);
    let length = to_chars(duration).clamp(1, width - start);
    BarPosition { start, length }
}

pub fn render_view(view: &TraceView, options: &RenderOptions) -> String {
    let metadata = view.metadata();
    let mut out = String::new();

    let _ = writeln!(out, "Trace Details");
    let _ = writeln!(out, "{} Spans", metadata.total_spans);
    if let ViewState::Focused(span_id) = view.state() {
        let _ = writeln!(out, "Focused on span {}", span_id);
    }
    if view.has_missing_spans() {
        let _ = writeln!(out, "{}", MISSING_SPANS_MESSAGE);
    }
    if options.is_sub_tree {
        let _ = writeln!(out, "{}", SUB_TREE_MESSAGE);
    }

    let forest = view.forest();
    let span_rows = collect_rows(&forest.span_tree);
    let missing_trees: Vec<Vec<Rc<TreeNode>>> = forest
        .missing_span_tree
        .iter()
        .map(|root| collect_rows(std::slice::from_ref(root)))
        .collect();
    let label_width = span_rows
        .iter()
        .chain(missing_trees.iter().flatten())
        .map(|node| row_label(node).chars().count())
        .max()
        .unwrap_or(0);

    // Nothing to place on a timeline for an empty trace.
    let Some(timeline) = Timeline::from_metadata(metadata, options.unit) else {
        return out;
    };
    let spread = timeline.end - timeline.start;

    out.push('\n');
    let _ = writeln!(
        out,
        "{:<label_width$} {}",
        format_global_start(timeline.start),
        render_ticks(&timeline, spread, options.width),
        label_width = label_width
    );

    for node in &span_rows {
        write_row(&mut out, node, spread, options.width, label_width);
    }
    for rows in &missing_trees {
        let root = &rows[0];
        let _ = writeln!(
            out,
            "{} {}, {} levels",
            MISSING_TREE_HEADER,
            root.id(),
            tree_levels_count(root)
        );
        for node in rows {
            write_row(&mut out, node, spread, options.width, label_width);
        }
    }

    out
}

fn write_row(out: &mut String, node: &TreeNode, spread: f64, width: usize, label_width: usize) {
    let position = bar_position(node.relative_offset.get(), node.duration, spread, width);
    let bar_char = if node.is_missing() { '-' } else { '=' };
    let bar = format!(
        "{}{}{}",
        " ".repeat(position.start),
        bar_char.to_string().repeat(position.length),
        " ".repeat(width - position.start - position.length)
    );
    let _ = writeln!(
        out,
        "{:<label_width$} |{}| {} {}",
        row_label(node),
        bar,
        format_duration(node.duration),
        node.color.get().to_hex(),
        label_width = label_width
    );
}

/// Nodes of the given trees in display order, parents before their children.
fn collect_rows(roots: &[Rc<TreeNode>]) -> Vec<Rc<TreeNode>> {
    let mut rows = Vec::new();
    let mut stack: Vec<Rc<TreeNode>> = roots.iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        stack.extend(node.children.borrow().iter().rev().cloned());
        rows.push(node);
    }
    rows
}

fn row_label(node: &TreeNode) -> String {
    let indent = "  ".repeat(node.level.get());
    if node.is_missing() {
        format!("{}{} ({})", indent, node.name(), node.id())
    } else {
        format!("{}{} [{}]", indent, node.name(), node.service_name())
    }
}

fn render_ticks(timeline: &Timeline, spread: f64, width: usize) -> String {
    let mut line = vec![' '; width + 2];
    let mut next_free = 0;
    for tick in &timeline.ticks {
        let position = bar_position(tick.offset, 0.0, spread, width).start + 1;
        if position < next_free || position + tick.label.len() > line.len() {
            continue;
        }
        for (i, c) in tick.label.chars().enumerate() {
            line[position + i] = c;
        }
        next_free = position + tick.label.len() + 1;
    }
    line.into_iter().collect::<String>().trim_end().to_string()
}

pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms >= 1_000.0 {
        format!("{:.2}s", duration_ms / 1_000.0)
    } else {
        format!("{:.2}ms", duration_ms)
    }
}

/// Details of one span, relative to the start of the trace.
pub fn render_span_details(node: &TreeNode, trace_start: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", node.name());
    let _ = writeln!(out, " id: {}", node.id());
    let Some(span) = node.span() else {
        let _ = writeln!(out, " placeholder for a span missing from the trace");
        return out;
    };
    if span.has_parent() {
        let _ = writeln!(out, " parent: {}", span.parent_id);
    }
    let _ = writeln!(out, " service: {}", span.service_name);
    let _ = writeln!(out, " start: {}", time_point_to_utc_string(span.start_time));
    let _ = writeln!(
        out,
        " offset: {}",
        format_duration(span.start_time - trace_start)
    );
    let _ = writeln!(out, " duration: {}", format_duration(span.duration));
    let _ = writeln!(out, " attributes: {}", stringify_attributes(&span.attributes));
    out
}
