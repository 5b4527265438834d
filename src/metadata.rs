use std::rc::Rc;

use crate::colors::{Color, ServiceColors};
use crate::forest::{Forest, TreeNode};
use crate::task_timer::TaskTimer;
use crate::types::TimePoint;

/// Trace-wide values computed over a whole forest.
/// `global_start` and `global_end` are `None` for an empty forest.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceMetadata {
    pub global_start: Option<TimePoint>,
    pub global_end: Option<TimePoint>,
    /// Number of real spans, placeholders excluded.
    pub total_spans: usize,
    /// Maximum depth reached, roots are at depth 0.
    pub levels: usize,
}

impl TraceMetadata {
    /// Time between the global start and end, if the forest wasn't empty.
    pub fn spread(&self) -> Option<f64> {
        match (self.global_start, self.global_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Compute trace metadata and fill in `level`, `color` and `relative_offset` of every node.
/// Placeholders count for timing but not for `total_spans`.
pub fn annotate_forest(
    forest: &Forest,
    service_colors: &ServiceColors,
    missing_span_color: Color,
) -> TraceMetadata {
    let t = TaskTimer::new("Computing trace metadata");

    let mut metadata = TraceMetadata::default();
    let mut stack: Vec<(Rc<TreeNode>, usize)> =
        forest.roots().map(|root| (root.clone(), 0)).collect();
    while let Some((node, level)) = stack.pop() {
        node.level.set(level);
        if node.is_missing() {
            node.color.set(missing_span_color);
        } else {
            node.color.set(service_colors.get(node.service_name()));
            metadata.total_spans += 1;
        }

        metadata.levels = metadata.levels.max(level);
        metadata.global_start = Some(match metadata.global_start {
            Some(start) => start.min(node.start_time),
            None => node.start_time,
        });
        metadata.global_end = Some(match metadata.global_end {
            Some(end) => end.max(node.end_time()),
            None => node.end_time(),
        });

        stack.extend(
            node.children
                .borrow()
                .iter()
                .rev()
                .map(|child| (child.clone(), level + 1)),
        );
    }

    if let Some(global_start) = metadata.global_start {
        let mut stack: Vec<Rc<TreeNode>> = forest.roots().cloned().collect();
        while let Some(node) = stack.pop() {
            node.relative_offset.set(node.start_time - global_start);
            stack.extend(node.children.borrow().iter().cloned());
        }
    }

    t.stop();
    metadata
}

/// Depth of a single tree, the root alone has depth 0.
pub fn tree_levels_count(node: &TreeNode) -> usize {
    let mut levels = 0;
    let mut stack: Vec<(Rc<TreeNode>, usize)> = node
        .children
        .borrow()
        .iter()
        .map(|child| (child.clone(), 1))
        .collect();
    while let Some((current, level)) = stack.pop() {
        levels = levels.max(level);
        stack.extend(
            current
                .children
                .borrow()
                .iter()
                .map(|child| (child.clone(), level + 1)),
        );
    }
    levels
}
