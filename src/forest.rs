//! Reconstruction of span trees from the flat span list of a trace.
//!
//! Spans are first indexed by id and then linked to their parents through the index, so the
//! input can arrive in any order. Spans whose parent is not part of the trace are attached to a
//! placeholder root standing in for the missing parent.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::colors::Color;
use crate::task_timer::TaskTimer;
use crate::types::{Span, TimePoint};

#[derive(Debug, Clone)]
pub enum NodeKind {
    Span(Rc<Span>),
    /// Stands in for a parent span that is referenced but absent from the trace.
    Missing { id: String, label: String },
}

#[derive(Debug)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub start_time: TimePoint,
    pub duration: f64,
    pub children: RefCell<Vec<Rc<TreeNode>>>,

    // Filled in by the metadata pass
    pub level: Cell<usize>,
    pub color: Cell<Color>,
    /// Distance from the start of the trace, in milliseconds.
    pub relative_offset: Cell<f64>,
}

impl TreeNode {
    pub fn from_span(span: Rc<Span>) -> TreeNode {
        TreeNode {
            start_time: span.start_time,
            duration: span.duration,
            kind: NodeKind::Span(span),
            children: RefCell::new(Vec::new()),
            level: Cell::new(0),
            color: Cell::new(Color::default()),
            relative_offset: Cell::new(0.0),
        }
    }

    /// Creates a placeholder for `missing_id` that covers the time range of its children.
    pub fn missing(missing_id: String, label: &str, children: Vec<Rc<TreeNode>>) -> TreeNode {
        let start_time = children
            .iter()
            .map(|c| c.start_time)
            .fold(f64::INFINITY, f64::min);
        let end_time = children
            .iter()
            .map(|c| c.end_time())
            .fold(f64::NEG_INFINITY, f64::max);
        let (start_time, duration) = if children.is_empty() {
            (0.0, 0.0)
        } else {
            (start_time, end_time - start_time)
        };

        TreeNode {
            kind: NodeKind::Missing {
                id: missing_id,
                label: label.to_string(),
            },
            start_time,
            duration,
            children: RefCell::new(children),
            level: Cell::new(0),
            color: Cell::new(Color::default()),
            relative_offset: Cell::new(0.0),
        }
    }

    pub fn id(&self) -> &str {
        match &self.kind {
            NodeKind::Span(span) => &span.id,
            NodeKind::Missing { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Span(span) => &span.name,
            NodeKind::Missing { label, .. } => label,
        }
    }

    pub fn service_name(&self) -> &str {
        match &self.kind {
            NodeKind::Span(span) => &span.service_name,
            NodeKind::Missing { .. } => "",
        }
    }

    pub fn span(&self) -> Option<&Rc<Span>> {
        match &self.kind {
            NodeKind::Span(span) => Some(span),
            NodeKind::Missing { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, NodeKind::Missing { .. })
    }

    pub fn end_time(&self) -> TimePoint {
        self.start_time + self.duration
    }

    pub fn child_ids(&self) -> Vec<String> {
        self.children
            .borrow()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    /// Copies the whole subtree, including computed fields. The copy shares no nodes with `self`.
    pub fn deep_clone(&self) -> Rc<TreeNode> {
        let mut root = self.copy_without_children();

        // Copies of the descendants in depth-first pre-order, each with the position of its
        // parent copy (`None` for children of the root).
        let mut copies: Vec<(TreeNode, Option<usize>)> = Vec::new();
        let mut stack: Vec<(Rc<TreeNode>, Option<usize>)> = self
            .children
            .borrow()
            .iter()
            .rev()
            .map(|child| (child.clone(), None))
            .collect();
        while let Some((node, parent)) = stack.pop() {
            let position = copies.len();
            copies.push((node.copy_without_children(), parent));
            stack.extend(
                node.children
                    .borrow()
                    .iter()
                    .rev()
                    .map(|child| (child.clone(), Some(position))),
            );
        }

        // Descendants come after their ancestors, so a copy is complete once it's popped.
        // Siblings are attached last to first.
        while let Some((mut copy, parent)) = copies.pop() {
            copy.children.get_mut().reverse();
            let siblings = match parent {
                Some(position) => copies[position].0.children.get_mut(),
                None => root.children.get_mut(),
            };
            siblings.push(Rc::new(copy));
        }
        root.children.get_mut().reverse();
        Rc::new(root)
    }

    fn copy_without_children(&self) -> TreeNode {
        TreeNode {
            kind: self.kind.clone(),
            start_time: self.start_time,
            duration: self.duration,
            children: RefCell::new(Vec::new()),
            level: Cell::new(self.level.get()),
            color: Cell::new(self.color.get()),
            relative_offset: Cell::new(self.relative_offset.get()),
        }
    }
}

// Children are released with a work stack so long parent chains drop without deep recursion.
impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(self.children.get_mut());
        while let Some(node) = stack.pop() {
            if let Ok(mut node) = Rc::try_unwrap(node) {
                stack.append(node.children.get_mut());
            }
        }
    }
}

/// Which of the two root collections of a [Forest] a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSide {
    SpanTree,
    MissingSpanTree,
}

#[derive(Debug, Default)]
pub struct Forest {
    pub span_tree: Vec<Rc<TreeNode>>,
    pub missing_span_tree: Vec<Rc<TreeNode>>,
    index: HashMap<String, (Rc<TreeNode>, TreeSide)>,
}

impl Forest {
    /// Builds the id index by walking down from the given roots.
    pub fn from_roots(
        span_tree: Vec<Rc<TreeNode>>,
        missing_span_tree: Vec<Rc<TreeNode>>,
    ) -> Forest {
        let mut index = HashMap::new();
        let sides = [
            (&span_tree, TreeSide::SpanTree),
            (&missing_span_tree, TreeSide::MissingSpanTree),
        ];
        for (roots, side) in sides {
            let mut stack: Vec<Rc<TreeNode>> = roots.iter().rev().cloned().collect();
            while let Some(node) = stack.pop() {
                stack.extend(node.children.borrow().iter().rev().cloned());
                index.insert(node.id().to_string(), (node, side));
            }
        }

        Forest {
            span_tree,
            missing_span_tree,
            index,
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Rc<TreeNode>> {
        self.index.get(id).map(|(node, _)| node.clone())
    }

    pub fn lookup_with_side(&self, id: &str) -> Option<(Rc<TreeNode>, TreeSide)> {
        self.index.get(id).cloned()
    }

    /// A new forest containing only a copy of the subtree rooted at `id`, placed on the same side
    /// as the original node. `None` when the id is not part of this forest.
    pub fn focused(&self, id: &str) -> Option<Forest> {
        let (node, side) = self.lookup_with_side(id)?;
        let root = node.deep_clone();
        Some(match side {
            TreeSide::SpanTree => Forest::from_roots(vec![root], Vec::new()),
            TreeSide::MissingSpanTree => Forest::from_roots(Vec::new(), vec![root]),
        })
    }

    /// All roots, span tree first.
    pub fn roots(&self) -> impl Iterator<Item = &Rc<TreeNode>> {
        self.span_tree.iter().chain(self.missing_span_tree.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.span_tree.is_empty() && self.missing_span_tree.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Number of nodes backed by a real span.
    pub fn span_count(&self) -> usize {
        self.index
            .values()
            .filter(|(node, _)| !node.is_missing())
            .count()
    }

    pub fn sort(&self) {
        sort_children(&self.span_tree);
        sort_children(&self.missing_span_tree);
    }
}

/// Link the spans of one trace into a forest.
/// Children keep their input order; use [sort_children] to order them by start time.
pub fn build_forest(spans: &[Span], missing_span_label: &str) -> Forest {
    let t = TaskTimer::new("Building span forest");

    // Index the spans by id
    let mut spans_by_id: HashMap<&str, &Span> = HashMap::new();
    let mut indexed_spans: Vec<&Span> = Vec::new();
    for span in spans {
        if span.id.is_empty() {
            tracing::warn!(span_name = %span.name, "skipping span without id");
            continue;
        }
        if spans_by_id.contains_key(span.id.as_str()) {
            tracing::warn!(span_id = %span.id, "skipping span with duplicate id");
            continue;
        }
        spans_by_id.insert(&span.id, span);
        indexed_spans.push(span);
    }

    // Link every span to its parent through the index
    let mut nodes: HashMap<&str, Rc<TreeNode>> = HashMap::new();
    let mut span_roots = Vec::new();
    let mut orphan_groups: Vec<(String, Vec<Rc<TreeNode>>)> = Vec::new();
    let mut orphan_group_by_parent: HashMap<&str, usize> = HashMap::new();
    for &span in &indexed_spans {
        let node = get_or_create_node(&mut nodes, span);

        if !span.has_parent() || span.parent_id == span.id {
            span_roots.push(node);
        } else if let Some(&parent_span) = spans_by_id.get(span.parent_id.as_str()) {
            let parent = get_or_create_node(&mut nodes, parent_span);
            parent.children.borrow_mut().push(node);
        } else {
            let group_index = *orphan_group_by_parent
                .entry(span.parent_id.as_str())
                .or_insert_with(|| {
                    orphan_groups.push((span.parent_id.clone(), Vec::new()));
                    orphan_groups.len() - 1
                });
            orphan_groups[group_index].1.push(node);
        }
    }

    let missing_roots = orphan_groups
        .into_iter()
        .map(|(missing_id, children)| {
            Rc::new(TreeNode::missing(missing_id, missing_span_label, children))
        })
        .collect();

    let forest = Forest::from_roots(span_roots, missing_roots);

    // Spans caught in a parent cycle can't be reached from any root.
    let unreachable = nodes.len() - forest.span_count();
    if unreachable > 0 {
        tracing::warn!(count = unreachable, "dropping spans that form a parent cycle");
        for (id, node) in &nodes {
            if forest.lookup(id).is_none() {
                node.children.borrow_mut().clear();
            }
        }
    }

    tracing::debug!(
        spans = forest.span_count(),
        roots = forest.span_tree.len(),
        missing_roots = forest.missing_span_tree.len(),
        "built span forest"
    );
    t.stop();

    forest
}

fn get_or_create_node<'a>(
    nodes: &mut HashMap<&'a str, Rc<TreeNode>>,
    span: &'a Span,
) -> Rc<TreeNode> {
    nodes
        .entry(span.id.as_str())
        .or_insert_with(|| Rc::new(TreeNode::from_span(Rc::new(span.clone()))))
        .clone()
}

/// Order the children of every node by start time. Stable, so spans that start at the same time
/// keep their relative order.
pub fn sort_children(nodes: &[Rc<TreeNode>]) {
    let mut stack: Vec<Rc<TreeNode>> = nodes.to_vec();
    while let Some(node) = stack.pop() {
        let mut children = node.children.borrow_mut();
        children.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        stack.extend(children.iter().cloned());
    }
}
