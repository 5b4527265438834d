//! The displayed forest of one trace and the focus/reset state machine around it.

use std::rc::Rc;

use crate::colors::ServiceColors;
use crate::forest::{build_forest, Forest, TreeNode};
use crate::metadata::{annotate_forest, TraceMetadata};
use crate::persistent::Settings;
use crate::types::{Span, TimePoint};

/// A sorted and annotated forest together with its metadata.
#[derive(Debug)]
pub struct AnnotatedForest {
    pub forest: Forest,
    pub metadata: TraceMetadata,
}

#[derive(Debug)]
enum ActiveView {
    Full,
    Focused {
        span_id: String,
        view: AnnotatedForest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState<'a> {
    Full,
    Focused(&'a str),
}

#[derive(Debug)]
pub struct TraceView {
    settings: Settings,
    service_colors: ServiceColors,
    original: AnnotatedForest,
    active: ActiveView,
}

impl TraceView {
    pub fn new(spans: &[Span], settings: &Settings) -> TraceView {
        // Colors depend only on the span list, so they stay the same across focus and reset.
        let service_colors = ServiceColors::from_spans(spans, &settings.palette);

        let forest = build_forest(spans, &settings.missing_span_label);
        forest.sort();
        let metadata = annotate_forest(&forest, &service_colors, settings.missing_span_color);
        tracing::info!(
            total_spans = metadata.total_spans,
            levels = metadata.levels,
            missing_roots = forest.missing_span_tree.len(),
            "trace view ready"
        );

        TraceView {
            settings: settings.clone(),
            service_colors,
            original: AnnotatedForest { forest, metadata },
            active: ActiveView::Full,
        }
    }

    /// Narrow the view to the subtree rooted at `span_id`, starting from the currently displayed
    /// forest. Returns false and leaves the view unchanged when the id isn't displayed.
    pub fn focus(&mut self, span_id: &str) -> bool {
        let Some(forest) = self.forest().focused(span_id) else {
            tracing::debug!(span_id, "focus target not found, keeping current view");
            return false;
        };

        forest.sort();
        let metadata = annotate_forest(
            &forest,
            &self.service_colors,
            self.settings.missing_span_color,
        );
        self.active = ActiveView::Focused {
            span_id: span_id.to_string(),
            view: AnnotatedForest { forest, metadata },
        };
        true
    }

    /// Go back to the full forest of the trace.
    pub fn reset(&mut self) {
        self.active = ActiveView::Full;
    }

    pub fn state(&self) -> ViewState<'_> {
        match &self.active {
            ActiveView::Full => ViewState::Full,
            ActiveView::Focused { span_id, .. } => ViewState::Focused(span_id),
        }
    }

    fn active_view(&self) -> &AnnotatedForest {
        match &self.active {
            ActiveView::Full => &self.original,
            ActiveView::Focused { view, .. } => view,
        }
    }

    /// The forest currently displayed.
    pub fn forest(&self) -> &Forest {
        &self.active_view().forest
    }

    /// Metadata of the forest currently displayed.
    pub fn metadata(&self) -> &TraceMetadata {
        &self.active_view().metadata
    }

    /// Metadata of the whole trace, unaffected by focus.
    pub fn original_metadata(&self) -> &TraceMetadata {
        &self.original.metadata
    }

    pub fn original_forest(&self) -> &Forest {
        &self.original.forest
    }

    /// Find a node of the displayed forest.
    pub fn lookup(&self, id: &str) -> Option<Rc<TreeNode>> {
        self.forest().lookup(id)
    }

    pub fn has_missing_spans(&self) -> bool {
        !self.forest().missing_span_tree.is_empty()
    }

    pub fn service_colors(&self) -> &ServiceColors {
        &self.service_colors
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start time of the first root in the displayed span tree.
    pub fn first_span_start_time(&self) -> Option<TimePoint> {
        self.forest().span_tree.first().map(|root| root.start_time)
    }
}
