pub mod colors;
pub mod forest;
pub mod import;
pub mod metadata;
pub mod persistent;
pub mod render;
pub mod task_timer;
pub mod timeline;
pub mod types;
pub mod view;

pub use forest::{build_forest, sort_children, Forest, NodeKind, TreeNode, TreeSide};
pub use metadata::{annotate_forest, TraceMetadata};
pub use types::{Span, TimePoint};
pub use view::{TraceView, ViewState};
