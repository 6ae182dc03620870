//! Error types for the explorer engine.
//!
//! Only programming errors and broken invariants surface as `Err`; routine
//! outcomes such as a blocked expansion are reported as events and leave the
//! visible graph untouched.

use statescope_core::StateId;
use thiserror::Error;

/// Result type alias for explorer operations.
pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// Errors that can occur during explorer operations.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The operation referenced a state that is not currently visible.
    #[error("state is not visible: {0}")]
    StateNotVisible(StateId),

    /// An expansion was requested for a state that is already expanded.
    #[error("state is already expanded: {0}")]
    AlreadyExpanded(StateId),

    /// A visible state is unknown to the transition source.
    #[error("state is unknown to the transition source: {0}")]
    UnknownState(StateId),

    /// No path from the initial state exists to a state the engine itself
    /// made visible. The reachability invariant is broken.
    #[error("no path from the initial state to {0}")]
    PathNotFound(StateId),

    /// The layout rejected the synchronized graph.
    #[error(transparent)]
    Layout(#[from] statescope_layout::LayoutError),

    /// Serializing the view export failed.
    #[error("view export error: {0}")]
    Export(#[from] serde_json::Error),
}
