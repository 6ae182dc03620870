//! Notifications the explorer emits toward its host.

use serde::Serialize;
use statescope_core::StateId;

/// Summary of what the user can still do with the visible graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionStatus {
    /// At least one visible state has known transitions and is collapsed.
    pub has_expandable_states: bool,
    /// At least one visible state is expanded.
    pub has_collapsible_states: bool,
}

/// Events emitted by the explorer. The host drains these after each batch of
/// operations (or each frame) and reacts as it sees fit; none of them
/// requires a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerEvent {
    /// A state's transitions were materialized.
    StateExpanded(StateId),
    /// A state's expansion was undone (including cascaded collapses).
    StateCollapsed(StateId),
    /// The host reported a click on a state.
    StateClicked(StateId),
    /// The host reported a right-click on a state.
    StateRightClicked(StateId),
    /// The pointer entered a state.
    StateHoverStarted(StateId),
    /// The pointer left a state.
    StateHoverEnded(StateId),
    /// The pointer entered a transition.
    TransitionHoverStarted {
        source: StateId,
        transition_index: usize,
    },
    /// The pointer left a transition.
    TransitionHoverEnded {
        source: StateId,
        transition_index: usize,
    },
    /// Expansion was requested for a state whose source data is erroneous.
    /// The visible graph is unchanged.
    ExpansionBlockedErroneous { state: StateId, error: String },
    /// Expansion was requested for a state whose transitions are not known
    /// yet. The visible graph is unchanged; exploring further is the
    /// transition source's business.
    ExpansionBlockedUnexplored(StateId),
    /// The expansion summary changed structurally.
    ExpansionStatusChanged(ExpansionStatus),
}
