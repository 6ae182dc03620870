//! Explorer configuration and sizing rules.
//!
//! The sizing helpers encode how the layout adapts to the visible graph:
//! link rest lengths and repulsion taper as the number of visible states
//! grows, keeping dense subgraphs compact instead of exploding.

use serde::{Deserialize, Serialize};

/// Strength of the spring along every layout link.
pub(crate) const LINK_STRENGTH: f64 = 0.2;

/// Excitation target while a node is being dragged; keeps the rest of the
/// graph responsive to the moving pin.
pub(crate) const DRAG_ALPHA_TARGET: f64 = 0.3;

/// A fresh transition waypoint spawns just beside its source state.
pub(crate) const WAYPOINT_OFFSET: f64 = 10.0;

/// A fresh target state spawns a little further out than its waypoint; the
/// simulation relaxes both into place.
pub(crate) const NEW_STATE_OFFSET: f64 = 20.0;

/// Configuration of an explorer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerConfig {
    /// Viewport width in pixels.
    pub width: f64,
    /// Viewport height in pixels.
    pub height: f64,
    /// Zoom factor feeding node sizing, link lengths and charges.
    pub scale: f64,
    /// Expanding a state collapses every state not on the path to it.
    pub directed_exploration: bool,
    /// Drag pins persist after release.
    pub sticky_nodes: bool,
    /// Lay out weak (silent) steps with a shorter link.
    pub short_weak_steps: bool,
    /// Presentation hint: show the "click to expand" notice.
    pub show_expand_notice: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            scale: 1.0,
            directed_exploration: false,
            sticky_nodes: false,
            short_weak_steps: false,
            show_expand_notice: true,
        }
    }
}

/// Radius of a drawn state circle at the given zoom factor.
pub fn state_radius(scale: f64) -> f64 {
    scale * 20.0
}

/// Minimum distance kept between any node and the viewport border; also the
/// margin the view export is aligned to.
pub fn border_margin(scale: f64) -> f64 {
    state_radius(scale)
}

/// Rest length of a layout link.
pub(crate) fn link_distance(
    scale: f64,
    weak: bool,
    short_weak_steps: bool,
    state_count: usize,
) -> f64 {
    if weak && short_weak_steps {
        scale * 15.0
    } else {
        scale * (60.0 - 2.0 * state_count as f64).clamp(30.0, 60.0)
    }
}

/// Repulsive charge of a state node.
pub(crate) fn state_charge(scale: f64, state_count: usize) -> f64 {
    scale * (-48.0 + 1.2 * state_count as f64).clamp(-48.0, -20.0)
}

/// Repulsive charge of a transition waypoint.
pub(crate) fn waypoint_charge(scale: f64, weak: bool) -> f64 {
    scale * if weak { -20.0 } else { -48.0 }
}
