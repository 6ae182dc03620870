//! Serializable snapshot of the current view.
//!
//! The export shifts all coordinates so the minimum x/y across the visible
//! nodes equals the border margin, which lets the snapshot be re-rendered
//! outside the live engine without cropping.

use std::collections::BTreeMap;

use serde::Serialize;
use statescope_core::StateId;

use crate::store::{VisibleGraph, VisibleState, VisibleTransition};

/// The visible states and transitions as currently displayed, aligned
/// top-left to the margin.
#[derive(Debug, Clone, Serialize)]
pub struct ViewData {
    pub states: BTreeMap<StateId, VisibleState>,
    pub transitions: Vec<VisibleTransition>,
}

pub(crate) fn export_view(graph: &VisibleGraph, margin: f64) -> ViewData {
    let min_x = graph
        .states()
        .values()
        .map(|s| s.x)
        .chain(graph.transitions().iter().map(|t| t.x))
        .fold(f64::INFINITY, f64::min);
    let min_y = graph
        .states()
        .values()
        .map(|s| s.y)
        .chain(graph.transitions().iter().map(|t| t.y))
        .fold(f64::INFINITY, f64::min);

    let (shift_x, shift_y) = if min_x.is_finite() && min_y.is_finite() {
        (margin - min_x, margin - min_y)
    } else {
        (0.0, 0.0)
    };

    ViewData {
        states: graph
            .states()
            .iter()
            .map(|(id, state)| {
                let mut state = state.clone();
                state.x += shift_x;
                state.y += shift_y;
                (id.clone(), state)
            })
            .collect(),
        transitions: graph
            .transitions()
            .iter()
            .map(|transition| {
                let mut transition = transition.clone();
                transition.x += shift_x;
                transition.y += shift_y;
                transition
            })
            .collect(),
    }
}
