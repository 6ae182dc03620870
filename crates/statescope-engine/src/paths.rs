//! Path queries over the visible graph.
//!
//! The backward chain caches one predecessor per state so that the common
//! case — "is this state still connected to the initial state?" — is a walk
//! along a few hops. The cache is a hint only: every hop is verified against
//! the currently visible transitions, and any break (or cycle left behind by
//! removed and re-created states) falls back to a full backward search that
//! also repairs the chain.

use std::collections::{BTreeMap, BTreeSet};

use statescope_core::StateId;
use tracing::trace;

use crate::store::VisibleGraph;

/// Find a path from `initial` to `target` along visible transitions,
/// preferring the backward chain. Returns `None` only if `target` is not
/// connected to the initial state — callers treat that as the signal to
/// remove it, never as a routine outcome.
pub(crate) fn generate_path(
    graph: &mut VisibleGraph,
    initial: &StateId,
    target: &StateId,
) -> Option<Vec<StateId>> {
    let mut reversed = vec![target.clone()];
    let mut visited = BTreeSet::new();
    visited.insert(target.clone());
    let mut current = target.clone();

    while current != *initial {
        let Some(previous) = graph.backward_link(&current).cloned() else {
            return search_path(graph, initial, target);
        };
        // The hint may predate a collapse or a source replacement: the
        // predecessor must still be visible and still own a transition into
        // the current state.
        if !graph.contains_state(&previous) || !graph.has_edge(&previous, &current) {
            return search_path(graph, initial, target);
        }
        // Stale entries of re-created states can form a cycle that never
        // reaches the initial state.
        if !visited.insert(previous.clone()) {
            trace!(state = %target, "backward_chain_cycle");
            return search_path(graph, initial, target);
        }
        reversed.push(previous.clone());
        current = previous;
    }

    reversed.reverse();
    Some(reversed)
}

/// Find a path from `initial` to `target` by breadth-first search backward
/// over the visible transitions, and rewrite the backward chain along the
/// discovered path so that future [`generate_path`] calls are cheap.
pub(crate) fn search_path(
    graph: &mut VisibleGraph,
    initial: &StateId,
    target: &StateId,
) -> Option<Vec<StateId>> {
    if target == initial {
        return Some(vec![initial.clone()]);
    }

    // Maps each discovered state to its successor along a shortest path
    // toward the target.
    let mut forward: BTreeMap<StateId, StateId> = BTreeMap::new();
    let mut frontier = vec![target.clone()];

    while !frontier.is_empty() {
        let wave = std::mem::take(&mut frontier);
        for current in wave {
            for transition in graph.transitions() {
                if transition.target == current && !forward.contains_key(&transition.source) {
                    frontier.push(transition.source.clone());
                    forward.insert(transition.source.clone(), current.clone());
                }
            }

            if forward.contains_key(initial) {
                let mut path = vec![initial.clone()];
                let mut current = initial.clone();
                while current != *target {
                    let next = forward.get(&current)?.clone();
                    graph.set_backward_link(next.clone(), current.clone());
                    path.push(next.clone());
                    current = next;
                }
                return Some(path);
            }
        }
    }

    None
}
