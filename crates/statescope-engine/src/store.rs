//! The visible subgraph: the subset of the transition system that is
//! currently materialized on screen.
//!
//! The store holds the state map, the transition list, the expansion set and
//! the backward chain, and exposes primitive mutators only. It performs no
//! reachability reasoning; the explorer layers that on top. Ordered
//! collections keep every traversal deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::Serialize;
use statescope_core::StateId;

/// A state currently materialized in the visible graph.
///
/// Positions are advanced by the layout between reconciliations; the derived
/// flags are recomputed from the transition source on every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleState {
    pub x: f64,
    pub y: f64,
    /// Pinned position while dragged (or permanently, with sticky nodes).
    #[serde(skip)]
    pub pin: Option<(f64, f64)>,
    pub initial: bool,
    /// Transitions of this state are known to the source.
    pub explored: bool,
    pub erroneous: bool,
    pub highlighted: bool,
    /// Known transitions exist and the state is collapsed.
    pub expandable: bool,
    /// Known transitions exist and are empty.
    pub terminal: bool,
}

impl VisibleState {
    /// A fresh non-initial state; flags are recomputed on the next
    /// reconciliation.
    pub(crate) fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pin: None,
            initial: false,
            explored: false,
            erroneous: false,
            highlighted: false,
            expandable: false,
            terminal: false,
        }
    }

    pub(crate) fn initial_at(x: f64, y: f64) -> Self {
        Self {
            initial: true,
            ..Self::at(x, y)
        }
    }
}

/// A transition currently materialized in the visible graph.
///
/// `(source, transition_index)` identifies the transition: duplicate labels
/// and targets are possible, the index within the source state's transition
/// list is not. The `(x, y)` waypoint is the layout midpoint and label
/// anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleTransition {
    pub source: StateId,
    pub target: StateId,
    pub transition_index: usize,
    pub label: String,
    pub weak: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_label: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// The mutable visible graph.
#[derive(Debug, Default)]
pub struct VisibleGraph {
    states: BTreeMap<StateId, VisibleState>,
    transitions: Vec<VisibleTransition>,
    expanded: BTreeSet<StateId>,
    /// For each non-initial state, one predecessor believed to lie on a path
    /// from the initial state. A hint only: it is validated before use and
    /// rebuilt by search when stale.
    backward_chain: BTreeMap<StateId, StateId>,
}

impl VisibleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // --- states ---

    pub fn states(&self) -> &BTreeMap<StateId, VisibleState> {
        &self.states
    }

    pub fn state(&self, id: &StateId) -> Option<&VisibleState> {
        self.states.get(id)
    }

    pub fn state_mut(&mut self, id: &StateId) -> Option<&mut VisibleState> {
        self.states.get_mut(id)
    }

    pub fn contains_state(&self, id: &StateId) -> bool {
        self.states.contains_key(id)
    }

    pub fn state_ids(&self) -> impl Iterator<Item = &StateId> {
        self.states.keys()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn insert_state(&mut self, id: StateId, state: VisibleState) {
        self.states.insert(id, state);
    }

    pub fn remove_state(&mut self, id: &StateId) -> Option<VisibleState> {
        self.states.remove(id)
    }

    pub fn set_state_position(&mut self, id: &StateId, x: f64, y: f64) {
        if let Some(state) = self.states.get_mut(id) {
            state.x = x;
            state.y = y;
        }
    }

    // --- transitions ---

    pub fn transitions(&self) -> &[VisibleTransition] {
        &self.transitions
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn push_transition(&mut self, transition: VisibleTransition) {
        self.transitions.push(transition);
    }

    /// Whether the transition `(source, index)` is materialized.
    pub fn has_transition(&self, source: &StateId, index: usize) -> bool {
        self.transitions
            .iter()
            .any(|t| t.source == *source && t.transition_index == index)
    }

    /// Whether any visible transition leads from `source` to `target`.
    pub fn has_edge(&self, source: &StateId, target: &StateId) -> bool {
        self.transitions
            .iter()
            .any(|t| t.source == *source && t.target == *target)
    }

    /// Remove the transition `(source, index)`. Returns whether it existed.
    pub fn remove_transition(&mut self, source: &StateId, index: usize) -> bool {
        match self
            .transitions
            .iter()
            .position(|t| t.source == *source && t.transition_index == index)
        {
            Some(position) => {
                self.transitions.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn retain_transitions(&mut self, keep: impl FnMut(&VisibleTransition) -> bool) {
        self.transitions.retain(keep);
    }

    pub fn set_transition_position(&mut self, source: &StateId, index: usize, x: f64, y: f64) {
        if let Some(transition) = self
            .transitions
            .iter_mut()
            .find(|t| t.source == *source && t.transition_index == index)
        {
            transition.x = x;
            transition.y = y;
        }
    }

    // --- expansion set ---

    pub fn is_expanded(&self, id: &StateId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = &StateId> {
        self.expanded.iter()
    }

    pub fn expanded_count(&self) -> usize {
        self.expanded.len()
    }

    pub fn mark_expanded(&mut self, id: &StateId) {
        self.expanded.insert(id.clone());
    }

    pub fn clear_expanded(&mut self, id: &StateId) -> bool {
        self.expanded.remove(id)
    }

    pub fn retain_expanded(&mut self, mut keep: impl FnMut(&StateId) -> bool) {
        self.expanded.retain(|id| keep(id));
    }

    // --- backward chain ---

    pub fn backward_link(&self, id: &StateId) -> Option<&StateId> {
        self.backward_chain.get(id)
    }

    pub fn set_backward_link(&mut self, id: StateId, predecessor: StateId) {
        self.backward_chain.insert(id, predecessor);
    }

    pub fn retain_backward_links(&mut self, mut keep: impl FnMut(&StateId) -> bool) {
        self.backward_chain.retain(|id, _| keep(id));
    }

    /// Drop everything; used when the transition source is replaced.
    pub fn clear(&mut self) {
        self.states.clear();
        self.transitions.clear();
        self.expanded.clear();
        self.backward_chain.clear();
    }

    /// Convert the visible subgraph to a petgraph `StableDiGraph` for
    /// analysis (edge weights are the display labels). Returns the graph and
    /// a mapping from state ids to node indices.
    pub fn to_petgraph(&self) -> (StableDiGraph<StateId, String>, HashMap<StateId, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for id in self.states.keys() {
            let idx = graph.add_node(id.clone());
            id_to_index.insert(id.clone(), idx);
        }

        for transition in &self.transitions {
            if let (Some(&from), Some(&to)) = (
                id_to_index.get(&transition.source),
                id_to_index.get(&transition.target),
            ) {
                graph.add_edge(from, to, transition.label.clone());
            }
        }

        (graph, id_to_index)
    }
}
