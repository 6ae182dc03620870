//! Core domain types shared across the statescope workspace.
//!
//! A labelled transition system (LTS) is described by an initial state plus a
//! map from state identifiers to state descriptors. The descriptor for a
//! state distinguishes three situations:
//!
//! - transitions *unknown* (`transitions: None`) — the state has not been
//!   explored by the transition source yet;
//! - transitions known and empty — the state is terminal;
//! - transitions known and non-empty — the state can be expanded.
//!
//! The types here mirror the JSON contract of the transition source
//! (camelCase keys, `detailsLabel` tolerating the literal `false`).

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Label shown for a weak (silent) step that carries no label of its own.
pub const TAU_LABEL: &str = "τ";

/// Identifier of a state within a transition system.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateId(pub String);

impl StateId {
    /// View the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        StateId(value.to_string())
    }
}

impl From<String> for StateId {
    fn from(value: String) -> Self {
        StateId(value)
    }
}

/// A single outgoing transition of a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtsTransition {
    /// Action label. May be empty for an unlabelled weak step.
    pub label: String,
    /// Whether this is a weak (silent/internal) step.
    #[serde(default, skip_serializing_if = "is_false")]
    pub weak: bool,
    /// Optional secondary label with extra detail.
    ///
    /// The wire format allows `false` in place of a string; both `false` and
    /// absence mean "no detail label".
    #[serde(
        default,
        deserialize_with = "details_label_or_false",
        skip_serializing_if = "Option::is_none"
    )]
    pub details_label: Option<String>,
    /// Identifier of the target state.
    pub target: StateId,
}

impl LtsTransition {
    /// The label to display: weak steps without a label show [`TAU_LABEL`].
    pub fn display_label(&self) -> &str {
        if self.weak && self.label.is_empty() {
            TAU_LABEL
        } else {
            &self.label
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn details_label_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Flag(bool),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => Ok(Some(text)),
        Some(Raw::Flag(_)) | None => Ok(None),
    }
}

/// Descriptor for a single state of an LTS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtsState {
    /// Outgoing transitions. `None` means the state has not been explored;
    /// an empty list means the state is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Vec<LtsTransition>>,
    /// A technical problem that makes the successor states inaccessible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the state should be rendered highlighted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub highlighted: bool,
}

impl LtsState {
    /// Whether the transitions of this state are known.
    pub fn is_explored(&self) -> bool {
        self.transitions.is_some()
    }

    /// Whether the state is known to have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        self.transitions.as_ref().is_some_and(|t| t.is_empty())
    }

    /// Whether the state is known to have at least one outgoing transition.
    pub fn has_outgoing(&self) -> bool {
        self.transitions.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// A labelled transition system, as provided by the transition source.
///
/// The map is ordered so that every traversal of the system is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lts {
    /// Identifier of the initial state.
    pub initial_state: StateId,
    /// All states known to the source, keyed by identifier.
    pub states: BTreeMap<StateId, LtsState>,
}

impl Lts {
    /// Create an empty system with the given initial state.
    pub fn new(initial_state: impl Into<StateId>) -> Self {
        Self {
            initial_state: initial_state.into(),
            states: BTreeMap::new(),
        }
    }

    /// Look up a state descriptor.
    pub fn state(&self, id: &StateId) -> Option<&LtsState> {
        self.states.get(id)
    }

    /// Whether the source knows the given state at all.
    pub fn contains_state(&self, id: &StateId) -> bool {
        self.states.contains_key(id)
    }

    /// Convert the known part of the system to a petgraph `StableDiGraph`
    /// for analysis. Returns the graph and a mapping from state ids to node
    /// indices. Transitions whose target is not itself a described state are
    /// skipped.
    pub fn to_petgraph(&self) -> (StableDiGraph<StateId, String>, HashMap<StateId, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for id in self.states.keys() {
            let idx = graph.add_node(id.clone());
            id_to_index.insert(id.clone(), idx);
        }

        for (id, state) in &self.states {
            let Some(transitions) = &state.transitions else {
                continue;
            };
            for transition in transitions {
                if let (Some(&from), Some(&to)) = (
                    id_to_index.get(id),
                    id_to_index.get(&transition.target),
                ) {
                    graph.add_edge(from, to, transition.display_label().to_string());
                }
            }
        }

        (graph, id_to_index)
    }
}

/// Classification of an incoming source update, deciding how the explorer
/// reconciles its visible graph with the new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceUpdate {
    /// The same underlying system, possibly explored further: keep the
    /// visible graph and recompute derived data.
    Refresh,
    /// Structurally identical data: nothing to do.
    Unchanged,
    /// Materially different data: discard the visible graph and start over
    /// from the initial state.
    Replace,
}

impl SourceUpdate {
    /// Default classification: pointer identity means a refresh request,
    /// deep equality means no change, anything else is a replacement.
    ///
    /// Callers that rebuild their `Lts` value after exploring further
    /// should bypass this and pass [`SourceUpdate::Refresh`] explicitly.
    pub fn classify(previous: &Arc<Lts>, next: &Arc<Lts>) -> Self {
        if Arc::ptr_eq(previous, next) {
            SourceUpdate::Refresh
        } else if previous == next {
            SourceUpdate::Unchanged
        } else {
            SourceUpdate::Replace
        }
    }
}
