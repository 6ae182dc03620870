//! The explorer engine: expansion control, reconciliation and layout
//! integration over a single visible graph.
//!
//! Control flow is strictly two-phase. Expansion and collapse mutate the
//! visible graph and re-synchronize the layout immediately; replacing the
//! transition source only *queues* a reconciliation, which [`LtsExplorer::tick`]
//! applies before it advances the simulation. No topology change ever happens
//! while a simulation step is in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use statescope_core::{Lts, SourceUpdate, StateId};
use statescope_layout::{ForceSimulation, LinkSpec, NodeSpec, Position, SimulationConfig};

use crate::config::{
    border_margin, link_distance, state_charge, state_radius, waypoint_charge, ExplorerConfig,
    DRAG_ALPHA_TARGET, LINK_STRENGTH, NEW_STATE_OFFSET, WAYPOINT_OFFSET,
};
use crate::error::{ExplorerError, ExplorerResult};
use crate::events::{ExpansionStatus, ExplorerEvent};
use crate::export::{export_view, ViewData};
use crate::paths::generate_path;
use crate::store::{VisibleGraph, VisibleState, VisibleTransition};

/// Identity of a layout node: a state circle or a transition waypoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LayoutKey {
    State(StateId),
    Waypoint(StateId, usize),
}

/// Interactive explorer over a labelled transition system.
///
/// Owns the visible subgraph and the force simulation; the presentation
/// layer reads positions and flags via [`states`]/[`transitions`] every
/// frame, routes pointer gestures back in, and drains [`ExplorerEvent`]s.
///
/// [`states`]: LtsExplorer::states
/// [`transitions`]: LtsExplorer::transitions
pub struct LtsExplorer {
    lts: Arc<Lts>,
    graph: VisibleGraph,
    sim: ForceSimulation<LayoutKey>,
    config: ExplorerConfig,
    events: VecDeque<ExplorerEvent>,
    last_status: Option<ExpansionStatus>,
    last_viewport: (f64, f64),
    pending_update: bool,
    pending_reset: bool,
}

impl LtsExplorer {
    /// Create an explorer showing just the initial state of `lts`.
    pub fn new(lts: Arc<Lts>, config: ExplorerConfig) -> ExplorerResult<Self> {
        let mut explorer = Self {
            lts,
            graph: VisibleGraph::new(),
            sim: ForceSimulation::new(SimulationConfig::default()),
            config,
            events: VecDeque::new(),
            last_status: None,
            last_viewport: (-1.0, -1.0),
            pending_update: false,
            pending_reset: false,
        };
        explorer.full_reset()?;
        Ok(explorer)
    }

    // --- read access -------------------------------------------------------

    /// The currently visible states.
    pub fn states(&self) -> &std::collections::BTreeMap<StateId, VisibleState> {
        self.graph.states()
    }

    /// The currently visible transitions.
    pub fn transitions(&self) -> &[VisibleTransition] {
        self.graph.transitions()
    }

    /// The visible graph as a whole (read-only).
    pub fn visible_graph(&self) -> &VisibleGraph {
        &self.graph
    }

    /// Current configuration.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Whether the given state is currently expanded.
    pub fn is_expanded(&self, id: &StateId) -> bool {
        self.graph.is_expanded(id)
    }

    /// Current coordinates of a visible state.
    pub fn state_coordinates(&self, id: &StateId) -> Option<(f64, f64)> {
        self.graph.state(id).map(|s| (s.x, s.y))
    }

    /// Current expansion summary.
    pub fn expansion_status(&self) -> ExpansionStatus {
        ExpansionStatus {
            has_expandable_states: self.graph.states().values().any(|s| s.expandable),
            has_collapsible_states: self.graph.expanded_count() > 0,
        }
    }

    /// Take all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<ExplorerEvent> {
        self.events.drain(..).collect()
    }

    // --- expansion control -------------------------------------------------

    /// Materialize the transitions of a collapsed visible state.
    ///
    /// Erroneous or still-unexplored states block the expansion: an event is
    /// emitted and the visible graph stays unchanged.
    pub fn expand_state(&mut self, id: &StateId) -> ExplorerResult<()> {
        if !self.graph.contains_state(id) {
            return Err(ExplorerError::StateNotVisible(id.clone()));
        }
        if self.graph.is_expanded(id) {
            return Err(ExplorerError::AlreadyExpanded(id.clone()));
        }
        let Some(descriptor) = self.lts.state(id).cloned() else {
            return Err(ExplorerError::UnknownState(id.clone()));
        };

        if let Some(error) = descriptor.error {
            debug!(state = %id, "expansion_blocked_erroneous");
            self.events.push_back(ExplorerEvent::ExpansionBlockedErroneous {
                state: id.clone(),
                error,
            });
            return Ok(());
        }
        let Some(transitions) = descriptor.transitions else {
            debug!(state = %id, "expansion_blocked_unexplored");
            self.events
                .push_back(ExplorerEvent::ExpansionBlockedUnexplored(id.clone()));
            return Ok(());
        };

        let (source_x, source_y) = match self.graph.state(id) {
            Some(state) => (state.x, state.y),
            None => return Err(ExplorerError::StateNotVisible(id.clone())),
        };

        for (index, transition) in transitions.iter().enumerate() {
            if self.graph.has_transition(id, index) {
                // Already visible, e.g. kept around by directed exploration.
                continue;
            }

            self.graph.push_transition(VisibleTransition {
                source: id.clone(),
                target: transition.target.clone(),
                transition_index: index,
                label: transition.display_label().to_string(),
                weak: transition.weak,
                details_label: transition.details_label.clone(),
                x: source_x + WAYPOINT_OFFSET,
                y: source_y,
            });

            if !self.graph.contains_state(&transition.target) {
                // Spawn the target near its source; the layout relaxes it.
                self.graph.insert_state(
                    transition.target.clone(),
                    VisibleState::at(source_x + NEW_STATE_OFFSET, source_y),
                );
                self.graph
                    .set_backward_link(transition.target.clone(), id.clone());
            }

            if self
                .lts
                .state(&transition.target)
                .is_some_and(|s| s.is_terminal())
            {
                // Nothing to expand on a terminal state.
                self.graph.mark_expanded(&transition.target);
            }
        }

        self.graph.mark_expanded(id);
        debug!(state = %id, "state_expanded");
        self.events.push_back(ExplorerEvent::StateExpanded(id.clone()));

        if self.config.directed_exploration {
            self.auto_collapse_nodes(id)?;
        }

        self.sim.restart();
        self.full_update()
    }

    /// Remove the materialized transitions of a visible state, cascading to
    /// remove any target left unreachable from the initial state.
    pub fn collapse_state(&mut self, id: &StateId) -> ExplorerResult<()> {
        if !self.graph.contains_state(id) {
            return Err(ExplorerError::StateNotVisible(id.clone()));
        }
        self.collapse_with_protection(id, &[])?;
        self.sim.restart();
        self.full_update()
    }

    /// Expand if collapsed, collapse if expanded.
    pub fn toggle_state(&mut self, id: &StateId) -> ExplorerResult<()> {
        if self.graph.is_expanded(id) {
            self.collapse_state(id)
        } else {
            self.expand_state(id)
        }
    }

    /// Expand every currently collapsed visible state once: one layer of
    /// breadth-first growth. On a finite system, repeated calls reach a
    /// fixed point where nothing changes.
    pub fn expand_all_single_step(&mut self) -> ExplorerResult<()> {
        let collapsed: Vec<StateId> = self
            .graph
            .state_ids()
            .filter(|id| !self.graph.is_expanded(id))
            .cloned()
            .collect();
        for id in collapsed {
            // Cascades and terminal auto-expansion can overtake the snapshot.
            if self.graph.contains_state(&id) && !self.graph.is_expanded(&id) {
                self.expand_state(&id)?;
            }
        }
        Ok(())
    }

    /// Collapse every expanded state, shrinking the visible graph toward the
    /// initial state.
    pub fn collapse_all(&mut self) -> ExplorerResult<()> {
        let expanded: Vec<StateId> = self.graph.expanded_ids().cloned().collect();
        for id in expanded {
            if self.graph.contains_state(&id) && self.graph.is_expanded(&id) {
                self.collapse_state(&id)?;
            }
        }
        Ok(())
    }

    fn collapse_with_protection(
        &mut self,
        id: &StateId,
        protected: &[StateId],
    ) -> ExplorerResult<()> {
        // A state the source no longer describes has nothing to collapse;
        // reconciliation removes it.
        let Some(descriptor) = self.lts.state(id).cloned() else {
            return Ok(());
        };
        let Some(transitions) = descriptor.transitions else {
            return Ok(());
        };
        let initial = self.lts.initial_state.clone();

        let mut actually_collapsed = false;
        for (index, transition) in transitions.iter().enumerate() {
            if protected.contains(&transition.target) {
                continue;
            }
            if !self.graph.remove_transition(id, index) {
                continue;
            }
            actually_collapsed = true;

            match self.graph.state(&transition.target) {
                None => continue,
                Some(state) if state.initial => continue,
                Some(_) => {}
            }
            if generate_path(&mut self.graph, &initial, &transition.target).is_none() {
                // The target lost its connection to the initial state:
                // collapse it (dropping protections, its transitions must
                // all go) and remove it.
                self.collapse_with_protection(&transition.target, &[])?;
                self.graph.remove_state(&transition.target);
                debug!(state = %transition.target, "state_removed_unreachable");
            }
        }

        if actually_collapsed {
            // A no-op collapse (e.g. on a terminal state) keeps the flag.
            self.graph.clear_expanded(id);
            debug!(state = %id, "state_collapsed");
            self.events
                .push_back(ExplorerEvent::StateCollapsed(id.clone()));
        }
        Ok(())
    }

    /// Collapse every state except `last_expanded`, protecting the path from
    /// the initial state to it. Afterwards exactly the states on that path
    /// are expanded.
    fn auto_collapse_nodes(&mut self, last_expanded: &StateId) -> ExplorerResult<()> {
        let initial = self.lts.initial_state.clone();
        let path = generate_path(&mut self.graph, &initial, last_expanded)
            .ok_or_else(|| ExplorerError::PathNotFound(last_expanded.clone()))?;

        let others: Vec<StateId> = self
            .graph
            .state_ids()
            .filter(|candidate| *candidate != last_expanded)
            .cloned()
            .collect();
        for id in others {
            if self.graph.contains_state(&id) {
                self.collapse_with_protection(&id, &path)?;
            }
        }

        // The path stays materialized end to end; keep its states flagged
        // expanded so the expansion set is exactly the path.
        for id in &path {
            self.graph.mark_expanded(id);
        }
        Ok(())
    }

    // --- reconciliation ----------------------------------------------------

    /// Hand over a new (or further explored) transition source, classifying
    /// it automatically: same allocation queues a refresh, deep-equal data
    /// is a no-op, anything else queues a full reset.
    pub fn set_source(&mut self, lts: Arc<Lts>) {
        let kind = SourceUpdate::classify(&self.lts, &lts);
        self.set_source_classified(lts, kind);
    }

    /// Hand over a new transition source with an explicit classification.
    ///
    /// Callers that rebuild their `Lts` after exploring further pass
    /// [`SourceUpdate::Refresh`] to keep the visible graph. The queued
    /// reconciliation runs at the start of the next [`tick`], never inside
    /// this call.
    ///
    /// [`tick`]: LtsExplorer::tick
    pub fn set_source_classified(&mut self, lts: Arc<Lts>, kind: SourceUpdate) {
        match kind {
            SourceUpdate::Unchanged => {}
            SourceUpdate::Refresh => {
                debug!("source_refresh_queued");
                self.lts = lts;
                self.pending_update = true;
            }
            SourceUpdate::Replace => {
                info!("source_replacement_queued");
                self.lts = lts;
                self.pending_reset = true;
            }
        }
    }

    /// Advance the explorer one frame: apply any queued reconciliation, then
    /// step the simulation and write positions back into the visible graph.
    ///
    /// Returns whether node positions advanced.
    pub fn tick(&mut self) -> ExplorerResult<bool> {
        if self.pending_reset {
            self.pending_reset = false;
            self.pending_update = false;
            self.full_reset()?;
        } else if self.pending_update {
            self.pending_update = false;
            self.full_update()?;
        }

        let advanced = self.sim.step();
        if advanced {
            self.write_back_positions();
        }
        Ok(advanced)
    }

    /// Pause the layout tick loop.
    pub fn stop(&mut self) {
        self.sim.stop();
    }

    /// Re-excite the layout to full energy and resume ticking.
    pub fn restart(&mut self) {
        self.sim.restart();
    }

    /// Change the viewport size. Recenters the layout; the simulation is
    /// only re-excited if the size actually changed.
    pub fn resize(&mut self, width: f64, height: f64) -> ExplorerResult<()> {
        self.config.width = width;
        self.config.height = height;
        self.full_update()
    }

    /// Replace the configuration (zoom, exploration modes, viewport).
    pub fn set_config(&mut self, config: ExplorerConfig) -> ExplorerResult<()> {
        self.config = config;
        self.full_update()
    }

    /// Synchronize the visible graph with the current source: drop vanished
    /// states and transitions, re-seed the initial state, recompute derived
    /// flags, hand the node and link lists to the layout, and emit the
    /// expansion summary if it changed.
    fn full_update(&mut self) -> ExplorerResult<()> {
        // Drop states the source no longer describes.
        let vanished: Vec<StateId> = self
            .graph
            .state_ids()
            .filter(|id| !self.lts.contains_state(id))
            .cloned()
            .collect();
        for id in &vanished {
            self.graph.remove_state(id);
        }
        if !vanished.is_empty() {
            debug!(count = vanished.len(), "vanished_states_dropped");
        }

        // Transitions need both endpoints; flags and chain entries need
        // their state.
        let visible: std::collections::BTreeSet<StateId> =
            self.graph.state_ids().cloned().collect();
        self.graph
            .retain_transitions(|t| visible.contains(&t.source) && visible.contains(&t.target));
        self.graph.retain_expanded(|id| visible.contains(id));
        self.graph.retain_backward_links(|id| visible.contains(id));

        // The initial state is always visible.
        let initial = self.lts.initial_state.clone();
        if !self.graph.contains_state(&initial) {
            self.graph
                .insert_state(initial.clone(), VisibleState::initial_at(0.0, 0.0));
            debug!(state = %initial, "initial_state_seeded");
        }

        // Recompute derived flags from the source.
        let ids: Vec<StateId> = self.graph.state_ids().cloned().collect();
        let mut force_expanded = Vec::new();
        for id in &ids {
            let descriptor = self.lts.state(id);
            let expanded = self.graph.is_expanded(id);
            let Some(visual) = self.graph.state_mut(id) else {
                continue;
            };
            visual.initial = *id == initial;
            match descriptor {
                Some(descriptor) => {
                    visual.explored = descriptor.is_explored();
                    visual.erroneous = descriptor.error.is_some();
                    visual.highlighted = descriptor.highlighted;
                    visual.expandable = descriptor.has_outgoing() && !expanded;
                    visual.terminal = descriptor.is_terminal();
                    if visual.terminal && !expanded {
                        // Nothing to expand on a terminal state.
                        force_expanded.push(id.clone());
                    }
                }
                None => {
                    // Only possible for a just-seeded initial state the
                    // source does not describe yet.
                    visual.explored = false;
                    visual.erroneous = false;
                    visual.highlighted = false;
                    visual.expandable = false;
                    visual.terminal = false;
                }
            }
        }
        for id in force_expanded {
            self.graph.mark_expanded(&id);
        }

        self.sync_layout()?;

        let status = self.expansion_status();
        if self.last_status.as_ref() != Some(&status) {
            self.events
                .push_back(ExplorerEvent::ExpansionStatusChanged(status.clone()));
            self.last_status = Some(status);
        }
        Ok(())
    }

    /// Discard the whole visible graph and start over from the initial
    /// state, at full layout energy.
    fn full_reset(&mut self) -> ExplorerResult<()> {
        info!("visible_graph_reset");
        self.graph.clear();
        self.full_update()?;
        self.sim.restart();
        Ok(())
    }

    // --- layout integration ------------------------------------------------

    fn sync_layout(&mut self) -> ExplorerResult<()> {
        let scale = self.config.scale;
        let state_count = self.graph.state_count();
        let radius = state_radius(scale);

        let mut nodes = Vec::with_capacity(state_count + self.graph.transition_count());
        for (id, state) in self.graph.states() {
            nodes.push(NodeSpec {
                key: LayoutKey::State(id.clone()),
                x: state.x,
                y: state.y,
                pin: state.pin.map(|(x, y)| Position::new(x, y)),
                charge: state_charge(scale, state_count),
                radius,
            });
        }

        let mut links = Vec::with_capacity(self.graph.transition_count() * 2);
        for transition in self.graph.transitions() {
            let waypoint = LayoutKey::Waypoint(transition.source.clone(), transition.transition_index);
            nodes.push(NodeSpec {
                key: waypoint.clone(),
                x: transition.x,
                y: transition.y,
                pin: None,
                charge: waypoint_charge(scale, transition.weak),
                radius,
            });
            let distance = link_distance(
                scale,
                transition.weak,
                self.config.short_weak_steps,
                state_count,
            );
            links.push(LinkSpec {
                source: LayoutKey::State(transition.source.clone()),
                target: waypoint.clone(),
                distance,
                strength: LINK_STRENGTH,
            });
            links.push(LinkSpec {
                source: waypoint,
                target: LayoutKey::State(transition.target.clone()),
                distance,
                strength: LINK_STRENGTH,
            });
        }

        self.sim.set_graph(nodes, links)?;

        let margin = border_margin(scale);
        self.sim
            .set_viewport(self.config.width, self.config.height, margin);
        let size = (self.config.width, self.config.height);
        if self.last_viewport != size {
            // Recentering is worth re-exciting; an unchanged viewport is not.
            self.sim.restart();
            self.last_viewport = size;
        }
        Ok(())
    }

    fn write_back_positions(&mut self) {
        let positions: Vec<(LayoutKey, Position)> = self
            .sim
            .positions()
            .map(|(key, position)| (key.clone(), position))
            .collect();
        for (key, position) in positions {
            match key {
                LayoutKey::State(id) => {
                    self.graph.set_state_position(&id, position.x, position.y);
                }
                LayoutKey::Waypoint(source, index) => {
                    self.graph
                        .set_transition_position(&source, index, position.x, position.y);
                }
            }
        }
    }

    // --- input routing -----------------------------------------------------

    /// Default click behavior: report the click and toggle the state.
    pub fn state_clicked(&mut self, id: &StateId) -> ExplorerResult<()> {
        self.events.push_back(ExplorerEvent::StateClicked(id.clone()));
        self.toggle_state(id)
    }

    /// Report a right-click on a state.
    pub fn state_right_clicked(&mut self, id: &StateId) {
        self.events
            .push_back(ExplorerEvent::StateRightClicked(id.clone()));
    }

    /// Report the pointer entering a state.
    pub fn state_hover_started(&mut self, id: &StateId) {
        self.events
            .push_back(ExplorerEvent::StateHoverStarted(id.clone()));
    }

    /// Report the pointer leaving a state.
    pub fn state_hover_ended(&mut self, id: &StateId) {
        self.events
            .push_back(ExplorerEvent::StateHoverEnded(id.clone()));
    }

    /// Report the pointer entering a transition.
    pub fn transition_hover_started(&mut self, source: &StateId, transition_index: usize) {
        self.events.push_back(ExplorerEvent::TransitionHoverStarted {
            source: source.clone(),
            transition_index,
        });
    }

    /// Report the pointer leaving a transition.
    pub fn transition_hover_ended(&mut self, source: &StateId, transition_index: usize) {
        self.events.push_back(ExplorerEvent::TransitionHoverEnded {
            source: source.clone(),
            transition_index,
        });
    }

    // --- dragging ----------------------------------------------------------

    /// Begin dragging a state: pin it and keep the simulation excited so the
    /// rest of the graph follows.
    pub fn drag_started(&mut self, id: &StateId, x: f64, y: f64) -> ExplorerResult<()> {
        let Some(state) = self.graph.state_mut(id) else {
            return Err(ExplorerError::StateNotVisible(id.clone()));
        };
        state.pin = Some((x, y));
        self.sim.pin(&LayoutKey::State(id.clone()), x, y);
        self.sim.set_alpha_target(DRAG_ALPHA_TARGET);
        self.sim.start();
        Ok(())
    }

    /// Move the drag pin.
    pub fn drag_moved(&mut self, id: &StateId, x: f64, y: f64) -> ExplorerResult<()> {
        let Some(state) = self.graph.state_mut(id) else {
            return Err(ExplorerError::StateNotVisible(id.clone()));
        };
        state.pin = Some((x, y));
        self.sim.pin(&LayoutKey::State(id.clone()), x, y);
        Ok(())
    }

    /// End the drag: relax the excitation, and release the pin unless sticky
    /// nodes are enabled.
    pub fn drag_ended(&mut self, id: &StateId) {
        self.sim.set_alpha_target(0.0);
        self.sim.start();
        if !self.config.sticky_nodes {
            if let Some(state) = self.graph.state_mut(id) {
                state.pin = None;
            }
            self.sim.unpin(&LayoutKey::State(id.clone()));
        }
    }

    // --- export ------------------------------------------------------------

    /// The visible graph as currently displayed, shifted so the bounding box
    /// minimum touches the margin.
    pub fn export_view_data(&self) -> ViewData {
        export_view(&self.graph, border_margin(self.config.scale))
    }

    /// [`export_view_data`] serialized as JSON.
    ///
    /// [`export_view_data`]: LtsExplorer::export_view_data
    pub fn export_view_json(&self) -> ExplorerResult<String> {
        Ok(serde_json::to_string(&self.export_view_data())?)
    }
}

impl std::fmt::Debug for LtsExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LtsExplorer")
            .field("visible_states", &self.graph.state_count())
            .field("visible_transitions", &self.graph.transition_count())
            .field("expanded", &self.graph.expanded_count())
            .field("pending_update", &self.pending_update)
            .field("pending_reset", &self.pending_reset)
            .finish()
    }
}
