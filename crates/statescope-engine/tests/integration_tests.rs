//! Integration tests for statescope-engine using isolated in-memory
//! transition systems.

use std::sync::Arc;

use petgraph::algo::has_path_connecting;
use statescope_core::{Lts, LtsState, LtsTransition, SourceUpdate, StateId};
use statescope_engine::{ExplorerConfig, ExplorerError, ExplorerEvent, LtsExplorer};

// ============================================================================
// Test LTS builder (isolated, no transition source)
// ============================================================================

#[derive(Default)]
struct TestLtsBuilder {
    lts: Lts,
}

impl TestLtsBuilder {
    fn new(initial: &str) -> Self {
        Self {
            lts: Lts::new(initial),
        }
    }

    fn unexplored(mut self, id: &str) -> Self {
        self.lts.states.insert(id.into(), LtsState::default());
        self
    }

    fn terminal(mut self, id: &str) -> Self {
        self.lts.states.insert(
            id.into(),
            LtsState {
                transitions: Some(vec![]),
                ..Default::default()
            },
        );
        self
    }

    fn erroneous(mut self, id: &str, message: &str) -> Self {
        self.lts.states.insert(
            id.into(),
            LtsState {
                error: Some(message.to_string()),
                ..Default::default()
            },
        );
        self
    }

    fn state(mut self, id: &str, transitions: &[(&str, &str)]) -> Self {
        let transitions = transitions
            .iter()
            .map(|(label, target)| LtsTransition {
                label: label.to_string(),
                weak: false,
                details_label: None,
                target: (*target).into(),
            })
            .collect();
        self.lts.states.insert(
            id.into(),
            LtsState {
                transitions: Some(transitions),
                ..Default::default()
            },
        );
        self
    }

    fn state_with(mut self, id: &str, transitions: Vec<LtsTransition>) -> Self {
        self.lts.states.insert(
            id.into(),
            LtsState {
                transitions: Some(transitions),
                ..Default::default()
            },
        );
        self
    }

    fn build(self) -> Arc<Lts> {
        Arc::new(self.lts)
    }
}

// ============================================================================
// Pre-built systems
// ============================================================================

/// s0 --a--> s1 (terminal), s0 --b--> s2, s2 --c--> s0
fn loop_with_dead_end() -> Arc<Lts> {
    TestLtsBuilder::new("s0")
        .state("s0", &[("a", "s1"), ("b", "s2")])
        .terminal("s1")
        .state("s2", &[("c", "s0")])
        .build()
}

/// A diamond with a back edge and a terminal tail:
/// s0 -> s1, s2; s1 -> s3; s2 -> s3, s0; s3 -> s1, s4 (terminal)
fn diamond_with_cycles() -> Arc<Lts> {
    TestLtsBuilder::new("s0")
        .state("s0", &[("a", "s1"), ("b", "s2")])
        .state("s1", &[("c", "s3")])
        .state("s2", &[("d", "s3"), ("e", "s0")])
        .state("s3", &[("f", "s1"), ("g", "s4")])
        .terminal("s4")
        .build()
}

fn explorer_on(lts: Arc<Lts>) -> LtsExplorer {
    LtsExplorer::new(lts, ExplorerConfig::default()).unwrap()
}

fn id(s: &str) -> StateId {
    StateId::from(s)
}

fn visible_ids(explorer: &LtsExplorer) -> Vec<String> {
    explorer.states().keys().map(|k| k.to_string()).collect()
}

fn transition_ids(explorer: &LtsExplorer) -> Vec<(String, usize)> {
    explorer
        .transitions()
        .iter()
        .map(|t| (t.source.to_string(), t.transition_index))
        .collect()
}

fn expanded_ids(explorer: &LtsExplorer) -> Vec<String> {
    explorer
        .visible_graph()
        .expanded_ids()
        .map(|k| k.to_string())
        .collect()
}

/// Check the global invariants: transition endpoints are visible, the
/// initial state is visible, every visible state is reachable from it
/// (cross-checked through petgraph), and the expansion set only refers to
/// visible states.
fn assert_invariants(explorer: &LtsExplorer, initial: &str) {
    let graph = explorer.visible_graph();

    for transition in graph.transitions() {
        assert!(
            graph.contains_state(&transition.source),
            "dangling source {}",
            transition.source
        );
        assert!(
            graph.contains_state(&transition.target),
            "dangling target {}",
            transition.target
        );
    }

    assert!(graph.contains_state(&id(initial)), "initial state missing");

    let (pg, index) = graph.to_petgraph();
    let start = index[&id(initial)];
    for (state, &node) in &index {
        assert!(
            has_path_connecting(&pg, start, node, None),
            "unreachable visible state {state}"
        );
    }

    for state in graph.expanded_ids() {
        assert!(
            graph.contains_state(state),
            "expansion flag for invisible state {state}"
        );
    }
}

// ============================================================================
// Expansion and collapse
// ============================================================================

#[test]
fn worked_example_scenario() {
    let mut explorer = explorer_on(loop_with_dead_end());

    // 1. Expanding s0 materializes both transitions and their targets; the
    //    terminal target is trivially expanded.
    explorer.expand_state(&id("s0")).unwrap();
    assert_eq!(visible_ids(&explorer), ["s0", "s1", "s2"]);
    assert_eq!(explorer.transitions().len(), 2);
    assert!(explorer.is_expanded(&id("s1")));
    assert_invariants(&explorer, "s0");

    // 2. Expanding s2 only adds the back edge; s0 is already visible.
    explorer.expand_state(&id("s2")).unwrap();
    assert_eq!(visible_ids(&explorer), ["s0", "s1", "s2"]);
    assert_eq!(explorer.transitions().len(), 3);
    assert_invariants(&explorer, "s0");

    // 3. Collapsing s0 removes both transitions; s1 and s2 lose their only
    //    connection from s0 (an *outgoing* edge to s0 does not help s2) and
    //    are removed with their edges.
    explorer.collapse_state(&id("s0")).unwrap();
    assert_eq!(visible_ids(&explorer), ["s0"]);
    assert!(explorer.transitions().is_empty());
    assert!(!explorer.is_expanded(&id("s0")));
    assert_invariants(&explorer, "s0");
}

#[test]
fn expand_then_collapse_is_idempotent() {
    let mut explorer = explorer_on(diamond_with_cycles());
    explorer.expand_state(&id("s0")).unwrap();

    let states_before = visible_ids(&explorer);
    let transitions_before = transition_ids(&explorer);
    let expanded_before = expanded_ids(&explorer);

    explorer.expand_state(&id("s1")).unwrap();
    explorer.collapse_state(&id("s1")).unwrap();

    assert_eq!(visible_ids(&explorer), states_before);
    assert_eq!(transition_ids(&explorer), transitions_before);
    assert_eq!(expanded_ids(&explorer), expanded_before);
}

#[test]
fn collapse_on_terminal_state_is_a_noop() {
    let mut explorer = explorer_on(loop_with_dead_end());
    explorer.expand_state(&id("s0")).unwrap();
    assert!(explorer.is_expanded(&id("s1")));

    explorer.collapse_state(&id("s1")).unwrap();
    // Nothing was removed, so the trivially-expanded flag survives.
    assert!(explorer.is_expanded(&id("s1")));
    assert_eq!(explorer.transitions().len(), 2);
}

#[test]
fn cascading_collapse_removes_whole_chains() {
    let lts = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "s1")])
        .state("s1", &[("b", "s2")])
        .state("s2", &[("c", "s3")])
        .terminal("s3")
        .build();
    let mut explorer = explorer_on(lts);

    explorer.expand_state(&id("s0")).unwrap();
    explorer.expand_state(&id("s1")).unwrap();
    explorer.expand_state(&id("s2")).unwrap();
    assert_eq!(explorer.states().len(), 4);

    explorer.collapse_state(&id("s1")).unwrap();
    assert_eq!(visible_ids(&explorer), ["s0", "s1"]);
    assert_eq!(explorer.transitions().len(), 1);
    assert_invariants(&explorer, "s0");
}

#[test]
fn duplicate_transitions_are_tracked_by_index() {
    let lts = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "s1"), ("a", "s1")])
        .terminal("s1")
        .build();
    let mut explorer = explorer_on(lts);

    explorer.expand_state(&id("s0")).unwrap();
    assert_eq!(explorer.transitions().len(), 2);
    assert_eq!(transition_ids(&explorer), [("s0".into(), 0), ("s0".into(), 1)]);

    explorer.collapse_state(&id("s0")).unwrap();
    assert!(explorer.transitions().is_empty());
    assert_eq!(visible_ids(&explorer), ["s0"]);
}

#[test]
fn weak_unlabelled_steps_display_as_tau() {
    let lts = TestLtsBuilder::new("s0")
        .state_with(
            "s0",
            vec![LtsTransition {
                label: String::new(),
                weak: true,
                details_label: None,
                target: id("s1"),
            }],
        )
        .terminal("s1")
        .build();
    let mut explorer = explorer_on(lts);

    explorer.expand_state(&id("s0")).unwrap();
    let transition = &explorer.transitions()[0];
    assert_eq!(transition.label, "τ");
    assert!(transition.weak);
}

// ============================================================================
// Bulk operations
// ============================================================================

#[test]
fn expand_all_reaches_a_fixed_point() {
    let mut explorer = explorer_on(diamond_with_cycles());

    let mut rounds = 0;
    loop {
        let before = (visible_ids(&explorer), transition_ids(&explorer));
        explorer.expand_all_single_step().unwrap();
        let after = (visible_ids(&explorer), transition_ids(&explorer));
        if before == after {
            break;
        }
        rounds += 1;
        assert!(rounds < 10, "expansion did not converge");
    }

    // Everything reachable is visible and expanded.
    assert_eq!(visible_ids(&explorer), ["s0", "s1", "s2", "s3", "s4"]);
    assert_eq!(expanded_ids(&explorer), ["s0", "s1", "s2", "s3", "s4"]);
    let status = explorer.expansion_status();
    assert!(!status.has_expandable_states);
    assert!(status.has_collapsible_states);
    assert_invariants(&explorer, "s0");

    // A further call changes nothing.
    let snapshot = (visible_ids(&explorer), transition_ids(&explorer));
    explorer.expand_all_single_step().unwrap();
    assert_eq!(
        (visible_ids(&explorer), transition_ids(&explorer)),
        snapshot
    );
}

#[test]
fn collapse_all_shrinks_to_the_initial_state() {
    let mut explorer = explorer_on(diamond_with_cycles());
    loop {
        let before = explorer.transitions().len();
        explorer.expand_all_single_step().unwrap();
        if explorer.transitions().len() == before {
            break;
        }
    }

    explorer.collapse_all().unwrap();
    assert_eq!(visible_ids(&explorer), ["s0"]);
    assert!(explorer.transitions().is_empty());
    assert_invariants(&explorer, "s0");
}

#[test]
fn invariants_hold_across_operation_sequences() {
    let mut explorer = explorer_on(diamond_with_cycles());

    explorer.expand_state(&id("s0")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.expand_state(&id("s1")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.expand_state(&id("s2")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.expand_state(&id("s3")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.collapse_state(&id("s2")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.collapse_state(&id("s1")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.collapse_state(&id("s0")).unwrap();
    assert_invariants(&explorer, "s0");
    explorer.expand_all_single_step().unwrap();
    assert_invariants(&explorer, "s0");
    explorer.collapse_all().unwrap();
    assert_invariants(&explorer, "s0");
}

// ============================================================================
// Directed exploration
// ============================================================================

#[test]
fn directed_exploration_keeps_exactly_the_path() {
    let config = ExplorerConfig {
        directed_exploration: true,
        ..Default::default()
    };
    let mut explorer = LtsExplorer::new(loop_with_dead_end(), config).unwrap();

    explorer.expand_state(&id("s0")).unwrap();
    explorer.expand_state(&id("s2")).unwrap();

    // The off-path dead end is gone; the path s0 -> s2 stays expanded.
    assert_eq!(visible_ids(&explorer), ["s0", "s2"]);
    assert_eq!(expanded_ids(&explorer), ["s0", "s2"]);
    assert_eq!(
        transition_ids(&explorer),
        [("s0".into(), 1), ("s2".into(), 0)]
    );
    assert_invariants(&explorer, "s0");
}

#[test]
fn directed_exploration_protects_longer_paths() {
    let config = ExplorerConfig {
        directed_exploration: true,
        ..Default::default()
    };
    let mut explorer = LtsExplorer::new(diamond_with_cycles(), config).unwrap();

    explorer.expand_state(&id("s0")).unwrap();
    explorer.expand_state(&id("s1")).unwrap();
    explorer.expand_state(&id("s3")).unwrap();

    // Path s0 -> s1 -> s3 survives expanded; s3's frontier stays visible
    // but collapsed.
    let expanded = expanded_ids(&explorer);
    assert!(expanded.contains(&"s0".to_string()));
    assert!(expanded.contains(&"s1".to_string()));
    assert!(expanded.contains(&"s3".to_string()));
    assert!(explorer.states().contains_key(&id("s4")));
    assert_invariants(&explorer, "s0");
}

// ============================================================================
// Blocked expansions
// ============================================================================

#[test]
fn erroneous_states_block_expansion_without_mutation() {
    let lts = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "bad")])
        .erroneous("bad", "stack overflow while stepping")
        .build();
    let mut explorer = explorer_on(lts);
    explorer.expand_state(&id("s0")).unwrap();
    explorer.drain_events();

    let before = (visible_ids(&explorer), transition_ids(&explorer));
    explorer.expand_state(&id("bad")).unwrap();

    assert_eq!((visible_ids(&explorer), transition_ids(&explorer)), before);
    assert!(!explorer.is_expanded(&id("bad")));
    let events = explorer.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ExplorerEvent::ExpansionBlockedErroneous { state, error }
            if state == &id("bad") && error.contains("stack overflow")
    )));
}

#[test]
fn unexplored_states_block_expansion_without_mutation() {
    let lts = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "far")])
        .unexplored("far")
        .build();
    let mut explorer = explorer_on(lts);
    explorer.expand_state(&id("s0")).unwrap();
    explorer.drain_events();

    let before = (visible_ids(&explorer), transition_ids(&explorer));
    explorer.expand_state(&id("far")).unwrap();

    assert_eq!((visible_ids(&explorer), transition_ids(&explorer)), before);
    let events = explorer.drain_events();
    assert!(events.contains(&ExplorerEvent::ExpansionBlockedUnexplored(id("far"))));
}

// ============================================================================
// Terminal states
// ============================================================================

#[test]
fn terminal_initial_state_is_trivially_expanded() {
    let explorer = explorer_on(TestLtsBuilder::new("s0").terminal("s0").build());
    let s0 = explorer.states().get(&id("s0")).unwrap();
    assert!(s0.terminal);
    assert!(!s0.expandable);
    assert!(explorer.is_expanded(&id("s0")));
}

// ============================================================================
// Source updates
// ============================================================================

#[test]
fn refresh_keeps_the_view_and_picks_up_new_data() {
    let lts = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "far")])
        .unexplored("far")
        .build();
    let mut explorer = explorer_on(lts);
    explorer.expand_state(&id("s0")).unwrap();

    // The source explored further out-of-band and rebuilt its data.
    let grown = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "far")])
        .state("far", &[("b", "beyond")])
        .terminal("beyond")
        .build();
    explorer.set_source_classified(grown, SourceUpdate::Refresh);
    explorer.tick().unwrap();

    // The visible graph survived, and the frontier became expandable.
    assert_eq!(visible_ids(&explorer), ["far", "s0"]);
    assert!(explorer.is_expanded(&id("s0")));
    assert!(explorer.states().get(&id("far")).unwrap().expandable);

    explorer.expand_state(&id("far")).unwrap();
    assert!(explorer.states().contains_key(&id("beyond")));
    assert_invariants(&explorer, "s0");
}

#[test]
fn replacement_resets_to_the_new_initial_state() {
    let mut explorer = explorer_on(loop_with_dead_end());
    explorer.expand_state(&id("s0")).unwrap();
    assert_eq!(explorer.states().len(), 3);

    let replacement = TestLtsBuilder::new("t0")
        .state("t0", &[("x", "t1")])
        .terminal("t1")
        .build();
    explorer.set_source(replacement);
    explorer.tick().unwrap();

    assert_eq!(visible_ids(&explorer), ["t0"]);
    assert!(explorer.transitions().is_empty());
    assert_invariants(&explorer, "t0");
}

#[test]
fn refresh_drops_states_the_source_forgot() {
    let mut explorer = explorer_on(loop_with_dead_end());
    explorer.expand_state(&id("s0")).unwrap();
    assert!(explorer.states().contains_key(&id("s1")));

    // Same system, but the source no longer describes s1.
    let shrunk = TestLtsBuilder::new("s0")
        .state("s0", &[("a", "s1"), ("b", "s2")])
        .state("s2", &[("c", "s0")])
        .build();
    explorer.set_source_classified(shrunk, SourceUpdate::Refresh);
    explorer.tick().unwrap();

    assert!(!explorer.states().contains_key(&id("s1")));
    // The dangling transition into s1 went with it.
    assert_eq!(explorer.transitions().len(), 1);
    assert_invariants(&explorer, "s0");
}

#[test]
fn reconciliation_is_deterministic() {
    let lts = diamond_with_cycles();
    let mut explorer = explorer_on(Arc::clone(&lts));
    explorer.expand_state(&id("s0")).unwrap();
    explorer.expand_state(&id("s2")).unwrap();

    explorer.set_source_classified(Arc::clone(&lts), SourceUpdate::Refresh);
    explorer.tick().unwrap();
    let first = (
        visible_ids(&explorer),
        transition_ids(&explorer),
        expanded_ids(&explorer),
    );

    explorer.set_source_classified(lts, SourceUpdate::Refresh);
    explorer.tick().unwrap();
    let second = (
        visible_ids(&explorer),
        transition_ids(&explorer),
        expanded_ids(&explorer),
    );

    assert_eq!(first, second);
}

// ============================================================================
// Layout and export
// ============================================================================

#[test]
fn ticking_moves_nodes_and_respects_the_viewport() {
    let mut explorer = explorer_on(diamond_with_cycles());
    explorer.expand_state(&id("s0")).unwrap();
    explorer.expand_state(&id("s1")).unwrap();

    for _ in 0..100 {
        explorer.tick().unwrap();
    }

    let margin = statescope_engine::border_margin(explorer.config().scale);
    for state in explorer.states().values() {
        assert!(state.x >= margin && state.x <= explorer.config().width - margin);
        assert!(state.y >= margin && state.y <= explorer.config().height - margin);
    }
    for transition in explorer.transitions() {
        assert!(transition.x >= margin);
        assert!(transition.y >= margin);
    }
}

#[test]
fn stop_freezes_positions_until_restart() {
    let mut explorer = explorer_on(loop_with_dead_end());
    explorer.expand_state(&id("s0")).unwrap();
    explorer.stop();
    assert!(!explorer.tick().unwrap());

    explorer.restart();
    assert!(explorer.tick().unwrap());
}

#[test]
fn export_aligns_to_the_margin() {
    let mut explorer = explorer_on(diamond_with_cycles());
    explorer.expand_state(&id("s0")).unwrap();
    for _ in 0..50 {
        explorer.tick().unwrap();
    }

    let view = explorer.export_view_data();
    let min_x = view
        .states
        .values()
        .map(|s| s.x)
        .chain(view.transitions.iter().map(|t| t.x))
        .fold(f64::INFINITY, f64::min);
    let min_y = view
        .states
        .values()
        .map(|s| s.y)
        .chain(view.transitions.iter().map(|t| t.y))
        .fold(f64::INFINITY, f64::min);

    let margin = statescope_engine::border_margin(explorer.config().scale);
    assert!((min_x - margin).abs() < 1e-9);
    assert!((min_y - margin).abs() < 1e-9);
}

#[test]
fn coordinates_are_queryable_only_for_visible_states() {
    let mut explorer = explorer_on(loop_with_dead_end());
    assert!(explorer.state_coordinates(&id("s0")).is_some());
    assert!(explorer.state_coordinates(&id("s2")).is_none());

    explorer.expand_state(&id("s0")).unwrap();
    assert!(explorer.state_coordinates(&id("s2")).is_some());
}

#[test]
fn operations_on_invisible_states_fail_loudly() {
    let mut explorer = explorer_on(loop_with_dead_end());
    assert!(matches!(
        explorer.collapse_state(&id("s2")),
        Err(ExplorerError::StateNotVisible(_))
    ));
    assert!(matches!(
        explorer.drag_started(&id("s2"), 0.0, 0.0),
        Err(ExplorerError::StateNotVisible(_))
    ));
}
