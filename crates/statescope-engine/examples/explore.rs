//! Explore a small vending-machine transition system end to end.
//!
//! Builds the system, grows the visible graph to its fixed point, lets the
//! layout settle and prints the exported view.
//!
//! Run with:
//! ```bash
//! cargo run --example explore -p statescope-engine
//! ```

use std::sync::Arc;

use statescope_core::{Lts, LtsState, LtsTransition, StateId};
use statescope_engine::{ExplorerConfig, ExplorerEvent, LtsExplorer};

fn transition(label: &str, target: &str) -> LtsTransition {
    LtsTransition {
        label: label.to_string(),
        weak: false,
        details_label: None,
        target: StateId::from(target),
    }
}

fn weak_transition(target: &str) -> LtsTransition {
    LtsTransition {
        label: String::new(),
        weak: true,
        details_label: None,
        target: StateId::from(target),
    }
}

/// A vending machine: insert a coin, pick a drink, get served. An internal
/// step models the machine brewing, and `broken` is a terminal dead end.
fn vending_machine() -> Arc<Lts> {
    let mut lts = Lts::new("idle");
    lts.states.insert(
        "idle".into(),
        LtsState {
            transitions: Some(vec![transition("coin", "paid"), transition("kick", "broken")]),
            ..Default::default()
        },
    );
    lts.states.insert(
        "paid".into(),
        LtsState {
            transitions: Some(vec![
                transition("coffee", "brewing"),
                transition("tea", "brewing"),
                transition("refund", "idle"),
            ]),
            ..Default::default()
        },
    );
    lts.states.insert(
        "brewing".into(),
        LtsState {
            transitions: Some(vec![weak_transition("serving")]),
            ..Default::default()
        },
    );
    lts.states.insert(
        "serving".into(),
        LtsState {
            transitions: Some(vec![transition("take", "idle")]),
            ..Default::default()
        },
    );
    lts.states.insert(
        "broken".into(),
        LtsState {
            transitions: Some(vec![]),
            ..Default::default()
        },
    );
    Arc::new(lts)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ExplorerConfig {
        short_weak_steps: true,
        ..Default::default()
    };
    let mut explorer = LtsExplorer::new(vending_machine(), config)?;

    // Grow to the fixed point: on a finite system this terminates.
    loop {
        let before = (explorer.states().len(), explorer.transitions().len());
        explorer.expand_all_single_step()?;
        let after = (explorer.states().len(), explorer.transitions().len());
        if before == after {
            break;
        }
        println!(
            "expanded one layer: {} states, {} transitions",
            after.0, after.1
        );
    }

    // Let the layout settle.
    while explorer.tick()? {}

    for event in explorer.drain_events() {
        if let ExplorerEvent::ExpansionStatusChanged(status) = event {
            println!(
                "expansion status: expandable={} collapsible={}",
                status.has_expandable_states, status.has_collapsible_states
            );
        }
    }

    for (id, state) in explorer.states() {
        println!(
            "{id}: ({:.1}, {:.1}) terminal={} expanded={}",
            state.x,
            state.y,
            state.terminal,
            explorer.is_expanded(id)
        );
    }

    println!("{}", explorer.export_view_json()?);
    Ok(())
}
