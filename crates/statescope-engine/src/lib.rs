//! Incremental explorer for labelled transition systems.
//!
//! The state space of a process term is potentially infinite, so the
//! explorer never materializes more than the user asked for: starting from
//! the initial state, expanding a state pulls its outgoing transitions and
//! their targets into the *visible graph*, collapsing removes them again and
//! cascades away anything left unreachable. A continuous force layout keeps
//! the visible graph readable while it changes.
//!
//! ## Core pieces
//!
//! - [`VisibleGraph`] — the materialized subgraph: states, transitions,
//!   expansion flags and the backward-chain reachability cache.
//! - [`LtsExplorer`] — expansion control, reconciliation against the
//!   transition source, layout integration, drag handling and export.
//! - [`ExplorerEvent`] — notifications for the host (blocked expansions,
//!   expansion-status changes, routed pointer input).
//!
//! ## Invariants
//!
//! After every completed operation:
//!
//! 1. every visible transition connects two visible states;
//! 2. the initial state is visible;
//! 3. every other visible state is reachable from the initial state along
//!    visible transitions;
//! 4. the expansion set only contains visible states;
//! 5. `expandable` and `terminal` flags reflect the source's transition
//!    data.
//!
//! The host drives everything from one thread: discrete operations mutate
//! the visible graph, and [`LtsExplorer::tick`] advances the layout one
//! frame, applying queued source replacements first. Obtaining transitions
//! for an unexplored state is the transition source's business; the explorer
//! only reports the attempt and picks up new data on the next source update.

mod config;
mod error;
mod events;
mod explorer;
mod export;
mod paths;
mod store;

pub use config::{border_margin, state_radius, ExplorerConfig};
pub use error::{ExplorerError, ExplorerResult};
pub use events::{ExpansionStatus, ExplorerEvent};
pub use explorer::LtsExplorer;
pub use export::ViewData;
pub use store::{VisibleGraph, VisibleState, VisibleTransition};
