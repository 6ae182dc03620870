//! Continuous force-directed layout for small interactive graphs.
//!
//! The simulation advances a set of keyed nodes one tick at a time under a
//! fixed force schedule:
//!
//! - a weak centering pull toward the viewport center,
//! - springs along explicit links with per-link rest length,
//! - pairwise repulsion with per-node charge (Barnes-Hut approximated),
//! - collision resolution around per-node radii,
//! - velocity damping plus a decaying excitation term (`alpha`) so the
//!   layout settles after a burst of change.
//!
//! Nodes can be pinned (dragged) and are clamped into the viewport after
//! every step. The caller re-synchronizes the node/link lists whenever the
//! graph topology changes; velocities and pins of surviving keys are kept
//! across syncs, so a topology change never makes the layout jump.

mod quadtree;
mod simulation;

pub use quadtree::{QuadTree, QuadTreeNode};
pub use simulation::{ForceSimulation, LinkSpec, NodeSpec};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors that can occur during layout operations.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The caller handed over an inconsistent graph.
    #[error("invalid layout graph: {0}")]
    InvalidGraph(String),
}

/// A 2D position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Current state of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    /// Ticking; each `step` advances positions.
    Running,
    /// Explicitly stopped; `step` is a no-op until restarted.
    Paused,
    /// Excitation decayed below the cutoff; positions are at rest.
    Settled,
}

/// Configuration for the force simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Excitation cutoff below which the simulation settles.
    pub alpha_min: f64,
    /// Per-tick relaxation of excitation toward its target.
    pub alpha_decay: f64,
    /// Per-tick velocity damping (0-1).
    pub velocity_decay: f64,
    /// Strength of the pull toward the viewport center.
    pub center_strength: f64,
    /// Strength of the collision response (0-1).
    pub collision_strength: f64,
    /// Barnes-Hut opening angle; larger is faster but less accurate.
    pub theta: f64,
    /// Distance below which repulsion is softened to avoid blow-ups.
    pub distance_min: f64,
    /// Use Barnes-Hut (true) or exact O(n²) pairwise repulsion (false).
    pub use_barnes_hut: bool,
    /// Maximum quadtree depth.
    pub max_tree_depth: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.001,
            alpha_decay: 0.005,    // slow decay keeps the graph responsive to edits
            velocity_decay: 0.05,
            center_strength: 0.01, // weak, only counteracts drift
            collision_strength: 0.7,
            theta: 0.9,
            distance_min: 1.0,
            use_barnes_hut: true,
            max_tree_depth: 12,
        }
    }
}
