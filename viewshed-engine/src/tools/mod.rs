//! User-facing viewshed tool: keyboard shortcuts and the action layer shared
//! with RPC.
//!
//! ## Action Flow
//!
//! ```text
//! Keyboard (native)              RPC request (WASM)
//!   └─> ViewshedActionEvent        └─> action_for()
//!       └─> handle_viewshed_actions()   │
//!           └──────────> apply_action() <┘
//!                          └─> ViewshedManager
//! ```
//!
//! ## Shortcuts (native only)
//!
//! - `C`: create a cone viewshed, `O`: create an omnidirectional one
//! - `M`: toggle move mode for the current viewshed
//! - `H`: toggle absolute/relative heights
//! - `P`: persist the current viewshed
//! - `Escape`: stop
//!
//! Placement is two left clicks on the terrain: the first sets the observer,
//! the second the target. A right click ends a move; Escape stops creation.

/// Viewshed actions, their keyboard shortcuts and JSON outcomes.
pub mod viewshed_tool;
