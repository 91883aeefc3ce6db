//! JSON-RPC 2.0 communication layer for embedding in a web frontend.
//!
//! Implements bidirectional messaging between the Bevy engine and a host web page via
//! iframe postMessage, supporting both request-response and notification patterns.
//!
//! ## Architecture
//!
//! The RPC system uses standard JSON-RPC 2.0 protocol with:
//! - **Requests**: Expect responses with matching IDs
//! - **Notifications**: One-way messages without responses
//! - **Responses**: Reply to requests with results or errors
//!
//! ## Message Flow
//!
//! ```text
//! Host (Parent Window)   <──postMessage──>  Bevy (iframe)
//!        │                                        │
//!        ├─ Request (with ID) ──────────────────> │
//!        │                                        ├─ Process request
//!        │ <───────────────── Response (with ID) ─┤
//!        │                                        │
//!        │ <────────── Notification (no ID) ─────┤
//! ```
//!
//! ## Viewshed Methods
//!
//! Each method maps to one `ViewshedAction` and returns its JSON outcome.
//!
//! - `create_viewshed {kind}`: `"cone"`, `"omnidirectional"` or `"360"`; placement
//!   then follows with two clicks on the terrain
//! - `stop_viewshed`: leave the current mode, destroying an unsaved viewshed
//! - `persist_viewshed`: store the current viewshed, returns its generated title
//! - `move_viewshed {enable?}`: enter/leave move mode, toggles when `enable` is absent
//! - `set_height_mode {mode}`: `"absolute"` or `"relative"`
//! - `set_viewshed_parameter {name, value}`: `position`, `heightOffset`, `range`,
//!   `fieldOfView`, `heading`, `pitch`, `showMarker`, `visibleColor`, `occludedColor`
//! - `get_viewshed_state`, `list_viewsheds`
//! - `view_viewshed {id}`, `edit_viewshed {id}`, `toggle_viewshed_visibility {id}`,
//!   `remove_viewshed {id}`, `rename_viewshed {id, title}`, `select_viewsheds {ids}`
//! - `export_viewsheds`, `import_viewsheds {document}`
//! - `restore_viewshed_session {mode, heightMode, current}`
//!
//! ### Diagnostics
//! - `get_fps`: Retrieve current frame rate
//!
//! ## Notifications
//!
//! Manager events are forwarded as notifications: `viewshed_mode_changed`,
//! `viewshed_current_changed`, `viewshed_positioned`, `viewshed_position_changed`,
//! `viewshed_height_mode_changed`, `viewshed_persisted`, `viewshed_added`,
//! `viewshed_removed`, `viewshed_renamed`, `viewshed_visibility_changed` and
//! `viewshed_selection_cleared`.
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32601`: Method not found
//! - `-32602`: Invalid params (bad arguments, unknown viewshed, nothing current)
//! - `-32603`: Internal error (no render context, terrain failure)

/// JSON-RPC 2.0 bidirectional communication system for the host page.
///
/// Handles request-response patterns, notifications, and WASM message listeners.
pub mod web_rpc;
