//! Engine-agnostic viewshed core.
//!
//! A viewshed is an observer (position, orientation, sensor frustum) whose
//! visibility is rendered as a shadow projection on a [`surface::RenderSurface`].
//! Only one viewshed at a time may own a surface's shadow slot; the
//! [`manager::ViewshedManager`] enforces that and drives creation, editing,
//! moving and viewing.
//!
//! ```text
//! ViewshedManager
//!   ├─ PositioningInteraction   two-click placement (CREATE)
//!   ├─ RepositionSession        drag through an edit session (MOVE)
//!   ├─ HeightModeResolver       absolute / terrain-relative heights
//!   └─ ViewshedCollection       persisted, titled viewsheds
//!        └─ ViewshedEntity ──lease──> RenderSurface shadow slot
//! ```

/// Persisted viewsheds with titles, visibility and JSON export/import.
pub mod collection;

/// Defaults for new viewsheds, loadable as a JSON asset.
pub mod config;

/// Observer entity: parameters, derived projection and surface binding.
pub mod entity;

pub mod error;

/// WGS84 geographic/ECEF conversions and local east/north/up frames.
pub mod geodesy;

/// Frustum, orientation, colours and the projection/marker primitives built from them.
pub mod frustum;

/// Absolute vs terrain-relative height switching with stale-result protection.
pub mod height_mode;

/// Two-click pointer placement of a new viewshed.
pub mod interaction;

/// Mode state machine owning the current viewshed.
pub mod manager;

/// Named parameter edits (`range`, `heading`, ...) for the current viewshed.
pub mod parameter;

/// Moving an existing viewshed through a host edit session.
pub mod reposition;

pub mod snapshot;

/// Shared rendering surface: shadow slot, markers and pointer claim.
pub mod surface;

pub use collection::{CollectionEvent, ViewshedCollection};
pub use config::ViewshedConfig;
pub use entity::{ViewshedEntity, ViewshedId, ViewshedKind, ViewshedOptions};
pub use error::ViewshedError;
pub use geodesy::Cartographic;
pub use height_mode::{HeightMode, HeightSwitch, TerrainRequest, TerrainToken};
pub use interaction::{PointerEvent, PointerEventKind};
pub use manager::{ManagerSessionState, ViewshedEvent, ViewshedManager, ViewshedMode};
pub use parameter::ViewshedParameter;
pub use snapshot::ViewshedSnapshot;
pub use surface::{RenderSurface, SurfaceId};
