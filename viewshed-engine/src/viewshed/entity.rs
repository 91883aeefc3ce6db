use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::error::ViewshedError;
use super::frustum::{
    Frustum, MarkerPrimitive, Orientation, ShadowProjection, ViewshedColors, clamp_range,
};
use super::geodesy::{Cartographic, LocalFrame};
use super::snapshot::ViewshedSnapshot;
use super::surface::{RenderSurface, ShadowLease};

static NEXT_VIEWSHED_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewshedId(pub u64);

impl ViewshedId {
    fn next() -> Self {
        Self(NEXT_VIEWSHED_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewshedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ViewshedKind {
    /// Bounded field of view.
    Cone,
    /// All directions; field of view is stored but has no effect.
    Omnidirectional,
}

impl ViewshedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cone => "cone",
            Self::Omnidirectional => "omnidirectional",
        }
    }
}

impl FromStr for ViewshedKind {
    type Err = ViewshedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cone" => Ok(Self::Cone),
            "omnidirectional" | "360" => Ok(Self::Omnidirectional),
            _ => Err(ViewshedError::UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for ViewshedKind {
    type Error = ViewshedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ViewshedKind> for String {
    fn from(kind: ViewshedKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Construction parameters; anything left at default comes from `constants`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewshedOptions {
    pub position: Cartographic,
    pub height_offset: f64,
    pub heading: f64,
    pub pitch: f64,
    pub frustum: Frustum,
    pub colors: ViewshedColors,
    pub show_marker: bool,
    pub persisted_title: Option<String>,
}

impl Default for ViewshedOptions {
    fn default() -> Self {
        Self {
            position: Cartographic::default(),
            height_offset: 0.0,
            heading: 0.0,
            pitch: 0.0,
            frustum: Frustum::default(),
            colors: ViewshedColors::default(),
            show_marker: false,
            persisted_title: None,
        }
    }
}

/// Notifications raised by entity mutations; drained by whoever owns the entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityNotice {
    PositionChanged(Cartographic),
}

#[derive(Debug)]
struct Binding {
    surface: RenderSurface,
    lease: ShadowLease,
}

/// An observer in the scene: geometry, sensor frustum and, while bound,
/// ownership of a surface's shadow slot.
#[derive(Debug)]
pub struct ViewshedEntity {
    id: ViewshedId,
    kind: ViewshedKind,
    position: Cartographic,
    height_offset: f64,
    orientation: Orientation,
    frustum: Frustum,
    colors: ViewshedColors,
    show_marker: bool,
    persisted_title: Option<String>,
    binding: Option<Binding>,
    notices: Vec<EntityNotice>,
}

impl ViewshedEntity {
    pub fn new(kind: ViewshedKind, options: ViewshedOptions) -> Result<Self, ViewshedError> {
        let position = Cartographic::from_slice(&options.position.to_array())?;
        let mut frustum = options.frustum;
        frustum.far = clamp_range(frustum.far);

        Ok(Self {
            id: ViewshedId::next(),
            kind,
            position,
            height_offset: options.height_offset,
            orientation: Orientation::new(options.heading, options.pitch),
            frustum,
            colors: options.colors,
            show_marker: options.show_marker,
            persisted_title: options.persisted_title,
            binding: None,
            notices: Vec::new(),
        })
    }

    pub fn from_snapshot(snapshot: &ViewshedSnapshot) -> Result<Self, ViewshedError> {
        Self::new(
            snapshot.kind,
            ViewshedOptions {
                position: snapshot.position,
                height_offset: snapshot.height_offset,
                heading: snapshot.orientation.heading,
                pitch: snapshot.orientation.pitch,
                frustum: snapshot.frustum,
                colors: snapshot.colors,
                show_marker: snapshot.show_marker,
                persisted_title: snapshot.title.clone(),
            },
        )
    }

    pub fn to_snapshot(&self) -> ViewshedSnapshot {
        ViewshedSnapshot {
            kind: self.kind,
            position: self.position,
            frustum: self.frustum,
            orientation: self.orientation,
            colors: self.colors,
            show_marker: self.show_marker,
            height_offset: self.height_offset,
            title: self.persisted_title.clone(),
        }
    }

    pub fn id(&self) -> ViewshedId {
        self.id
    }

    pub fn kind(&self) -> ViewshedKind {
        self.kind
    }

    pub fn position(&self) -> Cartographic {
        self.position
    }

    pub fn height_offset(&self) -> f64 {
        self.height_offset
    }

    /// Position of the frustum apex: `position` lifted by `height_offset`.
    pub fn apex(&self) -> Cartographic {
        self.position
            .with_height(self.position.height + self.height_offset)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn heading(&self) -> f64 {
        self.orientation.heading
    }

    pub fn pitch(&self) -> f64 {
        self.orientation.pitch
    }

    pub fn range(&self) -> f64 {
        self.frustum.far
    }

    pub fn field_of_view(&self) -> f64 {
        self.frustum.fov
    }

    pub fn frustum(&self) -> Frustum {
        self.frustum
    }

    pub fn colors(&self) -> ViewshedColors {
        self.colors
    }

    pub fn show_marker(&self) -> bool {
        self.show_marker
    }

    pub fn persisted_title(&self) -> Option<&str> {
        self.persisted_title.as_deref()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted_title.is_some()
    }

    pub(crate) fn set_persisted_title(&mut self, title: Option<String>) {
        self.persisted_title = title;
    }

    /// Whether this entity currently holds a surface's shadow slot.
    pub fn is_active(&self) -> bool {
        self.binding.is_some()
    }

    pub fn bound_surface(&self) -> Option<&RenderSurface> {
        self.binding.as_ref().map(|binding| &binding.surface)
    }

    pub fn take_notices(&mut self) -> Vec<EntityNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn set_position(&mut self, position: Cartographic) -> Result<(), ViewshedError> {
        let position = Cartographic::from_slice(&position.to_array())?;
        self.position = position;
        self.notices.push(EntityNotice::PositionChanged(position));
        self.sync_shadow();
        self.sync_marker();
        Ok(())
    }

    pub fn set_height_offset(&mut self, height_offset: f64) {
        self.height_offset = height_offset;
        self.sync_shadow();
        self.sync_marker();
    }

    pub fn set_range(&mut self, range: f64) {
        self.frustum.far = clamp_range(range);
        self.sync_shadow();
        if self.kind == ViewshedKind::Cone {
            self.sync_marker();
        }
    }

    pub fn set_field_of_view(&mut self, degrees: f64) {
        self.frustum.fov = degrees;
        if self.kind == ViewshedKind::Cone {
            self.sync_shadow();
            self.sync_marker();
        }
    }

    pub fn set_heading(&mut self, degrees: f64) {
        self.orientation = Orientation::new(degrees, self.orientation.pitch);
        self.sync_orientation();
    }

    pub fn set_pitch(&mut self, degrees: f64) {
        self.orientation = Orientation::new(self.orientation.heading, degrees);
        self.sync_orientation();
    }

    pub fn set_colors(&mut self, colors: ViewshedColors) {
        self.colors = colors;
        self.sync_shadow();
    }

    pub fn set_show_marker(&mut self, show: bool) {
        self.show_marker = show;
        self.sync_marker();
    }

    /// Point the observer at `target`: range becomes the apex-target distance
    /// and, for cones, heading/pitch align the principal axis with the target.
    pub fn look_at(&mut self, target: Cartographic) {
        let apex = self.apex();
        let direction = target.to_ecef() - apex.to_ecef();
        self.frustum.far = clamp_range(direction.length());

        if self.kind == ViewshedKind::Cone && direction.length_squared() > 0.0 {
            let (heading, pitch) = LocalFrame::at(apex).heading_pitch(direction);
            self.orientation = Orientation::new(heading, pitch);
        }

        self.sync_shadow();
        self.sync_marker();
    }

    /// Shadow source for the current parameters.
    pub fn projection(&self) -> ShadowProjection {
        let apex = self.apex();
        match self.kind {
            ViewshedKind::Cone => {
                let frame = LocalFrame::at(apex);
                ShadowProjection::Perspective {
                    apex: frame.origin,
                    direction: frame.direction(self.orientation.heading, self.orientation.pitch),
                    up: frame.direction(self.orientation.heading, self.orientation.pitch + 90.0),
                    frustum: self.frustum,
                    colors: self.colors,
                }
            }
            ViewshedKind::Omnidirectional => ShadowProjection::Omnidirectional {
                apex: apex.to_ecef(),
                near: self.frustum.near,
                far: self.frustum.far,
                colors: self.colors,
            },
        }
    }

    pub fn marker(&self) -> MarkerPrimitive {
        let apex = self.apex();
        match self.kind {
            ViewshedKind::Cone => {
                let frame = LocalFrame::at(apex);
                MarkerPrimitive::Cone {
                    apex: frame.origin,
                    direction: frame.direction(self.orientation.heading, self.orientation.pitch),
                    up: frame.direction(self.orientation.heading, self.orientation.pitch + 90.0),
                    fov: self.frustum.fov,
                    aspect_ratio: self.frustum.aspect_ratio,
                    range: self.frustum.far,
                }
            }
            ViewshedKind::Omnidirectional => MarkerPrimitive::Point {
                apex: apex.to_ecef(),
            },
        }
    }

    /// Take the surface's shadow slot. Binding to another surface while bound
    /// unbinds first; a surface without renderable context leaves the entity untouched.
    pub fn bind(&mut self, surface: &RenderSurface) -> Result<(), ViewshedError> {
        if let Some(binding) = &self.binding {
            if binding.surface.id() == surface.id() && surface.owns(binding.lease) {
                return Ok(());
            }
        }
        if !surface.is_renderable() {
            return Err(ViewshedError::NoRenderContext(surface.id().0));
        }

        self.unbind();
        let lease = surface.acquire(self.projection())?;
        self.binding = Some(Binding {
            surface: surface.clone(),
            lease,
        });
        self.sync_marker();
        debug!("Viewshed {} bound to surface {}", self.id, surface.id().0);
        Ok(())
    }

    /// Drop the marker and give the shadow slot back if still held. Idempotent.
    pub fn unbind(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        binding.surface.remove_marker(self.id);
        binding.surface.release(binding.lease);
        debug!("Viewshed {} unbound", self.id);
    }

    /// Unbind if another consumer replaced our shadow source. Returns true when preempted.
    pub fn check_preempted(&mut self) -> bool {
        let preempted = self
            .binding
            .as_ref()
            .is_some_and(|binding| !binding.surface.owns(binding.lease));
        if preempted {
            warn!("Viewshed {} lost its shadow source", self.id);
            self.unbind();
        }
        preempted
    }

    fn sync_orientation(&mut self) {
        if self.kind == ViewshedKind::Cone {
            self.sync_shadow();
            self.sync_marker();
        }
    }

    fn sync_shadow(&mut self) {
        let Some(binding) = &self.binding else {
            return;
        };
        if !binding.surface.update(binding.lease, self.projection()) {
            self.check_preempted();
        }
    }

    fn sync_marker(&self) {
        let Some(binding) = &self.binding else {
            return;
        };
        if self.show_marker {
            binding.surface.set_marker(self.id, self.marker());
        } else {
            binding.surface.remove_marker(self.id);
        }
    }
}

impl Drop for ViewshedEntity {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::surface::{ShadowOwner, ShadowSource, SurfaceId};
    use constants::viewshed::MIN_RANGE;

    fn cone_at(position: Cartographic) -> ViewshedEntity {
        ViewshedEntity::new(
            ViewshedKind::Cone,
            ViewshedOptions {
                position,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn look_at_straight_down_sets_range_and_pitch() {
        let mut cone = cone_at(Cartographic::new(0.0, 0.0, 0.0));
        cone.set_heading(42.0);
        cone.look_at(Cartographic::new(0.0, 0.0, -10.0));

        assert!((cone.range() - 10.0).abs() < 1e-6);
        assert!((cone.pitch() + 90.0).abs() < 1e-9);
        assert_eq!(cone.heading(), 0.0);
        assert_eq!(cone.orientation().roll, 0.0);
    }

    #[test]
    fn look_at_leaves_omnidirectional_orientation_alone() {
        let mut omni = ViewshedEntity::new(
            ViewshedKind::Omnidirectional,
            ViewshedOptions {
                heading: 30.0,
                pitch: 5.0,
                ..Default::default()
            },
        )
        .unwrap();
        omni.look_at(Cartographic::new(0.0, 0.0, -10.0));

        assert!((omni.range() - 10.0).abs() < 1e-6);
        assert_eq!(omni.heading(), 30.0);
        assert_eq!(omni.pitch(), 5.0);
    }

    #[test]
    fn look_at_close_target_clamps_range() {
        let mut cone = cone_at(Cartographic::new(10.0, 50.0, 100.0));
        cone.look_at(Cartographic::new(10.0, 50.0, 98.0));
        assert_eq!(cone.range(), MIN_RANGE);
    }

    #[test]
    fn look_at_uses_height_offset_for_apex() {
        let mut cone = cone_at(Cartographic::new(0.0, 0.0, 0.0));
        cone.set_height_offset(20.0);
        cone.look_at(Cartographic::new(0.0, 0.0, -10.0));
        assert!((cone.range() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn set_range_clamps() {
        let mut cone = cone_at(Cartographic::default());
        cone.set_range(2.0);
        assert_eq!(cone.range(), MIN_RANGE);
        cone.set_range(500.0);
        assert_eq!(cone.range(), 500.0);
    }

    #[test]
    fn omnidirectional_stores_fov_without_touching_shadow() {
        let surface = RenderSurface::new(SurfaceId(1));
        let mut omni =
            ViewshedEntity::new(ViewshedKind::Omnidirectional, ViewshedOptions::default())
                .unwrap();
        omni.bind(&surface).unwrap();
        let before = surface.shadow_source();
        omni.set_field_of_view(70.0);
        assert_eq!(omni.field_of_view(), 70.0);
        assert_eq!(surface.shadow_source(), before);
    }

    #[test]
    fn bound_setters_resync_surface() {
        let surface = RenderSurface::new(SurfaceId(1));
        let mut cone = cone_at(Cartographic::new(5.0, 45.0, 0.0));
        cone.bind(&surface).unwrap();
        cone.set_show_marker(true);
        cone.set_range(250.0);

        let Some(ShadowSource::Viewshed { projection, .. }) = surface.shadow_source() else {
            panic!("expected viewshed shadow source");
        };
        assert_eq!(projection.far(), 250.0);
        let Some(MarkerPrimitive::Cone { range, .. }) = surface.marker(cone.id()) else {
            panic!("expected cone marker");
        };
        assert_eq!(range, 250.0);

        cone.set_show_marker(false);
        assert!(surface.marker(cone.id()).is_none());
    }

    #[test]
    fn malformed_position_does_not_mutate() {
        let mut cone = cone_at(Cartographic::new(1.0, 2.0, 3.0));
        let result = cone.set_position(Cartographic::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(result, Err(ViewshedError::InvalidPosition(_))));
        assert_eq!(cone.position(), Cartographic::new(1.0, 2.0, 3.0));
        assert!(cone.take_notices().is_empty());
    }

    #[test]
    fn set_position_notifies() {
        let mut cone = cone_at(Cartographic::default());
        cone.set_position(Cartographic::new(1.0, 1.0, 1.0)).unwrap();
        assert_eq!(
            cone.take_notices(),
            vec![EntityNotice::PositionChanged(Cartographic::new(1.0, 1.0, 1.0))]
        );
    }

    #[test]
    fn bind_without_context_leaves_entity_unbound() {
        let good = RenderSurface::new(SurfaceId(1));
        let bad = RenderSurface::without_context(SurfaceId(2));
        let mut cone = cone_at(Cartographic::default());
        cone.bind(&good).unwrap();

        assert!(cone.bind(&bad).is_err());
        assert!(cone.is_active());
        assert_eq!(cone.bound_surface().map(|s| s.id()), Some(SurfaceId(1)));
    }

    #[test]
    fn rebinding_to_other_surface_releases_first() {
        let first = RenderSurface::new(SurfaceId(1));
        let second = RenderSurface::new(SurfaceId(2));
        let mut cone = cone_at(Cartographic::default());
        cone.set_show_marker(true);
        cone.bind(&first).unwrap();
        assert!(first.marker(cone.id()).is_some());

        cone.bind(&second).unwrap();
        assert_eq!(first.shadow_owner(), ShadowOwner::Default);
        assert!(first.marker(cone.id()).is_none());
        assert!(second.marker(cone.id()).is_some());
    }

    #[test]
    fn external_replacement_unbinds_on_next_sync() {
        let surface = RenderSurface::new(SurfaceId(1));
        let mut cone = cone_at(Cartographic::default());
        cone.bind(&surface).unwrap();
        surface.install_external("measurement");

        cone.set_range(300.0);
        assert!(!cone.is_active());
        assert_eq!(surface.shadow_owner(), ShadowOwner::External);
    }

    #[test]
    fn drop_releases_shadow_slot() {
        let surface = RenderSurface::new(SurfaceId(1));
        {
            let mut cone = cone_at(Cartographic::default());
            cone.bind(&surface).unwrap();
            assert!(matches!(surface.shadow_owner(), ShadowOwner::Lease(_)));
        }
        assert_eq!(surface.shadow_owner(), ShadowOwner::Default);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            "pyramid".parse::<ViewshedKind>(),
            Err(ViewshedError::UnknownKind(_))
        ));
        assert_eq!("Cone".parse::<ViewshedKind>().unwrap(), ViewshedKind::Cone);
    }
}
