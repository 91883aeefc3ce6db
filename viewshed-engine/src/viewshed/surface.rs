//! Rendering surface as seen by viewsheds: one exclusive shadow-source slot,
//! a marker primitive collection and an exclusive pointer claim.
//!
//! The surface is a cheap cloneable handle so entities, interactions and the
//! Bevy render systems can all refer to the same slot. Ownership of the slot
//! is explicit: [`RenderSurface::acquire`] hands out a [`ShadowLease`] and only
//! the holder of the current lease may update or release it. Anyone replacing
//! the source pushes a [`ShadowSourceChanged`] so preempted owners can unbind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bevy::log::debug;

use super::entity::ViewshedId;
use super::error::ViewshedError;
use super::frustum::{MarkerPrimitive, ShadowProjection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Proof of ownership of a surface's shadow slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowLease {
    surface: SurfaceId,
    serial: u64,
}

impl ShadowLease {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerClaim(u64);

/// Current content of the shadow slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowSource {
    Viewshed {
        lease: ShadowLease,
        projection: ShadowProjection,
    },
    /// Installed by some other consumer of the surface.
    External { label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowOwner {
    Default,
    Lease(ShadowLease),
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowSourceChanged {
    pub surface: SurfaceId,
    pub previous: ShadowOwner,
    pub current: ShadowOwner,
}

#[derive(Debug, Default)]
struct SurfaceState {
    renderable: bool,
    shadow: Option<ShadowSource>,
    next_serial: u64,
    markers: BTreeMap<ViewshedId, MarkerPrimitive>,
    pointer: Option<PointerClaim>,
    changes: Vec<ShadowSourceChanged>,
}

impl SurfaceState {
    fn owner(&self) -> ShadowOwner {
        match &self.shadow {
            None => ShadowOwner::Default,
            Some(ShadowSource::Viewshed { lease, .. }) => ShadowOwner::Lease(*lease),
            Some(ShadowSource::External { .. }) => ShadowOwner::External,
        }
    }

    fn replace(&mut self, id: SurfaceId, source: Option<ShadowSource>) {
        let previous = self.owner();
        self.shadow = source;
        let current = self.owner();
        if previous != current {
            self.changes.push(ShadowSourceChanged {
                surface: id,
                previous,
                current,
            });
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSurface {
    id: SurfaceId,
    state: Arc<Mutex<SurfaceState>>,
}

impl RenderSurface {
    pub fn new(id: SurfaceId) -> Self {
        Self::with_context(id, true)
    }

    /// A surface whose renderer is not available (yet); viewsheds cannot bind to it.
    pub fn without_context(id: SurfaceId) -> Self {
        Self::with_context(id, false)
    }

    fn with_context(id: SurfaceId, renderable: bool) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(SurfaceState {
                renderable,
                ..Default::default()
            })),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        // Single-threaded use; a poisoned lock still holds consistent data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_renderable(&self) -> bool {
        self.state().renderable
    }

    pub fn set_renderable(&self, renderable: bool) {
        self.state().renderable = renderable;
    }

    /// Install `projection` as the active shadow source, preempting whoever held it.
    pub fn acquire(&self, projection: ShadowProjection) -> Result<ShadowLease, ViewshedError> {
        let mut state = self.state();
        if !state.renderable {
            return Err(ViewshedError::NoRenderContext(self.id.0));
        }
        state.next_serial += 1;
        let lease = ShadowLease {
            surface: self.id,
            serial: state.next_serial,
        };
        state.replace(self.id, Some(ShadowSource::Viewshed { lease, projection }));
        debug!("Surface {} shadow slot acquired ({})", self.id.0, lease.serial);
        Ok(lease)
    }

    /// Replace the projection behind `lease`. Returns false if the lease was preempted.
    pub fn update(&self, lease: ShadowLease, projection: ShadowProjection) -> bool {
        let mut state = self.state();
        match &mut state.shadow {
            Some(ShadowSource::Viewshed {
                lease: current,
                projection: slot,
            }) if *current == lease => {
                *slot = projection;
                true
            }
            _ => false,
        }
    }

    /// Restore the default shadow state if `lease` still owns the slot.
    pub fn release(&self, lease: ShadowLease) -> bool {
        let mut state = self.state();
        if state.owner() != ShadowOwner::Lease(lease) {
            return false;
        }
        state.replace(self.id, None);
        debug!("Surface {} shadow slot released ({})", self.id.0, lease.serial);
        true
    }

    /// Some other consumer takes the shadow slot.
    pub fn install_external(&self, label: impl Into<String>) {
        let mut state = self.state();
        state.replace(
            self.id,
            Some(ShadowSource::External {
                label: label.into(),
            }),
        );
    }

    pub fn owns(&self, lease: ShadowLease) -> bool {
        self.state().owner() == ShadowOwner::Lease(lease)
    }

    pub fn shadow_owner(&self) -> ShadowOwner {
        self.state().owner()
    }

    pub fn shadow_source(&self) -> Option<ShadowSource> {
        self.state().shadow.clone()
    }

    pub fn drain_changes(&self) -> Vec<ShadowSourceChanged> {
        std::mem::take(&mut self.state().changes)
    }

    pub fn set_marker(&self, id: ViewshedId, marker: MarkerPrimitive) {
        self.state().markers.insert(id, marker);
    }

    pub fn remove_marker(&self, id: ViewshedId) -> bool {
        self.state().markers.remove(&id).is_some()
    }

    pub fn marker(&self, id: ViewshedId) -> Option<MarkerPrimitive> {
        self.state().markers.get(&id).cloned()
    }

    pub fn markers(&self) -> Vec<(ViewshedId, MarkerPrimitive)> {
        self.state()
            .markers
            .iter()
            .map(|(id, marker)| (*id, marker.clone()))
            .collect()
    }

    /// Take exclusive ownership of pointer input. Returns None while someone else holds it.
    pub fn claim_pointer(&self) -> Option<PointerClaim> {
        let mut state = self.state();
        if state.pointer.is_some() {
            return None;
        }
        state.next_serial += 1;
        let claim = PointerClaim(state.next_serial);
        state.pointer = Some(claim);
        Some(claim)
    }

    pub fn release_pointer(&self, claim: PointerClaim) -> bool {
        let mut state = self.state();
        if state.pointer == Some(claim) {
            state.pointer = None;
            true
        } else {
            false
        }
    }

    pub fn pointer_claimed(&self) -> bool {
        self.state().pointer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::frustum::ViewshedColors;
    use bevy::math::DVec3;

    fn omni() -> ShadowProjection {
        ShadowProjection::Omnidirectional {
            apex: DVec3::ZERO,
            near: 0.1,
            far: 50.0,
            colors: ViewshedColors::default(),
        }
    }

    #[test]
    fn surface_without_context_rejects_acquire() {
        let surface = RenderSurface::without_context(SurfaceId(7));
        assert!(matches!(
            surface.acquire(omni()),
            Err(ViewshedError::NoRenderContext(7))
        ));
        assert_eq!(surface.shadow_owner(), ShadowOwner::Default);
    }

    #[test]
    fn second_acquire_preempts_first_lease() {
        let surface = RenderSurface::new(SurfaceId(1));
        let first = surface.acquire(omni()).unwrap();
        let second = surface.acquire(omni()).unwrap();

        assert!(!surface.owns(first));
        assert!(surface.owns(second));
        assert!(!surface.release(first));
        assert!(!surface.update(first, omni()));

        let changes = surface.drain_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].previous, ShadowOwner::Lease(first));
        assert_eq!(changes[1].current, ShadowOwner::Lease(second));
    }

    #[test]
    fn external_install_is_reported() {
        let surface = RenderSurface::new(SurfaceId(1));
        let lease = surface.acquire(omni()).unwrap();
        surface.drain_changes();
        surface.install_external("sun");
        assert!(!surface.owns(lease));
        let changes = surface.drain_changes();
        assert_eq!(changes[0].current, ShadowOwner::External);
    }

    #[test]
    fn pointer_claim_is_exclusive() {
        let surface = RenderSurface::new(SurfaceId(1));
        let claim = surface.claim_pointer().unwrap();
        assert!(surface.claim_pointer().is_none());
        assert!(surface.release_pointer(claim));
        assert!(!surface.release_pointer(claim));
        assert!(surface.claim_pointer().is_some());
    }
}
