//! Two-click placement: the first click fixes the observer, the second the
//! point it looks at.

use bevy::log::{debug, info};

use super::entity::ViewshedEntity;
use super::error::ViewshedError;
use super::geodesy::Cartographic;
use super::surface::{PointerClaim, RenderSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Move,
    Click,
    DragStart,
    Drag,
    DragEnd,
    /// Right click / escape: abort whatever the pointer is doing.
    Cancel,
}

/// Pointer input with the terrain position under the cursor, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub position: Option<Cartographic>,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, position: Option<Cartographic>) -> Self {
        Self { kind, position }
    }

    pub fn moved(position: Cartographic) -> Self {
        Self::new(PointerEventKind::Move, Some(position))
    }

    pub fn click(position: Cartographic) -> Self {
        Self::new(PointerEventKind::Click, Some(position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositioningState {
    AwaitOrigin,
    AwaitTarget,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositioningNotice {
    Positioned(Cartographic),
    Finished(Cartographic),
}

#[derive(Debug)]
pub struct PositioningInteraction {
    state: PositioningState,
    surface: RenderSurface,
    claim: Option<PointerClaim>,
}

impl PositioningInteraction {
    /// Start capturing; holds the surface's pointer claim for the lifetime of
    /// the interaction. Fails if another interaction already holds it.
    pub fn new(surface: &RenderSurface) -> Result<Self, ViewshedError> {
        let claim = surface
            .claim_pointer()
            .ok_or(ViewshedError::PointerBusy(surface.id().0))?;
        Ok(Self {
            state: PositioningState::AwaitOrigin,
            surface: surface.clone(),
            claim: Some(claim),
        })
    }

    pub fn state(&self) -> PositioningState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == PositioningState::Done
    }

    pub fn on_move(&mut self, entity: &mut ViewshedEntity, position: Cartographic) {
        match self.state {
            PositioningState::AwaitOrigin => {
                if let Err(e) = entity.set_position(position) {
                    debug!("Ignoring pointer position: {e}");
                }
            }
            PositioningState::AwaitTarget => entity.look_at(position),
            PositioningState::Done => {}
        }
    }

    pub fn on_click(
        &mut self,
        entity: &mut ViewshedEntity,
        position: Cartographic,
    ) -> Option<PositioningNotice> {
        match self.state {
            PositioningState::AwaitOrigin => {
                entity.set_position(position).ok()?;
                self.state = PositioningState::AwaitTarget;
                info!("Viewshed {} origin placed", entity.id());
                Some(PositioningNotice::Positioned(position))
            }
            PositioningState::AwaitTarget => {
                entity.look_at(position);
                self.state = PositioningState::Done;
                self.destroy();
                info!("Viewshed {} target placed", entity.id());
                Some(PositioningNotice::Finished(position))
            }
            PositioningState::Done => None,
        }
    }

    /// Dispatch a raw pointer event. Events without a world position are ignored.
    pub fn handle(
        &mut self,
        entity: &mut ViewshedEntity,
        event: &PointerEvent,
    ) -> Option<PositioningNotice> {
        let position = event.position?;
        match event.kind {
            PointerEventKind::Move | PointerEventKind::Drag => {
                self.on_move(entity, position);
                None
            }
            PointerEventKind::Click => self.on_click(entity, position),
            _ => None,
        }
    }

    /// Give the pointer back. Safe to call any number of times.
    pub fn destroy(&mut self) {
        if let Some(claim) = self.claim.take() {
            self.surface.release_pointer(claim);
        }
    }
}

impl Drop for PositioningInteraction {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::entity::{ViewshedKind, ViewshedOptions};
    use crate::viewshed::surface::SurfaceId;

    fn setup() -> (RenderSurface, ViewshedEntity) {
        let surface = RenderSurface::new(SurfaceId(1));
        let entity = ViewshedEntity::new(ViewshedKind::Cone, ViewshedOptions::default()).unwrap();
        (surface, entity)
    }

    #[test]
    fn entity_follows_pointer_until_origin_click() {
        let (surface, mut entity) = setup();
        let mut interaction = PositioningInteraction::new(&surface).unwrap();

        interaction.on_move(&mut entity, Cartographic::new(1.0, 2.0, 3.0));
        assert_eq!(entity.position(), Cartographic::new(1.0, 2.0, 3.0));

        let notice = interaction.on_click(&mut entity, Cartographic::new(1.5, 2.0, 3.0));
        assert_eq!(
            notice,
            Some(PositioningNotice::Positioned(Cartographic::new(1.5, 2.0, 3.0)))
        );
        assert_eq!(interaction.state(), PositioningState::AwaitTarget);

        interaction.on_move(&mut entity, Cartographic::new(1.5, 2.0, -100.0));
        assert_eq!(entity.position(), Cartographic::new(1.5, 2.0, 3.0));
        assert!((entity.range() - 103.0).abs() < 1e-6);
    }

    #[test]
    fn second_click_finishes_and_releases_pointer() {
        let (surface, mut entity) = setup();
        let mut interaction = PositioningInteraction::new(&surface).unwrap();
        assert!(surface.pointer_claimed());

        interaction.on_click(&mut entity, Cartographic::new(0.0, 0.0, 0.0));
        let notice = interaction.on_click(&mut entity, Cartographic::new(0.0, 0.0, -10.0));

        assert!(matches!(notice, Some(PositioningNotice::Finished(_))));
        assert!(interaction.is_done());
        assert!(!surface.pointer_claimed());
        assert!(interaction.on_click(&mut entity, Cartographic::default()).is_none());
    }

    #[test]
    fn destroy_is_idempotent() {
        let (surface, _) = setup();
        let mut interaction = PositioningInteraction::new(&surface).unwrap();
        interaction.destroy();
        let other = surface.claim_pointer().unwrap();
        interaction.destroy();
        drop(interaction);
        assert!(surface.pointer_claimed());
        assert!(surface.release_pointer(other));
    }

    #[test]
    fn claimed_pointer_rejects_interaction() {
        let (surface, _) = setup();
        let other = surface.claim_pointer().unwrap();
        assert!(matches!(
            PositioningInteraction::new(&surface),
            Err(ViewshedError::PointerBusy(1))
        ));
        assert!(surface.release_pointer(other));
    }

    #[test]
    fn events_without_position_are_ignored() {
        let (surface, mut entity) = setup();
        let mut interaction = PositioningInteraction::new(&surface).unwrap();
        let event = PointerEvent::new(PointerEventKind::Click, None);
        assert!(interaction.handle(&mut entity, &event).is_none());
        assert_eq!(interaction.state(), PositioningState::AwaitOrigin);
    }
}
