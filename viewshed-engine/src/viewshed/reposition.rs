//! Dragging an existing viewshed to a new position through an edit session.
//!
//! The viewshed itself is not editable geometry, so a hidden single-point
//! proxy feature stands in for it. The session edits the proxy and every
//! geometry change is copied onto the viewshed by the owner of the session.

use bevy::log::{debug, info};

use super::entity::{ViewshedEntity, ViewshedId};
use super::geodesy::Cartographic;
use super::height_mode::HeightMode;
use super::interaction::{PointerEvent, PointerEventKind};

/// Hidden editable point mirroring a viewshed's position.
#[derive(Debug, Clone, PartialEq)]
pub struct EditProxy {
    position: Cartographic,
    hidden: bool,
    geometry_changed: bool,
}

impl EditProxy {
    pub fn new(position: Cartographic) -> Self {
        Self {
            position,
            hidden: true,
            geometry_changed: false,
        }
    }

    pub fn position(&self) -> Cartographic {
        self.position
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_position(&mut self, position: Cartographic) {
        if position != self.position {
            self.position = position;
            self.geometry_changed = true;
        }
    }

    /// Geometry-changed notification; true once per change.
    pub fn take_geometry_changed(&mut self) -> bool {
        std::mem::take(&mut self.geometry_changed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSessionKind {
    /// Move a whole feature, keeping its height.
    Translate,
    /// Move a vertex onto the terrain under the pointer.
    GeometryEdit,
}

/// An editing session run by the host's editor.
pub trait EditSession: Send + Sync {
    fn kind(&self) -> EditSessionKind;

    fn set_target(&mut self, proxy: &EditProxy);

    /// Feed pointer input; the session moves `proxy` as it sees fit.
    fn handle_pointer(&mut self, event: &PointerEvent, proxy: &mut EditProxy);

    fn stop(&mut self);

    /// "Stopped" notification; true once, after the session ended for any reason.
    fn take_stopped(&mut self) -> bool;
}

pub trait EditSessionProvider: Send + Sync {
    fn start_translate_session(&self) -> Box<dyn EditSession>;
    fn start_geometry_edit_session(&self) -> Box<dyn EditSession>;
}

#[derive(Debug, Default)]
struct SessionLifecycle {
    stopped: bool,
    notified: bool,
}

impl SessionLifecycle {
    fn stop(&mut self) {
        self.stopped = true;
    }

    fn take_stopped(&mut self) -> bool {
        if self.stopped && !self.notified {
            self.notified = true;
            return true;
        }
        false
    }
}

/// Drag deltas move the target horizontally.
#[derive(Debug, Default)]
pub struct TranslateSession {
    target: Option<Cartographic>,
    last_drag: Option<Cartographic>,
    lifecycle: SessionLifecycle,
}

impl EditSession for TranslateSession {
    fn kind(&self) -> EditSessionKind {
        EditSessionKind::Translate
    }

    fn set_target(&mut self, proxy: &EditProxy) {
        self.target = Some(proxy.position());
    }

    fn handle_pointer(&mut self, event: &PointerEvent, proxy: &mut EditProxy) {
        if self.lifecycle.stopped || self.target.is_none() {
            return;
        }
        match (event.kind, event.position) {
            (PointerEventKind::Cancel, _) => self.stop(),
            (PointerEventKind::DragStart, position) => self.last_drag = position,
            (PointerEventKind::Drag, Some(position)) => {
                if let Some(last) = self.last_drag {
                    let current = proxy.position();
                    proxy.set_position(Cartographic::new(
                        current.longitude + (position.longitude - last.longitude),
                        current.latitude + (position.latitude - last.latitude),
                        current.height,
                    ));
                }
                self.last_drag = Some(position);
            }
            (PointerEventKind::DragEnd, _) => self.last_drag = None,
            _ => {}
        }
    }

    fn stop(&mut self) {
        self.last_drag = None;
        self.lifecycle.stop();
    }

    fn take_stopped(&mut self) -> bool {
        self.lifecycle.take_stopped()
    }
}

/// The dragged vertex snaps to the picked terrain position.
#[derive(Debug, Default)]
pub struct GeometryEditSession {
    has_target: bool,
    dragging: bool,
    lifecycle: SessionLifecycle,
}

impl EditSession for GeometryEditSession {
    fn kind(&self) -> EditSessionKind {
        EditSessionKind::GeometryEdit
    }

    fn set_target(&mut self, _proxy: &EditProxy) {
        self.has_target = true;
    }

    fn handle_pointer(&mut self, event: &PointerEvent, proxy: &mut EditProxy) {
        if self.lifecycle.stopped || !self.has_target {
            return;
        }
        match (event.kind, event.position) {
            (PointerEventKind::Cancel, _) => self.stop(),
            (PointerEventKind::DragStart, _) => self.dragging = true,
            (PointerEventKind::Drag, Some(position)) if self.dragging => {
                proxy.set_position(position);
            }
            (PointerEventKind::DragEnd, Some(position)) if self.dragging => {
                proxy.set_position(position);
                self.dragging = false;
            }
            (PointerEventKind::DragEnd, None) => self.dragging = false,
            _ => {}
        }
    }

    fn stop(&mut self) {
        self.dragging = false;
        self.lifecycle.stop();
    }

    fn take_stopped(&mut self) -> bool {
        self.lifecycle.take_stopped()
    }
}

/// Provider backed by the built-in pointer-driven sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerEditProvider;

impl EditSessionProvider for PointerEditProvider {
    fn start_translate_session(&self) -> Box<dyn EditSession> {
        Box::new(TranslateSession::default())
    }

    fn start_geometry_edit_session(&self) -> Box<dyn EditSession> {
        Box::new(GeometryEditSession::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepositionEvent {
    Moved(Cartographic),
    /// The edit session ended on its own.
    Stopped,
}

pub struct RepositionSession {
    viewshed: ViewshedId,
    proxy: EditProxy,
    session: Box<dyn EditSession>,
    stopped: bool,
}

impl std::fmt::Debug for RepositionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositionSession")
            .field("viewshed", &self.viewshed)
            .field("proxy", &self.proxy)
            .field("kind", &self.session.kind())
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl RepositionSession {
    /// Translate in absolute mode, vertex editing (terrain snapping) in relative mode.
    pub fn start(
        provider: &dyn EditSessionProvider,
        entity: &ViewshedEntity,
        height_mode: HeightMode,
    ) -> Self {
        let mut session = match height_mode {
            HeightMode::Absolute => provider.start_translate_session(),
            HeightMode::Relative => provider.start_geometry_edit_session(),
        };
        let proxy = EditProxy::new(entity.position());
        session.set_target(&proxy);
        info!(
            "Reposition session ({:?}) started for viewshed {}",
            session.kind(),
            entity.id()
        );

        Self {
            viewshed: entity.id(),
            proxy,
            session,
            stopped: false,
        }
    }

    pub fn viewshed(&self) -> ViewshedId {
        self.viewshed
    }

    pub fn kind(&self) -> EditSessionKind {
        self.session.kind()
    }

    pub fn proxy(&self) -> &EditProxy {
        &self.proxy
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Vec<RepositionEvent> {
        if self.stopped {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.session.handle_pointer(event, &mut self.proxy);
        if self.proxy.take_geometry_changed() {
            events.push(RepositionEvent::Moved(self.proxy.position()));
        }
        if self.session.take_stopped() {
            self.teardown();
            events.push(RepositionEvent::Stopped);
        }
        events
    }

    /// Explicit teardown. The stopped flag is set before the session is told
    /// to stop, so its own stop notification cannot lead back here.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.teardown();
        true
    }

    fn teardown(&mut self) {
        self.stopped = true;
        self.session.stop();
        // Swallow the notification our own stop produced.
        self.session.take_stopped();
        debug!("Reposition session for viewshed {} stopped", self.viewshed);
    }
}

impl Drop for RepositionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::entity::{ViewshedKind, ViewshedOptions};

    fn entity() -> ViewshedEntity {
        ViewshedEntity::new(
            ViewshedKind::Cone,
            ViewshedOptions {
                position: Cartographic::new(10.0, 50.0, 300.0),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn drag(kind: PointerEventKind, lon: f64, lat: f64, h: f64) -> PointerEvent {
        PointerEvent::new(kind, Some(Cartographic::new(lon, lat, h)))
    }

    #[test]
    fn absolute_mode_translates_keeping_height() {
        let mut session =
            RepositionSession::start(&PointerEditProvider, &entity(), HeightMode::Absolute);
        assert_eq!(session.kind(), EditSessionKind::Translate);
        assert!(session.proxy().is_hidden());

        session.handle_pointer(&drag(PointerEventKind::DragStart, 1.0, 1.0, 0.0));
        let events = session.handle_pointer(&drag(PointerEventKind::Drag, 1.5, 0.5, 20.0));

        assert_eq!(
            events,
            vec![RepositionEvent::Moved(Cartographic::new(10.5, 49.5, 300.0))]
        );
    }

    #[test]
    fn relative_mode_snaps_to_pointer() {
        let mut session =
            RepositionSession::start(&PointerEditProvider, &entity(), HeightMode::Relative);
        assert_eq!(session.kind(), EditSessionKind::GeometryEdit);

        session.handle_pointer(&drag(PointerEventKind::DragStart, 10.0, 50.0, 0.0));
        let events = session.handle_pointer(&drag(PointerEventKind::Drag, 11.0, 51.0, 42.0));
        assert_eq!(
            events,
            vec![RepositionEvent::Moved(Cartographic::new(11.0, 51.0, 42.0))]
        );
    }

    #[test]
    fn moves_without_drag_do_nothing() {
        let mut session =
            RepositionSession::start(&PointerEditProvider, &entity(), HeightMode::Relative);
        let events = session.handle_pointer(&drag(PointerEventKind::Move, 11.0, 51.0, 42.0));
        assert!(events.is_empty());
    }

    #[test]
    fn cancel_reports_stopped_once() {
        let mut session =
            RepositionSession::start(&PointerEditProvider, &entity(), HeightMode::Absolute);
        let cancel = PointerEvent::new(PointerEventKind::Cancel, None);

        assert_eq!(session.handle_pointer(&cancel), vec![RepositionEvent::Stopped]);
        assert!(session.is_stopped());
        assert!(session.handle_pointer(&cancel).is_empty());
        assert!(!session.stop());
    }

    #[test]
    fn explicit_stop_is_idempotent_and_silent() {
        let mut session =
            RepositionSession::start(&PointerEditProvider, &entity(), HeightMode::Absolute);
        assert!(session.stop());
        assert!(!session.stop());
        let events = session.handle_pointer(&drag(PointerEventKind::Drag, 0.0, 0.0, 0.0));
        assert!(events.is_empty());
    }
}
