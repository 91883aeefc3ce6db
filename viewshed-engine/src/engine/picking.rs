//! Cursor to terrain picking and pointer event synthesis.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use constants::render_settings::DRAG_THRESHOLD_PX;

use super::scene_frame::SceneFrame;
use super::terrain::{HeightmapTerrain, SceneTerrain};
use crate::viewshed::geodesy::Cartographic;
use crate::viewshed::interaction::{PointerEvent, PointerEventKind};
use crate::viewshed::manager::ViewshedManager;

const MAX_PICK_DISTANCE: f32 = 5000.0;
const REFINE_ITERATIONS: usize = 8;

/// Terrain point under the cursor, for feedback drawing.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct PointerHover(pub Option<Vec3>);

fn height_above_terrain(
    ray: &Ray3d,
    t: f32,
    frame: &SceneFrame,
    terrain: &HeightmapTerrain,
) -> Option<(f64, Cartographic)> {
    let position = frame.to_cartographic(ray.get_point(t));
    if !terrain.contains(position.longitude, position.latitude) {
        return None;
    }
    let ground = terrain.height_at(position.longitude, position.latitude);
    Some((position.height - ground, position.with_height(ground)))
}

/// March `ray` over the heightmap and refine the first crossing with a binary search.
pub fn pick_terrain(
    ray: Ray3d,
    frame: &SceneFrame,
    terrain: &HeightmapTerrain,
    max_distance: f32,
) -> Option<Cartographic> {
    let step = (max_distance / 1024.0).max(0.25);
    let mut previous: Option<f32> = None;
    let mut t = 0.0;

    while t <= max_distance {
        match height_above_terrain(&ray, t, frame, terrain) {
            Some((diff, ground)) if diff <= 0.0 => {
                let Some(above) = previous else {
                    // Ray starts underground.
                    return Some(ground);
                };
                let (mut low, mut high) = (above, t);
                for _ in 0..REFINE_ITERATIONS {
                    let mid = (low + high) * 0.5;
                    match height_above_terrain(&ray, mid, frame, terrain) {
                        Some((diff, _)) if diff > 0.0 => low = mid,
                        _ => high = mid,
                    }
                }
                return height_above_terrain(&ray, high, frame, terrain)
                    .map(|(_, ground)| ground)
                    .or(Some(ground));
            }
            Some(_) => previous = Some(t),
            None => previous = None,
        }
        t += step;
    }
    None
}

/// Mouse state sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerInput {
    pub cursor: Option<Vec2>,
    pub left_pressed: bool,
    pub left_just_pressed: bool,
    pub left_just_released: bool,
    pub right_just_pressed: bool,
    pub right_just_released: bool,
}

/// Turns raw button/cursor state into click, drag and cancel events.
/// A right click that does not travel cancels; a right drag is left to the camera.
#[derive(Resource, Default, Debug)]
pub struct PointerTracker {
    last_cursor: Option<Vec2>,
    left_down_at: Option<Vec2>,
    right_down_at: Option<Vec2>,
    dragging: bool,
}

impl PointerTracker {
    pub fn update(&mut self, input: &PointerInput, hit: Option<Cartographic>) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        let moved = input.cursor.is_some() && input.cursor != self.last_cursor;
        let travelled = |from: Option<Vec2>| match (from, input.cursor) {
            (Some(from), Some(to)) => from.distance(to) > DRAG_THRESHOLD_PX,
            _ => false,
        };

        if input.left_just_pressed {
            self.left_down_at = input.cursor;
            self.dragging = false;
        }

        if input.left_pressed && !self.dragging && travelled(self.left_down_at) {
            self.dragging = true;
            events.push(PointerEvent::new(PointerEventKind::DragStart, hit));
        } else if input.left_pressed && self.dragging && moved {
            events.push(PointerEvent::new(PointerEventKind::Drag, hit));
        } else if moved && !input.left_pressed {
            events.push(PointerEvent::new(PointerEventKind::Move, hit));
        }

        if input.left_just_released && self.left_down_at.is_some() {
            let kind = if self.dragging {
                PointerEventKind::DragEnd
            } else {
                PointerEventKind::Click
            };
            events.push(PointerEvent::new(kind, hit));
            self.left_down_at = None;
            self.dragging = false;
        }

        if input.right_just_pressed {
            self.right_down_at = input.cursor;
        }
        if input.right_just_released {
            if self.right_down_at.is_some() && !travelled(self.right_down_at) {
                events.push(PointerEvent::new(PointerEventKind::Cancel, None));
            }
            self.right_down_at = None;
        }

        self.last_cursor = input.cursor;
        events
    }
}

/// Pick the terrain under the cursor and feed pointer events to the manager
/// while it is placing or moving a viewshed.
pub fn emit_pointer_events(
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    mouse: Res<ButtonInput<MouseButton>>,
    frame: Res<SceneFrame>,
    terrain: Res<SceneTerrain>,
    mut tracker: ResMut<PointerTracker>,
    mut hover: ResMut<PointerHover>,
    mut manager: ResMut<ViewshedManager>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera_transform, camera)) = cameras.single() else {
        return;
    };

    let cursor = window.cursor_position();
    let hit = cursor
        .and_then(|position| camera.viewport_to_world(camera_transform, position).ok())
        .and_then(|ray| pick_terrain(ray, &frame, &terrain.0, MAX_PICK_DISTANCE));
    hover.0 = hit.map(|position| frame.to_world(position));

    let input = PointerInput {
        cursor,
        left_pressed: mouse.pressed(MouseButton::Left),
        left_just_pressed: mouse.just_pressed(MouseButton::Left),
        left_just_released: mouse.just_released(MouseButton::Left),
        right_just_pressed: mouse.just_pressed(MouseButton::Right),
        right_just_released: mouse.just_released(MouseButton::Right),
    };
    let events = tracker.update(&input, hit);

    if !manager.wants_pointer() {
        return;
    }
    for event in &events {
        manager.handle_pointer(event);
    }
}
