//! Free-flight viewport camera: right-drag to look, wheel to dolly,
//! WASD/QE to fly, shift/ctrl to change speed.

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::math::EulerRot;
use bevy::prelude::*;

const YAW_SENSITIVITY: f32 = 0.0035;
const PITCH_SENSITIVITY: f32 = 0.0030;
const PITCH_LIMIT: f32 = 1.55;

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ViewportCamera {
    pub focus_point: Vec3,
    /// Height above the scene origin, used to scale movement speed.
    pub height: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl ViewportCamera {
    pub fn new(focus_point: Vec3, pitch: f32, yaw: f32) -> Self {
        Self {
            focus_point,
            height: focus_point.y.abs().max(1.0),
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw,
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.focus_point).with_rotation(self.rotation())
    }

    pub fn look(&mut self, delta: Vec2) {
        self.yaw -= delta.x * YAW_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * PITCH_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move along the view direction; positive `amount` moves forward.
    pub fn dolly(&mut self, amount: f32) {
        let speed = (self.height * 0.2).clamp(0.5, 500.0);
        let forward = self.rotation() * Vec3::NEG_Z;
        self.focus_point += forward * amount * speed;
        self.height = self.focus_point.y.abs().max(1.0);
    }

    /// Fly by `input` in camera space (x right, y world up, z backwards).
    pub fn fly(&mut self, input: Vec3, speed_factor: f32, delta_secs: f32) {
        if input == Vec3::ZERO {
            return;
        }
        let rotation = self.rotation();
        let world = rotation * Vec3::X * input.x + Vec3::Y * input.y + rotation * Vec3::Z * input.z;
        let speed = self.height.clamp(2.0, 200.0) * speed_factor;
        self.focus_point += world.normalize_or_zero() * speed * delta_secs;
        self.height = self.focus_point.y.abs().max(1.0);
    }
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 80.0, 150.0), -0.5, 0.0)
    }
}

pub fn spawn_camera(mut commands: Commands, viewport: Res<ViewportCamera>) {
    commands.spawn((Camera3d::default(), viewport.transform()));
}

pub fn camera_controller(
    mut cameras: Query<&mut Transform, With<Camera3d>>,
    mut viewport: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = cameras.single_mut() else {
        return;
    };

    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
        viewport.look(mouse_delta);
    }

    let scroll: f32 = scroll_events
        .read()
        .map(|ev| match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        })
        .sum();
    if scroll.abs() > f32::EPSILON {
        viewport.dolly(scroll);
    }

    let mut input = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        input.z -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        input.z += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        input.x += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        input.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        input.y += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyQ) {
        input.y -= 1.0;
    }
    let mut speed_factor = 1.0;
    if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
        speed_factor *= 3.5;
    }
    if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
        speed_factor *= 0.25;
    }
    viewport.fly(input, speed_factor, time.delta_secs());

    let target = viewport.transform();
    let lerp_speed = (12.0 * time.delta_secs()).min(1.0);
    camera_transform.translation = camera_transform
        .translation
        .lerp(target.translation, lerp_speed);
    camera_transform.rotation = camera_transform.rotation.slerp(target.rotation, lerp_speed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut camera = ViewportCamera::default();
        camera.look(Vec2::new(0.0, -10_000.0));
        assert!((camera.pitch - PITCH_LIMIT).abs() < 1e-6);
    }

    #[test]
    fn dolly_moves_along_view() {
        let mut camera = ViewportCamera::new(Vec3::new(0.0, 10.0, 0.0), 0.0, 0.0);
        camera.dolly(1.0);
        assert!(camera.focus_point.z < 0.0);
        assert!((camera.focus_point.y - 10.0).abs() < 1e-4);
    }

    #[test]
    fn fly_up_ignores_pitch() {
        let mut camera = ViewportCamera::new(Vec3::new(0.0, 10.0, 0.0), -1.0, 0.3);
        camera.fly(Vec3::Y, 1.0, 0.1);
        assert!(camera.focus_point.x.abs() < 1e-4);
        assert!(camera.focus_point.y > 10.0);
    }
}
