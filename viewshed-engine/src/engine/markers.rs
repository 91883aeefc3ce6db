//! Immediate-mode drawing of the active surface: observer markers, the
//! installed shadow source outline, terrain grid and pointer feedback.

use std::f32::consts::FRAC_PI_2;

use bevy::math::DVec3;
use bevy::prelude::*;
use constants::render_settings::{
    MARKER_APEX_SPHERE_SIZE, MARKER_COLOR, MARKER_FAR_PLANE_SEGMENTS,
    MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE, TERRAIN_GRID_COLOR,
};

use super::picking::PointerHover;
use super::scene_frame::SceneFrame;
use super::terrain::SceneTerrain;
use crate::viewshed::frustum::{MarkerPrimitive, RgbaColor, ShadowProjection};
use crate::viewshed::manager::ViewshedManager;
use crate::viewshed::surface::ShadowSource;

/// Grid lines drawn every this many heightmap samples.
const GRID_STRIDE: usize = 4;

fn color(rgba: [f32; 4]) -> Color {
    Color::srgba(rgba[0], rgba[1], rgba[2], rgba[3])
}

fn opaque(rgba: RgbaColor) -> Color {
    let [r, g, b, _] = rgba.0;
    Color::srgb(r, g, b)
}

/// Far-plane corners (ECEF) of a perspective frustum; `fov` spans the wider side.
pub fn frustum_corners(
    apex: DVec3,
    direction: DVec3,
    up: DVec3,
    fov_degrees: f64,
    aspect_ratio: f64,
    range: f64,
) -> [DVec3; 4] {
    let right = direction.cross(up).normalize_or_zero();
    let half = (fov_degrees.to_radians() * 0.5).tan();
    let (half_width, half_height) = if aspect_ratio >= 1.0 {
        (half, half / aspect_ratio)
    } else {
        (half * aspect_ratio, half)
    };
    let center = apex + direction * range;
    let dx = right * half_width * range;
    let dy = up * half_height * range;
    [
        center - dx - dy,
        center + dx - dy,
        center + dx + dy,
        center - dx + dy,
    ]
}

fn draw_frustum(
    gizmos: &mut Gizmos,
    frame: &SceneFrame,
    corners: [DVec3; 4],
    apex: DVec3,
    line: Color,
) {
    let apex = frame.ecef_to_world(apex);
    let corners = corners.map(|corner| frame.ecef_to_world(corner));
    for corner in corners {
        gizmos.line(apex, corner, line);
    }
    gizmos.linestrip(corners.into_iter().chain([corners[0]]), line);
}

fn horizontal_circle(gizmos: &mut Gizmos, center: Vec3, radius: f32, line: Color) {
    gizmos
        .circle(
            Isometry3d::new(center, Quat::from_rotation_x(FRAC_PI_2)),
            radius,
            line,
        )
        .resolution(MARKER_FAR_PLANE_SEGMENTS as u32);
}

/// Markers of every viewshed bound to the manager's surface.
pub fn draw_markers(mut gizmos: Gizmos, manager: Res<ViewshedManager>, frame: Res<SceneFrame>) {
    let line = color(MARKER_COLOR);
    for (_, marker) in manager.surface().markers() {
        match marker {
            MarkerPrimitive::Cone {
                apex,
                direction,
                up,
                fov,
                aspect_ratio,
                range,
            } => {
                let corners = frustum_corners(apex, direction, up, fov, aspect_ratio, range);
                gizmos.sphere(
                    Isometry3d::from_translation(frame.ecef_to_world(apex)),
                    MARKER_APEX_SPHERE_SIZE,
                    line,
                );
                draw_frustum(&mut gizmos, &frame, corners, apex, line);
            }
            MarkerPrimitive::Point { apex } => {
                gizmos.sphere(
                    Isometry3d::from_translation(frame.ecef_to_world(apex)),
                    MARKER_APEX_SPHERE_SIZE,
                    line,
                );
            }
        }
    }
}

/// Outline of the surface's current shadow source, in the viewshed's visible colour.
pub fn draw_shadow_source(
    mut gizmos: Gizmos,
    manager: Res<ViewshedManager>,
    frame: Res<SceneFrame>,
) {
    match manager.surface().shadow_source() {
        Some(ShadowSource::Viewshed { projection, .. }) => match projection {
            ShadowProjection::Perspective {
                apex,
                direction,
                up,
                frustum,
                colors,
            } => {
                let corners = frustum_corners(
                    apex,
                    direction,
                    up,
                    frustum.fov,
                    frustum.aspect_ratio,
                    frustum.far,
                );
                let world = corners.map(|corner| frame.ecef_to_world(corner));
                gizmos.linestrip(
                    world.into_iter().chain([world[0]]),
                    opaque(colors.visible_color),
                );
            }
            ShadowProjection::Omnidirectional {
                apex, far, colors, ..
            } => {
                horizontal_circle(
                    &mut gizmos,
                    frame.ecef_to_world(apex),
                    far as f32,
                    opaque(colors.visible_color),
                );
            }
        },
        Some(ShadowSource::External { .. }) | None => {}
    }
}

/// Heightfield-following grid over the scene terrain.
pub fn draw_terrain_grid(mut gizmos: Gizmos, terrain: Res<SceneTerrain>, frame: Res<SceneFrame>) {
    let line = color(TERRAIN_GRID_COLOR);
    let (columns, rows) = terrain.0.resolution();

    for row in (0..rows).step_by(GRID_STRIDE) {
        gizmos.linestrip(
            (0..columns).map(|column| frame.to_world(terrain.0.sample_position(column, row))),
            line,
        );
    }
    for column in (0..columns).step_by(GRID_STRIDE) {
        gizmos.linestrip(
            (0..rows).map(|row| frame.to_world(terrain.0.sample_position(column, row))),
            line,
        );
    }
}

pub fn draw_pointer_hover(
    mut gizmos: Gizmos,
    hover: Res<PointerHover>,
    manager: Res<ViewshedManager>,
) {
    if !manager.wants_pointer() {
        return;
    }
    if let Some(position) = hover.0 {
        gizmos.sphere(
            Isometry3d::from_translation(position),
            MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE,
            Color::WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_frustum_corners_span_range() {
        let corners = frustum_corners(DVec3::ZERO, DVec3::X, DVec3::Z, 90.0, 1.0, 10.0);
        for corner in corners {
            assert!((corner.x - 10.0).abs() < 1e-9);
            assert!((corner.y.abs() - 10.0).abs() < 1e-9);
            assert!((corner.z.abs() - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn narrow_aspect_shrinks_width() {
        let corners = frustum_corners(DVec3::ZERO, DVec3::X, DVec3::Z, 90.0, 0.5, 10.0);
        assert!((corners[0].y.abs() - 5.0).abs() < 1e-9);
        assert!((corners[0].z.abs() - 10.0).abs() < 1e-9);
    }
}
