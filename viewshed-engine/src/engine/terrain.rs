//! Terrain heights: a regular geographic heightmap, the async query seam used
//! by height-mode switching, and the Bevy systems that run those queries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future};

use crate::viewshed::error::ViewshedError;
use crate::viewshed::geodesy::Cartographic;
use crate::viewshed::height_mode::TerrainToken;
use crate::viewshed::manager::ViewshedManager;

pub type TerrainFuture =
    Pin<Box<dyn Future<Output = Result<Vec<Cartographic>, ViewshedError>> + Send>>;

/// Asynchronous terrain sampling. The answer carries one coordinate per input,
/// with `height` replaced by the terrain height.
pub trait TerrainQuery: Send + Sync {
    fn sample_heights(&self, coordinates: Vec<Cartographic>) -> TerrainFuture;
}

/// Geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRect {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoRect {
    pub fn around(center: Cartographic, half_extent_degrees: f64) -> Self {
        Self {
            west: center.longitude - half_extent_degrees,
            south: center.latitude - half_extent_degrees,
            east: center.longitude + half_extent_degrees,
            north: center.latitude + half_extent_degrees,
        }
    }

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

/// Heights on a `columns x rows` grid covering `bounds`, row 0 at the south edge.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTerrain {
    bounds: GeoRect,
    columns: usize,
    rows: usize,
    heights: Vec<f32>,
}

impl HeightmapTerrain {
    pub fn new(
        bounds: GeoRect,
        columns: usize,
        rows: usize,
        heights: Vec<f32>,
    ) -> Result<Self, ViewshedError> {
        if columns < 2 || rows < 2 {
            return Err(ViewshedError::Terrain(format!(
                "heightmap needs at least 2x2 samples, got {columns}x{rows}"
            )));
        }
        if heights.len() != columns * rows {
            return Err(ViewshedError::Terrain(format!(
                "expected {} heights, got {}",
                columns * rows,
                heights.len()
            )));
        }
        if !(bounds.east > bounds.west && bounds.north > bounds.south) {
            return Err(ViewshedError::Terrain(format!("empty bounds {bounds:?}")));
        }
        Ok(Self {
            bounds,
            columns,
            rows,
            heights,
        })
    }

    pub fn flat(bounds: GeoRect, height: f32) -> Result<Self, ViewshedError> {
        Self::new(bounds, 2, 2, vec![height; 4])
    }

    /// Rolling hills around `center`, used when no terrain data is configured.
    pub fn procedural(center: Cartographic, half_extent_degrees: f64, resolution: usize) -> Self {
        let resolution = resolution.max(2);
        let base = center.height as f32;
        let mut heights = Vec::with_capacity(resolution * resolution);
        for row in 0..resolution {
            for column in 0..resolution {
                let u = column as f32 / (resolution - 1) as f32 * std::f32::consts::TAU;
                let v = row as f32 / (resolution - 1) as f32 * std::f32::consts::TAU;
                let hills = 25.0 * (u * 1.5).sin() * (v * 1.2).cos() + 8.0 * (u * 4.0 + v * 3.0).sin();
                heights.push(base + hills);
            }
        }
        Self {
            bounds: GeoRect::around(center, half_extent_degrees),
            columns: resolution,
            rows: resolution,
            heights,
        }
    }

    pub fn bounds(&self) -> GeoRect {
        self.bounds
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.bounds.contains(longitude, latitude)
    }

    /// Geographic position of a grid sample.
    pub fn sample_position(&self, column: usize, row: usize) -> Cartographic {
        let column = column.min(self.columns - 1);
        let row = row.min(self.rows - 1);
        let longitude = self.bounds.west
            + (self.bounds.east - self.bounds.west) * column as f64 / (self.columns - 1) as f64;
        let latitude = self.bounds.south
            + (self.bounds.north - self.bounds.south) * row as f64 / (self.rows - 1) as f64;
        Cartographic::new(longitude, latitude, self.heights[row * self.columns + column] as f64)
    }

    /// Bilinear height; positions outside the grid clamp to its edge.
    pub fn height_at(&self, longitude: f64, latitude: f64) -> f64 {
        let norm_x = ((longitude - self.bounds.west) / (self.bounds.east - self.bounds.west))
            .clamp(0.0, 1.0);
        let norm_z = ((latitude - self.bounds.south) / (self.bounds.north - self.bounds.south))
            .clamp(0.0, 1.0);

        let pixel_x = norm_x * (self.columns - 1) as f64;
        let pixel_z = norm_z * (self.rows - 1) as f64;
        let x0 = (pixel_x.floor() as usize).min(self.columns - 1);
        let z0 = (pixel_z.floor() as usize).min(self.rows - 1);
        let x1 = (x0 + 1).min(self.columns - 1);
        let z1 = (z0 + 1).min(self.rows - 1);
        let wx = pixel_x - x0 as f64;
        let wz = pixel_z - z0 as f64;

        let h = |x: usize, z: usize| self.heights[z * self.columns + x] as f64;
        let top = h(x0, z0) * (1.0 - wx) + h(x1, z0) * wx;
        let bottom = h(x0, z1) * (1.0 - wx) + h(x1, z1) * wx;
        top * (1.0 - wz) + bottom * wz
    }
}

impl TerrainQuery for HeightmapTerrain {
    fn sample_heights(&self, coordinates: Vec<Cartographic>) -> TerrainFuture {
        let sampled = coordinates
            .into_iter()
            .map(|c| c.with_height(self.height_at(c.longitude, c.latitude)))
            .collect::<Vec<_>>();
        Box::pin(async move { Ok(sampled) })
    }
}

/// Terrain used for picking and drawing.
#[derive(Resource, Clone)]
pub struct SceneTerrain(pub Arc<HeightmapTerrain>);

/// Terrain used for height-mode queries; may differ from the drawn terrain.
#[derive(Resource, Clone)]
pub struct TerrainProvider(pub Arc<dyn TerrainQuery>);

#[derive(Component)]
pub struct TerrainTask {
    token: TerrainToken,
    task: Task<Result<Vec<Cartographic>, ViewshedError>>,
}

/// Start a background query for every terrain request the manager issued.
pub fn spawn_terrain_queries(
    mut commands: Commands,
    mut manager: ResMut<ViewshedManager>,
    provider: Res<TerrainProvider>,
) {
    let pool = AsyncComputeTaskPool::get();
    for request in manager.take_terrain_requests() {
        let query = provider.0.clone();
        let coordinates = request.coordinates;
        let task = pool.spawn(async move { query.sample_heights(coordinates).await });
        commands.spawn(TerrainTask {
            token: request.token,
            task,
        });
    }
}

/// Hand finished queries back to the manager, which drops stale answers.
pub fn poll_terrain_queries(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut TerrainTask)>,
    mut manager: ResMut<ViewshedManager>,
) {
    for (entity, mut pending) in &mut tasks {
        let Some(result) = block_on(future::poll_once(&mut pending.task)) else {
            continue;
        };
        if !manager.complete_terrain_request(pending.token, result) {
            debug!("Terrain answer for {} not applied", pending.token.viewshed);
        }
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> HeightmapTerrain {
        // 3x2 grid rising 10 m per column.
        HeightmapTerrain::new(
            GeoRect {
                west: 0.0,
                south: 0.0,
                east: 2.0,
                north: 1.0,
            },
            3,
            2,
            vec![0.0, 10.0, 20.0, 0.0, 10.0, 20.0],
        )
        .unwrap()
    }

    #[test]
    fn bilinear_between_samples() {
        let terrain = ramp();
        assert_eq!(terrain.height_at(0.5, 0.5), 5.0);
        assert_eq!(terrain.height_at(1.5, 0.0), 15.0);
    }

    #[test]
    fn outside_positions_clamp_to_edge() {
        let terrain = ramp();
        assert_eq!(terrain.height_at(-5.0, 0.5), 0.0);
        assert_eq!(terrain.height_at(9.0, 9.0), 20.0);
    }

    #[test]
    fn rejects_mismatched_grid() {
        let bounds = GeoRect::around(Cartographic::default(), 1.0);
        assert!(HeightmapTerrain::new(bounds, 2, 2, vec![0.0; 3]).is_err());
        assert!(HeightmapTerrain::new(bounds, 1, 4, vec![0.0; 4]).is_err());
    }

    #[test]
    fn query_replaces_heights() {
        let terrain = ramp();
        let result = block_on(terrain.sample_heights(vec![Cartographic::new(1.0, 0.5, 999.0)]));
        assert_eq!(result.unwrap(), vec![Cartographic::new(1.0, 0.5, 10.0)]);
    }

    #[test]
    fn procedural_terrain_is_centred() {
        let center = Cartographic::new(8.54, 47.37, 400.0);
        let terrain = HeightmapTerrain::procedural(center, 0.005, 33);
        assert!(terrain.contains(center.longitude, center.latitude));
        assert_eq!(terrain.resolution(), (33, 33));
        let h = terrain.height_at(center.longitude, center.latitude);
        assert!((h - 400.0).abs() < 40.0);
    }
}
