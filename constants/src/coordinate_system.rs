/// Local tangent plane (east, north, up) to scene world (Y-up) transform.
/// Row-major: [x_world, y_world, z_world] = M * [east, north, up]
/// (E→X, U→Y, -N→Z)
pub const ENU_TO_WORLD: [[f64; 3]; 3] = [
    [1.0, 0.0, 0.0],  // X = E
    [0.0, 0.0, 1.0],  // Y = U
    [0.0, -1.0, 0.0], // Z = -N
];

/// Map local east/north/up offsets into scene world axes.
pub fn enu_to_world(east: f64, north: f64, up: f64) -> (f64, f64, f64) {
    apply(&ENU_TO_WORLD, [east, north, up])
}

/// Inverse of [`enu_to_world`]. The matrix is orthonormal so its transpose is used.
pub fn world_to_enu(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let mut transposed = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            transposed[i][j] = ENU_TO_WORLD[j][i];
        }
    }
    apply(&transposed, [x, y, z])
}

fn apply(matrix: &[[f64; 3]; 3], input: [f64; 3]) -> (f64, f64, f64) {
    let mut output = [0.0; 3];

    for i in 0..3 {
        for j in 0..3 {
            output[i] += matrix[i][j] * input[j];
        }
    }

    (output[0], output[1], output[2])
}
