//! Math utilities and types
//!
//! Provides the double-precision math types used by the cull pipeline.
//! Matrices follow the column-vector convention: a local point `p` maps to
//! eye space as `model_view * p`, translation lives in column 3 and a
//! perspective projection carries `-1` at `(3, 2)`.

pub use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// 3D vector type
pub type Vec3d = Vector3<f64>;

/// 4D vector type
pub type Vec4d = Vector4<f64>;

/// 4x4 matrix type
pub type Mat4d = Matrix4<f64>;

/// 3D point type
pub type Point3d = Point3<f64>;

/// Tolerance used when classifying a projection matrix
pub const PROJECTION_EPSILON: f64 = 1.0e-6;

/// Distance of a local-space point in front of the eye
///
/// Uses only the third row of `model_view`, so the result is the negated
/// eye-space z coordinate: positive in front of the viewer.
#[inline]
pub fn eye_distance(coord: &Vec3d, model_view: &Mat4d) -> f64 {
    -(coord.x * model_view[(2, 0)]
        + coord.y * model_view[(2, 1)]
        + coord.z * model_view[(2, 2)]
        + model_view[(2, 3)])
}

/// Returns true when `projection` has no perspective row
pub fn is_orthographic(projection: &Mat4d) -> bool {
    projection[(3, 0)].abs() < PROJECTION_EPSILON
        && projection[(3, 1)].abs() < PROJECTION_EPSILON
        && projection[(3, 2)].abs() < PROJECTION_EPSILON
}

/// Returns true when every element of the matrix is finite
pub fn is_finite(matrix: &Mat4d) -> bool {
    matrix.iter().all(|v| v.is_finite())
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees.to_radians()
    }

    /// Approximate equality used for ordering diagnostics
    pub fn nearly_equal(a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b).abs() <= 1.0e-6 * scale
    }
}

/// Extension trait for Mat4d with projection and view constructors
pub trait Mat4Ext {
    /// OpenGL-style perspective projection (clip z in [-1, 1])
    fn perspective(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Mat4d;

    /// OpenGL-style orthographic projection
    fn orthographic(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4d;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3d, target: Vec3d, up: Vec3d) -> Mat4d;
}

impl Mat4Ext for Mat4d {
    fn perspective(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Mat4d {
        Mat4d::new_perspective(aspect, utils::deg_to_rad(fov_y_degrees), near, far)
    }

    fn orthographic(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4d {
        Mat4d::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3d, target: Vec3d, up: Vec3d) -> Mat4d {
        Mat4d::look_at_rh(&Point3d::from(eye), &Point3d::from(target), &up)
    }
}
