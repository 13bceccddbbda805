//! Planes and convex polytopes for visibility tests

use crate::foundation::math::{Mat4d, Vec3d, Vec4d};
use crate::scene::{BoundingBox, BoundingSphere};

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized unless degenerate)
    pub normal: Vec3d,
    /// Distance from origin along the normal
    pub distance: f64,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3d, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: &Vec3d) -> f64 {
        self.normal.dot(point) + self.distance
    }

    fn as_vec4(&self) -> Vec4d {
        Vec4d::new(self.normal.x, self.normal.y, self.normal.z, self.distance)
    }

    /// Move this plane from the space `matrix` maps into, back into the
    /// space it maps from. `matrix` is the forward transform, so no inverse
    /// is needed.
    pub fn transform_providing_inverse(&mut self, matrix: &Mat4d) {
        let v = matrix.transpose() * self.as_vec4();
        let normal = Vec3d::new(v.x, v.y, v.z);
        let length = normal.norm();
        if length > f64::EPSILON {
            self.normal = normal / length;
            self.distance = v.w / length;
        } else {
            self.normal = normal;
            self.distance = v.w;
        }
    }
}

/// Convex volume bounded by planes; normals point inwards
#[derive(Debug, Clone, Default)]
pub struct Polytope {
    planes: Vec<Plane>,
}

impl Polytope {
    /// Create a polytope from planes
    pub fn new(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    /// Clip-space unit frustum
    ///
    /// The four side planes are always present; near and far are optional.
    pub fn unit_frustum(with_near: bool, with_far: bool) -> Self {
        let mut planes = vec![
            Plane::new(Vec3d::new(1.0, 0.0, 0.0), 1.0),
            Plane::new(Vec3d::new(-1.0, 0.0, 0.0), 1.0),
            Plane::new(Vec3d::new(0.0, 1.0, 0.0), 1.0),
            Plane::new(Vec3d::new(0.0, -1.0, 0.0), 1.0),
        ];
        if with_near {
            planes.push(Plane::new(Vec3d::new(0.0, 0.0, 1.0), 1.0));
        }
        if with_far {
            planes.push(Plane::new(Vec3d::new(0.0, 0.0, -1.0), 1.0));
        }
        Self { planes }
    }

    /// Local frustum for a model-view/projection pair
    pub fn from_matrices(model_view: &Mat4d, projection: &Mat4d, with_near: bool, with_far: bool) -> Self {
        let mut polytope = Self::unit_frustum(with_near, with_far);
        polytope.transform_providing_inverse(&(projection * model_view));
        polytope
    }

    /// Transform every plane, see [`Plane::transform_providing_inverse`]
    pub fn transform_providing_inverse(&mut self, matrix: &Mat4d) {
        for plane in &mut self.planes {
            plane.transform_providing_inverse(matrix);
        }
    }

    /// Planes bounding this polytope
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// True unless the sphere lies entirely outside one plane
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> bool {
        if !sphere.valid() {
            return false;
        }
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(&sphere.center) >= -sphere.radius)
    }

    /// True unless the box lies entirely outside one plane
    pub fn contains_box(&self, bb: &BoundingBox) -> bool {
        if !bb.valid() {
            return false;
        }
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal
            let mut p = bb.min;
            if plane.normal.x >= 0.0 { p.x = bb.max.x; }
            if plane.normal.y >= 0.0 { p.y = bb.max.y; }
            if plane.normal.z >= 0.0 { p.z = bb.max.z; }
            plane.distance_to_point(&p) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    fn camera_frustum() -> Polytope {
        let view = Mat4d::look_at(Vec3d::zeros(), Vec3d::new(0.0, 0.0, -1.0), Vec3d::y());
        let proj = Mat4d::perspective(90.0, 1.0, 1.0, 100.0);
        Polytope::from_matrices(&view, &proj, false, false)
    }

    #[test]
    fn test_sides_only_frustum_ignores_distance() {
        let frustum = camera_frustum();
        assert_eq!(frustum.planes().len(), 4);
        let far_away = BoundingSphere::new(Vec3d::new(0.0, 0.0, -1.0e9), 1.0);
        assert!(frustum.contains_sphere(&far_away));
    }

    #[test]
    fn test_sphere_outside_side_plane() {
        let frustum = camera_frustum();
        // 90 degree fov: x > -z is outside the right plane
        let outside = BoundingSphere::new(Vec3d::new(50.0, 0.0, -10.0), 1.0);
        let straddling = BoundingSphere::new(Vec3d::new(10.5, 0.0, -10.0), 1.0);
        assert!(!frustum.contains_sphere(&outside));
        assert!(frustum.contains_sphere(&straddling));
    }

    #[test]
    fn test_box_behind_viewer_is_rejected() {
        let frustum = camera_frustum();
        let behind = BoundingBox::new(Vec3d::new(-1.0, -1.0, 5.0), Vec3d::new(1.0, 1.0, 7.0));
        let ahead = BoundingBox::new(Vec3d::new(-1.0, -1.0, -7.0), Vec3d::new(1.0, 1.0, -5.0));
        assert!(!frustum.contains_box(&behind));
        assert!(frustum.contains_box(&ahead));
    }

    #[test]
    fn test_near_plane_culls_close_geometry() {
        let view = Mat4d::identity();
        let proj = Mat4d::perspective(90.0, 1.0, 1.0, 100.0);
        let frustum = Polytope::from_matrices(&view, &proj, true, true);
        let too_close = BoundingBox::new(Vec3d::new(-0.1, -0.1, -0.5), Vec3d::new(0.1, 0.1, -0.4));
        let too_far = BoundingBox::new(Vec3d::new(-1.0, -1.0, -300.0), Vec3d::new(1.0, 1.0, -200.0));
        assert!(!frustum.contains_box(&too_close));
        assert!(!frustum.contains_box(&too_far));
    }
}
