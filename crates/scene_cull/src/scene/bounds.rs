//! Bounding volumes used by culling and distance accumulation

use crate::foundation::math::{Mat4d, Point3d, Vec3d};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3d,
    /// Maximum corner of the bounding box
    pub max: Vec3d,
}

impl BoundingBox {
    /// Create a new box from min and max points
    pub fn new(min: Vec3d, max: Vec3d) -> Self {
        Self { min, max }
    }

    /// Create an invalid box that any expansion will replace
    pub fn empty() -> Self {
        Self {
            min: Vec3d::repeat(f64::INFINITY),
            max: Vec3d::repeat(f64::NEG_INFINITY),
        }
    }

    /// Create a box centered at a point with given half extents
    pub fn from_center_extents(center: Vec3d, extents: Vec3d) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// A box is valid once it encloses at least one point
    pub fn valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3d {
        (self.min + self.max) * 0.5
    }

    /// Radius of the sphere passing through all corners
    pub fn radius(&self) -> f64 {
        (self.max - self.min).norm() * 0.5
    }

    /// Corner `pos` of the box
    ///
    /// Bit 1 selects max x, bit 2 max y, bit 4 max z.
    pub fn corner(&self, pos: usize) -> Vec3d {
        Vec3d::new(
            if pos & 1 != 0 { self.max.x } else { self.min.x },
            if pos & 2 != 0 { self.max.y } else { self.min.y },
            if pos & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Grow the box to include a point
    pub fn expand_by_point(&mut self, point: &Vec3d) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow the box to include another box
    pub fn expand_by_box(&mut self, other: &BoundingBox) {
        if !other.valid() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Grow the box to include a sphere
    pub fn expand_by_sphere(&mut self, sphere: &BoundingSphere) {
        if !sphere.valid() {
            return;
        }
        let r = Vec3d::repeat(sphere.radius);
        self.min = self.min.inf(&(sphere.center - r));
        self.max = self.max.sup(&(sphere.center + r));
    }

    /// Axis-aligned box enclosing this box after transformation
    pub fn transformed(&self, matrix: &Mat4d) -> BoundingBox {
        let mut result = BoundingBox::empty();
        if !self.valid() {
            return result;
        }
        for i in 0..8 {
            let p = matrix.transform_point(&Point3d::from(self.corner(i)));
            result.expand_by_point(&p.coords);
        }
        result
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Bounding sphere; a negative radius marks it invalid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center
    pub center: Vec3d,
    /// Sphere radius
    pub radius: f64,
}

impl BoundingSphere {
    /// Create a sphere from center and radius
    pub fn new(center: Vec3d, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Create an invalid sphere
    pub fn invalid() -> Self {
        Self {
            center: Vec3d::zeros(),
            radius: -1.0,
        }
    }

    /// Smallest sphere around a box
    pub fn from_box(bb: &BoundingBox) -> Self {
        if bb.valid() {
            Self::new(bb.center(), bb.radius())
        } else {
            Self::invalid()
        }
    }

    /// Whether the sphere encloses anything
    pub fn valid(&self) -> bool {
        self.radius >= 0.0
    }

    /// Grow the radius, keeping the center, so `other` is enclosed
    pub fn expand_radius_by(&mut self, other: &BoundingSphere) {
        if !other.valid() {
            return;
        }
        if self.valid() {
            let r = (other.center - self.center).norm() + other.radius;
            if r > self.radius {
                self.radius = r;
            }
        } else {
            *self = *other;
        }
    }

    /// Sphere enclosing this one after transformation
    ///
    /// Scaling is handled by transforming three axis offsets and keeping
    /// the largest resulting length.
    pub fn transformed(&self, matrix: &Mat4d) -> BoundingSphere {
        if !self.valid() {
            return *self;
        }
        let center = matrix.transform_point(&Point3d::from(self.center)).coords;
        let radius = [Vec3d::x(), Vec3d::y(), Vec3d::z()]
            .iter()
            .map(|axis| {
                let offset = Point3d::from(self.center + axis * self.radius);
                (matrix.transform_point(&offset).coords - center).norm()
            })
            .fold(0.0, f64::max);
        BoundingSphere::new(center, radius)
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_corners_follow_bit_layout() {
        let bb = BoundingBox::new(Vec3d::new(-1.0, -2.0, -3.0), Vec3d::new(1.0, 2.0, 3.0));
        assert_eq!(bb.corner(0), Vec3d::new(-1.0, -2.0, -3.0));
        assert_eq!(bb.corner(1), Vec3d::new(1.0, -2.0, -3.0));
        assert_eq!(bb.corner(6), Vec3d::new(-1.0, 2.0, 3.0));
        assert_eq!(bb.corner(7), Vec3d::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_empty_box_is_invalid_until_expanded() {
        let mut bb = BoundingBox::empty();
        assert!(!bb.valid());
        bb.expand_by_point(&Vec3d::new(1.0, 1.0, 1.0));
        assert!(bb.valid());
        assert_relative_eq!(bb.radius(), 0.0);
    }

    #[test]
    fn test_sphere_expand_radius_keeps_center() {
        let mut s = BoundingSphere::new(Vec3d::zeros(), 1.0);
        s.expand_radius_by(&BoundingSphere::new(Vec3d::new(3.0, 0.0, 0.0), 1.0));
        assert_eq!(s.center, Vec3d::zeros());
        assert_relative_eq!(s.radius, 4.0);
    }

    #[test]
    fn test_sphere_transformed_by_scale() {
        let s = BoundingSphere::new(Vec3d::new(1.0, 0.0, 0.0), 1.0);
        let m = Mat4d::new_scaling(2.0);
        let t = s.transformed(&m);
        assert_relative_eq!(t.center, Vec3d::new(2.0, 0.0, 0.0));
        assert_relative_eq!(t.radius, 2.0);
    }
}
