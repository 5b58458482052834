//! Shape descriptors

use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Collision shape of a body. Immutable once the body exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeDescriptor {
    /// Box with half-extents
    Box {
        half_extents: [f32; 3],
    },
    /// Sphere with radius
    Sphere {
        radius: f32,
    },
    /// Infinite half-space, normal along the body's local +Y
    Plane,
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self::cube(0.4)
    }
}

impl ShapeDescriptor {
    /// Cube with the given edge length
    pub fn cube(size: f32) -> Self {
        Self::from_size(size, size, size)
    }

    /// Box from full size
    pub fn from_size(width: f32, height: f32, depth: f32) -> Self {
        Self::Box {
            half_extents: [width * 0.5, height * 0.5, depth * 0.5],
        }
    }

    /// Sphere shape
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Wire name of the shape kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Plane => "plane",
        }
    }

    /// Wire dimensions: full edge lengths for boxes, `[radius]` for spheres
    pub fn dimensions(&self) -> Vec<f32> {
        match self {
            Self::Box { half_extents } => half_extents.iter().map(|h| h * 2.0).collect(),
            Self::Sphere { radius } => vec![*radius],
            Self::Plane => Vec::new(),
        }
    }

    /// Rebuild a descriptor from its wire kind and dimensions
    pub fn from_parts(kind: &str, dimensions: &[f32]) -> PhysicsResult<Self> {
        let shape = match (kind, dimensions) {
            ("box", [x, y, z]) => Self::from_size(*x, *y, *z),
            // A single edge length is a cube
            ("box", [size]) => Self::cube(*size),
            ("sphere", [radius]) => Self::sphere(*radius),
            ("plane", []) => Self::Plane,
            _ => {
                return Err(PhysicsError::InvalidShape(format!(
                    "{} with dimensions {:?}",
                    kind, dimensions
                )))
            }
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Reject non-positive or non-finite dimensions
    pub fn validate(&self) -> PhysicsResult<()> {
        let ok = match self {
            Self::Box { half_extents } => half_extents.iter().all(|h| h.is_finite() && *h > 0.0),
            Self::Sphere { radius } => radius.is_finite() && *radius > 0.0,
            Self::Plane => true,
        };
        if ok {
            Ok(())
        } else {
            Err(PhysicsError::InvalidShape(format!("{:?}", self)))
        }
    }

    /// Build a Rapier collider builder for this shape
    pub(crate) fn to_rapier_builder(&self) -> rapier::ColliderBuilder {
        match self {
            Self::Box { half_extents } => {
                rapier::ColliderBuilder::cuboid(half_extents[0], half_extents[1], half_extents[2])
            }
            Self::Sphere { radius } => rapier::ColliderBuilder::ball(*radius),
            Self::Plane => rapier::ColliderBuilder::halfspace(rapier::Vector::y_axis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_dimensions_are_full_size() {
        let shape = ShapeDescriptor::cube(0.4);
        assert_eq!(shape.kind(), "box");
        assert_eq!(shape, ShapeDescriptor::Box { half_extents: [0.2, 0.2, 0.2] });
        let dims = shape.dimensions();
        assert_eq!(dims.len(), 3);
        assert!((dims[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            ShapeDescriptor::from_parts("sphere", &[0.5]).unwrap(),
            ShapeDescriptor::sphere(0.5)
        );
        assert_eq!(ShapeDescriptor::from_parts("plane", &[]).unwrap(), ShapeDescriptor::Plane);
        assert_eq!(
            ShapeDescriptor::from_parts("box", &[1.0]).unwrap(),
            ShapeDescriptor::cube(1.0)
        );
    }

    #[test]
    fn test_from_parts_rejects_garbage() {
        assert!(ShapeDescriptor::from_parts("torus", &[1.0]).is_err());
        assert!(ShapeDescriptor::from_parts("box", &[1.0, 2.0]).is_err());
        assert!(ShapeDescriptor::from_parts("sphere", &[-1.0]).is_err());
        assert!(ShapeDescriptor::from_parts("box", &[1.0, f32::NAN, 1.0]).is_err());
    }
}
