//! Geometric primitives: 3-vectors, gradient samples and disparity planes.
//!
//! A `DisparityPlane` models disparity as an affine function of pixel
//! position, `d(x, y) = a*x + b*y + c`, so each pixel hypothesis describes a
//! locally slanted surface instead of a single scalar offset.

use std::ops::{Add, Neg};

/// 3-component float vector used for plane normals.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Returns the unit-length vector, or `self` unchanged for the zero
    /// vector.
    #[inline]
    pub fn normalized(self) -> Self {
        let sq = self.dot(self);
        if sq == 0.0 {
            return self;
        }
        let inv = 1.0 / sq.sqrt();
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl Add for Vector3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Per-pixel Sobel gradient sample.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Gradient {
    pub x: i16,
    pub y: i16,
}

impl Gradient {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// Affine disparity plane `d(x, y) = a*x + b*y + c`.
///
/// Planes are replaced wholesale when a better hypothesis wins a cost
/// comparison, never mutated in place.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DisparityPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl DisparityPlane {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }

    /// Builds the plane through pixel `(x, y)` with disparity `d` and surface
    /// normal `normal`.
    ///
    /// Degenerate when `normal.z == 0`; callers guarantee a non-zero z
    /// component.
    pub fn from_normal(x: i32, y: i32, normal: Vector3, d: f32) -> Self {
        Self {
            a: -normal.x / normal.z,
            b: -normal.y / normal.z,
            c: (normal.x * x as f32 + normal.y * y as f32 + normal.z * d) / normal.z,
        }
    }

    /// Disparity of the plane at pixel `(x, y)`.
    #[inline]
    pub fn to_disparity(self, x: i32, y: i32) -> f32 {
        self.a * x as f32 + self.b * y as f32 + self.c
    }

    /// Unit normal of the plane.
    pub fn to_normal(self) -> Vector3 {
        Vector3::new(self.a, self.b, -1.0).normalized()
    }

    /// Transforms the plane into the opposite view's coordinate frame.
    ///
    /// With `xr = xl - d`, `yr = yl` and opposite disparity signs, the plane
    /// `d = a*xl + b*yl + c` becomes `d = a/(a-1)*xr + b/(a-1)*yr + c/(a-1)`.
    /// Singular at `a == 1`: the result is non-finite, its aggregated cost
    /// takes the out-of-range punishment at every patch pixel and the plane
    /// loses every strict cost comparison, so it is never installed.
    pub fn to_other_view(self) -> Self {
        let denom = 1.0 / (self.a - 1.0);
        Self::new(self.a * denom, self.b * denom, self.c * denom)
    }
}
