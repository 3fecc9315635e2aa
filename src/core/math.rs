//! Numeric primitives shared by the controller and the pheromone layer.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::ops::{Add, Mul, Sub};

/// 2D arena coordinate (metres).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Vector of `length` pointing along `angle` (radians, counter-clockwise from +x).
    pub fn from_polar(length: f64, angle: f64) -> Self {
        Vec2::new(length * angle.cos(), length * angle.sin())
    }

    pub fn square_length(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f64 {
        self.square_length().sqrt()
    }

    /// Angle of the vector in (-π, π].
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn square_distance(self, other: Vec2) -> f64 {
        (self - other).square_length()
    }

    /// True when `other` lies strictly inside a disc of `radius` around `self`.
    #[inline]
    pub fn within(self, other: Vec2, radius: f64) -> bool {
        self.square_distance(other) < radius * radius
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Vec2::new(x, y)
    }
}

/// `value · e^(−λt)`
#[inline]
pub fn exponential_decay(value: f64, time: f64, lambda: f64) -> f64 {
    value * (-lambda * time).exp()
}

/// Rolls `value` over into `[min, max]` by repeatedly adding or subtracting the
/// span, modulo style. Non-finite input and degenerate ranges are returned as-is.
pub fn get_bound(mut value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if !value.is_finite() || !(span > 0.0) {
        return value;
    }

    while value < min {
        value += span;
    }
    while value > max {
        value -= span;
    }
    value
}

/// Poisson cumulative probability P(X ≤ ⌊k⌋) for rate `lambda`.
///
/// For `k < 1` the sum holds a single term, so the result is `e^(−λ)`.
pub fn poisson_cdf(k: f64, lambda: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;

    let upper = if k.is_finite() && k >= 1.0 { k.floor() as u64 } else { 0 };
    for i in 1..=upper {
        term *= lambda / i as f64;
        sum += term;
    }

    (-lambda).exp() * sum
}

/// Wraps an angle into (-π, π].
pub fn signed_normalize(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}
