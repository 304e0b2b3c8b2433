//! Axis-aligned bounding boxes.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An empty box that any point will expand.
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::MAX),
        max: DVec3::splat(f64::MIN),
    };

    /// Creates a box from two corners, in any order.
    #[must_use]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Returns the smallest box enclosing `points`, or [`Aabb::EMPTY`].
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |b, p| b.including(*p))
    }

    /// Returns true if no point has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Returns a copy grown to include `p`.
    #[must_use]
    pub fn including(self, p: DVec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Returns the union of two boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns a copy grown by `margin` on every side.
    #[must_use]
    pub fn expanded(self, margin: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    /// Returns the edge lengths.
    #[must_use]
    pub fn extent(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Returns the center point.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the length of the diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.extent().length()
    }

    /// Returns true if `p` lies inside or on the box.
    #[must_use]
    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Clips the line `origin + t * dir` to this box (slab test).
    ///
    /// Returns the parameter interval inside the box intersected with
    /// `[t_min, t_max]`, or `None` if the line misses.
    #[must_use]
    pub fn clip_line(&self, origin: DVec3, dir: DVec3, t_min: f64, t_max: f64) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let mut lo = t_min;
        let mut hi = t_max;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < f64::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            lo = lo.max(t0);
            hi = hi.min(t1);
            if lo > hi {
                return None;
            }
        }
        Some((lo, hi))
    }

    /// Returns true if the segment `a`-`b` touches the box.
    #[must_use]
    pub fn intersects_segment(&self, a: DVec3, b: DVec3) -> bool {
        self.clip_line(a, b - a, 0.0, 1.0).is_some()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let pts = [DVec3::new(1.0, -2.0, 3.0), DVec3::new(-1.0, 4.0, 0.0)];
        let b = Aabb::from_points(&pts);
        assert_eq!(b.min, DVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, DVec3::new(1.0, 4.0, 3.0));
        assert!(Aabb::from_points(&[]).is_empty());
    }

    #[test]
    fn test_clip_line_through_box() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let (t0, t1) = b
            .clip_line(DVec3::new(0.0, 0.0, 5.0), DVec3::NEG_Z, f64::MIN, f64::MAX)
            .unwrap();
        assert!((t0 - 4.0).abs() < 1e-12);
        assert!((t1 - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_misses_box() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        assert!(!b.intersects_segment(DVec3::new(2.0, 0.0, 5.0), DVec3::new(2.0, 0.0, -5.0)));
        assert!(!b.intersects_segment(DVec3::new(0.0, 0.0, 5.0), DVec3::new(0.0, 0.0, 2.0)));
        assert!(b.intersects_segment(DVec3::new(0.0, 0.0, 5.0), DVec3::new(0.0, 0.0, 0.5)));
    }
}
