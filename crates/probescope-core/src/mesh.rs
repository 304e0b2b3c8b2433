//! Triangle meshes and line casting against them.
//!
//! Meshes are stored in double precision, in micrometers. Atlas region meshes,
//! the outer brain surface and probe/holder meshes all use this type.

use glam::{DMat3, DVec3};

use crate::bounds::Aabb;
use crate::error::{ProbescopeError, Result};

/// Hits closer than this along a line are treated as one crossing (shared edges).
pub const HIT_MERGE_TOLERANCE: f64 = 1e-6;

/// An indexed triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    vertices: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
    bounds: Aabb,
}

impl TriMesh {
    /// Creates a mesh from vertices and triangles.
    ///
    /// Fails if a triangle references a vertex that does not exist.
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        let n = vertices.len();
        if let Some(bad) = triangles.iter().flatten().find(|&&i| i as usize >= n) {
            return Err(ProbescopeError::InvalidMeshSpec(format!(
                "triangle index {bad} out of range for {n} vertices"
            )));
        }
        let bounds = Aabb::from_points(&vertices);
        Ok(Self {
            vertices,
            triangles,
            bounds,
        })
    }

    /// Creates a mesh from polygon faces using fan triangulation.
    ///
    /// For a polygon `[v0, v1, v2, v3, ...]` this creates
    /// `[v0, v1, v2], [v0, v2, v3], ...`. Faces with fewer than three vertices are
    /// dropped.
    pub fn from_polygons(vertices: Vec<DVec3>, faces: &[Vec<u32>]) -> Result<Self> {
        let mut triangles = Vec::with_capacity(faces.len());
        for face in faces.iter().filter(|f| f.len() >= 3) {
            let v0 = face[0];
            for i in 1..(face.len() - 1) {
                triangles.push([v0, face[i], face[i + 1]]);
            }
        }
        Self::new(vertices, triangles)
    }

    /// An empty mesh.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            bounds: Aabb::EMPTY,
        }
    }

    /// A closed, outward-facing box.
    #[must_use]
    pub fn cuboid(a: DVec3, b: DVec3) -> Self {
        let (lo, hi) = (a.min(b), a.max(b));
        let vertices = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 == 0 { lo.x } else { hi.x },
                    if i & 2 == 0 { lo.y } else { hi.y },
                    if i & 4 == 0 { lo.z } else { hi.z },
                )
            })
            .collect::<Vec<_>>();
        let triangles = vec![
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ];
        let bounds = Aabb::new(lo, hi);
        Self {
            vertices,
            triangles,
            bounds,
        }
    }

    /// A closed UV sphere.
    #[must_use]
    pub fn uv_sphere(center: DVec3, radius: f64, rings: u32, segments: u32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);
        let mut vertices = vec![center + DVec3::Z * radius];
        for r in 1..rings {
            let theta = std::f64::consts::PI * f64::from(r) / f64::from(rings);
            for s in 0..segments {
                let phi = std::f64::consts::TAU * f64::from(s) / f64::from(segments);
                vertices.push(
                    center
                        + radius
                            * DVec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()),
                );
            }
        }
        vertices.push(center - DVec3::Z * radius);
        let bottom = (vertices.len() - 1) as u32;
        let ring_start = |r: u32| 1 + (r - 1) * segments;

        let mut triangles = Vec::new();
        for s in 0..segments {
            let next = (s + 1) % segments;
            triangles.push([0, ring_start(1) + s, ring_start(1) + next]);
            triangles.push([bottom, ring_start(rings - 1) + next, ring_start(rings - 1) + s]);
        }
        for r in 1..(rings - 1) {
            for s in 0..segments {
                let next = (s + 1) % segments;
                let a = ring_start(r) + s;
                let b = ring_start(r) + next;
                let c = ring_start(r + 1) + s;
                let d = ring_start(r + 1) + next;
                triangles.push([a, c, b]);
                triangles.push([b, c, d]);
            }
        }
        let bounds = Aabb::from_points(&vertices);
        Self {
            vertices,
            triangles,
            bounds,
        }
    }

    /// A flat rectangle spanned by `e1` and `e2` from `corner` (two triangles).
    #[must_use]
    pub fn rectangle(corner: DVec3, e1: DVec3, e2: DVec3) -> Self {
        let vertices = vec![corner, corner + e1, corner + e1 + e2, corner + e2];
        let bounds = Aabb::from_points(&vertices);
        Self {
            vertices,
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            bounds,
        }
    }

    /// Returns the vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    /// Returns the triangle indices.
    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Returns the bounding box.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Returns true if the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Returns the number of triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Returns the corners of triangle `i`.
    #[must_use]
    pub fn triangle(&self, i: usize) -> [DVec3; 3] {
        let [a, b, c] = self.triangles[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Returns unit face normals from the cross product of the first two edges.
    #[must_use]
    pub fn face_normals(&self) -> Vec<DVec3> {
        (0..self.triangles.len())
            .map(|i| {
                let [v0, v1, v2] = self.triangle(i);
                (v1 - v0).cross(v2 - v0).normalize_or_zero()
            })
            .collect()
    }

    /// Returns a copy with every vertex mapped through `f`.
    #[must_use]
    pub fn map_points(&self, f: impl Fn(DVec3) -> DVec3) -> Self {
        let vertices: Vec<DVec3> = self.vertices.iter().map(|&v| f(v)).collect();
        let bounds = Aabb::from_points(&vertices);
        Self {
            vertices,
            triangles: self.triangles.clone(),
            bounds,
        }
    }

    /// Returns a uniformly scaled copy.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        self.map_points(|v| v * factor)
    }

    /// Returns a translated copy.
    #[must_use]
    pub fn translated(&self, offset: DVec3) -> Self {
        self.map_points(|v| v + offset)
    }

    /// Returns a copy rotated about the origin.
    #[must_use]
    pub fn rotated(&self, rotation: &DMat3) -> Self {
        self.map_points(|v| *rotation * v)
    }

    /// Returns every parameter `t` where the line `origin + t * dir` crosses the
    /// mesh with `t` in `[t_min, t_max]`, sorted ascending.
    ///
    /// Both triangle windings count. Hits closer than [`HIT_MERGE_TOLERANCE`] are
    /// merged, so a line through a shared edge reports a single crossing.
    #[must_use]
    pub fn line_hits(&self, origin: DVec3, dir: DVec3, t_min: f64, t_max: f64) -> Vec<f64> {
        let Some((lo, hi)) = self.bounds.expanded(HIT_MERGE_TOLERANCE).clip_line(origin, dir, t_min, t_max)
        else {
            return Vec::new();
        };

        let mut hits: Vec<f64> = (0..self.triangles.len())
            .filter_map(|i| {
                let [v0, v1, v2] = self.triangle(i);
                line_triangle(origin, dir, v0, v1, v2)
            })
            .filter(|t| *t >= lo - HIT_MERGE_TOLERANCE && *t <= hi + HIT_MERGE_TOLERANCE)
            .collect();
        hits.sort_by(f64::total_cmp);
        hits.dedup_by(|later, earlier| (*later - *earlier).abs() < HIT_MERGE_TOLERANCE);
        hits
    }

    /// Returns the crossing points of the segment `a`-`b`, ordered from `a`.
    #[must_use]
    pub fn segment_hits(&self, a: DVec3, b: DVec3) -> Vec<DVec3> {
        let dir = b - a;
        let len = dir.length();
        if len <= f64::EPSILON {
            return Vec::new();
        }
        let unit = dir / len;
        self.line_hits(a, unit, 0.0, len)
            .into_iter()
            .map(|t| a + unit * t)
            .collect()
    }
}

/// Möller–Trumbore intersection without back-face culling or a sign restriction.
fn line_triangle(origin: DVec3, dir: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = dir.cross(edge2);
    let a = edge1.dot(h);
    let scale = edge1.length() * edge2.length() * dir.length();
    if a.abs() <= 1e-12 * scale {
        return None;
    }
    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    let slack = 1e-9;
    if !(-slack..=1.0 + slack).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = f * dir.dot(q);
    if v < -slack || u + v > 1.0 + slack {
        return None;
    }
    Some(f * edge2.dot(q))
}
