//! Reading mesh files from disk.
//!
//! Supported formats are Wavefront OBJ (atlas region meshes, custom objects),
//! PLY and STL (holder and custom meshes, binary or ASCII). Units are taken as
//! stored; callers apply their own scale factor.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use glam::DVec3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{ProbescopeError, Result};
use crate::mesh::TriMesh;

fn load_error(path: &Path, reason: impl Into<String>) -> ProbescopeError {
    ProbescopeError::MeshLoad {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Loads a mesh, choosing the reader from the file extension.
pub fn load_mesh(path: &Path) -> Result<TriMesh> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mesh = match ext.as_str() {
        "obj" => load_obj(path)?,
        "ply" => load_ply(path)?,
        "stl" => load_stl(path)?,
        other => return Err(load_error(path, format!("unsupported mesh format '{other}'"))),
    };
    log::debug!(
        "loaded mesh {} ({} triangles)",
        path.display(),
        mesh.num_triangles()
    );
    Ok(mesh)
}

/// Loads every model of an OBJ file into a single mesh.
pub fn load_obj(path: &Path) -> Result<TriMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| load_error(path, e.to_string()))?;

    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    for model in models {
        let mesh = &model.mesh;
        let base = u32::try_from(vertices.len()).map_err(|_| load_error(path, "too many vertices"))?;
        vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2]))),
        );
        triangles.extend(
            mesh.indices
                .chunks_exact(3)
                .map(|t| [base + t[0], base + t[1], base + t[2]]),
        );
    }
    TriMesh::new(vertices, triangles)
}

fn property_f64(p: &Property) -> Option<f64> {
    match p {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(f64::from(*v)),
        Property::UInt(v) => Some(f64::from(*v)),
        Property::Short(v) => Some(f64::from(*v)),
        Property::UShort(v) => Some(f64::from(*v)),
        Property::Char(v) => Some(f64::from(*v)),
        Property::UChar(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn property_indices(p: &Property) -> Option<Vec<u32>> {
    match p {
        Property::ListUInt(v) => Some(v.clone()),
        Property::ListInt(v) => v.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUShort(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
        Property::ListShort(v) => v.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUChar(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
        Property::ListChar(v) => v.iter().map(|&i| u32::try_from(i).ok()).collect(),
        _ => None,
    }
}

/// Loads a PLY mesh (`vertex` x/y/z and `face` vertex index lists).
pub fn load_ply(path: &Path) -> Result<TriMesh> {
    let mut reader = BufReader::new(File::open(path)?);
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| load_error(path, e.to_string()))?;

    let vertex_elements = ply
        .payload
        .get("vertex")
        .ok_or_else(|| load_error(path, "no vertex element"))?;
    let mut vertices = Vec::with_capacity(vertex_elements.len());
    for v in vertex_elements {
        let coord = |name: &str| v.get(name).and_then(property_f64);
        match (coord("x"), coord("y"), coord("z")) {
            (Some(x), Some(y), Some(z)) => vertices.push(DVec3::new(x, y, z)),
            _ => return Err(load_error(path, "vertex without x/y/z")),
        }
    }

    let mut faces = Vec::new();
    for f in ply.payload.get("face").into_iter().flatten() {
        let indices = f
            .get("vertex_indices")
            .or_else(|| f.get("vertex_index"))
            .and_then(property_indices)
            .ok_or_else(|| load_error(path, "face without vertex indices"))?;
        faces.push(indices);
    }
    TriMesh::from_polygons(vertices, &faces)
}

/// Loads an STL file, binary or ASCII.
pub fn load_stl(path: &Path) -> Result<TriMesh> {
    let mut reader = BufReader::new(File::open(path)?);
    read_stl(&mut reader).map_err(|reason| load_error(path, reason))
}

/// Parses STL bytes, binary or ASCII.
pub fn parse_stl(bytes: &[u8]) -> std::result::Result<TriMesh, String> {
    read_stl(&mut Cursor::new(bytes))
}

fn read_stl<R: Read + Seek>(reader: &mut R) -> std::result::Result<TriMesh, String> {
    let stl = stl_io::read_stl(reader).map_err(|e| format!("not a readable STL: {e}"))?;
    let vertices = stl
        .vertices
        .iter()
        .map(|v| DVec3::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2])))
        .collect();
    let triangles = stl
        .faces
        .iter()
        .map(|f| {
            let [a, b, c] = f.vertices;
            Some([u32::try_from(a).ok()?, u32::try_from(b).ok()?, u32::try_from(c).ok()?])
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| "too many vertices".to_string())?;
    TriMesh::new(vertices, triangles).map_err(|e| e.to_string())
}
