//! Dense voxel annotation of region ids.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use glam::DVec3;
use probescope_core::error::{ProbescopeError, Result};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::TiffError;

/// A stretch of a segment that stays in voxels of one id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelRun {
    /// Region id, `0` outside the brain.
    pub id: u32,
    /// Segment parameter where the run starts, in `[0, 1]`.
    pub t_start: f64,
    /// Segment parameter where the run ends, in `[0, 1]`.
    pub t_end: f64,
}

/// Region ids on a regular grid, indexed `[x][y][z]` with x slowest.
///
/// Voxel `i` covers `[i - 0.5, i + 0.5)` along each axis, so voxel centers sit at
/// integer coordinates. Indices outside the grid read as `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationVolume {
    shape: [usize; 3],
    data: Vec<u32>,
}

impl AnnotationVolume {
    /// Creates a volume; `data.len()` must equal the product of `shape`.
    pub fn new(shape: [usize; 3], data: Vec<u32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(ProbescopeError::InvalidAtlas(format!(
                "annotation of shape {shape:?} needs {expected} voxels, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// An all-zero volume.
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            shape,
            data: vec![0; shape.iter().product()],
        }
    }

    /// Reads a multi-page TIFF stack. Page `i` becomes the slab at first index
    /// `i`; rows and columns become the second and third indices.
    pub fn read_tiff(path: &Path) -> Result<Self> {
        let invalid = |e: TiffError| ProbescopeError::InvalidAtlas(format!("{}: {e}", path.display()));
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?)).map_err(invalid)?;
        let (width, height) = decoder.dimensions().map_err(invalid)?;

        let mut data = Vec::new();
        let mut pages = 0;
        loop {
            if decoder.dimensions().map_err(invalid)? != (width, height) {
                return Err(ProbescopeError::InvalidAtlas(format!(
                    "{}: page {pages} is not {width}x{height}",
                    path.display()
                )));
            }
            match decoder.read_image().map_err(invalid)? {
                DecodingResult::U8(page) => data.extend(page.into_iter().map(u32::from)),
                DecodingResult::U16(page) => data.extend(page.into_iter().map(u32::from)),
                DecodingResult::U32(page) => data.extend(page),
                DecodingResult::I32(page) => {
                    data.extend(page.into_iter().map(|id| u32::try_from(id).unwrap_or(0)));
                }
                _ => {
                    return Err(ProbescopeError::InvalidAtlas(format!(
                        "{}: annotation samples must be integers of at most 32 bits",
                        path.display()
                    )))
                }
            }
            pages += 1;
            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(invalid)?;
        }
        log::debug!("read {pages} annotation pages of {width}x{height} from {}", path.display());
        Self::new([pages, height as usize, width as usize], data)
    }

    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    fn offset(&self, index: [i64; 3]) -> Option<usize> {
        let mut flat = 0usize;
        for (axis, &i) in index.iter().enumerate() {
            let i = usize::try_from(i).ok()?;
            if i >= self.shape[axis] {
                return None;
            }
            flat = flat * self.shape[axis] + i;
        }
        Some(flat)
    }

    /// Id at a voxel index.
    #[must_use]
    pub fn get(&self, index: [i64; 3]) -> u32 {
        self.offset(index).map_or(0, |o| self.data[o])
    }

    /// Sets the id at a voxel index. Returns false outside the grid.
    pub fn set(&mut self, index: [i64; 3], id: u32) -> bool {
        match self.offset(index) {
            Some(o) => {
                self.data[o] = id;
                true
            }
            None => false,
        }
    }

    /// Fills an inclusive index box.
    pub fn fill(&mut self, lo: [i64; 3], hi: [i64; 3], id: u32) {
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    self.set([x, y, z], id);
                }
            }
        }
    }

    /// Walks the segment `a`-`b` (voxel coordinates) through every voxel it
    /// touches and returns runs of equal id, in order from `a`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn walk(&self, a: DVec3, b: DVec3) -> Vec<VoxelRun> {
        let mut runs: Vec<VoxelRun> = Vec::new();
        if !(a.is_finite() && b.is_finite()) {
            return runs;
        }
        let d = b - a;
        let start = (a + 0.5).floor();
        let mut cell = [start.x as i64, start.y as i64, start.z as i64];
        let mut step = [0i64; 3];
        let mut t_max = [f64::INFINITY; 3];
        let mut t_delta = [f64::INFINITY; 3];
        for axis in 0..3 {
            let (di, ai, ci) = (d[axis], a[axis], start[axis]);
            if di > 0.0 {
                step[axis] = 1;
                t_max[axis] = (ci + 0.5 - ai) / di;
                t_delta[axis] = 1.0 / di;
            } else if di < 0.0 {
                step[axis] = -1;
                t_max[axis] = (ci - 0.5 - ai) / di;
                t_delta[axis] = -1.0 / di;
            }
        }

        // Every voxel boundary crossed costs one step.
        let limit = (d.abs().element_sum().ceil() as usize) + 3;
        let mut t = 0.0;
        for _ in 0..=limit {
            let axis = if t_max[0] <= t_max[1] && t_max[0] <= t_max[2] {
                0
            } else if t_max[1] <= t_max[2] {
                1
            } else {
                2
            };
            let t_next = t_max[axis].min(1.0);
            let id = self.get(cell);
            match runs.last_mut() {
                Some(last) if last.id == id => last.t_end = t_next,
                _ => runs.push(VoxelRun {
                    id,
                    t_start: t,
                    t_end: t_next,
                }),
            }
            if t_next >= 1.0 {
                break;
            }
            t = t_next;
            cell[axis] += step[axis];
            t_max[axis] += t_delta[axis];
        }
        runs.retain(|r| r.t_end > r.t_start);
        runs
    }
}
