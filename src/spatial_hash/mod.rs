//! Uniform-grid spatial hash for particle neighbor search
//!
//! The plane is cut into square cells of a fixed size. Each particle index is
//! appended to the bucket of the cell containing it. The whole structure is
//! rebuilt every frame; particles move too far between large timesteps for an
//! incremental update to pay off.

mod cell_grid;

pub use cell_grid::CellGrid;

use rustc_hash::FxHashMap;

/// Cell coordinate packed into a single hashable key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellKey(u64);

impl CellKey {
    fn new(x: i32, y: i32) -> Self {
        Self(((x as u32 as u64) << 32) | y as u32 as u64)
    }
}

/// Spatial hash over particle indices
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    cells: FxHashMap<CellKey, Vec<u32>>,
    len: usize,
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            cells: FxHashMap::default(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Drop every bucket
    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    #[inline]
    fn cell_coord(&self, v: f32) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    /// Append a particle to the bucket for its cell
    pub fn insert(&mut self, index: u32, x: f32, y: f32) {
        let key = CellKey::new(self.cell_coord(x), self.cell_coord(y));
        self.cells.entry(key).or_default().push(index);
        self.len += 1;
    }

    /// Clear and insert every particle from an interleaved `[x, y, vx, vy]` array
    pub fn rebuild(&mut self, kinematics: &[f32]) {
        self.clear();
        for (index, particle) in kinematics.chunks_exact(4).enumerate() {
            self.insert(index as u32, particle[0], particle[1]);
        }
    }

    /// Candidate neighbors of `(x, y)` within `radius`
    ///
    /// The search box is grown by one cell on every side, so the result is a
    /// superset of the true neighbors. Order follows cell visit order, then
    /// insertion order inside a cell.
    pub fn query_neighbors(&self, x: f32, y: f32, radius: f32) -> Vec<u32> {
        let mut result = Vec::new();
        self.for_each_candidate(x, y, radius, |index| result.push(index));
        result
    }

    /// Visit every candidate neighbor without allocating
    pub fn for_each_candidate<F>(&self, x: f32, y: f32, radius: f32, mut f: F)
    where
        F: FnMut(u32),
    {
        let r = radius + self.cell_size;
        let min_x = self.cell_coord(x - r);
        let max_x = self.cell_coord(x + r);
        let min_y = self.cell_coord(y - r);
        let max_y = self.cell_coord(y + r);

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(bucket) = self.cells.get(&CellKey::new(cx, cy)) {
                    for &index in bucket {
                        f(index);
                    }
                }
            }
        }
    }

    /// Number of inserted particles
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stats(&self) -> SpatialHashStats {
        let max_per_cell = self.cells.values().map(Vec::len).max().unwrap_or(0);
        SpatialHashStats {
            occupied_cells: self.cells.len(),
            total_particles: self.len,
            max_particles_per_cell: max_per_cell,
            avg_particles_per_cell: if self.cells.is_empty() {
                0.0
            } else {
                self.len as f32 / self.cells.len() as f32
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHashStats {
    pub occupied_cells: usize,
    pub total_particles: usize,
    pub max_particles_per_cell: usize,
    pub avg_particles_per_cell: f32,
}
