/// Dense counting-sort form of the spatial hash
///
/// Uses the same `floor(p / cell_size)` quantization as [`super::SpatialHash`]
/// but stores the buckets as flat offset/count/index arrays covering the
/// canvas, which map directly onto device storage buffers. Particles outside
/// the canvas are clamped into the border cells.
#[derive(Debug, Clone)]
pub struct CellGrid {
    cell_size: f32,
    cols: u32,
    rows: u32,
    cell_of: Vec<u32>,
    cell_offsets: Vec<u32>,
    cell_counts: Vec<u32>,
    sorted_indices: Vec<u32>,
}

impl CellGrid {
    pub fn new(cell_size: f32, width: f32, height: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        let (cols, rows) = Self::dims(cell_size, width, height);
        let total = (cols * rows) as usize;
        Self {
            cell_size,
            cols,
            rows,
            cell_of: Vec::new(),
            cell_offsets: vec![0; total],
            cell_counts: vec![0; total],
            sorted_indices: Vec::new(),
        }
    }

    fn dims(cell_size: f32, width: f32, height: f32) -> (u32, u32) {
        (
            (width / cell_size).ceil().max(1.0) as u32,
            (height / cell_size).ceil().max(1.0) as u32,
        )
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    #[inline]
    fn cell_xy(&self, x: f32, y: f32) -> (u32, u32) {
        let cx = (x / self.cell_size).floor().max(0.0).min((self.cols - 1) as f32) as u32;
        let cy = (y / self.cell_size).floor().max(0.0).min((self.rows - 1) as f32) as u32;
        (cx, cy)
    }

    /// Rebuild from an interleaved `[x, y, vx, vy]` array
    ///
    /// Resizes the grid when the canvas dimensions changed.
    pub fn rebuild(&mut self, kinematics: &[f32], width: f32, height: f32) {
        let (cols, rows) = Self::dims(self.cell_size, width, height);
        if (cols, rows) != (self.cols, self.rows) {
            self.cols = cols;
            self.rows = rows;
        }
        let total = self.cell_count();
        let n = kinematics.len() / 4;

        // 1. cell per particle
        self.cell_of.clear();
        self.cell_of.reserve(n);
        for particle in kinematics.chunks_exact(4) {
            let (cx, cy) = self.cell_xy(particle[0], particle[1]);
            self.cell_of.push(cx + cy * self.cols);
        }

        // 2. occupancy
        self.cell_counts.clear();
        self.cell_counts.resize(total, 0);
        for &cell in &self.cell_of {
            self.cell_counts[cell as usize] += 1;
        }

        // 3. exclusive prefix sum
        self.cell_offsets.clear();
        self.cell_offsets.resize(total, 0);
        let mut running = 0u32;
        for (offset, &count) in self.cell_offsets.iter_mut().zip(&self.cell_counts) {
            *offset = running;
            running += count;
        }

        // 4. scatter, keeping insertion order inside a cell
        self.sorted_indices.clear();
        self.sorted_indices.resize(n, 0);
        let mut heads = self.cell_offsets.clone();
        for (index, &cell) in self.cell_of.iter().enumerate() {
            let head = &mut heads[cell as usize];
            self.sorted_indices[*head as usize] = index as u32;
            *head += 1;
        }
    }

    pub fn cell_offsets(&self) -> &[u32] {
        &self.cell_offsets
    }

    pub fn cell_counts(&self) -> &[u32] {
        &self.cell_counts
    }

    pub fn sorted_indices(&self) -> &[u32] {
        &self.sorted_indices
    }

    /// Visit every particle in the 3x3 block of cells around `(x, y)`
    pub fn for_each_candidate<F>(&self, x: f32, y: f32, mut f: F)
    where
        F: FnMut(u32),
    {
        let (cx, cy) = self.cell_xy(x, y);
        let x_range = cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1);
        for ny in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for nx in x_range.clone() {
                let cell = (nx + ny * self.cols) as usize;
                let start = self.cell_offsets[cell] as usize;
                let end = start + self.cell_counts[cell] as usize;
                for &index in &self.sorted_indices[start..end] {
                    f(index);
                }
            }
        }
    }
}
