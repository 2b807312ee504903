use crate::NoiseGenerator;
use crate::error::GridError;

// Square scalar field over a contiguous row-major buffer of size * size
// floats; element (x, y) lives at x * size + y. Integer indexing clamps
// both axes to the grid edge instead of failing, so every lookup has
// edge-extension semantics. All transformations allocate a new grid; the
// receiver is only ever mutated through set() and load_from().
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    data: Vec<f32>,
    size: usize,
}

impl Grid2D {
    // Build from a flat row-major buffer of length size * size.
    pub fn from_flat(data: Vec<f32>, size: usize) -> Result<Self, GridError> {
        if size == 0 || data.len() != size * size {
            return Err(GridError::LengthMismatch {
                len: data.len(),
                size,
            });
        }
        Ok(Self { data, size })
    }

    // Build from nested rows; every row must match the row count.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, GridError> {
        let size = rows.len();
        if size == 0 {
            return Err(GridError::NotSquare { rows: 0, cols: 0 });
        }
        for row in &rows {
            if row.len() != size {
                return Err(GridError::NotSquare {
                    rows: size,
                    cols: row.len(),
                });
            }
        }
        let data = rows.into_iter().flatten().collect();
        Ok(Self { data, size })
    }

    // Internal constructor for buffers whose length is correct by
    // construction.
    pub(crate) fn from_parts(data: Vec<f32>, size: usize) -> Self {
        debug_assert_eq!(data.len(), size * size);
        Self { data, size }
    }

    fn from_fn(size: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(size * size);
        for x in 0..size {
            for y in 0..size {
                data.push(f(x, y));
            }
        }
        Self { data, size }
    }

    // Sample a point-noise generator over the unit square.
    pub fn from_noise(noise: &dyn NoiseGenerator, size: usize) -> Self {
        Self::from_fn(size, |x, y| {
            noise.get2(x as f64 / size as f64, y as f64 / size as f64) as f32
        })
    }

    pub fn zeros(size: usize) -> Self {
        Self::from_parts(vec![0.0; size * size], size)
    }

    pub fn ones(size: usize) -> Self {
        Self::from_parts(vec![1.0; size * size], size)
    }

    // Ramp running 0 .. 1 across the linear buffer: (x * size + y) / size^2.
    pub fn linear(size: usize) -> Self {
        let denom = (size * size) as f32;
        Self::from_fn(size, |x, y| (x * size + y) as f32 / denom)
    }

    // Centered Gaussian bump; spread widens the bell along each axis.
    pub fn gaussian(size: usize, spread: (f32, f32)) -> Self {
        let half = size as f32 / 2.0;
        let n = size as f32;
        Self::from_fn(size, |x, y| {
            let dx = (x as f32 - half).powi(2) / (2.0 * spread.0 * n);
            let dy = (y as f32 - half).powi(2) / (2.0 * spread.1 * n);
            (-(dx + dy)).exp()
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[x * self.size + y]
    }

    fn clamp_xy(&self, x: isize, y: isize) -> (usize, usize) {
        let max = (self.size - 1) as isize;
        (x.clamp(0, max) as usize, y.clamp(0, max) as usize)
    }

    // Clamped read: out-of-range coordinates are redirected to the nearest
    // edge cell.
    pub fn get(&self, x: isize, y: isize) -> f32 {
        let (x, y) = self.clamp_xy(x, y);
        self.data[x * self.size + y]
    }

    // Clamped write, same redirection as get().
    pub fn set(&mut self, x: isize, y: isize, value: f32) {
        let (x, y) = self.clamp_xy(x, y);
        self.data[x * self.size + y] = value;
    }

    // Bilinear interpolation over normalized coordinates u, v in [0, 1].
    // Values outside [0, 1] extend the edge values because the corner
    // indices clamp.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let max = (self.size - 1) as isize;
        let x = u * max as f32;
        let y = v * max as f32;
        let x0 = (x as isize).clamp(0, max) as usize;
        let x1 = ((x + 1.0) as isize).clamp(0, max) as usize;
        let y0 = (y as isize).clamp(0, max) as usize;
        let y1 = ((y + 1.0) as isize).clamp(0, max) as usize;
        let tx = x % 1.0;
        let ty = y % 1.0;

        self.at(x0, y0) * (1.0 - tx) * (1.0 - ty)
            + self.at(x1, y0) * tx * (1.0 - ty)
            + self.at(x0, y1) * (1.0 - tx) * ty
            + self.at(x1, y1) * tx * ty
    }

    // Copy out an n x n sub-grid with its top-left corner at (x, y). The
    // window must lie fully inside the grid.
    pub fn slice(&self, x: usize, y: usize, n: usize) -> Result<Self, GridError> {
        if n == 0 || x + n > self.size || y + n > self.size {
            return Err(GridError::OutOfBounds {
                x,
                y,
                n,
                size: self.size,
            });
        }
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            let start = (x + i) * self.size + y;
            data.extend_from_slice(&self.data[start..start + n]);
        }
        Ok(Self { data, size: n })
    }

    // Split into an n x n matrix of tiles. Exclusive tiles are disjoint and
    // need size % n == 0; inclusive tiles are one cell larger and share
    // their border row/column with each neighbor (seamless chunking), which
    // needs (size - 1) % n == 0.
    pub fn partition(&self, n: usize, inclusive: bool) -> Result<Vec<Vec<Self>>, GridError> {
        let s = if inclusive {
            if n == 0 || (self.size - 1) % n != 0 {
                return Err(GridError::Partition {
                    size: self.size,
                    n,
                    requirement: "size - 1 must be divisible by n",
                });
            }
            (self.size - 1) / n
        } else {
            if n == 0 || self.size % n != 0 {
                return Err(GridError::Partition {
                    size: self.size,
                    n,
                    requirement: "size must be divisible by n",
                });
            }
            self.size / n
        };

        let tile = if inclusive { s + 1 } else { s };
        let mut tiles = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = Vec::with_capacity(n);
            for j in 0..n {
                row.push(self.slice(i * s, j * s, tile)?);
            }
            tiles.push(row);
        }
        Ok(tiles)
    }

    // Resize to floor(size * factor) cells per side; every destination cell
    // is inverse-mapped onto the source and bilinearly sampled.
    pub fn scale(&self, factor: f32) -> Self {
        assert!(factor > 0.0, "scale factor must be positive");
        let s = (self.size as f32 * factor) as usize;
        let denom = factor * self.size as f32;
        let mut data = Vec::with_capacity(s * s);
        for x in 0..s {
            for y in 0..s {
                data.push(self.sample(x as f32 / denom, y as f32 / denom));
            }
        }
        Self { data, size: s }
    }

    // Spatial convolution with an odd-sized kernel. Taps that fall outside
    // the grid contribute zero - not the clamped edge value - so responses
    // shrink toward the border. Downstream imagery depends on exactly this
    // behavior; do not switch it to edge extension.
    pub fn convolute(&self, kernel: &Grid2D) -> Result<Self, GridError> {
        if kernel.size % 2 != 1 {
            return Err(GridError::EvenKernel(kernel.size));
        }
        let r = ((kernel.size - 1) / 2) as isize;
        let n = self.size as isize;
        let mut data = Vec::with_capacity(self.size * self.size);
        for x in 0..n {
            for y in 0..n {
                let mut sum = 0.0;
                for i in -r..=r {
                    for j in -r..=r {
                        let sx = x + i;
                        let sy = y + j;
                        if sx >= 0 && sx < n && sy >= 0 && sy < n {
                            sum += self.data[(sx * n + sy) as usize]
                                * kernel.at((i + r) as usize, (j + r) as usize);
                        }
                    }
                }
                data.push(sum);
            }
        }
        Ok(Self::from_parts(data, self.size))
    }

    // Scale so the whole field sums to one (useful for kernels).
    pub fn normalise(&self) -> Self {
        self.div_scalar(self.sum())
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn average(&self) -> f32 {
        self.sum() / self.data.len() as f32
    }

    pub fn to_buffer(&self) -> Vec<f32> {
        self.data.clone()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    // Replace the backing buffer in place; the only mutation besides set().
    pub fn load_from(&mut self, buffer: &[f32]) -> Result<(), GridError> {
        if buffer.len() != self.data.len() {
            return Err(GridError::LengthMismatch {
                len: buffer.len(),
                size: self.size,
            });
        }
        self.data.copy_from_slice(buffer);
        Ok(())
    }

    fn zip_with(&self, other: &Grid2D, f: impl Fn(f32, f32) -> f32) -> Result<Self, GridError> {
        if self.size != other.size {
            return Err(GridError::SizeMismatch(self.size, other.size));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            data,
            size: self.size,
        })
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|&a| f(a)).collect(),
            size: self.size,
        }
    }

    // Elementwise field-field arithmetic; both operands must be the same
    // size.
    pub fn add(&self, other: &Grid2D) -> Result<Self, GridError> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Grid2D) -> Result<Self, GridError> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Grid2D) -> Result<Self, GridError> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Grid2D) -> Result<Self, GridError> {
        self.zip_with(other, |a, b| a / b)
    }

    // Field-scalar arithmetic, grid on the left.
    pub fn add_scalar(&self, value: f32) -> Self {
        self.map(|a| a + value)
    }

    pub fn sub_scalar(&self, value: f32) -> Self {
        self.map(|a| a - value)
    }

    pub fn mul_scalar(&self, value: f32) -> Self {
        self.map(|a| a * value)
    }

    pub fn div_scalar(&self, value: f32) -> Self {
        self.map(|a| a / value)
    }

    // Scalar-first operand order for the non-commutative operations.
    pub fn scalar_sub(&self, value: f32) -> Self {
        self.map(|a| value - a)
    }

    pub fn scalar_div(&self, value: f32) -> Self {
        self.map(|a| value / a)
    }

    pub fn negate(&self) -> Self {
        self.map(|a| -a)
    }
}
