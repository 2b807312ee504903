use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::grid2::Grid2D;

// 2D fractal terrain generator using midpoint displacement (diamond-square)
// over a 2^iterations + 1 grid.
pub struct DiamondSquare2D {
    seed: u64,
    iterations: u32,
    height: f32,
    persistence: f32,
}

// wraps a possibly-negative coordinate the way the reference grid does:
// remainder first, then absolute value
fn wrap_abs(v: isize, size: usize) -> usize {
    (v % size as isize).unsigned_abs()
}

impl DiamondSquare2D {
    // height scales the random displacement overall; persistence shrinks
    // the amplitude before every halving round (values below 1 smooth,
    // above 1 roughen).
    pub fn new(seed: u64, iterations: u32, height: f32, persistence: f32) -> Self {
        Self {
            seed,
            iterations,
            height,
            persistence,
        }
    }

    // Generate the (2^iterations + 1)-sized field. The draw order is part
    // of the determinism contract: the four corners first, then per tile
    // the diamond center followed by the top, bottom, left and right edge
    // midpoints, tiles traversed row by row with the step halving each
    // round. Equal parameters reproduce bit-identical output.
    pub fn generate(&self) -> Grid2D {
        let size = 2usize.pow(self.iterations) + 1;
        tracing::debug!(seed = self.seed, size, "generating diamond-square field");

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut draw = move || rng.random_range(-10000..10000) as f32;

        let mut data = vec![0.0f32; size * size];
        let idx = |x: usize, y: usize| x * size + y;
        let mut amplitude = self.height / 20000.0;

        data[idx(0, 0)] = draw() * amplitude;
        data[idx(0, size - 1)] = draw() * amplitude;
        data[idx(size - 1, 0)] = draw() * amplitude;
        data[idx(size - 1, size - 1)] = draw() * amplitude;

        let mut step = size - 1;
        while step > 0 {
            amplitude *= self.persistence;
            let half = step / 2;

            for x in (0..size - 1).step_by(step) {
                for y in (0..size - 1).step_by(step) {
                    // diamond: tile center from the four corners
                    data[idx(x + half, y + half)] = (data[idx(x, y)]
                        + data[idx(x + step, y)]
                        + data[idx(x, y + step)]
                        + data[idx(x + step, y + step)])
                        / 4.0
                        + draw() * amplitude;

                    // squares: each edge midpoint averages its two corners,
                    // the fresh center, and the mirrored midpoint of the
                    // neighboring tile (wrapping at the grid edge)
                    data[idx(x + half, y)] = (data[idx(x, y)]
                        + data[idx(x + step, y)]
                        + data[idx(x + half, y + half)]
                        + data[idx(x + half, wrap_abs(y as isize - half as isize, size))])
                        / 4.0
                        + draw() * amplitude;

                    data[idx(x + half, y + step)] = (data[idx(x, y + step)]
                        + data[idx(x + step, y + step)]
                        + data[idx(x + half, y + half)]
                        + data[idx(x + half, (y + 3 * step / 2) % size)])
                        / 4.0
                        + draw() * amplitude;

                    data[idx(x, y + half)] = (data[idx(x, y)]
                        + data[idx(x, y + step)]
                        + data[idx(x + half, y + half)]
                        + data[idx(wrap_abs(x as isize - half as isize, size), y + half)])
                        / 4.0
                        + draw() * amplitude;

                    data[idx(x + step, y + half)] = (data[idx(x + step, y)]
                        + data[idx(x + step, y + step)]
                        + data[idx(x + half, y + half)]
                        + data[idx((x + 3 * step / 2) % size, y + half)])
                        / 4.0
                        + draw() * amplitude;
                }
            }

            step /= 2;
        }

        Grid2D::from_parts(data, size)
    }
}

#[cfg(test)]
mod tests {
    use super::DiamondSquare2D;

    #[test]
    fn diamond2_dimensions() {
        let grid = DiamondSquare2D::new(0, 3, 100.0, 0.5).generate();
        assert_eq!(grid.size(), 9);
        let grid = DiamondSquare2D::new(0, 7, 100.0, 0.5).generate();
        assert_eq!(grid.size(), 129);
    }

    #[test]
    fn diamond2_determinism() {
        let a = DiamondSquare2D::new(42, 3, 100.0, 0.5).generate();
        let b = DiamondSquare2D::new(42, 3, 100.0, 0.5).generate();
        assert_eq!(a.to_buffer(), b.to_buffer());
    }

    #[test]
    fn diamond2_seed_changes_corners() {
        let a = DiamondSquare2D::new(1, 4, 100.0, 0.5).generate();
        let b = DiamondSquare2D::new(2, 4, 100.0, 0.5).generate();
        let n = a.size() as isize - 1;
        let corners_differ = a.get(0, 0) != b.get(0, 0)
            || a.get(0, n) != b.get(0, n)
            || a.get(n, 0) != b.get(n, 0)
            || a.get(n, n) != b.get(n, n);
        assert!(corners_differ);
    }

    #[test]
    fn diamond2_amplitude_tracks_height() {
        // doubling height doubles every displacement, so the fields differ
        // by exactly a factor of two
        let a = DiamondSquare2D::new(7, 4, 50.0, 0.5).generate();
        let b = DiamondSquare2D::new(7, 4, 100.0, 0.5).generate();
        for (&va, &vb) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((vb - va * 2.0).abs() < 1e-3);
        }
    }
}
