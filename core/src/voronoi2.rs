use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::grid2::Grid2D;

// Nearest-site distance field: n_points random sites are scattered over
// the grid and every cell stores the distance to the closest one, giving
// the cellular ridge pattern used for plateaus and crack networks.
pub struct Voronoi2D {
    seed: u64,
    n_points: usize,
}

impl Voronoi2D {
    pub fn new(seed: u64, n_points: usize) -> Self {
        Self { seed, n_points }
    }

    // Sites draw x then y from the seeded generator, so the layout is
    // reproducible for a given (seed, n_points, size). Distances are
    // Euclidean, divided by size to keep the field roughly in [0, sqrt(2)).
    pub fn generate(&self, size: usize) -> Grid2D {
        tracing::debug!(seed = self.seed, size, sites = self.n_points, "generating voronoi field");

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let points: Vec<(f32, f32)> = (0..self.n_points)
            .map(|_| {
                let x = rng.random_range(0..size as u32) as f32;
                let y = rng.random_range(0..size as u32) as f32;
                (x, y)
            })
            .collect();

        if points.is_empty() {
            return Grid2D::zeros(size);
        }

        let data: Vec<f32> = (0..size * size)
            .into_par_iter()
            .map(|i| {
                let x = (i / size) as f32;
                let y = (i % size) as f32;
                let mut best = f32::INFINITY;
                for &(px, py) in &points {
                    let d = (x - px).powi(2) + (y - py).powi(2);
                    if d < best {
                        best = d;
                    }
                }
                best.sqrt() / size as f32
            })
            .collect();

        Grid2D::from_parts(data, size)
    }
}
