use rayon::prelude::*;

use crate::NoiseGenerator;
use crate::grid2::Grid2D;

// Ken Perlin's reference permutation table. The generator duplicates it to
// 512 entries at construction so corner hashing never needs a wrapping
// lookup.
const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

// octaves in the fractal sum: amplitude scales by persistence and
// frequency doubles each round
const OCTAVES: usize = 4;

// 2D gradient noise over the classical permutation table, summed as
// fractal Brownian motion.
pub struct Perlin2D {
    height: f32,
    persistence: f64,
    scale: f64,
    offset: (f64, f64),
    perm: [u8; 512],
}

impl Perlin2D {
    // height scales the generated field, scale is the base frequency and
    // offset translates the sampling domain (useful for tiling or
    // scrolling a larger world).
    pub fn new(height: f32, persistence: f64, scale: f64, offset: (f64, f64)) -> Self {
        let mut perm = [0u8; 512];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = PERMUTATION[i & 255];
        }
        Self {
            height,
            persistence,
            scale,
            offset,
            perm,
        }
    }

    // Fade curve 6t^5 - 15t^4 + 10t^3; first and second derivatives vanish
    // at t=0 and t=1, which is what keeps cell boundaries artifact-free.
    #[inline]
    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    #[inline]
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + t * (b - a)
    }

    // Pick one of the predefined gradient directions from the hash and dot
    // it with the offset vector.
    #[inline]
    fn grad(hash: u8, x: f64, y: f64) -> f64 {
        let h = hash & 0xF;
        let u = if h < 8 { x } else { y };
        let v = if h < 8 { y } else { x };
        let su = if (h & 1) == 0 { u } else { -u };
        let sv = if (h & 2) == 0 { v } else { -v };
        su + sv
    }

    // Raw single-octave noise at (x, y), roughly in [-sqrt(2), sqrt(2)].
    fn noise(&self, x: f64, y: f64) -> f64 {
        let xi = (x.floor() as i32 & 255) as usize;
        let yi = (y.floor() as i32 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let u = Self::fade(xf);
        let v = Self::fade(yf);

        // hash the four cell corners into gradient indices
        let aa = self.perm[(self.perm[xi] as usize + yi) & 255];
        let ab = self.perm[(self.perm[xi] as usize + ((yi + 1) & 255)) & 255];
        let ba = self.perm[(self.perm[(xi + 1) & 255] as usize + yi) & 255];
        let bb = self.perm[(self.perm[(xi + 1) & 255] as usize + ((yi + 1) & 255)) & 255];

        let x1 = Self::lerp(Self::grad(aa, xf, yf), Self::grad(ba, xf - 1.0, yf), u);
        let x2 = Self::lerp(
            Self::grad(ab, xf, yf - 1.0),
            Self::grad(bb, xf - 1.0, yf - 1.0),
            u,
        );
        Self::lerp(x1, x2, v)
    }

    // Fill a size x size grid by sampling the unit square; cells are
    // independent, so the sweep runs in parallel.
    pub fn generate(&self, size: usize) -> Grid2D {
        let data: Vec<f32> = (0..size * size)
            .into_par_iter()
            .map(|i| {
                let nx = (i / size) as f64 / size as f64;
                let ny = (i % size) as f64 / size as f64;
                self.get2(nx, ny) as f32 * self.height
            })
            .collect();
        Grid2D::from_parts(data, size)
    }
}

impl NoiseGenerator for Perlin2D {
    // Multi-octave value at (x, y), normalized to roughly [-1, 1].
    fn get2(&self, x: f64, y: f64) -> f64 {
        let mut amplitude = 1.0;
        let mut freq = self.scale;
        let mut total = 0.0;
        let mut max_amp = 0.0;

        for _ in 0..OCTAVES {
            total += self.noise((x + self.offset.0) * freq, (y + self.offset.1) * freq) * amplitude;
            max_amp += amplitude;
            amplitude *= self.persistence;
            freq *= 2.0;
        }

        total / max_amp
    }
}

#[cfg(test)]
mod tests {
    use super::Perlin2D;
    use crate::NoiseGenerator;

    #[test]
    fn perlin2_determinism() {
        let a = Perlin2D::new(1.0, 0.5, 4.0, (0.0, 0.0));
        let b = Perlin2D::new(1.0, 0.5, 4.0, (0.0, 0.0));
        assert!((a.get2(10.5, -3.7) - b.get2(10.5, -3.7)).abs() < 1e-12);
        assert_eq!(
            a.generate(33).to_buffer(),
            b.generate(33).to_buffer()
        );
    }

    #[test]
    fn perlin2_range() {
        let p = Perlin2D::new(1.0, 0.5, 6.0, (0.0, 0.0));
        for &(x, y) in &[(0.0, 0.0), (5.3, -1.2), (100.1, 200.2)] {
            let v = p.get2(x, y);
            assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&v));
        }
    }

    #[test]
    fn perlin2_height_scales_output() {
        let unit = Perlin2D::new(1.0, 0.5, 4.0, (0.0, 0.0)).generate(17);
        let tall = Perlin2D::new(25.0, 0.5, 4.0, (0.0, 0.0)).generate(17);
        for (&a, &b) in unit.as_slice().iter().zip(tall.as_slice()) {
            assert!((b - a * 25.0).abs() < 1e-4);
        }
    }

    #[test]
    fn perlin2_offset_shifts_domain() {
        let base = Perlin2D::new(1.0, 0.5, 4.0, (0.0, 0.0));
        let moved = Perlin2D::new(1.0, 0.5, 4.0, (3.7, -1.2));
        assert!((base.get2(3.7 + 0.25, -1.2 + 0.25) - moved.get2(0.25, 0.25)).abs() < 1e-12);
    }
}
