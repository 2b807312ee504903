use crate::grid2::Grid2D;

const GAMMA_CORRECTION: f32 = 1.2;
const WATER_THRESHOLD: f32 = 0.3;
const SAND_THRESHOLD: f32 = 0.4;
const GRASS_THRESHOLD: f32 = 0.6;
const ROCK_THRESHOLD: f32 = 0.8;

// Rescale a field into [0, 1] for display and apply a gamma curve for
// contrast. This is display-space normalization; Grid2D::normalise is the
// sum-to-one kind used for kernels.
pub fn normalize2(grid: &mut Grid2D) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &v in grid.as_slice() {
        min = min.min(v);
        max = max.max(v);
    }

    let range = (max - min).max(0.001); // prevent zero-division
    for v in grid.as_mut_slice() {
        *v = ((*v - min) / range).powf(GAMMA_CORRECTION);
    }
}

// Linearly interpolate between two RGB triples
fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t) as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t) as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t) as u8,
    ]
}

// Map a height in [0, 1] to a terrain color
fn height_to_rgb(h: f32) -> [u8; 3] {
    match h {
        x if x < WATER_THRESHOLD => {
            let t = x / WATER_THRESHOLD;
            lerp_color([0, 0, 128], [0, 128, 255], t) // deep to shallow water
        }
        x if x < SAND_THRESHOLD => {
            let t = (x - WATER_THRESHOLD) / (SAND_THRESHOLD - WATER_THRESHOLD);
            lerp_color([194, 178, 128], [220, 200, 160], t) // sand
        }
        x if x < GRASS_THRESHOLD => {
            let t = (x - SAND_THRESHOLD) / (GRASS_THRESHOLD - SAND_THRESHOLD);
            lerp_color([34, 139, 34], [50, 205, 50], t) // grass
        }
        x if x < ROCK_THRESHOLD => {
            let t = (x - GRASS_THRESHOLD) / (ROCK_THRESHOLD - GRASS_THRESHOLD);
            lerp_color([128, 128, 128], [192, 192, 192], t) // rock
        }
        x => {
            let t = (x - ROCK_THRESHOLD) / (1.0 - ROCK_THRESHOLD);
            lerp_color([220, 220, 220], [255, 255, 255], t) // snow
        }
    }
}

// Convert a field with heights in [0, 1] into an RGB byte buffer using the
// terrain ramp; run normalize2 first if the field is raw.
pub fn to_terrain_image(grid: &Grid2D) -> Vec<u8> {
    let mut buf = Vec::with_capacity(grid.as_slice().len() * 3);
    for &h in grid.as_slice() {
        let [r, g, b] = height_to_rgb(h);
        buf.extend_from_slice(&[r, g, b]);
    }
    buf
}

// Grayscale export: min-max scaled to u8, one byte per cell.
pub fn to_grayscale_image(grid: &Grid2D) -> Vec<u8> {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &v in grid.as_slice() {
        min = min.min(v);
        max = max.max(v);
    }
    let range = (max - min).max(f32::EPSILON);

    grid.as_slice()
        .iter()
        .map(|&v| ((v - min) / range * 255.0) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize2, to_grayscale_image, to_terrain_image};
    use crate::grid2::Grid2D;

    #[test]
    fn utils_normalize2_maps_into_unit_range() {
        let mut grid = Grid2D::linear(8).mul_scalar(300.0).sub_scalar(150.0);
        normalize2(&mut grid);
        for &v in grid.as_slice() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn utils_terrain_image_has_three_bytes_per_cell() {
        let grid = Grid2D::linear(4);
        assert_eq!(to_terrain_image(&grid).len(), 4 * 4 * 3);
    }

    #[test]
    fn utils_grayscale_spans_full_range() {
        let grid = Grid2D::linear(8);
        let img = to_grayscale_image(&grid);
        assert_eq!(img.len(), 64);
        assert_eq!(*img.iter().min().unwrap(), 0);
        assert_eq!(*img.iter().max().unwrap(), 255);
    }
}
