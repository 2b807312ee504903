use image::{Rgb, RgbImage};
use palette::{Gradient, LinSrgb};
use relief_core::{DiamondSquare2D, Grid2D, HydraulicErosion2D, HydraulicParams};
use std::path::Path;

// Compute simple hillshade for a height field
// `z_scale` adjusts vertical exaggeration
fn hillshade(grid: &Grid2D, z_scale: f32) -> Vec<f32> {
    let n = grid.size();
    let mut shade = vec![0.0f32; n * n];
    let azimuth = std::f32::consts::PI / 4.0; // 45°
    let altitude = std::f32::consts::PI / 4.0; // 45°
    let (sin_alt, cos_alt) = altitude.sin_cos();

    for x in 0..n {
        for y in 0..n {
            let (xi, yi) = (x as isize, y as isize);
            // central differences; the clamped accessor handles the border
            let dzdx = ((grid.get(xi + 1, yi) - grid.get(xi - 1, yi)) / 2.0) * z_scale;
            let dzdy = ((grid.get(xi, yi + 1) - grid.get(xi, yi - 1)) / 2.0) * z_scale;
            // surface normal
            let (nx, ny, nz) = (-dzdx, -dzdy, 1.0);
            let len = (nx * nx + ny * ny + nz * nz).sqrt();
            let (nx, ny, nz) = (nx / len, ny / len, nz / len);
            // light vector from azimuth/altitude
            let lx = azimuth.cos() * cos_alt;
            let ly = azimuth.sin() * cos_alt;
            let lz = sin_alt;
            shade[x * n + y] = (nx * lx + ny * ly + nz * lz).max(0.0);
        }
    }
    shade
}

fn main() {
    // Synthesize a 257x257 fractal island and erode it
    let terrain = DiamondSquare2D::new(2025, 8, 120.0, 0.55).generate();
    let rain = Grid2D::ones(terrain.size()).mul_scalar(0.01);

    let params = HydraulicParams {
        pipe_area: 1.0,
        pipe_length: 1.0,
        max_sediment_capacity: 1.0,
        max_erosion_depth: 1.0,
        dissolve_speed: 0.1,
        deposition_speed: 0.1,
        evaporation: 0.02,
        tilt_limit: 0.1,
        dt: 0.02,
        cycles_per_iteration: 5,
    };

    let last = HydraulicErosion2D::new(params)
        .simulate(&terrain, &rain, 20)
        .expect("valid parameters")
        .last()
        .expect("at least one snapshot");

    let size = last.terrain.size();
    let shade = hillshade(&last.terrain, 1.0);

    // Color gradient - deep water to beach to grass to rock to snow
    let gradient = Gradient::with_domain(vec![
        (0.00, LinSrgb::new(0.0, 0.0, 0.5)), // deep blue
        (0.30, LinSrgb::new(0.8, 0.8, 0.5)), // sand
        (0.50, LinSrgb::new(0.1, 0.6, 0.2)), // green
        (0.75, LinSrgb::new(0.5, 0.4, 0.3)), // rock
        (1.00, LinSrgb::new(1.0, 1.0, 1.0)), // snow
    ]);

    // Normalize terrain heights to 0.0..1.0 for coloring
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in last.terrain.as_slice() {
        min = min.min(v);
        max = max.max(v);
    }

    let mut img = RgbImage::new(size as u32, size as u32);
    for x in 0..size {
        for y in 0..size {
            let h = last.terrain.get(x as isize, y as isize);
            let norm = if (max - min).abs() < f32::EPSILON {
                0.5
            } else {
                (h - min) / (max - min)
            };
            let col: LinSrgb = gradient.get(norm);
            let rgb = col.into_format::<u8>();
            // apply hillshade, then tint standing water blue
            let light = (shade[x * size + y] * 0.5 + 0.5).clamp(0.0, 1.0);
            let wet = (last.water.get(x as isize, y as isize) * 20.0).clamp(0.0, 0.6);
            let pixel = Rgb([
                (rgb.red as f32 * light * (1.0 - wet)) as u8,
                (rgb.green as f32 * light * (1.0 - wet)) as u8,
                ((rgb.blue as f32 * light).mul_add(1.0 - wet, 255.0 * wet)) as u8,
            ]);
            img.put_pixel(y as u32, x as u32, pixel);
        }
    }

    let path = Path::new("terrain_demo.png");
    img.save(path).unwrap();
    println!("Saved eroded terrain image to {:?}", path);
}
