use image::GrayImage;
use relief_core::utils::to_grayscale_image;
use relief_core::{Perlin2D, Voronoi2D};

fn main() {
    let size = 256;

    // Four octaves of gradient noise over the unit square
    let perlin = Perlin2D::new(1.0, 0.5, 4.0, (0.0, 0.0)).generate(size);
    let img = GrayImage::from_raw(size as u32, size as u32, to_grayscale_image(&perlin))
        .expect("buffer matches dimensions");
    img.save("perlin_demo.png").unwrap();

    // Distance field to 24 random sites
    let voronoi = Voronoi2D::new(7, 24).generate(size);
    let img = GrayImage::from_raw(size as u32, size as u32, to_grayscale_image(&voronoi))
        .expect("buffer matches dimensions");
    img.save("voronoi_demo.png").unwrap();

    println!("Saved perlin_demo.png and voronoi_demo.png");
}
