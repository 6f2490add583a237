//! Composition of a parent tile from its four children.

use crate::coord::GRID_PIXELS;
use image::{Rgba, RgbaImage};

const HALF: u32 = GRID_PIXELS / 2;

/// Downsamples an image by 2× with a box filter.
///
/// Each output pixel is the average of a 2×2 block of input pixels.
pub fn downsample_box_2x(source: &RgbaImage) -> RgbaImage {
    let new_width = source.width() / 2;
    let new_height = source.height() / 2;

    let mut output = RgbaImage::new(new_width, new_height);

    for y in 0..new_height {
        for x in 0..new_width {
            let p00 = source.get_pixel(x * 2, y * 2);
            let p10 = source.get_pixel(x * 2 + 1, y * 2);
            let p01 = source.get_pixel(x * 2, y * 2 + 1);
            let p11 = source.get_pixel(x * 2 + 1, y * 2 + 1);

            let mut avg = [0u8; 4];
            for (c, out) in avg.iter_mut().enumerate() {
                let sum = p00[c] as u16 + p10[c] as u16 + p01[c] as u16 + p11[c] as u16;
                *out = (sum / 4) as u8;
            }
            output.put_pixel(x, y, Rgba(avg));
        }
    }

    output
}

/// Builds a 100×100 tile from children in quadrant order
/// (top-left, top-right, bottom-left, bottom-right).
///
/// Missing children leave their quadrant transparent. Children of another
/// size are resized to fit.
pub fn compose_quadrants(children: [Option<&RgbaImage>; 4]) -> RgbaImage {
    let mut canvas = RgbaImage::new(GRID_PIXELS, GRID_PIXELS);

    for (i, child) in children.iter().enumerate() {
        let Some(child) = child else { continue };
        let small = if child.width() == GRID_PIXELS && child.height() == GRID_PIXELS {
            downsample_box_2x(child)
        } else {
            image::imageops::resize(*child, HALF, HALF, image::imageops::FilterType::Triangle)
        };
        let qx = (i as u32 % 2) * HALF;
        let qy = (i as u32 / 2) * HALF;
        image::imageops::replace(&mut canvas, &small, qx as i64, qy as i64);
    }

    canvas
}
