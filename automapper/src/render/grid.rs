//! Grid terrain rendering.

use crate::coord::{GRID_PIXELS, GRID_SIZE};
use crate::hmap::DecodedGrid;
use crate::texture::TextureSource;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

/// Colour drawn where a tileset texture is missing.
pub const MISSING_TEXTURE: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// Height difference above which a pixel is shaded as a cliff edge.
pub const CLIFF_THRESHOLD: f32 = 11.0;

/// Channel scale applied to cliff pixels, out of 255 (60% toward black).
pub const CLIFF_SHADE: u32 = 102;

const BORDER: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Looks up the texture of every tileset of a grid, indexed like the
/// grid's tile array.
pub fn resolve_textures<T: TextureSource + ?Sized>(
    grid: &DecodedGrid,
    source: &T,
) -> Vec<Option<Arc<RgbaImage>>> {
    grid.tilesets
        .iter()
        .map(|t| source.tile_image(&t.resource_name))
        .collect()
}

/// Renders one grid into a 100×100 image.
///
/// `textures[i]` is the texture of tileset `i`. Textures wrap around in
/// absolute world pixels so neighbouring grids tile seamlessly.
pub fn render_grid(grid: &DecodedGrid, textures: &[Option<Arc<RgbaImage>>]) -> RgbaImage {
    let mut img = RgbaImage::new(GRID_PIXELS, GRID_PIXELS);
    sample_textures(&mut img, grid, textures);

    if let Some(heights) = grid.zmap.as_deref().filter(|z| z.len() == GRID_SIZE) {
        shade_cliffs(&mut img, heights);
    }
    if grid.tiles.len() == GRID_SIZE {
        draw_priority_borders(&mut img, &grid.tiles);
    }
    img
}

fn sample_textures(img: &mut RgbaImage, grid: &DecodedGrid, textures: &[Option<Arc<RgbaImage>>]) {
    let base_x = grid.coord.x as i64 * GRID_PIXELS as i64;
    let base_y = grid.coord.y as i64 * GRID_PIXELS as i64;

    for py in 0..GRID_PIXELS {
        for px in 0..GRID_PIXELS {
            let texture = grid
                .tile_at(px, py)
                .and_then(|i| textures.get(i as usize))
                .and_then(|t| t.as_deref())
                .filter(|t| t.width() > 0 && t.height() > 0);

            let color = match texture {
                Some(tex) => {
                    let tx = wrap(base_x + px as i64, tex.width());
                    let ty = wrap(base_y + py as i64, tex.height());
                    *tex.get_pixel(tx, ty)
                }
                None => MISSING_TEXTURE,
            };
            img.put_pixel(px, py, color);
        }
    }
}

#[inline]
fn wrap(coord: i64, size: u32) -> u32 {
    let s = size as i64;
    (((coord % s) + s) % s) as u32
}

#[inline]
fn index(x: u32, y: u32) -> usize {
    (y * GRID_PIXELS + x) as usize
}

/// Offsets of the four direct neighbours.
const NEIGHBOURS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn shade_cliffs(img: &mut RgbaImage, heights: &[f32]) {
    for y in 1..GRID_PIXELS - 1 {
        for x in 1..GRID_PIXELS - 1 {
            let h = heights[index(x, y)];
            let cliff = NEIGHBOURS.iter().any(|&(dx, dy)| {
                let n = heights[index(x.wrapping_add_signed(dx), y.wrapping_add_signed(dy))];
                (h - n).abs() > CLIFF_THRESHOLD
            });
            if cliff {
                let p = img.get_pixel_mut(x, y);
                for c in &mut p.0[..3] {
                    *c = (*c as u32 * CLIFF_SHADE / 255) as u8;
                }
            }
        }
    }
}

fn draw_priority_borders(img: &mut RgbaImage, tiles: &[u16]) {
    for y in 1..GRID_PIXELS - 1 {
        for x in 1..GRID_PIXELS - 1 {
            let t = tiles[index(x, y)];
            let border = NEIGHBOURS.iter().any(|&(dx, dy)| {
                tiles[index(x.wrapping_add_signed(dx), y.wrapping_add_signed(dy))] > t
            });
            if border {
                img.put_pixel(x, y, BORDER);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;
    use crate::hmap::Tileset;

    fn tileset(name: &str) -> Tileset {
        Tileset {
            resource_name: name.to_string(),
            version: 1,
            priority: 0,
        }
    }

    fn flat_grid(tilesets: usize) -> DecodedGrid {
        DecodedGrid {
            version: 4,
            grid_id: 1,
            segment_id: 1,
            mtime: 0,
            coord: Coord::new(0, 0),
            tilesets: (0..tilesets).map(|i| tileset(&format!("t{}", i))).collect(),
            tiles: vec![0; GRID_SIZE],
            zmap: None,
            overlays: Vec::new(),
        }
    }

    fn solid(color: [u8; 4]) -> Option<Arc<RgbaImage>> {
        Some(Arc::new(RgbaImage::from_pixel(8, 8, Rgba(color))))
    }

    #[test]
    fn test_out_of_range_index_renders_gray() {
        let mut grid = flat_grid(1);
        grid.tiles[index(10, 10)] = 5;
        let img = render_grid(&grid, &[solid([0, 255, 0, 255])]);
        assert_eq!(*img.get_pixel(10, 10), Rgba([128, 128, 128, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_missing_texture_renders_gray() {
        let grid = flat_grid(1);
        let img = render_grid(&grid, &[None]);
        assert!(img.pixels().all(|p| *p == MISSING_TEXTURE));
    }

    #[test]
    fn test_cliff_shading_above_threshold() {
        let mut grid = flat_grid(1);
        let mut heights = vec![0.0f32; GRID_SIZE];
        heights[index(50, 50)] = 12.0;
        grid.zmap = Some(heights);

        let img = render_grid(&grid, &[solid([200, 100, 51, 255])]);

        // 200·102/255, 100·102/255, 51·102/255
        let shaded = Rgba([80, 40, 20, 255]);
        assert_eq!(*img.get_pixel(50, 50), shaded);
        assert_eq!(*img.get_pixel(51, 50), shaded);
        assert_eq!(*img.get_pixel(50, 49), shaded);
        assert_eq!(*img.get_pixel(51, 51), Rgba([200, 100, 51, 255]));
    }

    #[test]
    fn test_no_shading_at_small_delta() {
        let mut grid = flat_grid(1);
        let mut heights = vec![0.0f32; GRID_SIZE];
        heights[index(50, 50)] = 10.0;
        grid.zmap = Some(heights);

        let img = render_grid(&grid, &[solid([200, 100, 51, 255])]);
        assert_eq!(*img.get_pixel(50, 50), Rgba([200, 100, 51, 255]));
    }

    #[test]
    fn test_edge_pixels_not_shaded() {
        let mut grid = flat_grid(1);
        let mut heights = vec![0.0f32; GRID_SIZE];
        heights[index(0, 50)] = 50.0;
        grid.zmap = Some(heights);

        let img = render_grid(&grid, &[solid([200, 200, 200, 255])]);
        assert_eq!(*img.get_pixel(0, 50), Rgba([200, 200, 200, 255]));
        // the interior neighbour still sees the drop
        assert_eq!(img.get_pixel(1, 50)[0], 80);
    }

    #[test]
    fn test_priority_border_drawn_on_lower_side() {
        let mut grid = flat_grid(2);
        for y in 0..GRID_PIXELS {
            for x in 50..GRID_PIXELS {
                grid.tiles[index(x, y)] = 1;
            }
        }
        let img = render_grid(&grid, &[solid([0, 0, 255, 255]), solid([255, 0, 0, 255])]);

        assert_eq!(*img.get_pixel(49, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(50, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(48, 20), Rgba([0, 0, 255, 255]));
        // edge rows are never outlined
        assert_eq!(*img.get_pixel(49, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_texture_wraps_in_world_space() {
        let mut tex = RgbaImage::new(3, 1);
        tex.put_pixel(0, 0, Rgba([10, 0, 0, 255]));
        tex.put_pixel(1, 0, Rgba([20, 0, 0, 255]));
        tex.put_pixel(2, 0, Rgba([30, 0, 0, 255]));
        let textures = [Some(Arc::new(tex))];

        let mut grid = flat_grid(1);
        grid.coord = Coord::new(-1, 0);
        let img = render_grid(&grid, &textures);

        // absolute x = -100 → ((-100 % 3) + 3) % 3 = 2
        assert_eq!(img.get_pixel(0, 0)[0], 30);
        // absolute x = -99 → 0
        assert_eq!(img.get_pixel(1, 0)[0], 10);
    }

    #[test]
    fn test_missing_tiles_skip_borders() {
        let mut grid = flat_grid(1);
        grid.tiles.clear();
        let img = render_grid(&grid, &[solid([1, 2, 3, 255])]);
        assert!(img.pixels().all(|p| *p == MISSING_TEXTURE));
    }
}
