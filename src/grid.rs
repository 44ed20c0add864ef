// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

//! Partitioning of an image into square, non-overlapping tiles of odd side
//! length `S`. Tiles are addressed by their center ("pivot") pixel. Pivots are
//! spaced `S` apart starting at `(S-1)/2`, and a pivot is visited only if its
//! whole tile fits in the image; any trailing strip narrower than `S` along
//! the right or bottom edge belongs to no tile.

use image::RgbaImage;
use imageproc::rect::Rect;
use log::debug;
use rayon::prelude::*;

use crate::pixel_funcs::{is_colored, repaint, CHANNELS};

/// Tile layout for one image size and tile side length.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TileGrid {
    tile_size: u32,
    columns: u32,
    rows: u32,
}

// Pivot coordinates along one axis of length `dimension`.
fn axis_pivots(dimension: u32, tile_size: u32) -> impl Iterator<Item = u32> {
    let radius = (tile_size - 1) / 2;
    (radius..).step_by(tile_size as usize)
        .take_while(move |pivot| pivot + radius < dimension)
}

impl TileGrid {
    /// # Panics
    /// If `tile_size` is zero or even.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        assert!(tile_size % 2 == 1, "Tile size must be odd, got {}", tile_size);
        TileGrid{tile_size,
                 columns: axis_pivots(width, tile_size).count() as u32,
                 rows: axis_pivots(height, tile_size).count() as u32}
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Distance from a pivot to the edge of its tile.
    pub fn radius(&self) -> u32 {
        (self.tile_size - 1) / 2
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Pivot of the tile at (`column`, `row`).
    pub fn pivot(&self, column: u32, row: u32) -> (u32, u32) {
        (column * self.tile_size + self.radius(), row * self.tile_size + self.radius())
    }

    /// Byte range within one image row covered by tiles in `column`.
    pub fn column_bytes(&self, column: u32) -> std::ops::Range<usize> {
        let start = (column * self.tile_size) as usize * CHANNELS;
        start..start + self.tile_size as usize * CHANNELS
    }
}

/// A visited tile together with the number of colored pixels it held when it
/// was examined.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Tile {
    pub pivot_x: u32,
    pub pivot_y: u32,
    pub colored_count: u32,
    pub tile_size: u32,
}

impl Tile {
    pub fn area(&self) -> u32 {
        self.tile_size * self.tile_size
    }

    /// Fraction of the tile's pixels that are colored.
    pub fn density(&self) -> f32 {
        self.colored_count as f32 / self.area() as f32
    }

    /// Pixel region covered by this tile.
    pub fn rect(&self) -> Rect {
        let radius = (self.tile_size - 1) / 2;
        Rect::at((self.pivot_x - radius) as i32, (self.pivot_y - radius) as i32)
            .of_size(self.tile_size, self.tile_size)
    }
}

/// Number of colored pixels in the `columns` byte range of every row of
/// `band`, a run of whole image rows `row_len` bytes long.
pub fn count_colored_in_band(band: &[u8], row_len: usize,
                             columns: std::ops::Range<usize>) -> u32 {
    let mut count = 0;
    for row in band.chunks_exact(row_len) {
        count += row[columns.clone()]
            .chunks_exact(CHANNELS)
            .filter(|pixel| is_colored(pixel))
            .count() as u32;
    }
    count
}

/// Examines every tile of `image` and repaints the tiles for which `decide`
/// returns a color. Repainting rewrites RGB only; each pixel keeps its own
/// alpha. Pixels outside repainted tiles are copied unchanged.
///
/// Returns the output image and the repainted tiles in row-major order.
///
/// Tiles are independent, so bands of `tile_size` rows are processed in
/// parallel, each owning its slice of the output.
///
/// # Panics
/// If `image` has a zero dimension or `tile_size` is zero or even.
pub fn transform_tiles<F>(image: &RgbaImage, tile_size: u32, decide: F)
                          -> (RgbaImage, Vec<Tile>)
where F: Fn(&Tile) -> Option<[u8; 3]> + Sync
{
    let (width, height) = image.dimensions();
    assert!(width > 0 && height > 0, "Image is empty WxH {}x{}", width, height);
    let grid = TileGrid::new(width, height, tile_size);
    debug!("Examining {}x{} tiles of size {}", grid.columns(), grid.rows(), tile_size);
    let row_len = width as usize * CHANNELS;
    let band_len = row_len * grid.tile_size() as usize;

    let mut output = image.clone();
    let painted_by_band: Vec<Vec<Tile>> = output.par_chunks_mut(band_len)
        .take(grid.rows() as usize)
        .enumerate()
        .map(|(row, band)| {
            let mut painted = Vec::<Tile>::new();
            for column in 0..grid.columns() {
                let bytes = grid.column_bytes(column);
                let colored_count = count_colored_in_band(band, row_len, bytes.clone());
                let (pivot_x, pivot_y) = grid.pivot(column, row as u32);
                let tile = Tile{pivot_x, pivot_y, colored_count,
                                tile_size: grid.tile_size()};
                if let Some(rgb) = decide(&tile) {
                    for tile_row in band.chunks_exact_mut(row_len) {
                        for pixel in tile_row[bytes.clone()].chunks_exact_mut(CHANNELS) {
                            repaint(pixel, rgb);
                        }
                    }
                    painted.push(tile);
                }
            }
            painted
        }).collect();

    (output, painted_by_band.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use image::Rgba;
    use super::*;

    #[test]
    fn test_pivots_skip_partial_tiles() {
        assert_eq!(axis_pivots(29, 15).collect::<Vec<_>>(), vec![7]);
        assert_eq!(axis_pivots(30, 15).collect::<Vec<_>>(), vec![7, 22]);
        assert_eq!(axis_pivots(31, 15).collect::<Vec<_>>(), vec![7, 22]);
        assert_eq!(axis_pivots(14, 15).count(), 0);
        assert_eq!(axis_pivots(5, 1).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        for dimension in 0..100 {
            assert_eq!(axis_pivots(dimension, 15).count() as u32, dimension / 15);
            assert_eq!(axis_pivots(dimension, 3).count() as u32, dimension / 3);
        }
    }

    #[test]
    fn test_grid_layout() {
        let grid = TileGrid::new(31, 29, 15);
        assert_eq!(grid.radius(), 7);
        assert_eq!(grid.columns(), 2);
        assert_eq!(grid.rows(), 1);
        assert_eq!(grid.tile_size(), 15);
        assert_eq!(grid.pivot(0, 0), (7, 7));
        assert_eq!(grid.pivot(1, 0), (22, 7));
        assert_eq!(grid.column_bytes(1), 60..120);

        let rect = Tile{pivot_x: 22, pivot_y: 7, colored_count: 0, tile_size: 15}.rect();
        assert_eq!(rect.left(), 15);
        assert_eq!(rect.top(), 0);
        assert_eq!(rect.right(), 29);
        assert_eq!(rect.bottom(), 14);
    }

    #[test]
    #[should_panic]
    fn test_even_tile_size() {
        TileGrid::new(30, 30, 4);
    }

    #[test]
    fn test_tile_density() {
        let tile = Tile{pivot_x: 7, pivot_y: 7, colored_count: 57, tile_size: 15};
        assert_eq!(tile.area(), 225);
        assert_abs_diff_eq!(tile.density(), 0.2533, epsilon = 0.0001);
        assert!(tile.density() >= 0.25);
        let tile = Tile{colored_count: 56, ..tile};
        assert!(tile.density() < 0.25);
    }

    // Colors the first `count` pixels (raster order) of the tile at `rect`.
    fn color_pixels(image: &mut RgbaImage, rect: &Rect, count: u32) {
        let mut remaining = count;
        for y in rect.top()..=rect.bottom() {
            for x in rect.left()..=rect.right() {
                if remaining == 0 {
                    return;
                }
                image.put_pixel(x as u32, y as u32, Rgba([0, 0, 100, 255]));
                remaining -= 1;
            }
        }
    }

    #[test]
    fn test_transform_tiles_counts_and_paints() {
        let mut image = RgbaImage::from_pixel(31, 31, Rgba([255, 255, 255, 9]));
        let tile_at = |x, y| Tile{pivot_x: x, pivot_y: y, colored_count: 0, tile_size: 15};
        color_pixels(&mut image, &tile_at(7, 7).rect(), 10);
        color_pixels(&mut image, &tile_at(22, 22).rect(), 200);
        // Outside any tile; never examined nor painted.
        image.put_pixel(30, 30, Rgba([0, 0, 100, 255]));

        let seen = std::sync::Mutex::new(Vec::<Tile>::new());
        let (output, painted) = transform_tiles(&image, 15, |tile| {
            seen.lock().unwrap().push(*tile);
            (tile.colored_count > 100).then_some([1, 2, 3])
        });
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 4);
        let mut counts: Vec<u32> = seen.iter().map(|t| t.colored_count).collect();
        counts.sort();
        assert_eq!(counts, vec![0, 0, 10, 200]);

        assert_eq!(painted.len(), 1);
        assert_eq!((painted[0].pivot_x, painted[0].pivot_y), (22, 22));
        assert_eq!(painted[0].rect(), tile_at(22, 22).rect());
        assert_eq!(painted[0].colored_count, 200);

        for (x, y, pixel) in output.enumerate_pixels() {
            let in_painted = (15..30).contains(&x) && (15..30).contains(&y);
            if in_painted {
                assert_eq!(pixel.0[..3], [1, 2, 3]);
                assert_eq!(pixel.0[3], image.get_pixel(x, y).0[3]);
            } else {
                assert_eq!(pixel, image.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_count_colored_in_band() {
        let mut image = RgbaImage::from_pixel(6, 3, Rgba([255, 255, 255, 0]));
        image.put_pixel(0, 0, Rgba([0, 0, 100, 255]));
        image.put_pixel(2, 2, Rgba([255, 255, 254, 255]));
        image.put_pixel(3, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(5, 0, Rgba([1, 2, 3, 4]));
        let grid = TileGrid::new(6, 3, 3);
        let row_len = 6 * CHANNELS;
        assert_eq!(count_colored_in_band(image.as_raw(), row_len, grid.column_bytes(0)), 2);
        assert_eq!(count_colored_in_band(image.as_raw(), row_len, grid.column_bytes(1)), 2);
        // Only the first row.
        assert_eq!(count_colored_in_band(&image.as_raw()[..row_len], row_len, grid.column_bytes(1)), 1);
        assert_eq!(count_colored_in_band(image.as_raw(), row_len, 0..row_len), 4);
    }

    #[test]
    fn test_transform_tiles_no_tiles() {
        let image = RgbaImage::from_pixel(10, 40, Rgba([0, 0, 100, 255]));
        let (output, painted) = transform_tiles(&image, 15, |_| Some([0, 0, 0]));
        assert!(painted.is_empty());
        assert_eq!(output, image);
    }
}
