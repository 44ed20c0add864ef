// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

use image::{Rgba, RgbaImage};

/// RGB of the "not a cell" sentinel.
pub const WHITE: [u8; 3] = [255, 255, 255];

/// RGB painted over tiles that were counted as cells.
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Bytes per pixel in an [RgbaImage] buffer.
pub const CHANNELS: usize = 4;

/// A pixel is colored unless all of its RGB channels are 255. Alpha is not
/// considered.
#[inline]
pub fn is_colored(pixel: &[u8]) -> bool {
    pixel[0] != 255 || pixel[1] != 255 || pixel[2] != 255
}

/// Overwrites the RGB channels of `pixel`, leaving its alpha as is.
#[inline]
pub fn repaint(pixel: &mut [u8], rgb: [u8; 3]) {
    pixel[..3].copy_from_slice(&rgb);
}

/// Splits a packed 0xAARRGGBB value into an RGBA pixel.
pub fn argb_to_rgba(argb: u32) -> Rgba<u8> {
    let alpha = (argb >> 24) as u8;
    let red = (argb >> 16) as u8;
    let green = (argb >> 8) as u8;
    let blue = argb as u8;
    Rgba([red, green, blue, alpha])
}

/// Inverse of [argb_to_rgba()].
pub fn rgba_to_argb(pixel: &Rgba<u8>) -> u32 {
    let [red, green, blue, alpha] = pixel.0;
    (alpha as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

/// Builds a raster from a row-major buffer of packed ARGB pixels. Returns None
/// if `pixels` does not hold exactly `width * height` entries.
pub fn raster_from_argb(width: u32, height: u32, pixels: &[u32]) -> Option<RgbaImage> {
    if pixels.len() != width as usize * height as usize {
        return None;
    }
    let mut raw = Vec::with_capacity(pixels.len() * CHANNELS);
    for &argb in pixels {
        raw.extend_from_slice(&argb_to_rgba(argb).0);
    }
    RgbaImage::from_raw(width, height, raw)
}
