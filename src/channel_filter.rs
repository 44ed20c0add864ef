// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

use std::time::Instant;

use image::RgbaImage;
use log::debug;
use rayon::prelude::*;

use crate::pixel_funcs::{repaint, CHANNELS, WHITE};

/// Color channel examined by a [ChannelThreshold].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    // Offset of the channel within an RGBA pixel.
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Which side of the threshold gets whitened. Comparisons are strict: a
/// channel value equal to the threshold is never whitened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

/// Whitens every pixel whose selected channel crosses `threshold`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelThreshold {
    pub channel: Channel,
    pub threshold: u8,
    pub whiten_when: Comparison,
}

impl ChannelThreshold {
    /// Strips the light background: green above `max_green` is not a cell.
    pub fn background(max_green: u8) -> Self {
        ChannelThreshold{channel: Channel::Green, threshold: max_green,
                         whiten_when: Comparison::GreaterThan}
    }

    /// Strips the reddish tint of microcarriers.
    pub fn red_carrier(max_red: u8) -> Self {
        ChannelThreshold{channel: Channel::Red, threshold: max_red,
                         whiten_when: Comparison::GreaterThan}
    }

    /// Strips microcarrier pixels that lack the blue of stained cells.
    pub fn blue_carrier(min_blue: u8) -> Self {
        ChannelThreshold{channel: Channel::Blue, threshold: min_blue,
                         whiten_when: Comparison::LessThan}
    }

    /// True if a pixel with these RGBA bytes is to be whitened.
    #[inline]
    pub fn rejects(&self, pixel: &[u8]) -> bool {
        let value = pixel[self.channel.index()];
        match self.whiten_when {
            Comparison::GreaterThan => value > self.threshold,
            Comparison::LessThan => value < self.threshold,
        }
    }

    /// Returns a copy of `image` in which every rejected pixel is white. Alpha
    /// is carried over for all pixels; accepted pixels are unchanged.
    ///
    /// # Panics
    /// If `image` has a zero dimension.
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let filter_start = Instant::now();
        let (width, height) = image.dimensions();
        assert!(width > 0 && height > 0, "Image is empty WxH {}x{}", width, height);

        let mut output = image.clone();
        let row_len = width as usize * CHANNELS;
        let whitened: usize = output.par_chunks_mut(row_len).map(|row| {
            let mut row_whitened = 0;
            for pixel in row.chunks_exact_mut(CHANNELS) {
                if self.rejects(pixel) {
                    repaint(pixel, WHITE);
                    row_whitened += 1;
                }
            }
            row_whitened
        }).sum();
        debug!("{:?} whitened {} pixels in {:?}",
               self, whitened, filter_start.elapsed());
        output
    }
}
