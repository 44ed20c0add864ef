// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

use std::time::Instant;

use image::RgbaImage;
use log::{debug, info};

use crate::channel_filter::ChannelThreshold;
use crate::error::ConfigError;
use crate::grid::{transform_tiles, Tile};
use crate::pixel_funcs::{BLACK, WHITE};

/// Tunable constants of the cell counting pipeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellCounterConfig {
    /// Side length of the square tiles used for density classification. Must
    /// be odd so that each tile has a center pixel.
    pub tile_size: u32,

    /// Minimum fraction of colored pixels for a tile to count as a cell.
    /// Must be in (0, 1].
    pub density_factor: f32,

    /// Pixels with green above this are background.
    pub max_green: u8,

    /// Pixels with red above this are microcarrier.
    pub max_red: u8,

    /// Pixels with blue below this are microcarrier.
    pub min_blue: u8,
}

impl Default for CellCounterConfig {
    fn default() -> Self {
        CellCounterConfig{tile_size: 15,
                          density_factor: 0.25,
                          max_green: 140,
                          max_red: 80,
                          min_blue: 80}
    }
}

impl CellCounterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }
        if self.tile_size % 2 == 0 {
            return Err(ConfigError::EvenTileSize(self.tile_size));
        }
        // Also rejects NaN.
        if !(self.density_factor > 0.0 && self.density_factor <= 1.0) {
            return Err(ConfigError::FactorOutOfRange(self.density_factor));
        }
        Ok(())
    }
}

/// The states an image passes through, in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PipelineStage {
    Loaded,
    BackgroundStripped,
    RedStripped,
    BlueStripped,
    Denoised,
    Counted,
}

impl PipelineStage {
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Loaded => Some(PipelineStage::BackgroundStripped),
            PipelineStage::BackgroundStripped => Some(PipelineStage::RedStripped),
            PipelineStage::RedStripped => Some(PipelineStage::BlueStripped),
            PipelineStage::BlueStripped => Some(PipelineStage::Denoised),
            PipelineStage::Denoised => Some(PipelineStage::Counted),
            PipelineStage::Counted => None,
        }
    }

    /// Short lowercase name, suitable for file name suffixes.
    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::Loaded => "loaded",
            PipelineStage::BackgroundStripped => "background",
            PipelineStage::RedStripped => "red",
            PipelineStage::BlueStripped => "blue",
            PipelineStage::Denoised => "denoised",
            PipelineStage::Counted => "counted",
        }
    }
}

/// Whitens every tile whose colored-pixel density is strictly below
/// `density_factor`. Such tiles hold stray "rogue" pixels too sparse to be a
/// cell. Other tiles, and pixels outside any tile, are copied unchanged.
///
/// # Panics
/// If `image` has a zero dimension or `tile_size` is zero or even.
pub fn remove_rogue_pixels(image: &RgbaImage, tile_size: u32, density_factor: f32)
                           -> RgbaImage {
    let denoise_start = Instant::now();
    let (denoised, whitened) = transform_tiles(
        image, tile_size,
        |tile| (tile.density() < density_factor).then_some(WHITE));
    debug!("Whitened {} sparse tiles in {:?}",
           whitened.len(), denoise_start.elapsed());
    denoised
}

/// Classifies every tile whose colored-pixel density is at least
/// `density_factor` as a cell and paints it solid black. Returns the annotated
/// image along with the cell tiles; the number of cells is the length of the
/// returned Vec.
///
/// The `>=` here is the complement of the `<` in [remove_rogue_pixels()], so
/// at a given factor every tile is either whitened there or counted here.
///
/// # Panics
/// If `image` has a zero dimension or `tile_size` is zero or even.
pub fn mark_cells(image: &RgbaImage, tile_size: u32, density_factor: f32)
                  -> (RgbaImage, Vec<Tile>) {
    let count_start = Instant::now();
    let (marked, cells) = transform_tiles(
        image, tile_size,
        |tile| (tile.density() >= density_factor).then_some(BLACK));
    debug!("Marked {} cell tiles in {:?}", cells.len(), count_start.elapsed());
    (marked, cells)
}

#[derive(Debug)]
pub struct CellCountResult {
    /// Number of tiles classified as cells.
    pub cell_count: u32,

    /// The cell tiles, in raster order of their pivots.
    pub cells: Vec<Tile>,

    /// Final image: black cell tiles on a white background, with each pixel's
    /// original alpha.
    pub annotated: RgbaImage,

    /// Every intermediate image, starting with a copy of the input, if
    /// requested. Empty otherwise.
    pub stage_images: Vec<(PipelineStage, RgbaImage)>,
}

/// Counts the cells in a microscopy image by stripping background and
/// microcarrier pixels with fixed color thresholds and then classifying a grid
/// of tiles by colored-pixel density.
#[derive(Debug)]
pub struct CellCounter {
    config: CellCounterConfig,
}

impl CellCounter {
    pub fn new(config: CellCounterConfig) -> Result<CellCounter, ConfigError> {
        config.validate()?;
        Ok(CellCounter{config})
    }

    pub fn config(&self) -> &CellCounterConfig {
        &self.config
    }

    /// The background, red carrier and blue carrier filters, in the order
    /// they are applied.
    pub fn channel_filters(&self) -> [ChannelThreshold; 3] {
        [ChannelThreshold::background(self.config.max_green),
         ChannelThreshold::red_carrier(self.config.max_red),
         ChannelThreshold::blue_carrier(self.config.min_blue)]
    }

    /// Runs the full pipeline on `image`.
    ///
    /// # Arguments
    ///   `image` - The image to analyze. It is not modified.
    ///
    ///   `return_stage_images` - If true, a copy of the image after every
    ///   stage is returned in [CellCountResult::stage_images]. Otherwise each
    ///   intermediate image is dropped as soon as the next stage has consumed
    ///   it.
    ///
    /// # Panics
    /// If `image` has a zero dimension.
    pub fn count_cells(&self, image: &RgbaImage, return_stage_images: bool)
                       -> CellCountResult {
        let pipeline_start = Instant::now();
        let (width, height) = image.dimensions();
        assert!(width > 0 && height > 0, "Image is empty WxH {}x{}", width, height);
        info!("Image width x height: {}x{}", width, height);

        let mut stage_images = Vec::<(PipelineStage, RgbaImage)>::new();
        let mut stage: Option<PipelineStage> = None;
        let mut record = |stage_image: &RgbaImage| {
            let this_stage = match stage {
                None => PipelineStage::Loaded,
                Some(prev) => match prev.next() {
                    Some(s) => s,
                    None => panic!("No stage follows {:?}", prev),
                },
            };
            assert_eq!(stage_image.dimensions(), (width, height),
                       "{:?} changed the image dimensions", this_stage);
            if return_stage_images {
                stage_images.push((this_stage, stage_image.clone()));
            }
            stage = Some(this_stage);
        };

        record(image);
        let [background, red_carrier, blue_carrier] = self.channel_filters();
        let stripped = background.apply(image);
        record(&stripped);
        let stripped = red_carrier.apply(&stripped);
        record(&stripped);
        let stripped = blue_carrier.apply(&stripped);
        record(&stripped);
        info!("Channel filters done in {:?}", pipeline_start.elapsed());

        let denoised = remove_rogue_pixels(
            &stripped, self.config.tile_size, self.config.density_factor);
        drop(stripped);
        record(&denoised);
        let (annotated, cells) = mark_cells(
            &denoised, self.config.tile_size, self.config.density_factor);
        drop(denoised);
        record(&annotated);

        let cell_count = cells.len() as u32;
        info!("Found {} cells in {:?}", cell_count, pipeline_start.elapsed());
        CellCountResult{cell_count, cells, annotated, stage_images}
    }
}
