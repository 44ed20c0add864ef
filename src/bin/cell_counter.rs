// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger;
use image::imageops::{self, FilterType};
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing;
use log::{info, warn};

use cell_counter::algorithm::{CellCounter, CellCounterConfig};

/// Counts cells in microscopy image(s) and writes annotated images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Path of the file or directory to process.
    #[arg(short, long)]
    input: String,

    /// Directory where output file(s) are written.
    #[arg(short, long)]
    output: String,

    /// Side length of the classification tiles. Must be odd.
    #[arg(short, long, default_value_t = 15)]
    tile_size: u32,

    /// Fraction of colored pixels needed for a tile to be a cell.
    #[arg(short, long, default_value_t = 0.25)]
    factor: f32,

    /// Pixels with a green channel above this are background.
    #[arg(long, default_value_t = 140)]
    max_green: u8,

    /// Pixels with a red channel above this are microcarrier.
    #[arg(long, default_value_t = 80)]
    max_red: u8,

    /// Pixels with a blue channel below this are microcarrier.
    #[arg(long, default_value_t = 80)]
    min_blue: u8,

    /// Also write the image after every pipeline stage.
    #[arg(long, default_value_t = false)]
    stages: std::primitive::bool,

    /// Also write the input image with an outline around each cell.
    #[arg(long, default_value_t = false)]
    overlay: std::primitive::bool,

    /// If nonzero, written images are resized to this many pixels square.
    #[arg(short, long, default_value_t = 0)]
    panel_size: u32,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = CellCounterConfig{tile_size: args.tile_size,
                                   density_factor: args.factor,
                                   max_green: args.max_green,
                                   max_red: args.max_red,
                                   min_blue: args.min_blue};
    let counter = CellCounter::new(config).unwrap_or_else(|e| {
        panic!("Invalid configuration {:?}: {}", config, e);
    });

    let input = Path::new(&args.input);
    let output_dir = Path::new(&args.output);
    if !output_dir.is_dir() {
        panic!("Output '{}' is not an existing directory", args.output);
    }
    if input.is_dir() {
        let entries = fs::read_dir(input).unwrap_or_else(|e| {
            panic!("Cannot list images in '{}': {}", args.input, e);
        });
        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        // Deterministic processing order.
        images.sort();
        info!("Counting cells in {} files under {:?}", images.len(), input);
        for image_path in images {
            process_file(&image_path, &counter, &args);
        }
    } else if input.is_file() {
        process_file(input, &counter, &args);
    } else {
        panic!("Input image or directory '{}' not found", args.input);
    }
}

fn ms_per_megapixel(elapsed: Duration, width: u32, height: u32) -> f64 {
    elapsed.as_secs_f64() * 1000.0 / (width as f64 * height as f64 / 1000000.0)
}

fn output_path(input_path: &Path, args: &Args, suffix: &str) -> PathBuf {
    let stem = input_path.file_stem().unwrap().to_string_lossy();
    let mut path = PathBuf::from(&args.output);
    path.push(format!("{}_{}.png", stem, suffix));
    path
}

fn save(image: &RgbaImage, path: &Path, panel_size: u32) {
    let result = if panel_size > 0 {
        imageops::resize(image, panel_size, panel_size, FilterType::Lanczos3)
            .save(path)
    } else {
        image.save(path)
    };
    match result {
        Ok(()) => info!("Wrote {:?}", path),
        Err(e) => warn!("Could not write {:?}: {:?}", path, e),
    }
}

fn process_file(input_path: &Path, counter: &CellCounter, args: &Args) {
    info!("Processing {:?}", input_path);
    let img = match ImageReader::open(input_path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping {:?} due to: {:?}", input_path, e);
                return;
            },
        },
        Err(e) => {
            warn!("Skipping {:?} due to: {:?}", input_path, e);
            return;
        },
    };
    let img_rgba = img.into_rgba8();
    let (width, height) = img_rgba.dimensions();
    if width == 0 || height == 0 {
        warn!("Skipping empty image {:?}", input_path);
        return;
    }

    let count_start = Instant::now();
    let result = counter.count_cells(&img_rgba, args.stages);
    let elapsed = count_start.elapsed();
    info!("{}ms per megapixel", ms_per_megapixel(elapsed, width, height));
    println!("{}: number of cells found: {}",
             input_path.display(), result.cell_count);

    save(&result.annotated, &output_path(input_path, args, "cells"), args.panel_size);
    for (stage, stage_image) in &result.stage_images {
        save(stage_image, &output_path(input_path, args, stage.name()), args.panel_size);
    }
    if args.overlay {
        // Outline each cell tile on the input image.
        let mut overlay = img_rgba;
        for cell in &result.cells {
            drawing::draw_hollow_rect_mut(&mut overlay, cell.rect(),
                                          Rgba::<u8>([255, 0, 0, 255]));
        }
        save(&overlay, &output_path(input_path, args, "overlay"), args.panel_size);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use super::*;

    #[test]
    fn test_ms_per_megapixel() {
        assert_abs_diff_eq!(ms_per_megapixel(Duration::from_millis(10), 1000, 2000),
                            5.0, epsilon = 1e-9);
        // 4.9 gigapixels; past the u32 range.
        assert_abs_diff_eq!(ms_per_megapixel(Duration::from_secs(49), 70000, 70000),
                            10.0, epsilon = 1e-9);
    }
}
