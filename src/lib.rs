// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

//! CellCounter counts biological cells in color microscopy images of cells
//! grown on microcarriers. Given an RGBA image, it returns the number of cells
//! found together with an annotated image in which each cell is a black
//! square on a white background.
//!
//! # Algorithm
//!
//! Five stages run in sequence, each producing a new image from the previous
//! one:
//!
//! 1. Background stripping: pixels with a bright green channel are whitened.
//! 2. Red carrier stripping: pixels with a strong red channel belong to
//!    microcarriers and are whitened.
//! 3. Blue carrier stripping: pixels lacking the blue of stained cells are
//!    whitened.
//! 4. Denoising: the image is divided into square tiles (15x15 by default).
//!    Tiles where fewer than 25% of pixels are colored are whitened.
//! 5. Counting: each tile where at least 25% of pixels are colored counts as
//!    one cell and is painted black.
//!
//! All thresholds are fixed; see [algorithm::CellCounterConfig].
//!
//! # Caveats
//!
//! * Tiles are classified independently. A large cell straddling several
//!   tiles counts once per qualifying tile, and two small cells in one tile
//!   count once.
//! * Pixels in the rightmost columns and bottom rows that do not fill a whole
//!   tile are never examined; they pass through the last two stages as is.
//! * Only the RGB channels are ever rewritten. Alpha is carried through
//!   unchanged.

pub mod algorithm;
pub mod channel_filter;
pub mod error;
pub mod grid;
pub mod pixel_funcs;
