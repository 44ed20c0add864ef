// Copyright (c) 2025 The cell_counter authors
// See LICENSE file in root directory for license terms.

use thiserror::Error;

/// Rejected [crate::algorithm::CellCounterConfig] values. A pipeline cannot be
/// constructed from a configuration that fails validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("tile size must be at least 1")]
    ZeroTileSize,

    #[error("tile size must be odd, got {0}")]
    EvenTileSize(u32),

    #[error("density factor must be in (0, 1], got {0}")]
    FactorOutOfRange(f32),
}
