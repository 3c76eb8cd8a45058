//! Tile origin computation.
//!
//! Origins along an axis start at 0 and step by `stride = round(tile ×
//! (1 − overlap))` while the tile still fits; when the grid does not reach
//! the far edge, one final origin clamped to `extent − tile` is appended
//! (and deduplicated when the grid already ends flush). Rasters smaller
//! than one tile yield the single origin 0 on that axis; the extractor
//! zero-pads the crop. Clamp is the fixed boundary policy: tiles are never
//! dropped and interior tiles are never padded.

use crate::extract::TilingError;

/// Tile shape configuration shared by a whole run.
#[derive(Debug, Clone, Copy)]
pub struct TilingConfig {
    pub tile_size: u32,
    /// Fraction of tile size shared between adjacent tiles, in [0, 1).
    pub overlap: f32,
}

impl TilingConfig {
    pub fn new(tile_size: u32, overlap: f32) -> Self {
        Self { tile_size, overlap }
    }

    pub fn validate(&self) -> Result<(), TilingError> {
        if self.tile_size == 0 {
            return Err(TilingError::Validation(
                "tile size must be positive".to_string(),
            ));
        }
        if !self.overlap.is_finite() || !(0.0..1.0).contains(&self.overlap) {
            return Err(TilingError::Validation(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> u32 {
        let stride = (self.tile_size as f32 * (1.0 - self.overlap)).round() as u32;
        stride.max(1)
    }
}

/// One tile origin; `row`/`col` index the origin sequences along y/x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOrigin {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
}

/// Ordered tile origins for one raster. Iteration is row-major, finite, and
/// restartable (`iter` can be called any number of times).
#[derive(Debug, Clone)]
pub struct TileGrid {
    tile_size: u32,
    stride: u32,
    xs: Vec<u32>,
    ys: Vec<u32>,
}

fn axis_origins(extent: u32, tile: u32, stride: u32) -> Vec<u32> {
    if extent <= tile {
        return vec![0];
    }
    let mut origins = Vec::new();
    let mut pos = 0u32;
    while pos + tile <= extent {
        origins.push(pos);
        pos += stride;
    }
    let clamped = extent - tile;
    if origins.last() != Some(&clamped) {
        origins.push(clamped);
    }
    origins
}

impl TileGrid {
    pub fn new(width: u32, height: u32, config: &TilingConfig) -> Result<Self, TilingError> {
        config.validate()?;
        let stride = config.stride();
        Ok(Self {
            tile_size: config.tile_size,
            stride,
            xs: axis_origins(width, config.tile_size, stride),
            ys: axis_origins(height, config.tile_size, stride),
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    pub fn len(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TileOrigin> + '_ {
        self.ys.iter().enumerate().flat_map(move |(row, &y)| {
            self.xs.iter().enumerate().map(move |(col, &x)| TileOrigin {
                row: row as u32,
                col: col as u32,
                x,
                y,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xs(width: u32, height: u32, tile: u32, overlap: f32) -> Vec<u32> {
        let grid = TileGrid::new(width, height, &TilingConfig::new(tile, overlap)).unwrap();
        grid.iter()
            .filter(|o| o.row == 0)
            .map(|o| o.x)
            .collect()
    }

    #[test]
    fn overlap_grid_clamps_the_final_column() {
        // stride = round(512 * 0.7) = 358; 716 would overrun, so the final
        // origin clamps to 1024 - 512.
        let grid = TileGrid::new(1024, 1024, &TilingConfig::new(512, 0.3)).unwrap();
        assert_eq!(grid.stride(), 358);
        assert_eq!(xs(1024, 1024, 512, 0.3), vec![0, 358, 512]);
        assert_eq!(grid.len(), 9);
    }

    #[test]
    fn flush_grid_has_no_duplicate_final_origin() {
        assert_eq!(xs(1024, 1024, 512, 0.0), vec![0, 512]);
    }

    #[test]
    fn row_major_order_with_sequential_indices() {
        let grid = TileGrid::new(1024, 700, &TilingConfig::new(512, 0.3)).unwrap();
        let origins: Vec<_> = grid.iter().collect();
        assert_eq!(origins.len(), 6);
        assert_eq!(
            origins[0],
            TileOrigin { row: 0, col: 0, x: 0, y: 0 }
        );
        assert_eq!(
            origins[2],
            TileOrigin { row: 0, col: 2, x: 512, y: 0 }
        );
        // Second (clamped) row starts at y = 700 - 512.
        assert_eq!(
            origins[3],
            TileOrigin { row: 1, col: 0, x: 0, y: 188 }
        );
    }

    #[test]
    fn origins_stay_inside_the_raster() {
        for (w, h, t, f) in [
            (1024u32, 1024u32, 512u32, 0.3f32),
            (999, 1313, 512, 0.25),
            (512, 512, 512, 0.5),
            (513, 512, 512, 0.0),
            (2048, 77, 64, 0.9),
        ] {
            let grid = TileGrid::new(w, h, &TilingConfig::new(t, f)).unwrap();
            let mut last: Option<TileOrigin> = None;
            for origin in grid.iter() {
                assert!(origin.x + t <= w.max(t));
                assert!(origin.y + t <= h.max(t));
                // Row-major: strides between consecutive origins never go
                // backwards within a row.
                if let Some(prev) = last {
                    if prev.row == origin.row {
                        assert!(origin.x > prev.x);
                    }
                }
                last = Some(origin);
            }
        }
    }

    #[test]
    fn sub_tile_raster_yields_one_origin() {
        let grid = TileGrid::new(300, 200, &TilingConfig::new(512, 0.3)).unwrap();
        let origins: Vec<_> = grid.iter().collect();
        assert_eq!(
            origins,
            vec![TileOrigin { row: 0, col: 0, x: 0, y: 0 }]
        );
    }

    #[test]
    fn iteration_is_restartable() {
        let grid = TileGrid::new(1024, 1024, &TilingConfig::new(512, 0.3)).unwrap();
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = grid.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn bad_config_is_rejected() {
        assert!(TileGrid::new(100, 100, &TilingConfig::new(0, 0.3)).is_err());
        assert!(TileGrid::new(100, 100, &TilingConfig::new(64, 1.0)).is_err());
        assert!(TileGrid::new(100, 100, &TilingConfig::new(64, -0.1)).is_err());
        assert!(TileGrid::new(100, 100, &TilingConfig::new(64, f32::NAN)).is_err());
    }

    #[test]
    fn extreme_overlap_still_advances() {
        // round(8 * 0.01) = 0 would never terminate; stride floors at 1.
        let cfg = TilingConfig::new(8, 0.99);
        assert_eq!(cfg.stride(), 1);
        let grid = TileGrid::new(12, 8, &cfg).unwrap();
        assert_eq!(grid.cols(), 5);
        assert_eq!(grid.rows(), 1);
    }
}
