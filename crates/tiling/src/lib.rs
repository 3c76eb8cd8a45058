//! Tiling of large orthomosaic raster pairs into fixed-size overlapping
//! tiles.
//!
//! `grid` computes tile origins; `extract` crops and writes tile pairs and
//! appends manifest records. Rasters are independent: one raster's failure
//! aborts only that raster, and a run reports per-raster outcomes.

pub mod extract;
pub mod grid;

pub use extract::{
    discover_pairs, tile_split, PairPaths, SplitOutcome, TilingError, TilingResult,
};
pub use grid::{TileGrid, TileOrigin, TilingConfig};
