//! Point cloud rasterization
//!
//! Points `[x, y, v1..vk]` are binned onto a north-up grid and every cell
//! keeps weighted running statistics per channel:
//!
//! 1. [`compute_extent`]: the resolution-aligned grid covering all clouds
//! 2. [`Splatter`]: spreads each point over a footprint of cells, weighted
//!    by a Gaussian [`Kernel`] of the distance to the cell center
//! 3. [`Accumulator`]: sums, sums of squares, extremes and weight totals,
//!    mergeable in any order
//! 4. [`finalize`]: mean, standard deviation, min and max, `NaN` where no
//!    point contributed
//!
//! [`rasterize`] runs all of it over any number of clouds, holding one cloud
//! in memory at a time.

mod accumulator;
mod finalize;
mod grid;
mod kernel;
mod output;
mod params;
mod pipeline;
mod source;
mod splat;

pub use accumulator::Accumulator;
pub use finalize::{CellStatistics, finalize};
pub use grid::{GridSpec, compute_extent};
pub use kernel::Kernel;
pub use output::Dsm;
pub use params::{
    MAX_RADIUS, OutputStatistics, ProcessingMode, RasterizeParams, Roi, Statistic, Workers,
};
pub use pipeline::{Progress, Rasterizer, rasterize, rasterize_with};
pub use source::{CloudSource, PlySource};
pub use splat::{SplatStats, Splatter};
