//! # plyraster algorithms
//!
//! Rasterization of unordered point clouds into digital surface models.
//!
//! ## Modules
//!
//! - **rasterize**: extent computation, kernel-weighted splatting,
//!   streaming per-cell statistics and multi-cloud orchestration
//!
//! ```no_run
//! use plyraster_algorithms::prelude::*;
//!
//! let sources = vec![PlySource::new("tile_a.ply"), PlySource::new("tile_b.ply")];
//! let params = RasterizeParams {
//!     radius: 1,
//!     sigma: 1.0,
//!     outputs: OutputStatistics { std: true, ..Default::default() },
//!     ..RasterizeParams::with_resolution(0.5)
//! };
//! let dsm = rasterize(&sources, &params)?;
//! let height = dsm.layer(Statistic::Mean, 0);
//! # Ok::<(), plyraster_core::Error>(())
//! ```

mod maybe_rayon;
pub mod rasterize;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::rasterize::{
        Accumulator, CellStatistics, CloudSource, Dsm, GridSpec, Kernel, OutputStatistics,
        PlySource, ProcessingMode, Progress, RasterizeParams, Rasterizer, Roi, SplatStats, Splatter,
        Statistic, Workers, compute_extent, finalize, rasterize, rasterize_with,
    };
    pub use plyraster_core::prelude::*;
}
