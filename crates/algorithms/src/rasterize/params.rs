//! Rasterization parameters

use plyraster_core::raster::Neighborhood;
use plyraster_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::maybe_rayon::*;

use super::grid::GridSpec;
use super::kernel::Kernel;

/// Largest accepted footprint radius in cells
pub const MAX_RADIUS: usize = 1024;

/// Statistic layers a run can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    /// Weighted mean (always produced)
    Mean,
    /// Weighted population standard deviation
    StdDev,
    /// Smallest contributing value
    Min,
    /// Largest contributing value
    Max,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::Mean => "avg",
            Statistic::StdDev => "std",
            Statistic::Min => "min",
            Statistic::Max => "max",
        };
        f.write_str(name)
    }
}

/// Optional statistic layers on top of the mean
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStatistics {
    pub std: bool,
    pub min: bool,
    pub max: bool,
}

impl OutputStatistics {
    /// Every statistic
    pub fn all() -> Self {
        Self {
            std: true,
            min: true,
            max: true,
        }
    }

    /// Selected statistics in output order: mean, std, min, max
    pub fn selected(&self) -> Vec<Statistic> {
        let mut stats = vec![Statistic::Mean];
        if self.std {
            stats.push(Statistic::StdDev);
        }
        if self.min {
            stats.push(Statistic::Min);
        }
        if self.max {
            stats.push(Statistic::Max);
        }
        stats
    }
}

/// Explicit output extent: upper-left corner and size in cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub xoff: f64,
    pub yoff: f64,
    pub xsize: usize,
    pub ysize: usize,
}

impl Roi {
    pub fn new(xoff: f64, yoff: f64, xsize: usize, ysize: usize) -> Self {
        Self { xoff, yoff, xsize, ysize }
    }

    /// Grid with this extent at `resolution`
    pub fn grid(&self, resolution: f64) -> Result<GridSpec> {
        GridSpec::new(self.xoff, self.yoff, resolution, self.xsize, self.ysize)
    }
}

impl FromStr for Roi {
    type Err = Error;

    /// Parses `xoff,yoff,xsize,ysize`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "roi",
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [xoff, yoff, xsize, ysize] = parts.as_slice() else {
            return Err(invalid("expected xoff,yoff,xsize,ysize"));
        };
        Ok(Roi {
            xoff: xoff.parse().map_err(|_| invalid("xoff is not a number"))?,
            yoff: yoff.parse().map_err(|_| invalid("yoff is not a number"))?,
            xsize: xsize.parse().map_err(|_| invalid("xsize is not a cell count"))?,
            ysize: ysize.parse().map_err(|_| invalid("ysize is not a cell count"))?,
        })
    }
}

/// How points of one cloud are spread over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Single-threaded, straight into the shared accumulator
    Sequential,
    /// Thread-local partial accumulators on the global rayon pool
    #[default]
    Parallel,
    /// Thread-local partial accumulators on a dedicated pool of `n` threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Number of partitions worth creating
    pub fn threads(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => rayon::current_num_threads(),
            #[cfg(not(feature = "parallel"))]
            ProcessingMode::Parallel => 1,
            ProcessingMode::ParallelWith(n) => (*n).max(1),
        }
    }
}

/// Threads of a [`ProcessingMode`], set up once and reused for every cloud
#[derive(Debug)]
pub struct Workers {
    mode: ProcessingMode,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Workers {
    /// Build the dedicated pool of [`ProcessingMode::ParallelWith`]
    pub fn new(mode: ProcessingMode) -> Result<Self> {
        #[cfg(feature = "parallel")]
        let pool = match mode {
            ProcessingMode::ParallelWith(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        Error::Algorithm(format!("cannot build a {threads}-thread pool: {e}"))
                    })?,
            ),
            _ => None,
        };

        Ok(Self {
            mode,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Number of partitions worth creating
    pub fn threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        let pooled = self.pool.as_ref().map(rayon::ThreadPool::current_num_threads);
        #[cfg(not(feature = "parallel"))]
        let pooled = None;
        pooled.unwrap_or_else(|| self.mode.threads())
    }

    /// Map `f` over `range`, collecting in index order
    pub(crate) fn par_map<T, F>(&self, range: Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self.mode {
            ProcessingMode::Sequential => range.map(f).collect(),
            _ => self.install(|| range.into_par_iter().map(f).collect()),
        }
    }

    #[cfg(feature = "parallel")]
    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn install<R>(&self, op: impl FnOnce() -> R) -> R {
        op()
    }
}

/// Parameters of a rasterization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizeParams {
    /// Cell size in CRS units (default: 1.0)
    pub resolution: f64,
    /// Half-width of the splat footprint in cells (default: 0, own cell only)
    pub radius: usize,
    /// Use a disk instead of a square footprint (default: false)
    pub circular: bool,
    /// Gaussian influence scale in cells; infinity gives the unweighted mean
    pub sigma: f32,
    /// Explicit extent; computed from the clouds when `None`
    pub roi: Option<Roi>,
    /// Extra cells added on every side of a computed extent (default: 0)
    pub pad: usize,
    /// Statistic layers beyond the mean
    pub outputs: OutputStatistics,
    /// Threading of the splat step
    pub mode: ProcessingMode,
}

impl Default for RasterizeParams {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            radius: 0,
            circular: false,
            sigma: f32::INFINITY,
            roi: None,
            pad: 0,
            outputs: OutputStatistics::default(),
            mode: ProcessingMode::default(),
        }
    }
}

impl RasterizeParams {
    /// Parameters with the given resolution and defaults elsewhere
    pub fn with_resolution(resolution: f64) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    /// Check every option, reporting the first invalid one
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(Error::InvalidParameter {
                name: "resolution",
                value: self.resolution.to_string(),
                reason: "must be a finite number > 0".into(),
            });
        }
        if self.radius > MAX_RADIUS {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: self.radius.to_string(),
                reason: format!("must be at most {MAX_RADIUS} cells"),
            });
        }
        self.kernel()?;
        if let ProcessingMode::ParallelWith(0) = self.mode {
            return Err(Error::InvalidParameter {
                name: "mode",
                value: "ParallelWith(0)".into(),
                reason: "thread count must be > 0".into(),
            });
        }
        if let Some(roi) = &self.roi {
            roi.grid(self.resolution)?;
        }
        Ok(())
    }

    /// Splat footprint
    pub fn neighborhood(&self) -> Neighborhood {
        if self.circular {
            Neighborhood::Circle(self.radius)
        } else {
            Neighborhood::Square(self.radius)
        }
    }

    /// Distance weighting kernel
    pub fn kernel(&self) -> Result<Kernel> {
        Kernel::gaussian(self.sigma)
    }
}
