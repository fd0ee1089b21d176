//! Multi-cloud rasterization runs
//!
//! A run computes (or takes) the output grid, then streams the clouds one at
//! a time through the splatter into a single accumulator, and finally turns
//! the accumulator into output layers. Only one cloud is materialized at any
//! moment.

use plyraster_core::{CRS, Error, PointCloud, Result};
use tracing::{debug, info, warn};

use super::accumulator::Accumulator;
use super::finalize::finalize;
use super::grid::{GridSpec, compute_extent};
use super::output::Dsm;
use super::params::{OutputStatistics, RasterizeParams, Workers};
use super::source::CloudSource;
use super::splat::{SplatStats, Splatter};

/// Milestones reported by [`rasterize_with`]
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    /// The output grid is known
    ExtentComputed { grid: GridSpec },
    /// Cloud `index` (0-based) of `total` has been splatted
    CloudAccumulated {
        index: usize,
        total: usize,
        label: &'a str,
        stats: SplatStats,
    },
    /// Output layers are ready
    Finalized { grid: GridSpec, layers: usize },
}

/// Accumulation state over a fixed grid.
///
/// The first cloud added fixes the channel count. [`Rasterizer::finish`]
/// consumes the state, so no cloud can be added after finalization.
#[derive(Debug)]
pub struct Rasterizer {
    splatter: Splatter,
    outputs: OutputStatistics,
    workers: Workers,
    acc: Option<Accumulator>,
    clouds: usize,
    totals: SplatStats,
}

impl Rasterizer {
    pub fn new(grid: GridSpec, params: &RasterizeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            splatter: Splatter::from_params(grid, params)?,
            outputs: params.outputs,
            workers: Workers::new(params.mode)?,
            acc: None,
            clouds: 0,
            totals: SplatStats::default(),
        })
    }

    pub fn grid(&self) -> &GridSpec {
        self.splatter.grid()
    }

    /// Channel count, once the first cloud has been added
    pub fn channels(&self) -> Option<usize> {
        self.acc.as_ref().map(Accumulator::channels)
    }

    /// Number of clouds accumulated so far
    pub fn clouds(&self) -> usize {
        self.clouds
    }

    /// Splat one cloud into the shared accumulator
    pub fn add_cloud(&mut self, label: &str, cloud: &PointCloud) -> Result<SplatStats> {
        if cloud.is_empty() {
            return Err(Error::empty_input(format!("{label} contains no points")));
        }

        let splatter = &self.splatter;
        let acc = self
            .acc
            .get_or_insert_with(|| splatter.accumulator(cloud.channels()));
        if acc.channels() != cloud.channels() {
            return Err(Error::ChannelMismatch {
                cloud: label.to_string(),
                expected: acc.channels(),
                found: cloud.channels(),
            });
        }

        let stats = splatter.splat_partitioned(cloud, acc, &self.workers)?;
        self.clouds += 1;
        self.totals.merge(stats);

        debug!(
            "Accumulated {} ({} points, {} channels)",
            label,
            stats.points,
            cloud.channels()
        );
        if stats.outside > 0 {
            warn!(
                "{}: {} of {} points fall outside the grid",
                label, stats.outside, stats.points
            );
        }
        Ok(stats)
    }

    /// Finalize the statistics into output layers carrying `crs`
    pub fn finish(self, crs: Option<CRS>) -> Result<Dsm> {
        let acc = self
            .acc
            .ok_or_else(|| Error::empty_input("no point cloud was accumulated"))?;
        let grid = *self.splatter.grid();

        let dsm = Dsm::assemble(finalize(acc), &self.outputs, grid, crs)?;
        info!(
            "Finalized {} layers of {}x{} from {} clouds ({} points)",
            dsm.layers().len(),
            grid.xsize,
            grid.ysize,
            self.clouds,
            self.totals.points
        );
        Ok(dsm)
    }
}

/// Rasterize `sources` in order. See [`rasterize_with`].
pub fn rasterize<S: CloudSource>(sources: &[S], params: &RasterizeParams) -> Result<Dsm> {
    rasterize_with(sources, params, |_| {})
}

/// Rasterize `sources`, reporting progress to `on_event`.
///
/// The grid comes from `params.roi` when set, otherwise from the bounds of
/// all sources grown by `params.pad` cells. The CRS of the first source is
/// attached to every output layer. Any failure aborts the run.
pub fn rasterize_with<S, F>(sources: &[S], params: &RasterizeParams, mut on_event: F) -> Result<Dsm>
where
    S: CloudSource,
    F: FnMut(Progress<'_>),
{
    params.validate()?;
    let Some(first) = sources.first() else {
        return Err(Error::empty_input("no point clouds supplied"));
    };
    let crs = first.crs()?;

    let grid = match &params.roi {
        Some(roi) => roi.grid(params.resolution)?,
        None => compute_extent(sources, params.resolution)?.padded(params.pad),
    };
    info!(
        "Grid {}x{} at {} from ({}, {})",
        grid.xsize, grid.ysize, grid.resolution, grid.xoff, grid.yoff
    );
    on_event(Progress::ExtentComputed { grid });

    let mut rasterizer = Rasterizer::new(grid, params)?;
    let total = sources.len();
    for (index, source) in sources.iter().enumerate() {
        let label = source.label();
        let stats = {
            let cloud = source.load()?;
            rasterizer.add_cloud(&label, &cloud)?
        };
        on_event(Progress::CloudAccumulated {
            index,
            total,
            label: &label,
            stats,
        });
    }

    let dsm = rasterizer.finish(crs)?;
    on_event(Progress::Finalized {
        grid,
        layers: dsm.layers().len(),
    });
    Ok(dsm)
}
