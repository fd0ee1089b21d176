//! Splatting points into the accumulator
//!
//! A point is binned into the cell containing it, then spread to every cell
//! of the footprint around that cell. Each receiving cell weights the point
//! by its distance, in cells, from the cell center.

use ndarray::{ArrayView2, Axis};
use plyraster_core::cloud::COORDINATE_COLUMNS;
use plyraster_core::raster::Neighborhood;
use plyraster_core::{Error, PointCloud, Result};

use super::accumulator::Accumulator;
use super::grid::GridSpec;
use super::kernel::Kernel;
use super::params::{MAX_RADIUS, RasterizeParams, Workers};

/// Points below this count are not worth a partition of their own
const MIN_POINTS_PER_PARTITION: usize = 65_536;

/// Point counts of one splat pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplatStats {
    /// Points read
    pub points: usize,
    /// Points whose own cell lies outside the grid
    pub outside: usize,
}

impl SplatStats {
    pub fn merge(&mut self, other: SplatStats) {
        self.points += other.points;
        self.outside += other.outside;
    }
}

/// Spreads points over a fixed grid
#[derive(Debug, Clone)]
pub struct Splatter {
    grid: GridSpec,
    offsets: Vec<(isize, isize)>,
    kernel: Kernel,
}

impl Splatter {
    /// Fails when the footprint radius exceeds [`MAX_RADIUS`]
    pub fn new(grid: GridSpec, footprint: Neighborhood, kernel: Kernel) -> Result<Self> {
        if footprint.radius() > MAX_RADIUS {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: footprint.radius().to_string(),
                reason: format!("must be at most {MAX_RADIUS} cells"),
            });
        }
        Ok(Self {
            grid,
            offsets: footprint.offsets(),
            kernel,
        })
    }

    /// Splatter for `grid` configured by `params`
    pub fn from_params(grid: GridSpec, params: &RasterizeParams) -> Result<Self> {
        Self::new(grid, params.neighborhood(), params.kernel()?)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Empty accumulator matching the grid
    pub fn accumulator(&self, channels: usize) -> Accumulator {
        let (rows, cols) = self.grid.shape();
        Accumulator::new(rows, cols, channels)
    }

    /// Splat every point of `cloud` on the calling thread
    pub fn splat(&self, cloud: &PointCloud, acc: &mut Accumulator) -> Result<SplatStats> {
        self.check(cloud, acc)?;
        Ok(self.splat_rows(cloud.view(), acc))
    }

    /// Splat `cloud` over contiguous point partitions, each into its own
    /// partial accumulator, then fold the partials into `acc`.
    ///
    /// Small clouds and sequential workers go straight into `acc`.
    pub fn splat_partitioned(
        &self,
        cloud: &PointCloud,
        acc: &mut Accumulator,
        workers: &Workers,
    ) -> Result<SplatStats> {
        self.check(cloud, acc)?;

        let n = cloud.len();
        let parts = workers.threads().min(n.div_ceil(MIN_POINTS_PER_PARTITION));
        if parts <= 1 {
            return Ok(self.splat_rows(cloud.view(), acc));
        }

        let chunk = n.div_ceil(parts);
        let channels = acc.channels();
        let partials = workers.par_map(0..parts, |p| {
            let start = (p * chunk).min(n);
            let end = (start + chunk).min(n);
            let mut partial = self.accumulator(channels);
            let stats = self.splat_rows(cloud.rows(start, end), &mut partial);
            (partial, stats)
        });

        let mut stats = SplatStats::default();
        for (partial, part_stats) in &partials {
            acc.combine(partial)?;
            stats.merge(*part_stats);
        }
        Ok(stats)
    }

    /// Splat raw `[x, y, v1..vk]` rows; the caller guarantees matching shapes
    pub fn splat_rows(&self, rows: ArrayView2<'_, f64>, acc: &mut Accumulator) -> SplatStats {
        let mut stats = SplatStats::default();
        let mut values = vec![0.0f32; rows.ncols().saturating_sub(COORDINATE_COLUMNS)];

        for point in rows.axis_iter(Axis(0)) {
            stats.points += 1;
            let (x, y) = (point[0], point[1]);
            if !x.is_finite() || !y.is_finite() {
                stats.outside += 1;
                continue;
            }

            for (dst, &v) in values.iter_mut().zip(point.iter().skip(COORDINATE_COLUMNS)) {
                *dst = v as f32;
            }

            let (col_f, row_f) = self.grid.locate(x, y);
            let (row, col) = (row_f.floor() as isize, col_f.floor() as isize);
            if !self.grid.contains(row, col) {
                stats.outside += 1;
            }

            for &(dr, dc) in &self.offsets {
                let (r, c) = (row.saturating_add(dr), col.saturating_add(dc));
                if !self.grid.contains(r, c) {
                    continue;
                }
                let dx = col_f - (c as f64 + 0.5);
                let dy = row_f - (r as f64 + 0.5);
                let w = self.kernel.weight(dx * dx + dy * dy);
                acc.accumulate(r as usize, c as usize, &values, w);
            }
        }

        stats
    }

    fn check(&self, cloud: &PointCloud, acc: &Accumulator) -> Result<()> {
        if acc.shape() != self.grid.shape() {
            let (er, ec) = self.grid.shape();
            let (ar, ac) = acc.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        if cloud.channels() != acc.channels() {
            return Err(Error::ChannelMismatch {
                cloud: "point cloud".into(),
                expected: acc.channels(),
                found: cloud.channels(),
            });
        }
        Ok(())
    }
}
