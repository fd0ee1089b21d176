//! Output layer assembly

use ndarray::{Array3, Axis, s};
use plyraster_core::{CRS, Error, GeoTransform, Raster, Result};

use super::finalize::CellStatistics;
use super::grid::GridSpec;
use super::params::{OutputStatistics, Statistic};

/// Rasterized surface: one georeferenced layer per (statistic, channel).
///
/// Layers are ordered by statistic (mean, then std, min, max when selected)
/// and by channel within each statistic.
#[derive(Debug, Clone)]
pub struct Dsm {
    layers: Vec<Raster<f32>>,
    statistics: Vec<Statistic>,
    channels: usize,
    grid: GridSpec,
    crs: Option<CRS>,
}

impl Dsm {
    /// Slice the selected statistics out of `stats` into georeferenced layers
    pub fn assemble(
        stats: CellStatistics,
        outputs: &OutputStatistics,
        grid: GridSpec,
        crs: Option<CRS>,
    ) -> Result<Self> {
        if stats.shape() != grid.shape() {
            let (er, ec) = grid.shape();
            let (ar, ac) = stats.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let statistics = outputs.selected();
        let channels = stats.channels();
        let transform = grid.transform();

        let mut layers = Vec::with_capacity(statistics.len() * channels);
        for stat in &statistics {
            let source = match stat {
                Statistic::Mean => &stats.avg,
                Statistic::StdDev => &stats.std,
                Statistic::Min => &stats.min,
                Statistic::Max => &stats.max,
            };
            for k in 0..channels {
                let band = source.slice(s![.., .., k]).to_owned();
                layers.push(Raster::georeferenced(band, transform, crs.clone()));
            }
        }

        Ok(Self {
            layers,
            statistics,
            channels,
            grid,
            crs,
        })
    }

    pub fn layers(&self) -> &[Raster<f32>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Raster<f32>> {
        self.layers
    }

    /// Statistics present, in layer order
    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn transform(&self) -> GeoTransform {
        self.grid.transform()
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Layer of one statistic for one channel, if it was produced
    pub fn layer(&self, stat: Statistic, channel: usize) -> Option<&Raster<f32>> {
        if channel >= self.channels {
            return None;
        }
        let group = self.statistics.iter().position(|s| *s == stat)?;
        self.layers.get(group * self.channels + channel)
    }

    /// All layers stacked along the last axis: `(rows, cols, layers)`
    pub fn into_stack(self) -> Result<Array3<f32>> {
        let (rows, cols) = self.grid.shape();
        if self.layers.is_empty() {
            return Ok(Array3::zeros((rows, cols, 0)));
        }
        let views: Vec<_> = self.layers.iter().map(|l| l.view()).collect();
        ndarray::stack(Axis(2), &views).map_err(|e| Error::Other(e.to_string()))
    }
}
