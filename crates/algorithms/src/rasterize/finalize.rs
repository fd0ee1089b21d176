//! Turning running sums into statistic layers

use ndarray::{Array2, Array3, Axis, Zip};

use super::accumulator::Accumulator;

/// Final per-cell statistics, each `(rows, cols, channels)`.
///
/// Cells that never received weight hold `NaN` in every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CellStatistics {
    pub avg: Array3<f32>,
    pub std: Array3<f32>,
    pub min: Array3<f32>,
    pub max: Array3<f32>,
    /// Total weight per cell
    pub weight: Array2<f32>,
}

impl CellStatistics {
    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.weight.dim()
    }

    pub fn channels(&self) -> usize {
        self.avg.dim().2
    }
}

/// Consume the accumulator and compute mean, standard deviation and extremes.
///
/// - `avg = Σwv / Σw`
/// - `std = sqrt(max(0, Σwv² / Σw − avg²))`
///
/// Arithmetic runs in `f64`. When every contribution had the same value the
/// cell gets exactly that value and `std = 0`.
pub fn finalize(acc: Accumulator) -> CellStatistics {
    let Accumulator {
        weight,
        sum: mut avg,
        sum_sq: mut std,
        mut min,
        mut max,
    } = acc;

    Zip::from(avg.lanes_mut(Axis(2)))
        .and(std.lanes_mut(Axis(2)))
        .and(min.lanes_mut(Axis(2)))
        .and(max.lanes_mut(Axis(2)))
        .and(&weight)
        .for_each(|mut avg, mut std, mut lo, mut hi, &w| {
            if !(w > 0.0) {
                avg.fill(f32::NAN);
                std.fill(f32::NAN);
                lo.fill(f32::NAN);
                hi.fill(f32::NAN);
                return;
            }

            let w = f64::from(w);
            for k in 0..avg.len() {
                let (vmin, vmax) = (lo[k], hi[k]);
                let mean = f64::from(avg[k]) / w;
                let variance = (f64::from(std[k]) / w - mean * mean).max(0.0);

                if vmin == vmax {
                    avg[k] = vmin;
                    std[k] = 0.0;
                } else {
                    // rounding in the f32 sums can push the mean past an extreme
                    avg[k] = (mean as f32).max(vmin).min(vmax);
                    std[k] = variance.sqrt() as f32;
                }
            }
        });

    CellStatistics {
        avg,
        std,
        min,
        max,
        weight,
    }
}
