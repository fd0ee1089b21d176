//! Per-cell running statistics
//!
//! Every update is a sum, a min or a max, so accumulators built from any
//! split of the points (per file, per thread partition, per point) can be
//! merged with [`Accumulator::combine`] in any order.

use ndarray::{Array2, Array3, Zip};
use plyraster_core::{Error, Result};

/// Weighted sums, sums of squares and extremes for every (cell, channel)
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    /// Total weight per cell, shared by all channels of the cell
    pub(crate) weight: Array2<f32>,
    pub(crate) sum: Array3<f32>,
    pub(crate) sum_sq: Array3<f32>,
    pub(crate) min: Array3<f32>,
    pub(crate) max: Array3<f32>,
}

impl Accumulator {
    /// Empty state: zero weight, `min = +∞`, `max = −∞`
    pub fn new(rows: usize, cols: usize, channels: usize) -> Self {
        let shape = (rows, cols, channels);
        Self {
            weight: Array2::zeros((rows, cols)),
            sum: Array3::zeros(shape),
            sum_sq: Array3::zeros(shape),
            min: Array3::from_elem(shape, f32::INFINITY),
            max: Array3::from_elem(shape, f32::NEG_INFINITY),
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.weight.dim()
    }

    pub fn channels(&self) -> usize {
        self.sum.dim().2
    }

    /// Total weight received by a cell
    pub fn weight(&self, row: usize, col: usize) -> f32 {
        self.weight[[row, col]]
    }

    /// Weight totals of all cells
    pub fn weights(&self) -> &Array2<f32> {
        &self.weight
    }

    /// Add the channel values of one point to a cell with weight `w`.
    ///
    /// Non-positive weights are ignored, so `min`/`max` only ever see values
    /// that actually contribute.
    #[inline]
    pub fn accumulate(&mut self, row: usize, col: usize, values: &[f32], w: f32) {
        if !(w > 0.0) {
            return;
        }
        debug_assert_eq!(values.len(), self.channels());

        self.weight[[row, col]] += w;
        for (k, &v) in values.iter().enumerate() {
            let idx = [row, col, k];
            self.sum[idx] += w * v;
            self.sum_sq[idx] += w * v * v;
            if v < self.min[idx] {
                self.min[idx] = v;
            }
            if v > self.max[idx] {
                self.max[idx] = v;
            }
        }
    }

    /// Fold `other` into `self`
    pub fn combine(&mut self, other: &Accumulator) -> Result<()> {
        if self.shape() != other.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = other.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        if self.channels() != other.channels() {
            return Err(Error::ChannelMismatch {
                cloud: "partial accumulator".into(),
                expected: self.channels(),
                found: other.channels(),
            });
        }

        Zip::from(&mut self.weight)
            .and(&other.weight)
            .for_each(|a, &b| *a += b);
        Zip::from(&mut self.sum)
            .and(&mut self.sum_sq)
            .and(&other.sum)
            .and(&other.sum_sq)
            .for_each(|s, sq, &os, &osq| {
                *s += os;
                *sq += osq;
            });
        Zip::from(&mut self.min)
            .and(&mut self.max)
            .and(&other.min)
            .and(&other.max)
            .for_each(|lo, hi, &olo, &ohi| {
                *lo = lo.min(olo);
                *hi = hi.max(ohi);
            });
        Ok(())
    }

    /// `combine` by value
    pub fn merged(mut self, other: &Accumulator) -> Result<Accumulator> {
        self.combine(other)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filled(updates: &[(usize, usize, f32, f32)]) -> Accumulator {
        let mut acc = Accumulator::new(2, 2, 1);
        for &(r, c, v, w) in updates {
            acc.accumulate(r, c, &[v], w);
        }
        acc
    }

    #[test]
    fn test_initial_state() {
        let acc = Accumulator::new(3, 4, 2);
        assert_eq!(acc.shape(), (3, 4));
        assert_eq!(acc.channels(), 2);
        assert_eq!(acc.weight(2, 3), 0.0);
        assert_eq!(acc.min[[0, 0, 1]], f32::INFINITY);
        assert_eq!(acc.max[[0, 0, 1]], f32::NEG_INFINITY);
    }

    #[test]
    fn test_accumulate() {
        let acc = filled(&[(0, 1, 10.0, 1.0), (0, 1, 20.0, 0.5), (1, 0, 3.0, 0.0)]);
        assert_eq!(acc.weight(0, 1), 1.5);
        assert_eq!(acc.sum[[0, 1, 0]], 20.0);
        assert_eq!(acc.sum_sq[[0, 1, 0]], 300.0);
        assert_eq!(acc.min[[0, 1, 0]], 10.0);
        assert_eq!(acc.max[[0, 1, 0]], 20.0);
        // zero weight leaves the cell untouched
        assert_eq!(acc.weight(1, 0), 0.0);
        assert_eq!(acc.min[[1, 0, 0]], f32::INFINITY);
    }

    #[test]
    fn test_combine_is_commutative_and_associative() {
        let a = filled(&[(0, 0, 1.0, 1.0), (1, 1, 4.0, 0.25)]);
        let b = filled(&[(0, 0, -2.0, 0.5), (0, 1, 7.0, 1.0)]);
        let c = filled(&[(1, 1, 9.0, 1.0), (0, 0, 3.0, 2.0)]);

        let ab_c = a.clone().merged(&b).unwrap().merged(&c).unwrap();
        let c_ba = c.clone().merged(&b.clone().merged(&a).unwrap()).unwrap();

        for (x, y) in ab_c.sum.iter().zip(c_ba.sum.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-5);
        }
        for (x, y) in ab_c.sum_sq.iter().zip(c_ba.sum_sq.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-4);
        }
        assert_eq!(ab_c.weight, c_ba.weight);
        assert_eq!(ab_c.min, c_ba.min);
        assert_eq!(ab_c.max, c_ba.max);
        assert_eq!(ab_c.min[[0, 0, 0]], -2.0);
        assert_eq!(ab_c.max[[1, 1, 0]], 9.0);
    }

    #[test]
    fn test_combine_with_empty_is_identity() {
        let a = filled(&[(0, 0, 1.0, 1.0), (1, 0, 5.0, 0.5)]);
        let merged = a.clone().merged(&Accumulator::new(2, 2, 1)).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn test_combine_rejects_other_shapes() {
        let mut a = Accumulator::new(2, 2, 1);
        assert!(matches!(
            a.combine(&Accumulator::new(2, 3, 1)),
            Err(Error::SizeMismatch { .. })
        ));
        assert!(matches!(
            a.combine(&Accumulator::new(2, 2, 3)),
            Err(Error::ChannelMismatch { .. })
        ));
    }
}
