//! Distance weighting of splatted points
//!
//! A point at distance `d` (in cells) from a cell center contributes with
//! weight `exp(-d² / (2σ²))`. An infinite σ gives every contribution weight
//! one, i.e. the plain arithmetic mean.

use plyraster_core::{Error, Result};

/// Gaussian influence kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    sigma: f32,
    /// `1 / (2σ²)`, zero for the unweighted kernel
    falloff: f64,
}

impl Kernel {
    /// Gaussian with scale `sigma` cells; `f32::INFINITY` is accepted
    pub fn gaussian(sigma: f32) -> Result<Self> {
        if sigma.is_nan() || sigma <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "sigma",
                value: sigma.to_string(),
                reason: "must be > 0 (or infinite for an unweighted mean)".into(),
            });
        }
        let s = f64::from(sigma);
        Ok(Self {
            sigma,
            falloff: 1.0 / (2.0 * s * s),
        })
    }

    /// Every contribution counts once
    pub fn unweighted() -> Self {
        Self {
            sigma: f32::INFINITY,
            falloff: 0.0,
        }
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn is_unweighted(&self) -> bool {
        self.sigma.is_infinite()
    }

    /// Weight for a squared distance in cells
    #[inline]
    pub fn weight(&self, dist_sq: f64) -> f32 {
        (-dist_sq * self.falloff).exp() as f32
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::unweighted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unweighted_is_one() {
        let kernel = Kernel::gaussian(f32::INFINITY).unwrap();
        assert!(kernel.is_unweighted());
        for d in [0.0, 0.25, 2.0, 1e6] {
            assert_eq!(kernel.weight(d), 1.0);
        }
        assert_eq!(kernel, Kernel::unweighted());
    }

    #[test]
    fn test_gaussian_weights() {
        let kernel = Kernel::gaussian(1.0).unwrap();
        assert_eq!(kernel.weight(0.0), 1.0);
        assert_relative_eq!(kernel.weight(1.0), (-0.5f64).exp() as f32, epsilon = 1e-7);
        assert_relative_eq!(kernel.weight(4.0), (-2.0f64).exp() as f32, epsilon = 1e-7);
        assert!(kernel.weight(1.0) > kernel.weight(2.0));
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(Kernel::gaussian(0.0).is_err());
        assert!(Kernel::gaussian(-1.0).is_err());
        assert!(Kernel::gaussian(f32::NAN).is_err());
    }
}
