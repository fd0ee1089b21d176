//! Raster element trait for cell values

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Only floating point cells are supported: every plyraster layer uses
/// `NaN` as its no-data marker.
pub trait RasterElement:
    Float + NumCast + Debug + Default + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self {
        Self::nan()
    }

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        if self.is_nan() {
            return true;
        }
        match nodata {
            Some(nd) => {
                let scale = <Self as NumCast>::from(100.0).unwrap_or_else(Self::one);
                (*self - nd).abs() < Self::epsilon() * scale
            }
            None => false,
        }
    }

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

impl RasterElement for f32 {}
impl RasterElement for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_always_nodata() {
        assert!(f32::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn test_explicit_nodata() {
        assert!((-9999.0f32).is_nodata(Some(-9999.0)));
        assert!(!(1.0f32).is_nodata(Some(-9999.0)));
        assert!(!(1.0f64).is_nodata(None));
    }
}
