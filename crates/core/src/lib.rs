//! # plyraster core
//!
//! Core types and I/O shared by the plyraster crates.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid backed by `ndarray`
//! - `GeoTransform`: affine transformation for georeferencing
//! - `PointCloud`: rows of `[x, y, v1..vk]` read from a point cloud file
//! - `CRS`: coordinate reference system, resolvable from PLY header comments
//! - I/O for PLY point clouds and GeoTIFF rasters

pub mod cloud;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use cloud::{BoundingBox, PointCloud};
pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cloud::{BoundingBox, PointCloud};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Neighborhood, Raster, RasterElement};
}
