//! Output grid definition and automatic extent computation
//!
//! Cell (row r, col c) covers `[xoff + c·res, xoff + (c+1)·res)` horizontally
//! and `[yoff − (r+1)·res, yoff − r·res)` vertically: row 0 is the northern
//! edge and y decreases with the row index.

use plyraster_core::{BoundingBox, Error, GeoTransform, Result};
use serde::{Deserialize, Serialize};

use super::source::CloudSource;

/// A north-up grid of `ysize` rows by `xsize` columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// X of the western edge
    pub xoff: f64,
    /// Y of the northern edge
    pub yoff: f64,
    /// Cell size
    pub resolution: f64,
    /// Number of columns
    pub xsize: usize,
    /// Number of rows
    pub ysize: usize,
}

impl GridSpec {
    /// Validated grid
    pub fn new(xoff: f64, yoff: f64, resolution: f64, xsize: usize, ysize: usize) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidExtent(format!(
                "resolution must be finite and > 0, got {resolution}"
            )));
        }
        if !xoff.is_finite() || !yoff.is_finite() {
            return Err(Error::InvalidExtent(format!(
                "origin ({xoff}, {yoff}) is not finite"
            )));
        }
        if xsize == 0 || ysize == 0 {
            return Err(Error::InvalidExtent(format!(
                "grid size {xsize}x{ysize} must be positive"
            )));
        }
        Ok(Self { xoff, yoff, resolution, xsize, ysize })
    }

    /// Smallest resolution-aligned grid covering `bbox`.
    ///
    /// The origin snaps to the lattice of multiples of `resolution`, so
    /// runs over different subsets of the same data share cell boundaries.
    pub fn from_bounds(bbox: &BoundingBox, resolution: f64) -> Result<Self> {
        if bbox.is_empty() {
            return Err(Error::InvalidExtent("bounding box is empty".into()));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidExtent(format!(
                "resolution must be finite and > 0, got {resolution}"
            )));
        }

        let xoff = (bbox.min_x / resolution).floor() * resolution;
        let yoff = (bbox.max_y / resolution).ceil() * resolution;
        let xsize = 1.0 + ((bbox.max_x - xoff) / resolution).floor();
        let ysize = 1.0 - ((bbox.min_y - yoff) / resolution).floor();

        Self::new(xoff, yoff, resolution, cell_count(xsize)?, cell_count(ysize)?)
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.ysize, self.xsize)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.xsize * self.ysize
    }

    /// A valid grid always has at least one cell
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Affine transform `(res, 0, xoff, 0, -res, yoff)`
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::north_up(self.xoff, self.yoff, self.resolution)
    }

    /// Fractional (col, row) of a position; cell centers sit at `i + 0.5`
    #[inline]
    pub fn locate(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.xoff) / self.resolution,
            (self.yoff - y) / self.resolution,
        )
    }

    /// (row, col) of the cell containing a position, if inside the grid
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.locate(x, y);
        let (row, col) = (row.floor(), col.floor());
        if !row.is_finite() || !col.is_finite() {
            return None;
        }
        let (row, col) = (row as isize, col as isize);
        self.contains(row, col).then_some((row as usize, col as usize))
    }

    /// Whether a signed (row, col) lies inside the grid
    #[inline]
    pub fn contains(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.ysize && (col as usize) < self.xsize
    }

    /// The same lattice grown by `cells` on every side
    pub fn padded(&self, cells: usize) -> Self {
        let margin = cells as f64 * self.resolution;
        Self {
            xoff: self.xoff - margin,
            yoff: self.yoff + margin,
            resolution: self.resolution,
            xsize: self.xsize + 2 * cells,
            ysize: self.ysize + 2 * cells,
        }
    }
}

fn cell_count(value: f64) -> Result<usize> {
    if !value.is_finite() || value < 1.0 || value > u32::MAX as f64 {
        return Err(Error::InvalidExtent(format!("cannot build a grid of {value} cells")));
    }
    Ok(value as usize)
}

/// Compute the grid covering every point of every source.
///
/// Each source is loaded once and released before the next one, so only one
/// cloud is held in memory at a time.
pub fn compute_extent<S: CloudSource>(sources: &[S], resolution: f64) -> Result<GridSpec> {
    if sources.is_empty() {
        return Err(Error::empty_input("no point clouds supplied"));
    }

    let mut bbox = BoundingBox::empty();
    for source in sources {
        let cloud = source.load()?;
        let label = source.label();
        if cloud.is_empty() {
            return Err(Error::empty_input(format!("{label} contains no points")));
        }
        let bounds = cloud.bounds().map_err(|e| match e {
            Error::InvalidExtent(reason) => Error::InvalidExtent(format!("{label}: {reason}")),
            other => other,
        })?;
        bbox = bbox.merge(&bounds);
    }

    GridSpec::from_bounds(&bbox, resolution)
}
