//! Point cloud data
//!
//! A [`PointCloud`] is a dense table with one row per point:
//! `[x, y, v1, .., vk]`. `x`/`y` are planimetric coordinates in the target
//! projected CRS, the `k` extra columns are channel values (height, colour
//! bands, ...). `k` may be zero.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};

/// Number of coordinate columns preceding the channel values
pub const COORDINATE_COLUMNS: usize = 2;

/// A point cloud stored as rows of `[x, y, v1..vk]`
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    data: Array2<f64>,
}

impl PointCloud {
    /// Wrap an `(n, 2 + k)` array
    pub fn new(data: Array2<f64>) -> Result<Self> {
        if data.ncols() < COORDINATE_COLUMNS {
            return Err(Error::InvalidParameter {
                name: "columns",
                value: data.ncols().to_string(),
                reason: "a point needs at least x and y".into(),
            });
        }
        Ok(Self { data })
    }

    /// Build from a flat row-major buffer with `columns` values per point
    pub fn from_flat(values: Vec<f64>, columns: usize) -> Result<Self> {
        if columns < COORDINATE_COLUMNS || values.len() % columns != 0 {
            return Err(Error::InvalidParameter {
                name: "columns",
                value: columns.to_string(),
                reason: format!("{} values cannot be split into rows of {columns}", values.len()),
            });
        }
        let rows = values.len() / columns;
        let data = Array2::from_shape_vec((rows, columns), values)
            .map_err(|e| Error::Other(e.to_string()))?;
        Self::new(data)
    }

    /// Build from individual rows, which must all have the same width
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let columns = rows.first().map_or(COORDINATE_COLUMNS, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != columns) {
            return Err(Error::InvalidParameter {
                name: "rows",
                value: format!("row {bad}"),
                reason: format!("expected {columns} values, got {}", rows[bad].len()),
            });
        }
        Self::from_flat(rows.concat(), columns)
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Whether the cloud holds no points
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Number of extra (value) columns per point
    pub fn channels(&self) -> usize {
        self.data.ncols() - COORDINATE_COLUMNS
    }

    /// Planimetric position of point `i`
    pub fn xy(&self, i: usize) -> (f64, f64) {
        (self.data[[i, 0]], self.data[[i, 1]])
    }

    /// Channel values of point `i`
    pub fn values(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![i, COORDINATE_COLUMNS..])
    }

    /// All rows
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Rows `start..end` as a borrowed cloud view
    pub fn rows(&self, start: usize, end: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![start..end, ..])
    }

    /// Stack the points of `other` below the points of `self`
    pub fn concat(&self, other: &PointCloud) -> Result<PointCloud> {
        if self.channels() != other.channels() {
            return Err(Error::ChannelMismatch {
                cloud: "concatenated cloud".into(),
                expected: self.channels(),
                found: other.channels(),
            });
        }
        let data = ndarray::concatenate(Axis(0), &[self.data.view(), other.data.view()])
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self { data })
    }

    /// Planimetric bounding box of all points.
    ///
    /// Fails with [`Error::InvalidExtent`] on the first non-finite coordinate.
    pub fn bounds(&self) -> Result<BoundingBox> {
        let mut bbox = BoundingBox::empty();
        for (i, row) in self.data.axis_iter(Axis(0)).enumerate() {
            let (x, y) = (row[0], row[1]);
            if !x.is_finite() || !y.is_finite() {
                return Err(Error::InvalidExtent(format!(
                    "point {i} has non-finite coordinates ({x}, {y})"
                )));
            }
            bbox.extend(x, y);
        }
        Ok(bbox)
    }
}

/// Axis-aligned planimetric bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// A box containing nothing; extending it with a point yields that point
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Whether no point was ever added
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Grow the box to include `(x, y)`
    pub fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Union of two boxes
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
