//! Where point clouds come from
//!
//! The orchestrator only needs to load one cloud at a time and to know the
//! CRS of the run. [`CloudSource`] abstracts over clouds already in memory
//! and PLY files that are read on demand and released after use.

use plyraster_core::io::{read_ply, read_ply_header};
use plyraster_core::{CRS, PointCloud, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// A point cloud that can be materialized on demand
pub trait CloudSource {
    /// Name used in logs and error messages
    fn label(&self) -> String;

    /// Materialize the points
    fn load(&self) -> Result<Cow<'_, PointCloud>>;

    /// CRS the coordinates are expressed in, if the source knows it
    fn crs(&self) -> Result<Option<CRS>> {
        Ok(None)
    }
}

impl CloudSource for PointCloud {
    fn label(&self) -> String {
        format!("in-memory cloud ({} points)", self.len())
    }

    fn load(&self) -> Result<Cow<'_, PointCloud>> {
        Ok(Cow::Borrowed(self))
    }
}

impl<T: CloudSource + ?Sized> CloudSource for &T {
    fn label(&self) -> String {
        (**self).label()
    }

    fn load(&self) -> Result<Cow<'_, PointCloud>> {
        (**self).load()
    }

    fn crs(&self) -> Result<Option<CRS>> {
        (**self).crs()
    }
}

impl<T: CloudSource + ?Sized> CloudSource for Box<T> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn load(&self) -> Result<Cow<'_, PointCloud>> {
        (**self).load()
    }

    fn crs(&self) -> Result<Option<CRS>> {
        (**self).crs()
    }
}

/// A PLY file whose vertices are read each time it is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlySource {
    path: PathBuf,
}

impl PlySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CloudSource for PlySource {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Cow<'_, PointCloud>> {
        Ok(Cow::Owned(read_ply(&self.path)?.cloud))
    }

    /// Resolved from the `projection:` header comments; a file without one
    /// is an error
    fn crs(&self) -> Result<Option<CRS>> {
        let header = read_ply_header(&self.path)?;
        CRS::from_ply_comments(&header.comments).map(Some)
    }
}
