//! I/O for point clouds and rasters

mod native;
pub mod ply;

pub use native::{
    Compression, GeoTiffOptions, read_geotiff, read_geotiff_from_buffer, write_geotiff,
    write_geotiff_to_buffer,
};
pub use ply::{PlyData, PlyEncoding, PlyHeader, read_ply, read_ply_from_reader, read_ply_header};
