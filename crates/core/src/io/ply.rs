//! PLY point cloud reader
//!
//! Reads the `vertex` element of ASCII and binary (little/big endian) PLY
//! files into a [`PointCloud`]. Every scalar vertex property becomes one
//! column, in declaration order, so a typical `x y z red green blue` file
//! yields rows of `[x, y, z, r, g, b]`. Header comments are kept because they
//! carry the projection of the coordinates.

use crate::cloud::{COORDINATE_COLUMNS, PointCloud};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const VERTEX: &str = "vertex";
const MAX_BINARY_RESERVE: usize = 1 << 24;

/// Body encoding declared by the `format` header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

/// Scalar property types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => ScalarType::I8,
            "uchar" | "uint8" => ScalarType::U8,
            "short" | "int16" => ScalarType::I16,
            "ushort" | "uint16" => ScalarType::U16,
            "int" | "int32" => ScalarType::I32,
            "uint" | "uint32" => ScalarType::U32,
            "float" | "float32" => ScalarType::F32,
            "double" | "float64" => ScalarType::F64,
            _ => return None,
        })
    }

    fn read_binary<B: ByteOrder, R: Read>(self, reader: &mut R) -> std::io::Result<f64> {
        Ok(match self {
            ScalarType::I8 => reader.read_i8()? as f64,
            ScalarType::U8 => reader.read_u8()? as f64,
            ScalarType::I16 => reader.read_i16::<B>()? as f64,
            ScalarType::U16 => reader.read_u16::<B>()? as f64,
            ScalarType::I32 => reader.read_i32::<B>()? as f64,
            ScalarType::U32 => reader.read_u32::<B>()? as f64,
            ScalarType::F32 => reader.read_f32::<B>()? as f64,
            ScalarType::F64 => reader.read_f64::<B>()?,
        })
    }
}

/// A property of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyDef {
    Scalar { name: String, ty: ScalarType },
    List { name: String, count: ScalarType, item: ScalarType },
}

impl PropertyDef {
    pub fn name(&self) -> &str {
        match self {
            PropertyDef::Scalar { name, .. } | PropertyDef::List { name, .. } => name,
        }
    }
}

/// An element declaration (`element <name> <count>` plus its properties)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDef {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDef>,
}

/// Parsed PLY header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    pub encoding: PlyEncoding,
    pub elements: Vec<ElementDef>,
    /// `comment` and `obj_info` lines, without the keyword
    pub comments: Vec<String>,
}

impl PlyHeader {
    /// The `vertex` element, if declared
    pub fn vertex(&self) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == VERTEX)
    }

    /// Names of the scalar vertex properties, i.e. the cloud columns
    pub fn vertex_columns(&self) -> Vec<&str> {
        self.vertex()
            .map(|v| {
                v.properties
                    .iter()
                    .filter(|p| matches!(p, PropertyDef::Scalar { .. }))
                    .map(PropertyDef::name)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A PLY file read into memory
#[derive(Debug, Clone)]
pub struct PlyData {
    pub header: PlyHeader,
    pub cloud: PointCloud,
}

impl PlyData {
    pub fn comments(&self) -> &[String] {
        &self.header.comments
    }
}

/// Read the vertices and header comments of a PLY file
pub fn read_ply<P: AsRef<Path>>(path: P) -> Result<PlyData> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_ply_from_reader(BufReader::new(file), &path.display().to_string())
}

/// Read only the header of a PLY file
pub fn read_ply_header<P: AsRef<Path>>(path: P) -> Result<PlyHeader> {
    let path = path.as_ref();
    let file = File::open(path)?;
    parse_header(&mut BufReader::new(file), &path.display().to_string())
}

/// Read a PLY stream; `label` names the source in error messages
pub fn read_ply_from_reader<R: BufRead>(mut reader: R, label: &str) -> Result<PlyData> {
    let header = parse_header(&mut reader, label)?;

    let columns = header.vertex_columns().len();
    if header.vertex().is_none() {
        return Err(Error::ply(label, "no vertex element"));
    }
    if columns < COORDINATE_COLUMNS {
        return Err(Error::ply(
            label,
            format!("vertex element has {columns} scalar properties, need at least x and y"),
        ));
    }

    let values = match header.encoding {
        PlyEncoding::Ascii => read_ascii_vertices(&mut reader, &header, label)?,
        PlyEncoding::BinaryLittleEndian => {
            read_binary_vertices::<LittleEndian, _>(&mut reader, &header, label)?
        }
        PlyEncoding::BinaryBigEndian => {
            read_binary_vertices::<BigEndian, _>(&mut reader, &header, label)?
        }
    };

    let cloud = PointCloud::from_flat(values, columns)?;
    Ok(PlyData { header, cloud })
}

fn parse_header<R: BufRead>(reader: &mut R, label: &str) -> Result<PlyHeader> {
    let mut next_line = || -> Result<String> {
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(Error::ply(label, "unexpected end of header"));
        }
        String::from_utf8(buf)
            .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
            .map_err(|_| Error::ply(label, "header is not valid UTF-8"))
    };

    if next_line()?.trim() != "ply" {
        return Err(Error::ply(label, "missing 'ply' magic line"));
    }

    let mut encoding = None;
    let mut elements: Vec<ElementDef> = Vec::new();
    let mut comments = Vec::new();

    loop {
        let line = next_line()?;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "format" => {
                encoding = Some(match (tokens.next(), tokens.next()) {
                    (Some("ascii"), Some("1.0")) => PlyEncoding::Ascii,
                    (Some("binary_little_endian"), Some("1.0")) => PlyEncoding::BinaryLittleEndian,
                    (Some("binary_big_endian"), Some("1.0")) => PlyEncoding::BinaryBigEndian,
                    _ => return Err(Error::ply(label, format!("unsupported format line '{line}'"))),
                });
            }
            "comment" | "obj_info" => {
                let text = line.trim_start()[keyword.len()..].trim();
                comments.push(text.to_string());
            }
            "element" => {
                let (Some(name), Some(count), None) = (tokens.next(), tokens.next(), tokens.next())
                else {
                    return Err(Error::ply(label, format!("malformed element line '{line}'")));
                };
                let count = count
                    .parse()
                    .map_err(|_| Error::ply(label, format!("invalid element count '{count}'")))?;
                elements.push(ElementDef {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::ply(label, "property declared before any element"))?;
                let parts: Vec<&str> = tokens.collect();
                let scalar = |name: &str| {
                    ScalarType::parse(name)
                        .ok_or_else(|| Error::ply(label, format!("unknown property type '{name}'")))
                };
                let property = match parts.as_slice() {
                    ["list", count, item, name] => PropertyDef::List {
                        name: name.to_string(),
                        count: scalar(*count)?,
                        item: scalar(*item)?,
                    },
                    [ty, name] => PropertyDef::Scalar {
                        name: name.to_string(),
                        ty: scalar(*ty)?,
                    },
                    _ => return Err(Error::ply(label, format!("malformed property line '{line}'"))),
                };
                element.properties.push(property);
            }
            "end_header" => break,
            other => {
                return Err(Error::ply(label, format!("unknown header keyword '{other}'")));
            }
        }
    }

    let encoding = encoding.ok_or_else(|| Error::ply(label, "missing format line"))?;
    Ok(PlyHeader {
        encoding,
        elements,
        comments,
    })
}

fn read_ascii_vertices<R: BufRead>(
    reader: &mut R,
    header: &PlyHeader,
    label: &str,
) -> Result<Vec<f64>> {
    let mut body = String::new();
    reader
        .read_to_string(&mut body)
        .map_err(|_| Error::ply(label, "ASCII body is not valid UTF-8"))?;
    let mut tokens = body.split_ascii_whitespace();

    let mut next = |what: &str| -> Result<f64> {
        let token = tokens
            .next()
            .ok_or_else(|| Error::ply(label, format!("truncated body while reading {what}")))?;
        token
            .parse::<f64>()
            .map_err(|_| Error::ply(label, format!("invalid number '{token}' for {what}")))
    };

    // every value takes at least one byte plus a separator
    let mut values = Vec::with_capacity(vertex_capacity(header, label, body.len() / 2)?);
    for element in &header.elements {
        let keep = element.name == VERTEX;
        if element.properties.is_empty() {
            continue;
        }
        for _ in 0..element.count {
            for property in &element.properties {
                match property {
                    PropertyDef::Scalar { name, .. } => {
                        let v = next(name.as_str())?;
                        if keep {
                            values.push(v);
                        }
                    }
                    PropertyDef::List { name, .. } => {
                        let n = list_len(next(name.as_str())?, name, label)?;
                        for _ in 0..n {
                            next(name.as_str())?;
                        }
                    }
                }
            }
        }
        if keep {
            break;
        }
    }
    Ok(values)
}

fn read_binary_vertices<B: ByteOrder, R: Read>(
    reader: &mut R,
    header: &PlyHeader,
    label: &str,
) -> Result<Vec<f64>> {
    let truncated = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::ply(label, "truncated binary body"),
        _ => Error::Io(e),
    };

    let mut values = Vec::with_capacity(vertex_capacity(header, label, MAX_BINARY_RESERVE)?);
    for element in &header.elements {
        let keep = element.name == VERTEX;
        if element.properties.is_empty() {
            continue;
        }
        for _ in 0..element.count {
            for property in &element.properties {
                match property {
                    PropertyDef::Scalar { ty, .. } => {
                        let v = ty.read_binary::<B, _>(reader).map_err(truncated)?;
                        if keep {
                            values.push(v);
                        }
                    }
                    PropertyDef::List { name, count, item } => {
                        let n = count.read_binary::<B, _>(reader).map_err(truncated)?;
                        for _ in 0..list_len(n, name, label)? {
                            item.read_binary::<B, _>(reader).map_err(truncated)?;
                        }
                    }
                }
            }
        }
        if keep {
            break;
        }
    }
    Ok(values)
}

/// Values to reserve up front for the vertex element, at most `limit`.
/// The vector grows past it as the body is read.
fn vertex_capacity(header: &PlyHeader, label: &str, limit: usize) -> Result<usize> {
    let Some(vertex) = header.vertex() else {
        return Ok(0);
    };
    let total = vertex
        .count
        .checked_mul(header.vertex_columns().len())
        .ok_or_else(|| Error::ply(label, format!("vertex count {} is too large", vertex.count)))?;
    Ok(total.min(limit))
}

fn list_len(raw: f64, name: &str, label: &str) -> Result<usize> {
    if raw < 0.0 || raw.fract() != 0.0 {
        return Err(Error::ply(label, format!("invalid list length {raw} for '{name}'")));
    }
    Ok(raw as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    const ASCII: &str = "ply\n\
        format ascii 1.0\n\
        comment projection: UTM 31N\n\
        obj_info generated for tests\n\
        element vertex 3\n\
        property double x\n\
        property double y\n\
        property float z\n\
        property uchar red\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        end_header\n\
        0.5 0.5 10.0 255\n\
        0.5 1.5 20.0 128\n\
        2.0 3.0 30.0 0\n\
        3 0 1 2\n";

    #[test]
    fn test_read_ascii() {
        let ply = read_ply_from_reader(Cursor::new(ASCII), "ascii.ply").unwrap();
        assert_eq!(ply.header.encoding, PlyEncoding::Ascii);
        assert_eq!(ply.header.vertex_columns(), vec!["x", "y", "z", "red"]);
        assert_eq!(
            ply.comments(),
            &["projection: UTM 31N".to_string(), "generated for tests".to_string()]
        );

        let cloud = ply.cloud;
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.channels(), 2);
        assert_eq!(cloud.xy(1), (0.5, 1.5));
        assert_eq!(cloud.values(0).to_vec(), vec![10.0, 255.0]);
    }

    fn binary_ply<B: ByteOrder>(format: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        write!(
            buf,
            "ply\r\nformat {format} 1.0\r\n\
             element camera 1\r\nproperty list uchar float k\r\n\
             element vertex 2\r\nproperty double x\r\nproperty double y\r\nproperty float z\r\n\
             end_header\r\n"
        )
        .unwrap();
        buf.write_u8(2).unwrap();
        buf.write_f32::<B>(1.0).unwrap();
        buf.write_f32::<B>(2.0).unwrap();
        for (x, y, z) in [(1.0, 2.0, 3.5f32), (-4.0, 5.25, 6.0)] {
            buf.write_f64::<B>(x).unwrap();
            buf.write_f64::<B>(y).unwrap();
            buf.write_f32::<B>(z).unwrap();
        }
        buf
    }

    #[test]
    fn test_read_binary_both_endians() {
        for (bytes, encoding) in [
            (binary_ply::<LittleEndian>("binary_little_endian"), PlyEncoding::BinaryLittleEndian),
            (binary_ply::<BigEndian>("binary_big_endian"), PlyEncoding::BinaryBigEndian),
        ] {
            let ply = read_ply_from_reader(Cursor::new(bytes), "bin.ply").unwrap();
            assert_eq!(ply.header.encoding, encoding);
            assert_eq!(ply.cloud.len(), 2);
            assert_eq!(ply.cloud.xy(1), (-4.0, 5.25));
            assert_eq!(ply.cloud.values(0).to_vec(), vec![3.5]);
        }
    }

    #[test]
    fn test_truncated_binary() {
        let mut bytes = binary_ply::<LittleEndian>("binary_little_endian");
        bytes.truncate(bytes.len() - 3);
        let err = read_ply_from_reader(Cursor::new(bytes), "short.ply").unwrap_err();
        assert!(matches!(err, Error::PlyFormat { .. }), "got {err}");
    }

    #[test]
    fn test_header_errors() {
        let cases = [
            "plx\nformat ascii 1.0\nend_header\n",
            "ply\nformat ascii 2.0\nend_header\n",
            "ply\nformat ascii 1.0\nproperty float x\nend_header\n",
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1\n",
            "ply\nformat ascii 1.0\nelement face 1\nproperty uchar n\nend_header\n1\n",
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n",
        ];
        for case in cases {
            let result = read_ply_from_reader(Cursor::new(case), "bad.ply");
            assert!(matches!(result, Err(Error::PlyFormat { .. })), "accepted: {case:?}");
        }
    }

    #[test]
    fn test_ascii_invalid_number() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nend_header\n1.0 abc\n";
        assert!(read_ply_from_reader(Cursor::new(text), "nan.ply").is_err());
    }

    #[test]
    fn test_oversized_vertex_count() {
        for count in ["18446744073709551615", "10000000000000000"] {
            let header = format!(
                "ply\nformat {{}} 1.0\nelement vertex {count}\nproperty float x\nproperty float y\nend_header\n"
            );
            let ascii = header.replace("{}", "ascii") + "1.0 2.0\n";
            let err = read_ply_from_reader(Cursor::new(ascii), "huge.ply").unwrap_err();
            assert!(matches!(err, Error::PlyFormat { .. }), "got {err}");

            let mut binary = header.replace("{}", "binary_little_endian").into_bytes();
            binary.write_f32::<LittleEndian>(1.0).unwrap();
            binary.write_f32::<LittleEndian>(2.0).unwrap();
            let err = read_ply_from_reader(Cursor::new(binary), "huge.ply").unwrap_err();
            assert!(matches!(err, Error::PlyFormat { .. }), "got {err}");
        }
    }
}
