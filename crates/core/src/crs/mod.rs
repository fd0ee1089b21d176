//! Coordinate Reference System handling
//!
//! Point clouds written by stereo pipelines carry their projection as a PLY
//! header comment, e.g. `projection: UTM 31N` or `projection: EPSG 32631`.
//! [`CRS::from_ply_comments`] turns such comments into a [`CRS`] that is
//! forwarded unchanged to the output raster.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const WKT_ROOTS: [&str; 5] = ["PROJCS[", "GEOGCS[", "PROJCRS[", "GEOGCRS[", "COMPOUNDCRS["];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 / UTM zone as a PROJ string, e.g. `zone = 31, south = false`
    pub fn utm(zone: u8, south: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::MetadataResolution(format!(
                "UTM zone {zone} outside 1..=60"
            )));
        }
        let hemisphere = if south { " +south" } else { "" };
        Ok(Self::from_proj(format!(
            "+proj=utm +zone={zone}{hemisphere} +datum=WGS84 +units=m +no_defs"
        )))
    }

    /// Resolve the CRS declared in PLY header comments.
    ///
    /// Recognised forms, in order of precedence:
    /// - `projection: UTM <zone><N|S>`
    /// - `projection: EPSG <code>` (4 or 5 digits)
    /// - `projection: CRS <wkt or proj string>`
    ///
    /// The last comment of the winning kind is used.
    pub fn from_ply_comments<S: AsRef<str>>(comments: &[S]) -> Result<Self> {
        let last = |kind: &str| {
            comments
                .iter()
                .filter_map(|c| projection_value(c.as_ref(), kind))
                .last()
        };

        if let Some(code) = last("UTM") {
            return parse_utm(code);
        }
        if let Some(code) = last("EPSG") {
            return parse_epsg(code);
        }
        if let Some(definition) = last("CRS") {
            let upper = definition.to_ascii_uppercase();
            return Ok(if WKT_ROOTS.iter().any(|root| upper.starts_with(root)) {
                Self::from_wkt(definition)
            } else {
                Self::from_proj(definition)
            });
        }

        let listed: Vec<&str> = comments.iter().map(|c| c.as_ref()).collect();
        Err(Error::MetadataResolution(format!(
            "no projection comment among {listed:?}"
        )))
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Value following `projection: <kind> ` in a comment line
fn projection_value<'a>(comment: &'a str, kind: &str) -> Option<&'a str> {
    let rest = comment.trim().strip_prefix("projection:")?.trim_start();
    let value = rest.strip_prefix(kind)?;
    if !value.starts_with(char::is_whitespace) {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_utm(code: &str) -> Result<CRS> {
    let invalid = || Error::MetadataResolution(format!("invalid UTM zone '{code}'"));

    if !code.is_ascii() {
        return Err(invalid());
    }
    let split = code.len().checked_sub(1).ok_or_else(invalid)?;
    let (zone, hemisphere) = code.split_at(split);
    if zone.is_empty() || zone.len() > 2 || !zone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let south = match hemisphere {
        "N" => false,
        "S" => true,
        _ => return Err(invalid()),
    };
    let zone: u8 = zone.parse().map_err(|_| invalid())?;
    CRS::utm(zone, south)
}

fn parse_epsg(code: &str) -> Result<CRS> {
    if !(4..=5).contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MetadataResolution(format!(
            "invalid EPSG code '{code}'"
        )));
    }
    code.parse()
        .map(CRS::from_epsg)
        .map_err(|e| Error::MetadataResolution(format!("invalid EPSG code '{code}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_utm_comment() {
        let crs = CRS::from_ply_comments(&["created by s2p", "projection: UTM 31N"]).unwrap();
        assert_eq!(
            crs.proj(),
            Some("+proj=utm +zone=31 +datum=WGS84 +units=m +no_defs")
        );

        let south = CRS::from_ply_comments(&["projection: UTM 7S"]).unwrap();
        assert!(south.proj().unwrap().contains("+zone=7 +south"));
    }

    #[test]
    fn test_epsg_comment() {
        let crs = CRS::from_ply_comments(&["projection: EPSG 32631"]).unwrap();
        assert_eq!(crs.epsg(), Some(32631));
        assert_eq!(crs.identifier(), "EPSG:32631");
    }

    #[test]
    fn test_utm_wins_over_epsg_and_last_wins() {
        let comments = [
            "projection: EPSG 4326",
            "projection: UTM 30N",
            "projection: UTM 31N",
        ];
        let crs = CRS::from_ply_comments(&comments).unwrap();
        assert!(crs.proj().unwrap().contains("+zone=31"));
    }

    #[test]
    fn test_free_form_crs_comment() {
        let wkt = CRS::from_ply_comments(&["projection: CRS PROJCS[\"WGS 84 / UTM zone 31N\"]"])
            .unwrap();
        assert!(wkt.wkt().is_some());

        let proj = CRS::from_ply_comments(&["projection: CRS +proj=longlat +datum=WGS84"]).unwrap();
        assert_eq!(proj.proj(), Some("+proj=longlat +datum=WGS84"));
    }

    #[test]
    fn test_missing_or_invalid_projection() {
        let none: [&str; 0] = [];
        assert!(matches!(
            CRS::from_ply_comments(&none),
            Err(Error::MetadataResolution(_))
        ));
        assert!(CRS::from_ply_comments(&["projection: UTM 99N"]).is_err());
        assert!(CRS::from_ply_comments(&["projection: UTM 31X"]).is_err());
        assert!(CRS::from_ply_comments(&["projection: EPSG 12"]).is_err());
        assert!(CRS::from_ply_comments(&["projection: UTMX 31N"]).is_err());
    }
}
