//! Input checks run before anything is handed to the store. The text parsers
//! take what an outer layer received (path segments, a `bbox=` query value);
//! the typed checks guard the repository entry points.

/**
 *     /\
 *    ( /   @ @    ()
 *     \  __| |__  /
 *      -/   "   \-
 *     /-|       |-\
 *    / /-\     /-\ \
 *     / /-`---'-\ \
 *      /         \ CRABPANO
 *
 *   validate.rs - coordinate and bounding box validation
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use geo::{coord, Rect};

pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// A query envelope. Unlike `geo::Rect` it keeps the bounds exactly as given
/// so an inverted box can be reported rather than silently normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        BoundingBox { min_lon, min_lat, max_lon, max_lat }
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }
}

/// Does this look like a plain decimal, i.e. `^[0-9.\-]+$`?
fn is_decimal(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

fn parse_decimal(text: &str) -> Result<f64> {
    let text = text.trim();

    if !is_decimal(text) {
        return Err(PanoError::Validation(format!("'{}' is not a decimal number", text)));
    }

    text.parse::<f64>()
        .map_err(|_| PanoError::Validation(format!("'{}' is not a decimal number", text)))
}

/// Parse a longitude / latitude pair given as text.
///
/// * `lon` - longitude text.
/// * `lat` - latitude text.
pub fn parse_point(lon: &str, lat: &str) -> Result<(f64, f64)> {
    Ok((parse_decimal(lon)?, parse_decimal(lat)?))
}

/// Parse `minLon,minLat,maxLon,maxLat` and check it with `bounding_box`.
///
/// * `text` - the four comma separated numbers.
pub fn parse_bbox(text: &str) -> Result<BoundingBox> {
    let values = text
        .split(',')
        .map(parse_decimal)
        .collect::<Result<Vec<f64>>>()?;

    if values.len() != 4 {
        return Err(PanoError::Validation(format!(
            "a bounding box needs 4 values, got {}",
            values.len()
        )));
    }

    let bbox = BoundingBox::new(values[0], values[1], values[2], values[3]);
    bounding_box(&bbox)?;
    Ok(bbox)
}

/// Longitude must sit in [-180, 180] and latitude in [-90, 90].
pub fn coordinates(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(PanoError::Validation(format!("longitude {} out of range", lon)));
    }

    if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(PanoError::Validation(format!("latitude {} out of range", lat)));
    }

    Ok(())
}

/// Both corners in range and min strictly below max on each axis.
pub fn bounding_box(bbox: &BoundingBox) -> Result<()> {
    coordinates(bbox.min_lon, bbox.min_lat)?;
    coordinates(bbox.max_lon, bbox.max_lat)?;

    if bbox.min_lon >= bbox.max_lon || bbox.min_lat >= bbox.max_lat {
        return Err(PanoError::Validation(String::from(
            "bounding box minimum must be below its maximum",
        )));
    }

    Ok(())
}

/// A search radius in meters.
pub fn radius(meters: f64) -> Result<()> {
    if !meters.is_finite() || meters < 0.0 {
        return Err(PanoError::Validation(format!("radius {} is not a distance", meters)));
    }
    Ok(())
}

/// A numeric attribute (heading, correction, elevation) has to be a real number.
pub fn finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PanoError::Validation(format!("{} must be a finite number", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("-0.13", "51.5").unwrap(), (-0.13, 51.5));
        assert!(parse_point("1e5", "2").is_err());
        assert!(parse_point("", "2").is_err());
        assert!(parse_point("1", "abc").is_err());
        // Matches the pattern but isn't a number
        assert!(parse_point("1.2.3", "4").is_err());
        assert!(parse_point("--", "4").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("-1,51,0,52").unwrap();
        assert_eq!(bbox, BoundingBox::new(-1.0, 51.0, 0.0, 52.0));
        assert!(parse_bbox("-1,51,0").is_err());
        assert!(parse_bbox("-1,51,0,52,3").is_err());
        assert!(parse_bbox("-1,51,x,52").is_err());
    }

    #[test]
    fn test_bbox_ranges() {
        assert!(parse_bbox("-180,-90,180,90").is_ok());
        assert!(parse_bbox("-181,0,1,1").is_err());
        assert!(parse_bbox("0,-91,1,1").is_err());
        assert!(parse_bbox("0,0,1,91").is_err());
        // Longitude may go beyond 90, latitude may not
        assert!(parse_bbox("100,0,120,10").is_ok());
        assert!(parse_bbox("0,100,10,120").is_err());
    }

    #[test]
    fn test_bbox_ordering() {
        assert!(parse_bbox("1,1,1,2").is_err());
        assert!(parse_bbox("1,1,2,1").is_err());
        assert!(parse_bbox("2,1,1,2").is_err());
        assert!(parse_bbox("1,2,2,1").is_err());
    }

    #[test]
    fn test_coordinates() {
        assert!(coordinates(-0.14, 51.51).is_ok());
        assert!(coordinates(180.5, 0.0).is_err());
        assert!(coordinates(0.0, -90.5).is_err());
        assert!(coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_radius() {
        assert!(radius(100.0).is_ok());
        assert!(radius(-1.0).is_err());
        assert!(radius(f64::INFINITY).is_err());
    }
}
