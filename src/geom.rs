//! Conversion between the WKT text the store speaks (`POINT(lon lat)`,
//! `LINESTRING(lon lat, ...)`, SRID 4326) and the `geo` types the rest of
//! CrabPano works with.

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
 *   geom.rs - geometry codec
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use geo::{Coord, LineString, Point};

/// Render a point as `POINT(<lon> <lat>)`.
///
/// f64 `Display` never switches to scientific notation, so the output is
/// always a plain decimal the store will accept.
///
/// * `lon` - longitude in degrees.
/// * `lat` - latitude in degrees.
pub fn encode_point(lon: f64, lat: f64) -> String {
    format!("POINT({} {})", lon, lat)
}

/// Parse a `POINT(<lon> <lat>)` string back into a point. The x of the
/// returned point is the longitude, the y the latitude.
///
/// * `text` - the WKT text as returned by `ST_AsText`.
pub fn decode_point(text: &str) -> Result<Point<f64>> {
    let body = tagged_body(text, "POINT")?;
    let coord = decode_coord(body, text)?;
    Ok(Point::from(coord))
}

/// Render an ordered list of points as `LINESTRING(<lon1> <lat1>, ...)`.
/// At least one point is needed; a single point gives a degenerate but legal line.
///
/// * `points` - the vertices, in path order.
pub fn encode_line(points: &[Point<f64>]) -> Result<String> {
    if points.is_empty() {
        return Err(PanoError::Validation(String::from(
            "a line needs at least one point",
        )));
    }

    let verts: Vec<String> = points
        .iter()
        .map(|p| format!("{} {}", p.x(), p.y()))
        .collect();
    Ok(format!("LINESTRING({})", verts.join(",")))
}

/// Parse a `LINESTRING(...)` string into a `LineString`, keeping vertex order.
///
/// * `text` - the WKT text as returned by `ST_AsText`.
pub fn decode_line(text: &str) -> Result<LineString<f64>> {
    let body = tagged_body(text, "LINESTRING")?;
    let coords = body
        .split(',')
        .map(|pair| decode_coord(pair, text))
        .collect::<Result<Vec<Coord<f64>>>>()?;
    Ok(LineString::from(coords))
}

/// Strip the `TAG(` ... `)` wrapper, returning what sits between the parens.
fn tagged_body<'a>(text: &'a str, tag: &str) -> Result<&'a str> {
    text.trim()
        .strip_prefix(tag)
        .map(|rest| rest.trim_start())
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| PanoError::Decode(format!("expected {}(...) but got '{}'", tag, text)))
}

/// Two whitespace separated numbers, longitude first.
fn decode_coord(pair: &str, text: &str) -> Result<Coord<f64>> {
    let bad = || PanoError::Decode(format!("malformed coordinate '{}' in '{}'", pair.trim(), text));
    let mut tokens = pair.split_whitespace();

    let x = tokens.next().ok_or_else(bad)?.parse::<f64>().map_err(|_| bad())?;
    let y = tokens.next().ok_or_else(bad)?.parse::<f64>().map_err(|_| bad())?;

    if tokens.next().is_some() || !x.is_finite() || !y.is_finite() {
        return Err(bad());
    }

    Ok(Coord { x, y })
}
