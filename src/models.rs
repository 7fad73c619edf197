//! The rows that come back from the PostGIS database and the records we
//! build from them. We use Diesel to provide an ORM for us.
/** ```rust,ignore
 *     /\
 *    ( /   @ @    ()
 *     \  __| |__  /
 *      -/   "   \-
 *     /-|       |-\
 *    / /-\     /-\ \
 *     / /-`---'-\ \
 *      /         \ CRABPANO
 *
 *   models.rs - db models for diesel
 *   Author - bjb8@st-andrews.ac.uk
 *   ```
 */

use crate::error::{PanoError, Result};
use crate::geom::decode_point;
use diesel::prelude::*;
use diesel::sql_types::{Float8, Int4, Int8, Nullable, Text};
use geo::Point;

// Geometry columns always arrive as ST_AsText output, never as raw geometry.

/// A panorama row as selected with `ST_AsText(the_geom) AS the_geom`.
#[derive(QueryableByName, Clone, Debug, PartialEq)]
pub struct PanoRow {
    #[diesel(sql_type = Int4)]
    pub id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub the_geom: Option<String>,
    #[diesel(sql_type = Int8)]
    pub timestamp: i64,
    #[diesel(sql_type = Nullable<Float8>)]
    pub ele: Option<f64>,
    #[diesel(sql_type = Float8)]
    pub poseheadingdegrees: f64,
    #[diesel(sql_type = Float8)]
    pub pancorrection: f64,
    #[diesel(sql_type = Float8)]
    pub tiltcorrection: f64,
    #[diesel(sql_type = Float8)]
    pub rollcorrection: f64,
    #[diesel(sql_type = Int4)]
    pub authorised: i32,
}

/// A sequence member joined with its panorama, in membership order.
#[derive(QueryableByName, Clone, Debug, PartialEq)]
pub struct MemberRow {
    #[diesel(sql_type = Int4)]
    pub panoid: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub the_geom: Option<String>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub ele: Option<f64>,
    #[diesel(sql_type = Float8)]
    pub poseheadingdegrees: f64,
    #[diesel(sql_type = Float8)]
    pub pancorrection: f64,
    #[diesel(sql_type = Float8)]
    pub tiltcorrection: f64,
    #[diesel(sql_type = Float8)]
    pub rollcorrection: f64,
}

/// Just an id and its geometry text.
#[derive(QueryableByName, Clone, Debug, PartialEq)]
pub struct GeomRow {
    #[diesel(sql_type = Int4)]
    pub id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub the_geom: Option<String>,
}

/// What an `INSERT ... RETURNING id` gives back.
#[derive(QueryableByName, Clone, Copy, Debug)]
pub struct InsertedId {
    #[diesel(sql_type = Int4)]
    pub id: i32,
}

/// One link between a sequence and a panorama.
#[derive(Insertable, Clone, Copy, Debug)]
#[diesel(table_name = crate::schema::sequence_panos)]
pub struct NewMembership {
    pub sequenceid: i32,
    pub panoid: i32,
}

/// The values a store needs to insert a panorama.
#[derive(Clone, Debug, PartialEq)]
pub struct PanoInsert {
    pub the_geom: Option<String>,
    pub timestamp: i64,
    pub poseheadingdegrees: f64,
    pub ele: Option<f64>,
}

/// A panorama as callers see it. Location is decoded; the geometry text is gone.
#[derive(Clone, Debug, PartialEq)]
pub struct Panorama {
    pub id: i32,
    /// x is longitude, y latitude. None until the panorama is positioned.
    pub location: Option<Point<f64>>,
    pub elevation: Option<f64>,
    pub heading_degrees: f64,
    pub pan_correction: f64,
    pub tilt_correction: f64,
    pub roll_correction: f64,
    pub authorised: bool,
    /// Creation time in epoch seconds.
    pub timestamp: i64,
    pub sequence_id: Option<i32>,
}

/// What we know about a panorama when it is first added.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct NewPanorama {
    pub location: Option<Point<f64>>,
    pub heading_degrees: f64,
    pub elevation: Option<f64>,
}

/// One entry in a batch move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanoMove {
    pub id: i32,
    pub lon: f64,
    pub lat: f64,
}

/// A panorama with no elevation yet, for whatever fills elevations in.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationTask {
    pub id: i32,
    pub location: Option<Point<f64>>,
}

/// A stop along a sequence, with everything a viewer needs to orient it.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceMember {
    pub pano_id: i32,
    pub location: Point<f64>,
    pub elevation: Option<f64>,
    pub heading_degrees: f64,
    pub pan_correction: f64,
    pub tilt_correction: f64,
    pub roll_correction: f64,
}

/// A stop along a sequence, position only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathVertex {
    pub pano_id: i32,
    pub location: Point<f64>,
}

/// Decode optional geometry text. NULL is an unpositioned panorama; text
/// that is not a point is an error, never a silent (0, 0).
pub fn decode_location(the_geom: &Option<String>) -> Result<Option<Point<f64>>> {
    the_geom.as_deref().map(decode_point).transpose()
}

impl TryFrom<PanoRow> for Panorama {
    type Error = PanoError;

    fn try_from(row: PanoRow) -> Result<Self> {
        Ok(Panorama {
            id: row.id,
            location: decode_location(&row.the_geom)?,
            elevation: row.ele,
            heading_degrees: row.poseheadingdegrees,
            pan_correction: row.pancorrection,
            tilt_correction: row.tiltcorrection,
            roll_correction: row.rollcorrection,
            authorised: row.authorised != 0,
            timestamp: row.timestamp,
            sequence_id: None,
        })
    }
}

impl TryFrom<MemberRow> for SequenceMember {
    type Error = PanoError;

    fn try_from(row: MemberRow) -> Result<Self> {
        let location = decode_location(&row.the_geom)?.ok_or_else(|| {
            PanoError::Decode(format!("sequence member {} has no location", row.panoid))
        })?;

        Ok(SequenceMember {
            pano_id: row.panoid,
            location,
            elevation: row.ele,
            heading_degrees: row.poseheadingdegrees,
            pan_correction: row.pancorrection,
            tilt_correction: row.tiltcorrection,
            roll_correction: row.rollcorrection,
        })
    }
}

impl TryFrom<GeomRow> for ElevationTask {
    type Error = PanoError;

    fn try_from(row: GeomRow) -> Result<Self> {
        Ok(ElevationTask {
            id: row.id,
            location: decode_location(&row.the_geom)?,
        })
    }
}

impl From<&SequenceMember> for PathVertex {
    fn from(member: &SequenceMember) -> Self {
        PathVertex {
            pano_id: member.pano_id,
            location: member.location,
        }
    }
}
