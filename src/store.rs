//! The persistence primitives the panorama repository and the sequence
//! builder are written against. `db.rs` implements them for a PostGIS
//! `PgConnection`; `memstore.rs` implements them in memory for tests.

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
 *   store.rs - the backing store trait
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::Result;
use crate::models::{GeomRow, MemberRow, PanoInsert, PanoRow};
use crate::validate::BoundingBox;

/// Geometry arguments and results are WKT text; decoding is left to the caller.
/// Every row-returning query hands back rows in the order documented on it.
pub trait PanoStore {
    /// Run `f` as one transaction. Any `Err` rolls back everything `f` wrote.
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;

    /// Insert a panorama, returning every id the insert produced.
    fn insert_panorama(&mut self, pano: &PanoInsert) -> Result<Vec<i32>>;

    fn select_panorama(&mut self, id: i32) -> Result<Option<PanoRow>>;

    fn delete_panorama(&mut self, id: i32) -> Result<usize>;

    fn update_location(&mut self, id: i32, point: &str) -> Result<usize>;

    fn update_corrections(&mut self, id: i32, pan: f64, tilt: f64, roll: f64) -> Result<usize>;

    fn update_elevation(&mut self, id: i32, ele: f64) -> Result<usize>;

    fn update_authorised(&mut self, id: i32, authorised: i32) -> Result<usize>;

    /// The positioned panorama closest to `point` by plain geometry
    /// (coordinate unit) distance. Ties go to the lowest id.
    fn nearest(&mut self, point: &str) -> Result<Option<PanoRow>>;

    /// Panoramas strictly closer than `meters` to `point` on the ellipsoid, by id.
    fn within_radius(&mut self, point: &str, meters: f64) -> Result<Vec<PanoRow>>;

    /// Panoramas whose envelope intersects the box, boundary included. Unordered.
    fn in_envelope(&mut self, bbox: &BoundingBox) -> Result<Vec<PanoRow>>;

    /// `authorised = 0`, by id.
    fn unauthorised(&mut self) -> Result<Vec<PanoRow>>;

    /// No location, by id.
    fn unpositioned(&mut self) -> Result<Vec<PanoRow>>;

    /// No elevation, by id.
    fn missing_elevation(&mut self) -> Result<Vec<GeomRow>>;

    /// Insert a sequence path, returning every id the insert produced.
    fn insert_sequence_geom(&mut self, line: &str) -> Result<Vec<i32>>;

    fn select_sequence_geom(&mut self, sequence_id: i32) -> Result<Option<GeomRow>>;

    /// Add one membership row after any existing ones. A panorama may belong
    /// to one sequence only; a second membership is a store error.
    fn insert_membership(&mut self, sequence_id: i32, pano_id: i32) -> Result<usize>;

    /// Sequences a panorama belongs to, oldest membership first.
    fn sequences_for(&mut self, pano_id: i32) -> Result<Vec<i32>>;

    /// Members of a sequence joined with their panoramas, in membership order.
    fn sequence_members(&mut self, sequence_id: i32) -> Result<Vec<MemberRow>>;

    fn delete_memberships(&mut self, pano_id: i32) -> Result<usize>;
}
