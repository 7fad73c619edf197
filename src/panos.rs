//! Creating, changing and finding individual panoramas. Every function takes
//! the store it should work against, so callers decide which connection (or
//! which test double) is used.

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
 *   panos.rs - the panorama repository
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use crate::geom::encode_point;
use crate::models::{ElevationTask, NewPanorama, PanoInsert, PanoMove, PanoRow, Panorama};
use crate::store::PanoStore;
use crate::validate::{self, BoundingBox};
use chrono::Utc;
use log::{debug, info, warn};

/// Decode a batch of rows, geometry text and all.
fn to_panoramas(rows: Vec<PanoRow>) -> Result<Vec<Panorama>> {
    rows.into_iter().map(Panorama::try_from).collect()
}

/// Add a new panorama, returning its id. The creation time is stamped here.
///
/// * `store` - the backing store.
/// * `pano` - location (if known), heading and elevation (if known).
pub fn create<S: PanoStore>(store: &mut S, pano: &NewPanorama) -> Result<i32> {
    if let Some(location) = pano.location {
        validate::coordinates(location.x(), location.y())?;
    }
    validate::finite("heading", pano.heading_degrees)?;
    if let Some(ele) = pano.elevation {
        validate::finite("elevation", ele)?;
    }

    let insert = PanoInsert {
        the_geom: pano.location.map(|p| encode_point(p.x(), p.y())),
        timestamp: Utc::now().timestamp(),
        poseheadingdegrees: pano.heading_degrees,
        ele: pano.elevation,
    };

    match store.insert_panorama(&insert)?.as_slice() {
        [id] if *id > 0 => {
            info!("Added panorama {}", id);
            Ok(*id)
        }
        ids => Err(PanoError::Persistence(format!(
            "panorama insert returned {} ids",
            ids.len()
        ))),
    }
}

/// Return the panorama with this id, along with the sequence it belongs to.
///
/// * `store` - the backing store.
/// * `id` - the panorama id.
pub fn get<S: PanoStore>(store: &mut S, id: i32) -> Result<Option<Panorama>> {
    let row = match store.select_panorama(id)? {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut pano = Panorama::try_from(row)?;
    let sequences = store.sequences_for(id)?;

    if sequences.len() > 1 {
        warn!("Panorama {} belongs to {} sequences, using the first", id, sequences.len());
    }

    pano.sequence_id = sequences.first().copied();
    Ok(Some(pano))
}

/// Delete a panorama and its sequence membership together. Returns 1 if it
/// existed; only then should any image file for it be removed.
///
/// * `store` - the backing store.
/// * `id` - the panorama id.
pub fn delete<S: PanoStore>(store: &mut S, id: i32) -> Result<usize> {
    let deleted = store.atomically(|s| {
        let unlinked = s.delete_memberships(id)?;
        if unlinked > 0 {
            debug!("Unlinked panorama {} from {} sequence(s)", id, unlinked);
        }
        s.delete_panorama(id)
    })?;

    info!("Deleted {} panorama(s) with id {}", deleted, id);
    Ok(deleted)
}

/// Move a panorama. Any sequence path it is on keeps its old shape.
///
/// * `store` - the backing store.
/// * `id` - the panorama id.
/// * `lon` - new longitude.
/// * `lat` - new latitude.
pub fn move_pano<S: PanoStore>(store: &mut S, id: i32, lon: f64, lat: f64) -> Result<usize> {
    validate::coordinates(lon, lat)?;
    store.update_location(id, &encode_point(lon, lat))
}

/// Move many panoramas at once. Either every move happens or none do; an id
/// that does not exist simply adds nothing to the total.
///
/// * `store` - the backing store.
/// * `moves` - the id and new position of each panorama.
pub fn move_multi<S: PanoStore>(store: &mut S, moves: &[PanoMove]) -> Result<usize> {
    for m in moves {
        validate::coordinates(m.lon, m.lat)?;
    }

    let moved = store.atomically(|s| {
        moves.iter().try_fold(0, |total: usize, m| -> Result<usize> {
            Ok(total + s.update_location(m.id, &encode_point(m.lon, m.lat))?)
        })
    })?;

    info!("Moved {} of {} panoramas", moved, moves.len());
    Ok(moved)
}

/// Set all three orientation corrections in one update.
///
/// * `store` - the backing store.
/// * `id` - the panorama id.
/// * `pan`, `tilt`, `roll` - the corrections in degrees.
pub fn rotate<S: PanoStore>(store: &mut S, id: i32, pan: f64, tilt: f64, roll: f64) -> Result<usize> {
    validate::finite("pan", pan)?;
    validate::finite("tilt", tilt)?;
    validate::finite("roll", roll)?;
    store.update_corrections(id, pan, tilt, roll)
}

pub fn set_elevation<S: PanoStore>(store: &mut S, id: i32, elevation: f64) -> Result<usize> {
    validate::finite("elevation", elevation)?;
    store.update_elevation(id, elevation)
}

/// Mark a panorama as fit for public view.
pub fn authorise<S: PanoStore>(store: &mut S, id: i32) -> Result<usize> {
    store.update_authorised(id, 1)
}

/// The positioned panorama nearest this point, in plain coordinate distance.
///
/// * `store` - the backing store.
/// * `lon` - query longitude.
/// * `lat` - query latitude.
pub fn find_nearest<S: PanoStore>(store: &mut S, lon: f64, lat: f64) -> Result<Option<Panorama>> {
    validate::coordinates(lon, lat)?;
    store
        .nearest(&encode_point(lon, lat))?
        .map(Panorama::try_from)
        .transpose()
}

/// Panoramas less than `meters` away on the ground, lowest id first.
///
/// * `store` - the backing store.
/// * `lon` - query longitude.
/// * `lat` - query latitude.
/// * `meters` - the search radius.
pub fn find_within_radius<S: PanoStore>(store: &mut S, lon: f64, lat: f64, meters: f64) -> Result<Vec<Panorama>> {
    validate::coordinates(lon, lat)?;
    validate::radius(meters)?;
    to_panoramas(store.within_radius(&encode_point(lon, lat), meters)?)
}

/// Panoramas inside or on the edge of the box, in no particular order.
///
/// * `store` - the backing store.
/// * `bbox` - the envelope to search.
pub fn find_in_bbox<S: PanoStore>(store: &mut S, bbox: &BoundingBox) -> Result<Vec<Panorama>> {
    validate::bounding_box(bbox)?;
    to_panoramas(store.in_envelope(bbox)?)
}

pub fn find_unauthorised<S: PanoStore>(store: &mut S) -> Result<Vec<Panorama>> {
    to_panoramas(store.unauthorised()?)
}

pub fn find_unpositioned<S: PanoStore>(store: &mut S) -> Result<Vec<Panorama>> {
    to_panoramas(store.unpositioned()?)
}

/// Panoramas still waiting for an elevation, with where they are.
pub fn find_missing_elevation<S: PanoStore>(store: &mut S) -> Result<Vec<ElevationTask>> {
    store
        .missing_elevation()?
        .into_iter()
        .map(ElevationTask::try_from)
        .collect()
}
