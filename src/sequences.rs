//! Sequences: ordered paths through panoramas. A sequence is written once,
//! as a path geometry plus one membership row per panorama, and never
//! changed afterwards.

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
 *   sequences.rs - the sequence builder
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use crate::geom::{decode_line, encode_line};
use crate::models::{decode_location, PathVertex, SequenceMember};
use crate::store::PanoStore;
use geo::{LineString, Point};
use log::{debug, info, warn};

/// Build a sequence from panorama ids, in the order given. Ids that do not
/// exist or have no location are skipped. The path and its memberships are
/// written in one transaction, so a failure leaves nothing behind.
///
/// * `store` - the backing store.
/// * `ordered_ids` - the panoramas along the path, first to last.
pub fn create<S: PanoStore>(store: &mut S, ordered_ids: &[i32]) -> Result<i32> {
    let sequence_id = store.atomically(|s| {
        let mut vertices: Vec<PathVertex> = vec![];

        for id in ordered_ids {
            let location = match s.select_panorama(*id)? {
                Some(row) => decode_location(&row.the_geom)?,
                None => None,
            };

            match location {
                Some(location) => vertices.push(PathVertex { pano_id: *id, location }),
                None => warn!("Panorama {} is missing or unpositioned, leaving it out", id),
            }
        }

        if vertices.is_empty() {
            return Err(PanoError::NotFound(String::from("no valid panorama ids")));
        }

        let points: Vec<Point<f64>> = vertices.iter().map(|v| v.location).collect();
        let sequence_id = match s.insert_sequence_geom(&encode_line(&points)?)?.as_slice() {
            [id] if *id > 0 => *id,
            ids => {
                return Err(PanoError::Persistence(format!(
                    "sequence insert returned {} ids",
                    ids.len()
                )))
            }
        };

        for vertex in vertices.iter() {
            let added = s.insert_membership(sequence_id, vertex.pano_id)?;
            if added != 1 {
                return Err(PanoError::Persistence(format!(
                    "linking panorama {} to sequence {} added {} rows",
                    vertex.pano_id, sequence_id, added
                )));
            }
        }

        debug!("Sequence {} has {} of {} requested panoramas", sequence_id, vertices.len(), ordered_ids.len());
        Ok(sequence_id)
    })?;

    info!("Created sequence {}", sequence_id);
    Ok(sequence_id)
}

/// The members of a sequence in path order, or None if it has none.
/// Any member whose location cannot be read fails the whole call.
///
/// * `store` - the backing store.
/// * `sequence_id` - the sequence id.
pub fn get<S: PanoStore>(store: &mut S, sequence_id: i32) -> Result<Option<Vec<SequenceMember>>> {
    let rows = store.sequence_members(sequence_id)?;

    if rows.is_empty() {
        return Ok(None);
    }

    rows.into_iter()
        .map(SequenceMember::try_from)
        .collect::<Result<Vec<SequenceMember>>>()
        .map(Some)
}

/// The path as it was when the sequence was created.
///
/// * `store` - the backing store.
/// * `sequence_id` - the sequence id.
pub fn get_geometry<S: PanoStore>(store: &mut S, sequence_id: i32) -> Result<Option<LineString<f64>>> {
    match store.select_sequence_geom(sequence_id)? {
        Some(row) => {
            let text = row.the_geom.ok_or_else(|| {
                PanoError::Decode(format!("sequence {} has no geometry", sequence_id))
            })?;
            Ok(Some(decode_line(&text)?))
        }
        None => Ok(None),
    }
}

/// The sequence a panorama belongs to, if any.
pub fn sequence_for<S: PanoStore>(store: &mut S, pano_id: i32) -> Result<Option<i32>> {
    Ok(store.sequences_for(pano_id)?.first().copied())
}

/// Every stop on the sequence this panorama belongs to, in path order.
/// Empty if the panorama is not on a sequence.
///
/// * `store` - the backing store.
/// * `pano_id` - any panorama on the sequence.
pub fn path_for<S: PanoStore>(store: &mut S, pano_id: i32) -> Result<Vec<PathVertex>> {
    let sequence_id = match sequence_for(store, pano_id)? {
        Some(id) => id,
        None => return Ok(vec![]),
    };

    Ok(get(store, sequence_id)?
        .unwrap_or_default()
        .iter()
        .map(PathVertex::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::faulty::{Fault, FaultyStore};
    use crate::memstore::MemStore;
    use crate::models::NewPanorama;
    use crate::panos;

    fn positioned(store: &mut MemStore, lon: f64, lat: f64) -> i32 {
        let pano = NewPanorama {
            location: Some(Point::new(lon, lat)),
            heading_degrees: 45.0,
            elevation: Some(10.0),
        };
        panos::create(store, &pano).unwrap()
    }

    #[test]
    fn test_create_empty_or_unknown() {
        let mut store = MemStore::new();
        assert_eq!(create(&mut store, &[]).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(create(&mut store, &[42]).unwrap_err().kind(), ErrorKind::NotFound);

        let unpositioned = panos::create(&mut store, &NewPanorama::default()).unwrap();
        assert_eq!(create(&mut store, &[unpositioned]).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.sequence_count(), 0);
    }

    #[test]
    fn test_single_member() {
        let mut store = MemStore::new();
        let a = positioned(&mut store, -1.0, 50.0);
        let seq = create(&mut store, &[a]).unwrap();

        let line = get_geometry(&mut store, seq).unwrap().unwrap();
        assert_eq!(line.0.len(), 1);
        assert_eq!(panos::get(&mut store, a).unwrap().unwrap().sequence_id, Some(seq));
    }

    #[test]
    fn test_order_kept() {
        let mut store = MemStore::new();
        let a = positioned(&mut store, -1.0, 50.0);
        let b = positioned(&mut store, -1.1, 50.1);
        let c = positioned(&mut store, -1.2, 50.2);
        let missing = c + 100;

        let seq = create(&mut store, &[c, missing, a, b]).unwrap();
        let members = get(&mut store, seq).unwrap().unwrap();
        let ids: Vec<i32> = members.iter().map(|m| m.pano_id).collect();
        assert_eq!(ids, vec![c, a, b]);
        assert_eq!(members[0].location, Point::new(-1.2, 50.2));
        assert_eq!(members[0].heading_degrees, 45.0);
        assert_eq!(members[0].elevation, Some(10.0));

        let line = get_geometry(&mut store, seq).unwrap().unwrap();
        let xs: Vec<f64> = line.coords().map(|c| c.x).collect();
        assert_eq!(xs, vec![-1.2, -1.0, -1.1]);

        let path: Vec<i32> = path_for(&mut store, b).unwrap().iter().map(|v| v.pano_id).collect();
        assert_eq!(path, vec![c, a, b]);
    }

    #[test]
    fn test_failed_create_leaves_nothing() {
        let mut store = MemStore::new();
        let a = positioned(&mut store, 0.0, 0.0);
        let b = positioned(&mut store, 1.0, 1.0);
        let first = create(&mut store, &[a]).unwrap();

        // b links fine, then a is already taken
        let err = create(&mut store, &[b, a]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(store.sequence_count(), 1);
        assert_eq!(store.membership_count(), 1);
        assert_eq!(sequence_for(&mut store, b).unwrap(), None);

        // A duplicate id in one request fails the same way
        assert!(create(&mut store, &[b, b]).is_err());
        assert_eq!(store.sequence_count(), 1);

        let next = create(&mut store, &[b]).unwrap();
        assert!(next > first + 1);
    }

    #[test]
    fn test_geometry_is_a_snapshot() {
        let mut store = MemStore::new();
        let a = positioned(&mut store, 0.0, 0.0);
        let b = positioned(&mut store, 1.0, 1.0);
        let seq = create(&mut store, &[a, b]).unwrap();
        let before = get_geometry(&mut store, seq).unwrap().unwrap();

        panos::move_pano(&mut store, a, 5.0, 5.0).unwrap();
        assert_eq!(get_geometry(&mut store, seq).unwrap().unwrap(), before);
        // Members read live positions
        assert_eq!(get(&mut store, seq).unwrap().unwrap()[0].location, Point::new(5.0, 5.0));

        assert_eq!(panos::delete(&mut store, a).unwrap(), 1);
        assert_eq!(panos::delete(&mut store, b).unwrap(), 1);
        assert_eq!(get_geometry(&mut store, seq).unwrap().unwrap(), before);
        assert!(get(&mut store, seq).unwrap().is_none());
        assert_eq!(store.membership_count(), 0);
    }

    #[test]
    fn test_unknown_sequence() {
        let mut store = MemStore::new();
        let a = positioned(&mut store, 0.0, 0.0);
        assert!(get(&mut store, 7).unwrap().is_none());
        assert!(get_geometry(&mut store, 7).unwrap().is_none());
        assert!(path_for(&mut store, a).unwrap().is_empty());
    }

    fn faulty_with_panos(fault: Fault) -> (FaultyStore, i32, i32) {
        let mut store = FaultyStore::new(Fault::Healthy);
        let a = positioned(&mut store.inner, 0.0, 0.0);
        let b = positioned(&mut store.inner, 1.0, 1.0);
        store.fault = fault;
        (store, a, b)
    }

    #[test]
    fn test_bad_member_geometry() {
        let (mut store, a, b) = faulty_with_panos(Fault::Healthy);
        let seq = create(&mut store, &[a, b]).unwrap();

        store.fault = Fault::MemberGeom(Some(String::from("POINT(east north)")));
        assert_eq!(get(&mut store, seq).unwrap_err().kind(), ErrorKind::Decode);
        assert_eq!(path_for(&mut store, a).unwrap_err().kind(), ErrorKind::Decode);

        store.fault = Fault::MemberGeom(None);
        assert_eq!(get(&mut store, seq).unwrap_err().kind(), ErrorKind::Decode);

        store.fault = Fault::Healthy;
        assert_eq!(get(&mut store, seq).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_sequence_id_count() {
        for reported in [vec![], vec![1, 2], vec![0]] {
            let (mut store, a, b) = faulty_with_panos(Fault::SequenceIds(reported));
            assert_eq!(create(&mut store, &[a, b]).unwrap_err().kind(), ErrorKind::Persistence);
            assert_eq!(store.inner.sequence_count(), 0);
            assert_eq!(store.inner.membership_count(), 0);
        }
    }

    #[test]
    fn test_membership_not_added() {
        let (mut store, a, b) = faulty_with_panos(Fault::NoMembership);
        assert_eq!(create(&mut store, &[a, b]).unwrap_err().kind(), ErrorKind::Persistence);
        assert_eq!(store.inner.sequence_count(), 0);
        assert_eq!(sequence_for(&mut store, a).unwrap(), None);
    }
}
