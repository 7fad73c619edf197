//! A `PanoStore` that wraps `MemStore` and misbehaves on request, for
//! testing the paths a healthy store never takes.

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
 *   faulty.rs - misbehaving store for tests
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::Result;
use crate::memstore::MemStore;
use crate::models::{GeomRow, MemberRow, PanoInsert, PanoRow};
use crate::store::PanoStore;
use crate::validate::BoundingBox;

#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    Healthy,
    /// The panorama insert writes its row but reports these ids.
    PanoIds(Vec<i32>),
    /// The sequence insert writes its path but reports these ids.
    SequenceIds(Vec<i32>),
    /// Membership inserts write nothing and report 0 rows.
    NoMembership,
    /// Every sequence member comes back with this geometry.
    MemberGeom(Option<String>),
}

pub struct FaultyStore {
    pub inner: MemStore,
    pub fault: Fault,
}

impl FaultyStore {
    pub fn new(fault: Fault) -> Self {
        FaultyStore {
            inner: MemStore::new(),
            fault,
        }
    }
}

impl PanoStore for FaultyStore {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = self.inner.clone();
        let result = f(self);

        if result.is_err() {
            self.inner = saved;
        }
        result
    }

    fn insert_panorama(&mut self, pano: &PanoInsert) -> Result<Vec<i32>> {
        let ids = self.inner.insert_panorama(pano)?;
        match &self.fault {
            Fault::PanoIds(reported) => Ok(reported.clone()),
            _ => Ok(ids),
        }
    }

    fn select_panorama(&mut self, id: i32) -> Result<Option<PanoRow>> {
        self.inner.select_panorama(id)
    }

    fn delete_panorama(&mut self, id: i32) -> Result<usize> {
        self.inner.delete_panorama(id)
    }

    fn update_location(&mut self, id: i32, point: &str) -> Result<usize> {
        self.inner.update_location(id, point)
    }

    fn update_corrections(&mut self, id: i32, pan: f64, tilt: f64, roll: f64) -> Result<usize> {
        self.inner.update_corrections(id, pan, tilt, roll)
    }

    fn update_elevation(&mut self, id: i32, ele: f64) -> Result<usize> {
        self.inner.update_elevation(id, ele)
    }

    fn update_authorised(&mut self, id: i32, authorised: i32) -> Result<usize> {
        self.inner.update_authorised(id, authorised)
    }

    fn nearest(&mut self, point: &str) -> Result<Option<PanoRow>> {
        self.inner.nearest(point)
    }

    fn within_radius(&mut self, point: &str, meters: f64) -> Result<Vec<PanoRow>> {
        self.inner.within_radius(point, meters)
    }

    fn in_envelope(&mut self, bbox: &BoundingBox) -> Result<Vec<PanoRow>> {
        self.inner.in_envelope(bbox)
    }

    fn unauthorised(&mut self) -> Result<Vec<PanoRow>> {
        self.inner.unauthorised()
    }

    fn unpositioned(&mut self) -> Result<Vec<PanoRow>> {
        self.inner.unpositioned()
    }

    fn missing_elevation(&mut self) -> Result<Vec<GeomRow>> {
        self.inner.missing_elevation()
    }

    fn insert_sequence_geom(&mut self, line: &str) -> Result<Vec<i32>> {
        let ids = self.inner.insert_sequence_geom(line)?;
        match &self.fault {
            Fault::SequenceIds(reported) => Ok(reported.clone()),
            _ => Ok(ids),
        }
    }

    fn select_sequence_geom(&mut self, sequence_id: i32) -> Result<Option<GeomRow>> {
        self.inner.select_sequence_geom(sequence_id)
    }

    fn insert_membership(&mut self, sequence_id: i32, pano_id: i32) -> Result<usize> {
        match self.fault {
            Fault::NoMembership => Ok(0),
            _ => self.inner.insert_membership(sequence_id, pano_id),
        }
    }

    fn sequences_for(&mut self, pano_id: i32) -> Result<Vec<i32>> {
        self.inner.sequences_for(pano_id)
    }

    fn sequence_members(&mut self, sequence_id: i32) -> Result<Vec<MemberRow>> {
        let mut rows = self.inner.sequence_members(sequence_id)?;
        if let Fault::MemberGeom(geom) = &self.fault {
            for row in rows.iter_mut() {
                row.the_geom = geom.clone();
            }
        }
        Ok(rows)
    }

    fn delete_memberships(&mut self, pano_id: i32) -> Result<usize> {
        self.inner.delete_memberships(pano_id)
    }
}
