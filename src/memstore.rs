//! An in memory `PanoStore`. It answers the same questions the PostGIS
//! database does, with the same three notions of distance, so the
//! repository and sequence code can be tested without a server.

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
 *   memstore.rs - in memory store
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use crate::geom::{decode_line, decode_point, encode_line, encode_point};
use crate::models::{GeomRow, MemberRow, PanoInsert, PanoRow};
use crate::store::PanoStore;
use crate::validate::BoundingBox;
use geo::{EuclideanDistance, GeodesicDistance, Intersects, LineString, Point};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
struct MemPano {
    location: Option<Point<f64>>,
    timestamp: i64,
    ele: Option<f64>,
    heading: f64,
    pan: f64,
    tilt: f64,
    roll: f64,
    authorised: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MemMember {
    key: i32,
    sequenceid: i32,
    panoid: i32,
}

/// The tables. Kept apart from the id counters so a rollback never hands
/// out an id twice.
#[derive(Clone, Debug, Default)]
struct Tables {
    panos: BTreeMap<i32, MemPano>,
    paths: BTreeMap<i32, LineString<f64>>,
    members: Vec<MemMember>,
}

#[derive(Clone, Debug, Default)]
pub struct MemStore {
    tables: Tables,
    last_pano: i32,
    last_path: i32,
    last_member: i32,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    /// How many sequence paths exist.
    pub fn sequence_count(&self) -> usize {
        self.tables.paths.len()
    }

    /// How many membership rows exist across all sequences.
    pub fn membership_count(&self) -> usize {
        self.tables.members.len()
    }

    fn row(id: i32, pano: &MemPano) -> PanoRow {
        PanoRow {
            id,
            the_geom: pano.location.map(|p| encode_point(p.x(), p.y())),
            timestamp: pano.timestamp,
            ele: pano.ele,
            poseheadingdegrees: pano.heading,
            pancorrection: pano.pan,
            tiltcorrection: pano.tilt,
            rollcorrection: pano.roll,
            authorised: pano.authorised,
        }
    }

    /// Rows matching `keep`, in id order.
    fn rows_where<F>(&self, keep: F) -> Vec<PanoRow>
    where
        F: Fn(&MemPano) -> bool,
    {
        self.tables
            .panos
            .iter()
            .filter(|(_, pano)| keep(pano))
            .map(|(id, pano)| MemStore::row(*id, pano))
            .collect()
    }

    fn update<F>(&mut self, id: i32, change: F) -> usize
    where
        F: FnOnce(&mut MemPano),
    {
        match self.tables.panos.get_mut(&id) {
            Some(pano) => {
                change(pano);
                1
            }
            None => 0,
        }
    }
}

impl PanoStore for MemStore {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = self.tables.clone();
        let result = f(self);

        if result.is_err() {
            self.tables = saved;
        }
        result
    }

    fn insert_panorama(&mut self, pano: &PanoInsert) -> Result<Vec<i32>> {
        let location = pano.the_geom.as_deref().map(decode_point).transpose()?;
        self.last_pano += 1;
        self.tables.panos.insert(
            self.last_pano,
            MemPano {
                location,
                timestamp: pano.timestamp,
                ele: pano.ele,
                heading: pano.poseheadingdegrees,
                pan: 0.0,
                tilt: 0.0,
                roll: 0.0,
                authorised: 0,
            },
        );
        Ok(vec![self.last_pano])
    }

    fn select_panorama(&mut self, id: i32) -> Result<Option<PanoRow>> {
        Ok(self.tables.panos.get(&id).map(|pano| MemStore::row(id, pano)))
    }

    fn delete_panorama(&mut self, id: i32) -> Result<usize> {
        // Same as the ON DELETE CASCADE on sequence_panos.panoid
        self.tables.members.retain(|m| m.panoid != id);
        Ok(self.tables.panos.remove(&id).map_or(0, |_| 1))
    }

    fn update_location(&mut self, id: i32, point: &str) -> Result<usize> {
        let location = decode_point(point)?;
        Ok(self.update(id, |pano| pano.location = Some(location)))
    }

    fn update_corrections(&mut self, id: i32, pan: f64, tilt: f64, roll: f64) -> Result<usize> {
        Ok(self.update(id, |pano| {
            pano.pan = pan;
            pano.tilt = tilt;
            pano.roll = roll;
        }))
    }

    fn update_elevation(&mut self, id: i32, ele: f64) -> Result<usize> {
        Ok(self.update(id, |pano| pano.ele = Some(ele)))
    }

    fn update_authorised(&mut self, id: i32, authorised: i32) -> Result<usize> {
        Ok(self.update(id, |pano| pano.authorised = authorised))
    }

    fn nearest(&mut self, point: &str) -> Result<Option<PanoRow>> {
        let target = decode_point(point)?;
        let mut best: Option<(f64, i32)> = None;

        // Ids ascend, so a strict comparison keeps the lowest id on a tie.
        for (id, pano) in self.tables.panos.iter() {
            if let Some(location) = pano.location {
                let distance = location.euclidean_distance(&target);
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, *id));
                }
            }
        }

        Ok(best.and_then(|(_, id)| self.tables.panos.get(&id).map(|pano| MemStore::row(id, pano))))
    }

    fn within_radius(&mut self, point: &str, meters: f64) -> Result<Vec<PanoRow>> {
        let target = decode_point(point)?;
        Ok(self.rows_where(|pano| {
            pano.location
                .map_or(false, |location| target.geodesic_distance(&location) < meters)
        }))
    }

    fn in_envelope(&mut self, bbox: &BoundingBox) -> Result<Vec<PanoRow>> {
        let rect = bbox.to_rect();
        Ok(self.rows_where(|pano| pano.location.map_or(false, |location| rect.intersects(&location.0))))
    }

    fn unauthorised(&mut self) -> Result<Vec<PanoRow>> {
        Ok(self.rows_where(|pano| pano.authorised == 0))
    }

    fn unpositioned(&mut self) -> Result<Vec<PanoRow>> {
        Ok(self.rows_where(|pano| pano.location.is_none()))
    }

    fn missing_elevation(&mut self) -> Result<Vec<GeomRow>> {
        Ok(self
            .rows_where(|pano| pano.ele.is_none())
            .into_iter()
            .map(|row| GeomRow {
                id: row.id,
                the_geom: row.the_geom,
            })
            .collect())
    }

    fn insert_sequence_geom(&mut self, line: &str) -> Result<Vec<i32>> {
        let line = decode_line(line)?;
        self.last_path += 1;
        self.tables.paths.insert(self.last_path, line);
        Ok(vec![self.last_path])
    }

    fn select_sequence_geom(&mut self, sequence_id: i32) -> Result<Option<GeomRow>> {
        match self.tables.paths.get(&sequence_id) {
            Some(line) => {
                let points: Vec<Point<f64>> = line.points().collect();
                Ok(Some(GeomRow {
                    id: sequence_id,
                    the_geom: Some(encode_line(&points)?),
                }))
            }
            None => Ok(None),
        }
    }

    fn insert_membership(&mut self, sequence_id: i32, pano_id: i32) -> Result<usize> {
        if !self.tables.paths.contains_key(&sequence_id) || !self.tables.panos.contains_key(&pano_id) {
            return Err(PanoError::Persistence(format!(
                "membership ({}, {}) references a missing row",
                sequence_id, pano_id
            )));
        }

        if self.tables.members.iter().any(|m| m.panoid == pano_id) {
            return Err(PanoError::Persistence(format!(
                "panorama {} already belongs to a sequence",
                pano_id
            )));
        }

        self.last_member += 1;
        self.tables.members.push(MemMember {
            key: self.last_member,
            sequenceid: sequence_id,
            panoid: pano_id,
        });
        Ok(1)
    }

    fn sequences_for(&mut self, pano_id: i32) -> Result<Vec<i32>> {
        Ok(self
            .tables
            .members
            .iter()
            .filter(|m| m.panoid == pano_id)
            .map(|m| m.sequenceid)
            .collect())
    }

    fn sequence_members(&mut self, sequence_id: i32) -> Result<Vec<MemberRow>> {
        let mut members: Vec<MemMember> = self
            .tables
            .members
            .iter()
            .filter(|m| m.sequenceid == sequence_id)
            .copied()
            .collect();
        members.sort_by_key(|m| m.key);

        Ok(members
            .iter()
            .filter_map(|m| {
                self.tables.panos.get(&m.panoid).map(|pano| MemberRow {
                    panoid: m.panoid,
                    the_geom: pano.location.map(|p| encode_point(p.x(), p.y())),
                    ele: pano.ele,
                    poseheadingdegrees: pano.heading,
                    pancorrection: pano.pan,
                    tiltcorrection: pano.tilt,
                    rollcorrection: pano.roll,
                })
            })
            .collect())
    }

    fn delete_memberships(&mut self, pano_id: i32) -> Result<usize> {
        let before = self.tables.members.len();
        self.tables.members.retain(|m| m.panoid != pano_id);
        Ok(before - self.tables.members.len())
    }
}
