//! The major functions that deal with the PostGIS database holding the
//! panoramas and their sequences.

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
 *   db.rs - database access functions
 *   Author - bjb8@st-andrews.ac.uk
 *
 *   Useful links:
 *   https://postgis.net/docs/ST_Distance.html
 *   https://postgis.net/docs/geometry_overlaps.html
 */

use crate::error::{PanoError, Result};
use crate::geom::{decode_line, encode_line};
use crate::models::{GeomRow, InsertedId, MemberRow, NewMembership, PanoInsert, PanoRow};
use crate::ops::DbOps;
use crate::schema::{panoramas, sequence_panos};
use crate::store::PanoStore;
use crate::validate::BoundingBox;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_types::{Float8, Int4, Int8, Nullable, Text};
use log::{debug, info};

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// The panorama columns, geometry as WKT.
const PANO_COLUMNS: &str = "id, ST_AsText(the_geom) AS the_geom, timestamp, ele, \
    poseheadingdegrees, pancorrection, tiltcorrection, rollcorrection, authorised";

/// Establish a connection to the database described by `ops`, with the
/// per statement deadline applied.
///
/// * `ops` - the database options.
pub fn establish_connection(ops: &DbOps) -> Result<PgConnection> {
    let mut conn = PgConnection::establish(&ops.database_url())?;
    set_statement_timeout(&mut conn, ops.statement_timeout_ms)?;
    info!("Connected to {} on {}", ops.dbname, ops.dbhost);
    Ok(conn)
}

/// Build a pool of connections, each with the statement deadline applied.
///
/// * `ops` - the database options.
pub fn connect_pool(ops: &DbOps) -> Result<Pool> {
    let manager = ConnectionManager::<PgConnection>::new(ops.database_url());
    let pool = Pool::builder()
        .max_size(ops.pool_size)
        .connection_customizer(Box::new(StatementTimeout(ops.statement_timeout_ms)))
        .build(manager)?;
    info!("Pool of {} connections to {} on {}", ops.pool_size, ops.dbname, ops.dbhost);
    Ok(pool)
}

fn set_statement_timeout(conn: &mut PgConnection, millis: u64) -> QueryResult<()> {
    // SET takes no bind parameters, but a u64 cannot carry anything but digits.
    diesel::sql_query(format!("SET statement_timeout = {}", millis)).execute(conn)?;
    Ok(())
}

#[derive(Debug)]
struct StatementTimeout(u64);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> std::result::Result<(), r2d2::Error> {
        set_statement_timeout(conn, self.0).map_err(r2d2::Error::QueryError)
    }
}

/// Run a panorama select, with `tail` being everything after the FROM.
fn load_panos(conn: &mut PgConnection, tail: &str) -> QueryResult<Vec<PanoRow>> {
    diesel::sql_query(format!("SELECT {} FROM panoramas {}", PANO_COLUMNS, tail)).load(conn)
}

impl PanoStore for PgConnection {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.transaction::<T, PanoError, _>(|conn| f(conn))
    }

    fn insert_panorama(&mut self, pano: &PanoInsert) -> Result<Vec<i32>> {
        let ids: Vec<InsertedId> = diesel::sql_query(
            "INSERT INTO panoramas (the_geom, timestamp, poseheadingdegrees, ele) \
             VALUES (ST_GeomFromText($1, 4326), $2, $3, $4) RETURNING id",
        )
        .bind::<Nullable<Text>, _>(pano.the_geom.clone())
        .bind::<Int8, _>(pano.timestamp)
        .bind::<Float8, _>(pano.poseheadingdegrees)
        .bind::<Nullable<Float8>, _>(pano.ele)
        .load(self)?;
        Ok(ids.into_iter().map(|r| r.id).collect())
    }

    fn select_panorama(&mut self, id: i32) -> Result<Option<PanoRow>> {
        let rows: Vec<PanoRow> =
            diesel::sql_query(format!("SELECT {} FROM panoramas WHERE id = $1", PANO_COLUMNS))
                .bind::<Int4, _>(id)
                .load(self)?;
        Ok(rows.into_iter().next())
    }

    fn delete_panorama(&mut self, id: i32) -> Result<usize> {
        Ok(diesel::delete(panoramas::table.find(id)).execute(self)?)
    }

    fn update_location(&mut self, id: i32, point: &str) -> Result<usize> {
        Ok(
            diesel::sql_query("UPDATE panoramas SET the_geom = ST_GeomFromText($1, 4326) WHERE id = $2")
                .bind::<Text, _>(point)
                .bind::<Int4, _>(id)
                .execute(self)?,
        )
    }

    fn update_corrections(&mut self, id: i32, pan: f64, tilt: f64, roll: f64) -> Result<usize> {
        Ok(diesel::update(panoramas::table.find(id))
            .set((
                panoramas::pancorrection.eq(pan),
                panoramas::tiltcorrection.eq(tilt),
                panoramas::rollcorrection.eq(roll),
            ))
            .execute(self)?)
    }

    fn update_elevation(&mut self, id: i32, ele: f64) -> Result<usize> {
        Ok(diesel::update(panoramas::table.find(id))
            .set(panoramas::ele.eq(Some(ele)))
            .execute(self)?)
    }

    fn update_authorised(&mut self, id: i32, authorised: i32) -> Result<usize> {
        Ok(diesel::update(panoramas::table.find(id))
            .set(panoramas::authorised.eq(authorised))
            .execute(self)?)
    }

    fn nearest(&mut self, point: &str) -> Result<Option<PanoRow>> {
        debug!("Nearest to {}", point);
        let rows: Vec<PanoRow> = diesel::sql_query(format!(
            "SELECT {} FROM panoramas WHERE the_geom IS NOT NULL \
             ORDER BY ST_Distance(the_geom, ST_GeomFromText($1, 4326)), id LIMIT 1",
            PANO_COLUMNS
        ))
        .bind::<Text, _>(point)
        .load(self)?;
        Ok(rows.into_iter().next())
    }

    fn within_radius(&mut self, point: &str, meters: f64) -> Result<Vec<PanoRow>> {
        debug!("Within {}m of {}", meters, point);
        Ok(diesel::sql_query(format!(
            "SELECT {} FROM panoramas WHERE the_geom IS NOT NULL \
             AND ST_Distance(ST_GeomFromText($1, 4326)::geography, the_geom::geography, true) < $2 \
             ORDER BY id",
            PANO_COLUMNS
        ))
        .bind::<Text, _>(point)
        .bind::<Float8, _>(meters)
        .load(self)?)
    }

    fn in_envelope(&mut self, bbox: &BoundingBox) -> Result<Vec<PanoRow>> {
        debug!("Within envelope {:?}", bbox);
        Ok(diesel::sql_query(format!(
            "SELECT {} FROM panoramas WHERE the_geom && ST_MakeEnvelope($1, $2, $3, $4, 4326)",
            PANO_COLUMNS
        ))
        .bind::<Float8, _>(bbox.min_lon)
        .bind::<Float8, _>(bbox.min_lat)
        .bind::<Float8, _>(bbox.max_lon)
        .bind::<Float8, _>(bbox.max_lat)
        .load(self)?)
    }

    fn unauthorised(&mut self) -> Result<Vec<PanoRow>> {
        Ok(load_panos(self, "WHERE authorised = 0 ORDER BY id")?)
    }

    fn unpositioned(&mut self) -> Result<Vec<PanoRow>> {
        Ok(load_panos(self, "WHERE the_geom IS NULL ORDER BY id")?)
    }

    fn missing_elevation(&mut self) -> Result<Vec<GeomRow>> {
        Ok(diesel::sql_query(
            "SELECT id, ST_AsText(the_geom) AS the_geom FROM panoramas WHERE ele IS NULL ORDER BY id",
        )
        .load(self)?)
    }

    fn insert_sequence_geom(&mut self, line: &str) -> Result<Vec<i32>> {
        // PostGIS refuses a one point LINESTRING, so a lone vertex is stored
        // as a zero length line through that vertex twice.
        let verts = decode_line(line)?.into_points();
        let line = match verts.as_slice() {
            [only] => encode_line(&[*only, *only])?,
            _ => line.to_string(),
        };

        let ids: Vec<InsertedId> = diesel::sql_query(
            "INSERT INTO sequence_geom (the_geom) VALUES (ST_GeomFromText($1, 4326)) RETURNING id",
        )
        .bind::<Text, _>(&line)
        .load(self)?;
        Ok(ids.into_iter().map(|r| r.id).collect())
    }

    fn select_sequence_geom(&mut self, sequence_id: i32) -> Result<Option<GeomRow>> {
        let rows: Vec<GeomRow> = diesel::sql_query(
            "SELECT id, ST_AsText(the_geom) AS the_geom FROM sequence_geom WHERE id = $1",
        )
        .bind::<Int4, _>(sequence_id)
        .load(self)?;

        let row = match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        };

        // Undo the lone vertex padding from insert_sequence_geom. Memberships
        // are only ever removed, so fewer than two means it was never a real
        // two point path.
        let the_geom = match row.the_geom.as_deref().map(decode_line).transpose()? {
            Some(line) if line.0.len() == 2 && line.0[0] == line.0[1] => {
                let members: i64 = sequence_panos::table
                    .filter(sequence_panos::sequenceid.eq(sequence_id))
                    .count()
                    .get_result(self)?;

                if members < 2 {
                    Some(encode_line(&[geo::Point::from(line.0[0])])?)
                } else {
                    row.the_geom
                }
            }
            _ => row.the_geom,
        };

        Ok(Some(GeomRow { id: row.id, the_geom }))
    }

    fn insert_membership(&mut self, sequence_id: i32, pano_id: i32) -> Result<usize> {
        Ok(diesel::insert_into(sequence_panos::table)
            .values(&NewMembership {
                sequenceid: sequence_id,
                panoid: pano_id,
            })
            .execute(self)?)
    }

    fn sequences_for(&mut self, pano_id: i32) -> Result<Vec<i32>> {
        Ok(sequence_panos::table
            .filter(sequence_panos::panoid.eq(pano_id))
            .select(sequence_panos::sequenceid)
            .order(sequence_panos::id)
            .load(self)?)
    }

    fn sequence_members(&mut self, sequence_id: i32) -> Result<Vec<MemberRow>> {
        Ok(diesel::sql_query(
            "SELECT s.panoid, ST_AsText(p.the_geom) AS the_geom, p.ele, p.poseheadingdegrees, \
             p.pancorrection, p.tiltcorrection, p.rollcorrection \
             FROM sequence_panos s INNER JOIN panoramas p ON s.panoid = p.id \
             WHERE s.sequenceid = $1 ORDER BY s.id",
        )
        .bind::<Int4, _>(sequence_id)
        .load(self)?)
    }

    fn delete_memberships(&mut self, pano_id: i32) -> Result<usize> {
        Ok(diesel::delete(sequence_panos::table.filter(sequence_panos::panoid.eq(pano_id)))
            .execute(self)?)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use super::*;
    use crate::models::{NewPanorama, PanoMove};
    use crate::{panos, sequences};
    use geo::Point;
    use postgres::{Client, NoTls};
    use std::env;
    use std::panic;

    const MIGRATION: &str = include_str!("../migrations/2024-01-01-000000_create_panoramas/up.sql");

    // These need a PostGIS server; run them with `cargo test -- --ignored` and
    // CRABPANO_TEST_PGUSER / CRABPANO_TEST_PGPASS set to a superuser.

    // This closure and catch lets us catch failures but always fire off the teardown.
    fn run_test<T>(test: T) -> ()
    where T: FnOnce() -> () + panic::UnwindSafe {
        setup();

        let result = panic::catch_unwind(|| {
            test()
        });

        teardown();
        assert!(result.is_ok())
    }

    fn admin_string() -> String {
        let pg_user = env::var("CRABPANO_TEST_PGUSER").unwrap();
        let pg_pass = env::var("CRABPANO_TEST_PGPASS").unwrap();
        String::from("host=localhost user=") + &pg_user + " password=" + &pg_pass
    }

    fn test_ops() -> DbOps {
        DbOps {
            dbhost: String::from("localhost"),
            dbuser: env::var("CRABPANO_TEST_PGUSER").unwrap(),
            dbpass: env::var("CRABPANO_TEST_PGPASS").unwrap(),
            dbname: String::from("testpanos"),
            statement_timeout_ms: 10_000,
            pool_size: 2,
        }
    }

    fn setup() {
        let conn_string = admin_string();
        let mut client = Client::connect(conn_string.as_str(), NoTls).unwrap();
        client.batch_execute("CREATE DATABASE testpanos ENCODING = 'UTF8'").unwrap();
        client.close().unwrap();

        let conn_string2 = conn_string + " dbname=testpanos";
        client = Client::connect(conn_string2.as_str(), NoTls).unwrap();
        client.batch_execute("CREATE EXTENSION IF NOT EXISTS postgis;").unwrap();
        client.batch_execute(MIGRATION).unwrap();
        client.close().unwrap();
    }

    fn teardown() {
        let mut client = Client::connect(admin_string().as_str(), NoTls).unwrap();
        client.batch_execute("DROP DATABASE testpanos WITH (FORCE);").unwrap();
    }

    fn add(conn: &mut PgConnection, lon: f64, lat: f64) -> i32 {
        let pano = NewPanorama {
            location: Some(Point::new(lon, lat)),
            heading_degrees: 0.0,
            elevation: None,
        };
        panos::create(conn, &pano).unwrap()
    }

    #[test]
    #[serial]
    #[ignore]
    fn test_create_move_bbox() {
        run_test(|| {
            let conn = &mut establish_connection(&test_ops()).unwrap();
            let pano = NewPanorama {
                location: Some(Point::new(-0.13, 51.50)),
                heading_degrees: 90.0,
                elevation: None,
            };
            let id = panos::create(conn, &pano).unwrap();
            assert_eq!(panos::move_pano(conn, id, -0.14, 51.51).unwrap(), 1);

            let got = panos::get(conn, id).unwrap().unwrap();
            assert_eq!(got.location, Some(Point::new(-0.14, 51.51)));
            assert_eq!(got.heading_degrees, 90.0);

            let inside = panos::find_in_bbox(conn, &BoundingBox::new(-1.0, 51.0, 0.0, 52.0)).unwrap();
            assert!(inside.iter().any(|p| p.id == id));
            let outside = panos::find_in_bbox(conn, &BoundingBox::new(1.0, 1.0, 2.0, 2.0)).unwrap();
            assert!(outside.is_empty());
        })
    }

    #[test]
    #[serial]
    #[ignore]
    fn test_spatial_queries() {
        run_test(|| {
            let conn = &mut establish_connection(&test_ops()).unwrap();
            let a = add(conn, 0.0, 0.0);
            let b = add(conn, 0.001, 0.0);
            let c = add(conn, 1.0, 1.0);
            let _unpositioned = panos::create(conn, &NewPanorama::default()).unwrap();

            let nearest = panos::find_nearest(conn, 0.0009, 0.0).unwrap().unwrap();
            assert_eq!(nearest.id, b);

            // 0.001 degrees of longitude at the equator is about 111m
            let nearby = panos::find_within_radius(conn, 0.0, 0.0, 200.0).unwrap();
            let ids: Vec<i32> = nearby.iter().map(|p| p.id).collect();
            assert_eq!(ids, vec![a, b]);

            // A point on the envelope edge counts
            let edge = panos::find_in_bbox(conn, &BoundingBox::new(1.0, 0.5, 2.0, 1.5)).unwrap();
            assert_eq!(edge.len(), 1);
            assert_eq!(edge[0].id, c);

            assert_eq!(panos::find_unpositioned(conn).unwrap().len(), 1);
            assert_eq!(panos::find_missing_elevation(conn).unwrap().len(), 4);
        })
    }

    #[test]
    #[serial]
    #[ignore]
    fn test_sequence_atomic() {
        run_test(|| {
            let pool = connect_pool(&test_ops()).unwrap();
            let mut pooled = pool.get().unwrap();
            let conn: &mut PgConnection = &mut pooled;
            let a = add(conn, -1.0, 50.0);
            let b = add(conn, -1.001, 50.001);
            let c = add(conn, -1.002, 50.002);

            let seq = sequences::create(conn, &[c, a, 999]).unwrap();
            let members = sequences::get(conn, seq).unwrap().unwrap();
            let ids: Vec<i32> = members.iter().map(|m| m.pano_id).collect();
            assert_eq!(ids, vec![c, a]);

            // a already belongs to a sequence, so the whole create is undone
            assert!(sequences::create(conn, &[b, a]).is_err());
            assert_eq!(sequences::sequence_for(conn, b).unwrap(), None);

            // Moving a member leaves the stored path alone
            panos::move_multi(conn, &[PanoMove { id: c, lon: 10.0, lat: 10.0 }]).unwrap();
            let line = sequences::get_geometry(conn, seq).unwrap().unwrap();
            assert_eq!(line.0[0].x, -1.002);
            assert_eq!(panos::get(conn, a).unwrap().unwrap().sequence_id, Some(seq));

            assert_eq!(panos::delete(conn, a).unwrap(), 1);
            assert_eq!(sequences::path_for(conn, c).unwrap().len(), 1);
        })
    }

    #[test]
    #[serial]
    #[ignore]
    fn test_single_member_path() {
        run_test(|| {
            let conn = &mut establish_connection(&test_ops()).unwrap();
            let a = add(conn, 3.0, 4.0);
            let b = add(conn, 5.0, 6.0);
            let c = add(conn, 5.0, 6.0);

            let lone = sequences::create(conn, &[a]).unwrap();
            let line = sequences::get_geometry(conn, lone).unwrap().unwrap();
            assert_eq!(line.0.len(), 1);
            assert_eq!(line.0[0].x, 3.0);

            // Still one vertex once the member is gone
            assert_eq!(panos::delete(conn, a).unwrap(), 1);
            assert_eq!(sequences::get_geometry(conn, lone).unwrap().unwrap().0.len(), 1);

            // Two panoramas in the same spot keep both vertices
            let pair = sequences::create(conn, &[b, c]).unwrap();
            assert_eq!(sequences::get_geometry(conn, pair).unwrap().unwrap().0.len(), 2);
        })
    }
}
