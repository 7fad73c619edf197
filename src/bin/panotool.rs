//! A command line tool for looking after the panorama database: find
//! panoramas by place, fix their positions and orientations, and build
//! sequences from them. Results are written to stdout as CSV.
//!
//! Example usage:
//!
//!   panotool --dbuser pano --dbname panoramas bbox -1,51,0,52
//!   panotool nearest -- -0.13 51.5
//!   panotool seq-create 12,13,14,15

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
 *   panotool.rs - panorama admin tool
 *   Author - bjb8@st-andrews.ac.uk
 *
 */
use clap::{Parser, Subcommand};
use crabpano::db::establish_connection;
use crabpano::error::PanoError;
use crabpano::models::{NewPanorama, PanoMove, Panorama, PathVertex, SequenceMember};
use crabpano::ops::DbOps;
use crabpano::validate::{parse_bbox, parse_point};
use crabpano::{panos, sequences};
use diesel::PgConnection;
use dotenvy::dotenv;
use fern;
use geo::Point;
use humantime;
use log::{error, info};
use std::env;
use std::error::Error;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

type CsvOut = csv::Writer<io::Stdout>;

fn opt_string(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_panoramas(out: &mut CsvOut, rows: &[Panorama]) -> Result<(), Box<dyn Error>> {
    out.write_record([
        "id", "lon", "lat", "ele", "heading", "pan", "tilt", "roll", "authorised", "timestamp", "sequence",
    ])?;

    for pano in rows {
        out.write_record(&[
            pano.id.to_string(),
            opt_string(pano.location.map(|p| p.x())),
            opt_string(pano.location.map(|p| p.y())),
            opt_string(pano.elevation),
            pano.heading_degrees.to_string(),
            pano.pan_correction.to_string(),
            pano.tilt_correction.to_string(),
            pano.roll_correction.to_string(),
            (pano.authorised as i32).to_string(),
            pano.timestamp.to_string(),
            pano.sequence_id.map(|s| s.to_string()).unwrap_or_default(),
        ])?;
    }
    Ok(())
}

fn write_members(out: &mut CsvOut, rows: &[SequenceMember]) -> Result<(), Box<dyn Error>> {
    out.write_record(["panoid", "lon", "lat", "ele", "heading", "pan", "tilt", "roll"])?;

    for member in rows {
        out.write_record(&[
            member.pano_id.to_string(),
            member.location.x().to_string(),
            member.location.y().to_string(),
            opt_string(member.elevation),
            member.heading_degrees.to_string(),
            member.pan_correction.to_string(),
            member.tilt_correction.to_string(),
            member.roll_correction.to_string(),
        ])?;
    }
    Ok(())
}

fn write_path(out: &mut CsvOut, rows: &[PathVertex]) -> Result<(), Box<dyn Error>> {
    out.write_record(["panoid", "lon", "lat"])?;

    for vertex in rows {
        out.write_record(&[
            vertex.pano_id.to_string(),
            vertex.location.x().to_string(),
            vertex.location.y().to_string(),
        ])?;
    }
    Ok(())
}

fn write_count(out: &mut CsvOut, name: &str, count: usize) -> Result<(), Box<dyn Error>> {
    out.write_record([name])?;
    out.write_record([count.to_string()])?;
    Ok(())
}

/// Read `id,lon,lat` rows (with a header) for a batch move.
fn read_moves(path: &PathBuf) -> Result<Vec<PanoMove>, Box<dyn Error>> {
    parse_moves(File::open(path)?)
}

fn parse_moves<R: io::Read>(input: R) -> Result<Vec<PanoMove>, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_reader(input);
    let mut moves: Vec<PanoMove> = vec![];

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |i: usize| {
            record.get(i).ok_or_else(|| {
                PanoError::Validation(format!("move row {} has {} of 3 fields", line + 1, record.len()))
            })
        };
        let id: i32 = field(0)?
            .trim()
            .parse()
            .map_err(|_| PanoError::Validation(format!("move row {} has a bad id", line + 1)))?;
        let (lon, lat) = parse_point(field(1)?, field(2)?)?;
        moves.push(PanoMove { id, lon, lat });
    }

    Ok(moves)
}

fn parse_ids(text: &str) -> Result<Vec<i32>, PanoError> {
    text.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<i32>()
                .map_err(|_| PanoError::Validation(format!("'{}' is not a panorama id", s)))
        })
        .collect()
}

fn run_command(conn: &mut PgConnection, command: &Command) -> Result<(), Box<dyn Error>> {
    let mut out = csv::Writer::from_writer(io::stdout());

    match command {
        Command::Get { id } => match panos::get(conn, *id)? {
            Some(pano) => write_panoramas(&mut out, &[pano])?,
            None => return Err(Box::new(PanoError::NotFound(format!("panorama {}", id)))),
        },
        Command::Create { lon, lat, heading, ele } => {
            let location = match (lon, lat) {
                (Some(lon), Some(lat)) => {
                    let (x, y) = parse_point(lon, lat)?;
                    Some(Point::new(x, y))
                }
                (None, None) => None,
                _ => return Err(Box::new(PanoError::Validation(String::from("give both --lon and --lat or neither")))),
            };
            let pano = NewPanorama {
                location,
                heading_degrees: *heading,
                elevation: *ele,
            };
            let id = panos::create(conn, &pano)?;
            out.write_record(["id"])?;
            out.write_record([id.to_string()])?;
        }
        Command::Delete { id } => write_count(&mut out, "deleted", panos::delete(conn, *id)?)?,
        Command::Move { id, lon, lat } => {
            let (lon, lat) = parse_point(lon, lat)?;
            write_count(&mut out, "moved", panos::move_pano(conn, *id, lon, lat)?)?;
        }
        Command::MoveMulti { file } => {
            let moves = read_moves(file)?;
            write_count(&mut out, "moved", panos::move_multi(conn, &moves)?)?;
        }
        Command::Rotate { id, pan, tilt, roll } => {
            write_count(&mut out, "rotated", panos::rotate(conn, *id, *pan, *tilt, *roll)?)?
        }
        Command::Elevation { id, ele } => write_count(&mut out, "updated", panos::set_elevation(conn, *id, *ele)?)?,
        Command::Authorise { id } => write_count(&mut out, "authorised", panos::authorise(conn, *id)?)?,
        Command::Nearest { lon, lat } => {
            let (lon, lat) = parse_point(lon, lat)?;
            match panos::find_nearest(conn, lon, lat)? {
                Some(pano) => write_panoramas(&mut out, &[pano])?,
                None => return Err(Box::new(PanoError::NotFound(String::from("no nearest panorama")))),
            }
        }
        Command::Nearby { lon, lat, meters } => {
            let (lon, lat) = parse_point(lon, lat)?;
            write_panoramas(&mut out, &panos::find_within_radius(conn, lon, lat, *meters)?)?;
        }
        Command::Bbox { bbox } => {
            let bbox = parse_bbox(bbox)?;
            write_panoramas(&mut out, &panos::find_in_bbox(conn, &bbox)?)?;
        }
        Command::Unauthorised => write_panoramas(&mut out, &panos::find_unauthorised(conn)?)?,
        Command::Unpositioned => write_panoramas(&mut out, &panos::find_unpositioned(conn)?)?,
        Command::NoElevation => {
            out.write_record(["id", "lon", "lat"])?;
            for task in panos::find_missing_elevation(conn)? {
                out.write_record(&[
                    task.id.to_string(),
                    opt_string(task.location.map(|p| p.x())),
                    opt_string(task.location.map(|p| p.y())),
                ])?;
            }
        }
        Command::SeqCreate { ids } => {
            let seqid = sequences::create(conn, &parse_ids(ids)?)?;
            out.write_record(["seqid"])?;
            out.write_record([seqid.to_string()])?;
        }
        Command::SeqGet { id } => match sequences::get(conn, *id)? {
            Some(members) => write_members(&mut out, &members)?,
            None => return Err(Box::new(PanoError::NotFound(format!("sequence {}", id)))),
        },
        Command::SeqGeom { id } => match sequences::get_geometry(conn, *id)? {
            Some(line) => {
                out.write_record(["lon", "lat"])?;
                for coord in line.coords() {
                    out.write_record(&[coord.x.to_string(), coord.y.to_string()])?;
                }
            }
            None => return Err(Box::new(PanoError::NotFound(format!("sequence {}", id)))),
        },
        Command::SeqFor { id } => write_path(&mut out, &sequences::path_for(conn, *id)?)?,
    }

    out.flush()?;
    Ok(())
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Show one panorama
    Get { id: i32 },
    /// Add a panorama record
    Create {
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        heading: f64,
        #[arg(long, allow_hyphen_values = true)]
        ele: Option<f64>,
    },
    /// Delete a panorama record
    Delete { id: i32 },
    /// Move a panorama
    Move {
        id: i32,
        #[arg(allow_hyphen_values = true)]
        lon: String,
        #[arg(allow_hyphen_values = true)]
        lat: String,
    },
    /// Move many panoramas from an id,lon,lat CSV file, all or nothing
    MoveMulti { file: PathBuf },
    /// Set the pan, tilt and roll corrections
    Rotate {
        id: i32,
        #[arg(allow_hyphen_values = true)]
        pan: f64,
        #[arg(allow_hyphen_values = true)]
        tilt: f64,
        #[arg(allow_hyphen_values = true)]
        roll: f64,
    },
    /// Set the elevation in meters
    Elevation {
        id: i32,
        #[arg(allow_hyphen_values = true)]
        ele: f64,
    },
    /// Mark a panorama as publicly visible
    Authorise { id: i32 },
    /// The panorama nearest a point
    Nearest {
        #[arg(allow_hyphen_values = true)]
        lon: String,
        #[arg(allow_hyphen_values = true)]
        lat: String,
    },
    /// Panoramas within some meters of a point
    Nearby {
        #[arg(allow_hyphen_values = true)]
        lon: String,
        #[arg(allow_hyphen_values = true)]
        lat: String,
        meters: f64,
    },
    /// Panoramas in minLon,minLat,maxLon,maxLat
    Bbox {
        #[arg(allow_hyphen_values = true)]
        bbox: String,
    },
    /// Panoramas waiting to be authorised
    Unauthorised,
    /// Panoramas with no location
    Unpositioned,
    /// Panoramas with no elevation
    NoElevation,
    /// Build a sequence from comma separated panorama ids
    SeqCreate { ids: String },
    /// The members of a sequence, in order
    SeqGet { id: i32 },
    /// The path geometry stored for a sequence
    SeqGeom { id: i32 },
    /// The full path of whichever sequence this panorama is on
    SeqFor { id: i32 },
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    dbhost: Option<String>,
    #[arg(long)]
    dbname: Option<String>,
    #[arg(long)]
    dbuser: Option<String>,
    #[arg(long)]
    dbpass: Option<String>,
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long)]
    logfile: Option<PathBuf>,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

fn setup_logger(args: &Args) -> Result<(), fern::InitError> {
    let level = if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // stdout carries the CSV
        .chain(std::io::stderr());

    if let Some(path) = &args.logfile {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

/// Command line values win over the environment and `.env`.
fn db_ops(args: &Args) -> Result<DbOps, PanoError> {
    dotenv().ok();
    let timeout = args.timeout.map(|t| t.to_string());

    DbOps::from_lookup(|key| {
        let given = match key {
            "DB_HOST" => args.dbhost.clone(),
            "DB_DBASE" => args.dbname.clone(),
            "DB_USER" => args.dbuser.clone(),
            "DB_PASS" => args.dbpass.clone(),
            "DB_STATEMENT_TIMEOUT_MS" => timeout.clone(),
            _ => None,
        };
        given.or_else(|| env::var(key).ok())
    })
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let ops = db_ops(args)?;
    let conn = &mut establish_connection(&ops)?;
    run_command(conn, &args.command)
}

fn main() {
    let args = Args::parse();

    if let Err(e) = setup_logger(&args) {
        eprintln!("Could not start logging: {}", e);
    }

    info!("Command:{:?}", args.command);

    if let Err(e) = run(&args) {
        error!("{}", e);

        match e.downcast_ref::<PanoError>() {
            Some(pe) => eprintln!("{}", pe.public_message()),
            None => eprintln!("{}", e),
        }
        std::process::exit(1);
    }
}
