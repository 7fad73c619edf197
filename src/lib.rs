/// The various functions for the CrabPano project.
/// This library stores geo-located panoramas in PostGIS, finds them by
/// place, and links them into ordered sequences (paths) for walking through.

/** ```rust,ignore
 *
 *     /\
 *    ( /   @ @    ()
 *     \  __| |__  /
 *      -/   "   \-
 *     /-|       |-\
 *    / /-\     /-\ \
 *     / /-`---'-\ \
 *      /         \ CRABPANO
 *
 *   lib.rs - rust lib declaration
 *   Author - bjb8@st-andrews.ac.uk
 *   ```
 */

pub mod db;
pub mod error;
#[cfg(test)]
mod faulty;
pub mod geom;
pub mod memstore;
pub mod models;
pub mod ops;
pub mod panos;
pub mod schema;
pub mod sequences;
pub mod store;
pub mod validate;
