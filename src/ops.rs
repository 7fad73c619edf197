//! The database options CrabPano needs, read from the environment (and any
//! `.env` file) or filled in from the command line.
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
 *   ops.rs - database options
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use crate::error::{PanoError, Result};
use dotenvy::dotenv;
use std::env;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_POOL_SIZE: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct DbOps {
    /// Host the PostGIS server runs on
    pub dbhost: String,
    /// Username for the database
    pub dbuser: String,
    /// Password for the database
    pub dbpass: String,
    /// Name of the database
    pub dbname: String,
    /// Deadline for any one statement. 0 turns it off.
    pub statement_timeout_ms: u64,
    /// Connections kept in the pool
    pub pool_size: u32,
}

impl DbOps {
    /// Read `DB_HOST`, `DB_USER`, `DB_PASS`, `DB_DBASE`, `DB_STATEMENT_TIMEOUT_MS`
    /// and `DB_POOL_SIZE`, loading a `.env` file first if there is one.
    pub fn from_env() -> Result<DbOps> {
        dotenv().ok();
        DbOps::from_lookup(|key| env::var(key).ok())
    }

    /// Build the options from any key lookup.
    ///
    /// * `lookup` - returns the value for an environment style key, if set.
    pub fn from_lookup<F>(lookup: F) -> Result<DbOps>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PanoError::Validation(format!("{} must be set", key)))
        };

        let statement_timeout_ms = match lookup("DB_STATEMENT_TIMEOUT_MS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                PanoError::Validation(format!("DB_STATEMENT_TIMEOUT_MS '{}' is not a number", v))
            })?,
            None => DEFAULT_STATEMENT_TIMEOUT_MS,
        };

        let pool_size = match lookup("DB_POOL_SIZE") {
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| PanoError::Validation(format!("DB_POOL_SIZE '{}' is not a number", v)))?,
            None => DEFAULT_POOL_SIZE,
        };

        Ok(DbOps {
            dbhost: lookup("DB_HOST").unwrap_or_else(|| String::from(DEFAULT_HOST)),
            dbuser: required("DB_USER")?,
            dbpass: lookup("DB_PASS").unwrap_or_default(),
            dbname: required("DB_DBASE")?,
            statement_timeout_ms,
            pool_size,
        })
    }

    /// A formatted string that describes our database connection. The user
    /// and password are percent-encoded so `@`, `:` and `/` survive.
    pub fn database_url(&self) -> String {
        let mut url = String::from("postgres://") + &escape_userinfo(&self.dbuser);

        if !self.dbpass.is_empty() {
            url = url + ":" + &escape_userinfo(&self.dbpass);
        }

        url + "@" + &self.dbhost + "/" + &self.dbname
    }
}

/// Percent-encode every byte outside the URL unreserved set.
fn escape_userinfo(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => escaped.push(byte as char),
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }

    escaped
}
