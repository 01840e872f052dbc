//! Stats database.
//!
//! Two tables: `log` records each address event (allocated, released, bound)
//! and `captures` records each address successfully bound to a VM.

use crate::error::Result;
use rusqlite::{params, Connection};
use std::fmt;
use std::path::Path;

/// What happened to an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Allocated by the provider.
    Get,
    /// Released back to the provider.
    Del,
    /// Bound to the VM port.
    Bind,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "GET",
            Action::Del => "DEL",
            Action::Bind => "BIND",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub ip: String,
    pub account: String,
    pub server: String,
    pub subnet: String,
    pub ts: String,
}

pub struct StatsDb {
    db: Connection,
}

impl StatsDb {
    pub fn open(path: &Path) -> Result<StatsDb> {
        let db = Connection::open(path)?;
        log::debug!("Opened stats db {}", path.display());
        Self::init(db)
    }

    pub fn open_in_memory() -> Result<StatsDb> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<StatsDb> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS log (
                id INTEGER PRIMARY KEY,
                ip TEXT,
                acc TEXT,
                action TEXT,
                subnet TEXT,
                ts DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS captures (
                id INTEGER PRIMARY KEY,
                ip TEXT,
                acc TEXT,
                server TEXT,
                subnet TEXT,
                ts DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_log_subnet ON log(subnet);
            "#,
        )?;
        Ok(StatsDb { db })
    }

    pub fn log_ip(&self, ip: &str, account: &str, action: Action, subnet: Option<&str>) -> Result<()> {
        self.db.execute(
            "INSERT INTO log (ip, acc, action, subnet) VALUES (?1, ?2, ?3, ?4)",
            params![ip, account, action.as_str(), subnet],
        )?;
        Ok(())
    }

    pub fn capture(&self, ip: &str, account: &str, server: &str, subnet: &str) -> Result<()> {
        self.db.execute(
            "INSERT INTO captures (ip, acc, server, subnet) VALUES (?1, ?2, ?3, ?4)",
            params![ip, account, server, subnet],
        )?;
        Ok(())
    }

    /// Most recent captures first.
    pub fn recent_captures(&self, limit: usize) -> Result<Vec<Capture>> {
        let mut stmt = self.db.prepare(
            "SELECT ip, acc, server, subnet, ts FROM captures ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Capture {
                ip: row.get(0)?,
                account: row.get(1)?,
                server: row.get(2)?,
                subnet: row.get(3)?,
                ts: row.get(4)?,
            })
        })?;
        let captures = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(captures)
    }

    /// Allocations per target subnet, most frequent first.
    pub fn subnet_hits(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.db.prepare(
            "SELECT subnet, COUNT(*) FROM log WHERE subnet IS NOT NULL AND action = 'GET' \
             GROUP BY subnet ORDER BY COUNT(*) DESC, subnet ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, count as u64))
        })?;
        let hits = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    pub fn count_captures(&self) -> Result<u64> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM captures", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of log rows with the given action.
    pub fn count_action(&self, action: Action) -> Result<u64> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM log WHERE action = ?1",
            params![action.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
