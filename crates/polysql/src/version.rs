//! Database type/version detection.
//!
//! [`DbVersion`] is probed once per physical connection and is the only input to
//! dialect and batch-strategy selection.

use crate::error::OrmResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Database product family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Oracle,
    MySql,
    MariaDb,
    Db2,
    PostgreSql,
    H2,
    Sqlite,
    SqlServer,
    /// A product this crate has no dialect for.
    #[serde(untagged)]
    Unknown(String),
}

impl DbType {
    /// Parse a product name as reported by driver metadata
    /// (`"Oracle"`, `"MySQL"`, `"DB2/LINUXX8664"`, `"Microsoft SQL Server"`, ...).
    pub fn from_product_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("mariadb") {
            DbType::MariaDb
        } else if lower.contains("mysql") {
            DbType::MySql
        } else if lower.contains("oracle") {
            DbType::Oracle
        } else if lower.starts_with("db2") {
            DbType::Db2
        } else if lower.contains("postgres") {
            DbType::PostgreSql
        } else if lower == "h2" {
            DbType::H2
        } else if lower.contains("sqlite") {
            DbType::Sqlite
        } else if lower.contains("sql server") || lower == "sqlserver" || lower == "mssql" {
            DbType::SqlServer
        } else {
            DbType::Unknown(name.trim().to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DbType::Oracle => "oracle",
            DbType::MySql => "mysql",
            DbType::MariaDb => "mariadb",
            DbType::Db2 => "db2",
            DbType::PostgreSql => "postgresql",
            DbType::H2 => "h2",
            DbType::Sqlite => "sqlite",
            DbType::SqlServer => "sqlserver",
            DbType::Unknown(name) => name,
        }
    }

    /// MySQL and MariaDB share every dialect rule.
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, DbType::MySql | DbType::MariaDb)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of a connected database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbVersion {
    pub db_type: DbType,
    pub major: u32,
    pub minor: u32,
    pub version_string: String,
}

impl DbVersion {
    pub fn new(db_type: DbType, major: u32, minor: u32) -> Self {
        Self {
            version_string: format!("{major}.{minor}"),
            db_type,
            major,
            minor,
        }
    }

    /// Build from a product name and a raw version string such as
    /// `"8.0.36-0ubuntu0.22.04.1"` or `"Oracle Database 19c ... Release 19.0.0.0.0"`.
    ///
    /// The first dotted number in the string supplies `major.minor`.
    pub fn parse(product_name: &str, version_string: &str) -> Self {
        let (major, minor) = parse_major_minor(version_string);
        Self {
            db_type: DbType::from_product_name(product_name),
            major,
            minor,
            version_string: version_string.trim().to_string(),
        }
    }

    /// Cache key for dialect lookup.
    pub fn key(&self) -> String {
        format!("{}.{}.{}", self.db_type, self.major, self.minor)
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.db_type, self.major, self.minor)
    }
}

fn parse_major_minor(s: &str) -> (u32, u32) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let major: u32 = s[start..i].parse().unwrap_or(0);
            if i < bytes.len() && bytes[i] == b'.' {
                let minor_start = i + 1;
                let mut j = minor_start;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if j > minor_start {
                    return (major, s[minor_start..j].parse().unwrap_or(0));
                }
            }
            // A lone number ("19c") only counts when no dotted form follows.
            if !s[i..].chars().any(|c| c == '.') {
                return (major, 0);
            }
        } else {
            i += 1;
        }
    }
    (0, 0)
}

/// Lazily probed, per-connection [`DbVersion`].
///
/// The first caller probes the database while holding the probe lock; every later
/// caller reads the stored value without locking.
#[derive(Debug, Default)]
pub struct DbVersionCell {
    slot: OnceLock<Arc<DbVersion>>,
    probe_lock: tokio::sync::Mutex<()>,
    probes: AtomicU64,
}

impl DbVersionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell that is already resolved (no probing will happen).
    pub fn resolved(version: DbVersion) -> Self {
        let cell = Self::default();
        let _ = cell.slot.set(Arc::new(version));
        cell
    }

    pub fn get(&self) -> Option<Arc<DbVersion>> {
        self.slot.get().cloned()
    }

    /// Return the cached version, running `probe` at most once.
    pub async fn get_or_probe<F, Fut>(&self, probe: F) -> OrmResult<Arc<DbVersion>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrmResult<DbVersion>>,
    {
        if let Some(v) = self.slot.get() {
            return Ok(Arc::clone(v));
        }

        let _guard = self.probe_lock.lock().await;
        if let Some(v) = self.slot.get() {
            return Ok(Arc::clone(v));
        }

        self.probes.fetch_add(1, Ordering::Relaxed);
        let version = Arc::new(probe().await?);
        tracing::debug!(target: "polysql.dialect", db = %version, "probed database version");
        let _ = self.slot.set(Arc::clone(&version));
        Ok(version)
    }

    /// Number of probes that actually ran.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }
}
