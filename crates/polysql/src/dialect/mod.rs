//! Per-database SQL dialects.
//!
//! A [`SqlDialect`] translates portable concepts (pagination, pattern matching,
//! literal formatting, current timestamp, name collation) into one vendor's
//! syntax. Dialects never inspect a statement body: pagination wraps an already
//! built [`SqlBuffer`] by prepending/appending around it.
//!
//! Adding a database means adding one dialect type and one arm in
//! [`create_dialect`]; buffers and callers are untouched.

mod db2;
mod generic;
mod mysql;
mod oracle;


pub use db2::Db2Dialect;
pub use generic::{H2Dialect, PostgresDialect, SqlServerDialect, SqliteDialect};
pub use mysql::MysqlDialect;
pub use oracle::OracleDialect;

use crate::error::{OrmError, OrmResult};
use crate::sql::SqlBuffer;
use crate::value::SqlValue;
use crate::version::{DbType, DbVersion};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Variable names used for pagination bounds.
pub const PAGE_START: &str = "_start_";
pub const PAGE_END: &str = "_end_";
pub const PAGE_ROWS: &str = "_rows_";

/// A page window: skip `start` rows, return at most `rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub start: i64,
    pub rows: i64,
}

impl Paging {
    pub fn new(start: i64, rows: i64) -> Self {
        Self { start, rows }
    }

    /// 1-based page number to window.
    pub fn page(page: i64, per_page: i64) -> OrmResult<Self> {
        if page < 1 {
            return Err(OrmError::validation(format!(
                "page must be >= 1, got {page}"
            )));
        }
        Ok(Self::new((page - 1) * per_page, per_page))
    }

    pub fn end(&self) -> i64 {
        self.start + self.rows
    }

    /// `start <= 0` means "from the beginning".
    pub fn from_beginning(&self) -> bool {
        self.start <= 0
    }
}

/// Which side(s) of a LIKE pattern get a `%` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `%x%`
    Contains,
    /// `x%`
    Starts,
    /// `%x`
    Ends,
}

impl MatchMode {
    fn sides(self) -> (bool, bool) {
        match self {
            MatchMode::Contains => (true, true),
            MatchMode::Starts => (false, true),
            MatchMode::Ends => (true, false),
        }
    }
}

/// Dialect translation rules. Implementations are immutable and shared.
///
/// Default methods implement the ANSI-ish behaviour (`LIMIT/OFFSET`, `||`
/// concatenation, quoted literals) that Postgres, H2 and SQLite share.
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// The version this dialect was built for.
    fn version(&self) -> &DbVersion;

    fn name(&self) -> &'static str;

    /// Rewrite a complete SELECT into a page query.
    fn paginate(&self, body: &mut SqlBuffer, paging: &Paging) {
        if paging.from_beginning() {
            body.append("\nLIMIT").add_named_variable(PAGE_ROWS, paging.rows);
        } else {
            body.append("\nLIMIT")
                .add_named_variable(PAGE_ROWS, paging.rows)
                .append("OFFSET")
                .add_named_variable(PAGE_START, paging.start);
        }
    }

    /// Append a LIKE operand (`'%'||:x||'%'` and its one-sided forms).
    fn append_like_operand(&self, buffer: &mut SqlBuffer, value: SqlValue, mode: MatchMode) {
        let (left, right) = mode.sides();
        if left {
            buffer.append("'%'||");
        }
        buffer.add_variable(value);
        if right {
            buffer.push("||'%'");
        }
    }

    /// Expression for "now".
    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Expression used when ordering by a human-readable name.
    fn collate_for_name(&self, column: &str) -> String {
        column.to_string()
    }

    fn string_literal(&self, s: &str) -> String {
        quote(s)
    }

    fn datetime_literal(&self, dt: &NaiveDateTime) -> String {
        quote(&format_datetime(dt))
    }

    fn date_literal(&self, d: &NaiveDate) -> String {
        quote(&d.format("%Y-%m-%d").to_string())
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }

    /// Format a bound value as a literal (logging/debugging only).
    fn format_literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Text(s) => self.string_literal(s),
            SqlValue::DateTime(dt) => self.datetime_literal(dt),
            SqlValue::Date(d) => self.date_literal(d),
            SqlValue::Uuid(u) => self.string_literal(&u.to_string()),
            SqlValue::Bytes(b) => self.bytes_literal(b),
            SqlValue::Json(j) => self.string_literal(&j.to_string()),
        }
    }
}

/// `'it''s'`
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Build the dialect for a version. Unknown products are a configuration error.
pub fn create_dialect(version: &DbVersion) -> OrmResult<Arc<dyn SqlDialect>> {
    let v = version.clone();
    let dialect: Arc<dyn SqlDialect> = match version.db_type {
        DbType::Oracle => Arc::new(OracleDialect::new(v)),
        DbType::MySql | DbType::MariaDb => Arc::new(MysqlDialect::new(v)),
        DbType::Db2 => Arc::new(Db2Dialect::new(v)),
        DbType::PostgreSql => Arc::new(PostgresDialect::new(v)),
        DbType::H2 => Arc::new(H2Dialect::new(v)),
        DbType::Sqlite => Arc::new(SqliteDialect::new(v)),
        DbType::SqlServer => Arc::new(SqlServerDialect::new(v)),
        DbType::Unknown(ref name) => {
            return Err(OrmError::UnsupportedDatabase(format!(
                "{name} {}",
                version.version_string
            )));
        }
    };
    Ok(dialect)
}

/// Thread-safe dialect cache keyed by [`DbVersion::key`].
///
/// Pass one instance explicitly to everything that needs dialect lookup.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    cache: Mutex<HashMap<String, Arc<dyn SqlDialect>>>,
    misses: AtomicU64,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared dialect for `version`, building it on first use.
    pub fn resolve(&self, version: &DbVersion) -> OrmResult<Arc<dyn SqlDialect>> {
        let key = version.key();
        let mut cache = self.lock();
        if let Some(found) = cache.get(&key) {
            return Ok(Arc::clone(found));
        }
        let dialect = create_dialect(version)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "polysql.dialect", key = %key, dialect = dialect.name(), "dialect created");
        cache.insert(key, Arc::clone(&dialect));
        Ok(dialect)
    }

    /// Number of dialects actually constructed.
    pub fn created(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries are inserted whole, so a guard dropped by a panicking thread
    /// still leaves a usable map.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn SqlDialect>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
