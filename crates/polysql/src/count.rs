//! `SELECT COUNT(*)` derivation for paged queries.
//!
//! The input is treated as text with a known shape (what [`FragmentBuilder`]
//! and [`SqlDialect::paginate`] produce), not parsed as SQL:
//!
//! 1. pagination wrappers this crate emits (Oracle `ROWNUM`, DB2
//!    `ROW_NUMBER()`) are peeled off;
//! 2. a top-level `ORDER BY` / `LIMIT` / `OFFSET` / `FETCH` tail is cut;
//! 3. the projection becomes `COUNT(*)` when that cannot change the row count,
//!    otherwise the query is wrapped in `SELECT COUNT(*) FROM (...) T_C`.
//!
//! Anything the scanner does not understand (unbalanced parentheses, an
//! unterminated quote) is wrapped whole.
//!
//! [`FragmentBuilder`]: crate::FragmentBuilder
//! [`SqlDialect::paginate`]: crate::SqlDialect::paginate

use crate::error::{OrmError, OrmResult};
use crate::sql::NamedSql;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

static ORACLE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\ASELECT \* FROM \(\n\tSELECT T_T\.\*, ROWNUM R_N FROM \(\n(.*)\n\t\) T_T WHERE ROWNUM <= :\$\d+\$_end_\n\) WHERE R_N > :\$\d+\$_start_\z",
    )
    .expect("valid oracle range regex")
});

static DB2_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\ASELECT \* FROM \(\n\tSELECT T_T\.\*, ROW_NUMBER\(\) OVER\(\) AS R_N FROM \(\n(.*)\n\t\) T_T FETCH FIRST :\$\d+\$_end_ ROWS ONLY\n\) T_R WHERE R_N > :\$\d+\$_start_\z",
    )
    .expect("valid db2 range regex")
});

static ORACLE_TOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\ASELECT \* FROM \(\n(.*)\n\) WHERE ROWNUM <= :\$\d+\$_rows_\z")
        .expect("valid oracle top-n regex")
});

/// Projection modifiers that make `COUNT(*)` unsafe.
const PROJECTION_BLOCKERS: &[&str] = &["DISTINCT", "UNIQUE", "TOP"];

/// Top-level keywords that make `COUNT(*)` unsafe.
const SHAPE_BLOCKERS: &[&str] = &["GROUP", "HAVING", "UNION", "INTERSECT", "EXCEPT", "MINUS"];

const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

/// A derived count query and the placeholder keys it still references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSql {
    pub sql: String,
    pub param_keys: Vec<String>,
}

impl CountSql {
    /// Derive from named-placeholder SQL text.
    pub fn derive(sql: &str) -> Self {
        let sql = derive_count_sql(sql);
        let param_keys = NamedSql {
            sql: sql.clone(),
            params: Vec::new(),
        }
        .placeholder_keys();
        Self { sql, param_keys }
    }

    /// Pick the values this count query needs out of the source query's params.
    pub fn bind(&self, source: &NamedSql) -> OrmResult<NamedSql> {
        let params = self
            .param_keys
            .iter()
            .map(|key| {
                source
                    .get(key)
                    .map(|v| (key.clone(), v.clone()))
                    .ok_or_else(|| {
                        OrmError::validation(format!("placeholder :{key} has no bound value"))
                    })
            })
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(NamedSql {
            sql: self.sql.clone(),
            params,
        })
    }
}

/// Hit/miss counters of a [`CountSqlCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Derived count queries keyed by the exact source SQL text.
///
/// Append-only and unbounded: query shapes are finite.
#[derive(Debug, Default)]
pub struct CountSqlCache {
    entries: Mutex<HashMap<String, Arc<CountSql>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CountSqlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_derive(&self, sql: &str) -> Arc<CountSql> {
        if let Some(found) = self.lock().get(sql) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(found);
        }

        // Derive outside the lock; a racing thread's equivalent entry wins.
        let derived = Arc::new(CountSql::derive(sql));
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "polysql.count", sql = %sql, count_sql = %derived.sql, "count sql derived");
        let mut entries = self.lock();
        Arc::clone(entries.entry(sql.to_string()).or_insert(derived))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CountSql>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cached count-query derivation.
#[derive(Debug, Default)]
pub struct CountSqlDeriver {
    cache: CountSqlCache,
}

impl CountSqlDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count query for `query`, bound with the params it still references.
    pub fn derive(&self, query: &NamedSql) -> OrmResult<NamedSql> {
        self.cache.get_or_derive(&query.sql).bind(query)
    }

    pub fn cache(&self) -> &CountSqlCache {
        &self.cache
    }
}

/// Text-level derivation; see the module docs.
pub fn derive_count_sql(sql: &str) -> String {
    let body = unwrap_paging(sql.trim());
    let Some(words) = top_level_words(&body) else {
        return wrap(&body);
    };

    let after_set_op = words
        .iter()
        .rposition(|w| SET_OPERATORS.contains(&w.upper.as_str()))
        .map_or(0, |i| i + 1);
    let cut = (after_set_op..words.len()).find(|&i| match words[i].upper.as_str() {
        "ORDER" => words.get(i + 1).is_some_and(|w| w.upper == "BY"),
        "LIMIT" | "OFFSET" | "FETCH" => true,
        _ => false,
    });
    let (body, words) = match cut {
        Some(i) => (body[..words[i].start].trim_end(), &words[..i]),
        None => (body.as_str(), &words[..]),
    };

    reduce(body, words).unwrap_or_else(|| wrap(body))
}

fn wrap(body: &str) -> String {
    format!("SELECT COUNT(*) FROM (\n{body}\n) T_C")
}

/// `SELECT cols FROM ...` -> `SELECT COUNT(*) FROM ...` when the projection is
/// plain columns and nothing groups or combines rows.
fn reduce(body: &str, words: &[Word]) -> Option<String> {
    let select = words.first()?;
    if select.start != 0 || select.upper != "SELECT" {
        return None;
    }
    if words
        .get(1)
        .is_some_and(|w| PROJECTION_BLOCKERS.contains(&w.upper.as_str()))
    {
        return None;
    }
    if words
        .iter()
        .any(|w| SHAPE_BLOCKERS.contains(&w.upper.as_str()))
    {
        return None;
    }
    let from = words.iter().find(|w| w.upper == "FROM")?;
    let projection = &body[select.end..from.start];
    if projection.contains('(') || projection.contains(":$") {
        return None;
    }
    Some(format!("SELECT COUNT(*) {}", &body[from.start..]))
}

fn unwrap_paging(sql: &str) -> String {
    for (re, levels) in [(&*ORACLE_RANGE, 2), (&*DB2_RANGE, 2), (&*ORACLE_TOP, 1)] {
        if let Some(caps) = re.captures(sql) {
            return dedent(&caps[1], levels);
        }
    }
    sql.to_string()
}

/// Remove up to `levels` leading tabs from every line.
fn dedent(text: &str, levels: usize) -> String {
    text.split('\n')
        .map(|line| {
            let tabs = line.bytes().take(levels).take_while(|b| *b == b'\t').count();
            &line[tabs..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug)]
struct Word {
    start: usize,
    end: usize,
    upper: String,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Words outside parentheses, quotes, comments and placeholders.
///
/// `None` when the text is not balanced.
fn top_level_words(sql: &str) -> Option<Vec<Word>> {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                let quote = bytes[i];
                let close = bytes[i + 1..].iter().position(|b| *b == quote)?;
                i += close + 2;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|b| *b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = sql[i + 2..].find("*/")?;
                i += close + 4;
            }
            b':' if bytes.get(i + 1) == Some(&b'$') => {
                i += 2;
                while i < bytes.len() && (bytes[i] == b'$' || is_word_byte(bytes[i])) {
                    i += 1;
                }
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.checked_sub(1)?;
                i += 1;
            }
            b if is_word_byte(b) => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                if depth == 0 {
                    words.push(Word {
                        start,
                        end: i,
                        upper: sql[start..i].to_ascii_uppercase(),
                    });
                }
            }
            _ => i += 1,
        }
    }
    (depth == 0).then_some(words)
}
