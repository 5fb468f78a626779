use super::buffer::SqlBuffer;
use super::parts::{OmitMark, SqlItem};
use crate::dialect::SqlDialect;
use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\$[0-9]+(?:\$[A-Za-z0-9_]+)?)").expect("valid placeholder regex"));

/// SQL with named placeholders (`:$1`, `:$2$userName`) and the values they bind.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSql {
    pub sql: String,
    /// `(key, value)` in placeholder order; keys omit the leading `:`.
    pub params: Vec<(String, SqlValue)>,
}

/// Positional placeholder syntax expected by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `$1, $2, ...` (Postgres)
    Dollar,
    /// `?, ?, ...` (JDBC-style drivers, MySQL, SQLite)
    Question,
}

/// SQL with positional placeholders and its ordered values.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl NamedSql {
    /// Look up a bound value by placeholder key (with or without the leading `:`).
    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        let key = key.strip_prefix(':').unwrap_or(key);
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn to_map(&self) -> HashMap<String, SqlValue> {
        self.params.iter().cloned().collect()
    }

    /// Placeholder keys in the order they occur in the SQL text.
    pub fn placeholder_keys(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(&self.sql)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Rewrite named placeholders for drivers that only bind by position.
    ///
    /// A key referenced twice binds its value twice.
    pub fn to_positional(&self, style: ParamStyle) -> OrmResult<PositionalSql> {
        let lookup = self.to_map();
        let mut params = Vec::with_capacity(self.params.len());
        let mut out = String::with_capacity(self.sql.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(&self.sql) {
            let whole = caps.get(0).expect("capture 0 is the whole match");
            let key = &caps[1];
            let value = lookup.get(key).ok_or_else(|| {
                OrmError::validation(format!("placeholder :{key} has no bound value"))
            })?;
            out.push_str(&self.sql[last..whole.start()]);
            params.push(value.clone());
            match style {
                ParamStyle::Dollar => {
                    out.push('$');
                    out.push_str(&params.len().to_string());
                }
                ParamStyle::Question => out.push('?'),
            }
            last = whole.end();
        }
        out.push_str(&self.sql[last..]);
        Ok(PositionalSql { sql: out, params })
    }
}

/// Truncation policy for log output of large batch statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmitStrategy {
    /// Row runs longer than this are truncated.
    pub min_size: usize,
    /// Rows kept at each end of a truncated run.
    pub keep_size: usize,
}

impl Default for OmitStrategy {
    fn default() -> Self {
        Self {
            min_size: 8,
            keep_size: 3,
        }
    }
}

impl OmitStrategy {
    pub fn new(min_size: usize, keep_size: usize) -> Self {
        Self {
            min_size,
            keep_size,
        }
    }

    /// Never truncate.
    pub fn disabled() -> Self {
        Self {
            min_size: usize::MAX,
            keep_size: 0,
        }
    }

    fn applies(&self, rows: usize) -> bool {
        rows > self.min_size && rows > self.keep_size * 2
    }
}

impl SqlBuffer {
    /// Render for execution: named placeholders plus their values.
    pub fn render_named(&self) -> NamedSql {
        let mut sql = String::new();
        let mut params = Vec::with_capacity(self.variable_count());
        for item in self.items() {
            match item {
                SqlItem::Text(s) | SqlItem::Raw(s) => sql.push_str(s),
                SqlItem::Variable(v) => {
                    let key = v.key();
                    sql.push(':');
                    sql.push_str(&key);
                    params.push((key, v.value.clone()));
                }
                SqlItem::Omit(_) => {}
            }
        }
        NamedSql { sql, params }
    }

    /// Render for execution with positional placeholders.
    pub fn render_positional(&self, style: ParamStyle) -> PositionalSql {
        let mut sql = String::new();
        let mut params = Vec::with_capacity(self.variable_count());
        for item in self.items() {
            match item {
                SqlItem::Text(s) | SqlItem::Raw(s) => sql.push_str(s),
                SqlItem::Variable(v) => {
                    params.push(v.value.clone());
                    match style {
                        ParamStyle::Dollar => {
                            sql.push('$');
                            sql.push_str(&params.len().to_string());
                        }
                        ParamStyle::Question => sql.push('?'),
                    }
                }
                SqlItem::Omit(_) => {}
            }
        }
        PositionalSql { sql, params }
    }

    /// Render with every variable inlined as a dialect literal (logging only).
    pub fn render_literal(&self, dialect: &dyn SqlDialect) -> String {
        let mut out = String::new();
        for item in self.items() {
            write_literal_item(&mut out, item, dialect);
        }
        out
    }

    /// Literal render that collapses long runs of marked row fragments, keeping
    /// `keep_size` rows at each end and an ellipsis stating the omitted count.
    pub fn render_literal_omitted(&self, dialect: &dyn SqlDialect, omit: &OmitStrategy) -> String {
        let items = self.items();
        let mut out = String::new();
        let mut i = 0;
        while i < items.len() {
            let SqlItem::Omit(OmitMark::Row(_)) = items[i] else {
                write_literal_item(&mut out, &items[i], dialect);
                i += 1;
                continue;
            };

            let mut starts = Vec::new();
            let mut end = i;
            while end < items.len() {
                match items[end] {
                    SqlItem::Omit(OmitMark::Row(_)) => starts.push(end),
                    SqlItem::Omit(OmitMark::End) => break,
                    _ => {}
                }
                end += 1;
            }

            let total = starts.len();
            if omit.applies(total) {
                let head_end = starts[omit.keep_size];
                let tail_start = if omit.keep_size == 0 {
                    end
                } else {
                    starts[total - omit.keep_size]
                };
                for item in &items[i..head_end] {
                    write_literal_item(&mut out, item, dialect);
                }
                let tabs = trailing_indent(&out);
                out.push('\n');
                out.push_str(&"\t".repeat(tabs));
                out.push_str(&format!(
                    "/* ... {} rows omitted ... */",
                    total - omit.keep_size * 2
                ));
                for item in &items[tail_start..end] {
                    write_literal_item(&mut out, item, dialect);
                }
            } else {
                for item in &items[i..end] {
                    write_literal_item(&mut out, item, dialect);
                }
            }
            i = end + 1;
        }
        out
    }
}

fn write_literal_item(out: &mut String, item: &SqlItem, dialect: &dyn SqlDialect) {
    match item {
        SqlItem::Text(s) | SqlItem::Raw(s) => out.push_str(s),
        SqlItem::Variable(v) => out.push_str(&dialect.format_literal(&v.value)),
        SqlItem::Omit(_) => {}
    }
}

fn trailing_indent(s: &str) -> usize {
    let line = match s.rfind('\n') {
        Some(pos) => &s[pos + 1..],
        None => s,
    };
    line.chars().take_while(|c| *c == '\t').count()
}
