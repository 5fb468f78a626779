use super::{MatchMode, PAGE_ROWS, PAGE_START, Paging, SqlDialect};
use crate::sql::SqlBuffer;
use crate::value::SqlValue;
use crate::version::DbVersion;

/// MySQL and MariaDB.
#[derive(Debug, Clone)]
pub struct MysqlDialect {
    version: DbVersion,
}

impl MysqlDialect {
    pub fn new(version: DbVersion) -> Self {
        Self { version }
    }
}

impl SqlDialect for MysqlDialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "mysql"
    }

    fn paginate(&self, body: &mut SqlBuffer, paging: &Paging) {
        body.append("\nLIMIT");
        if !paging.from_beginning() {
            body.add_named_variable(PAGE_START, paging.start).push(",");
        }
        body.add_named_variable(PAGE_ROWS, paging.rows);
    }

    fn append_like_operand(&self, buffer: &mut SqlBuffer, value: SqlValue, mode: MatchMode) {
        buffer.append("CONCAT(");
        if matches!(mode, MatchMode::Contains | MatchMode::Ends) {
            buffer.push("'%',");
        }
        buffer.add_variable(value);
        if matches!(mode, MatchMode::Contains | MatchMode::Starts) {
            buffer.push(",'%'");
        }
        buffer.push(")");
    }

    /// GBK ordering sorts Chinese names by pinyin.
    fn collate_for_name(&self, column: &str) -> String {
        format!("CONVERT({column} USING GBK)")
    }

    fn string_literal(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        for c in s.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }
}
