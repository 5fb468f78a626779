use super::{PAGE_END, PAGE_ROWS, PAGE_START, Paging, SqlDialect, format_datetime, quote};
use crate::sql::SqlBuffer;
use crate::version::DbVersion;
use chrono::{NaiveDate, NaiveDateTime};

/// IBM DB2 (LUW): `ROW_NUMBER()` + `FETCH FIRST` pagination, Oracle-style
/// `TO_TIMESTAMP`/`TO_DATE` literals.
#[derive(Debug, Clone)]
pub struct Db2Dialect {
    version: DbVersion,
}

impl Db2Dialect {
    pub fn new(version: DbVersion) -> Self {
        Self { version }
    }
}

impl SqlDialect for Db2Dialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "db2"
    }

    fn paginate(&self, body: &mut SqlBuffer, paging: &Paging) {
        if paging.from_beginning() {
            body.append("\nFETCH FIRST")
                .add_named_variable(PAGE_ROWS, paging.rows)
                .append("ROWS ONLY");
        } else {
            body.indent(2, true);
            body.prepend("SELECT * FROM (\n\tSELECT T_T.*, ROW_NUMBER() OVER() AS R_N FROM (\n");
            body.append("\n\t) T_T FETCH FIRST")
                .add_named_variable(PAGE_END, paging.end())
                .append("ROWS ONLY\n) T_R WHERE R_N > ")
                .add_named_variable(PAGE_START, paging.start);
        }
    }

    fn datetime_literal(&self, dt: &NaiveDateTime) -> String {
        format!(
            "TO_TIMESTAMP({}, 'YYYY-MM-DD HH24:MI:SS.FF')",
            quote(&format_datetime(dt))
        )
    }

    fn date_literal(&self, d: &NaiveDate) -> String {
        format!(
            "TO_DATE({}, 'YYYY-MM-DD')",
            quote(&d.format("%Y-%m-%d").to_string())
        )
    }
}
