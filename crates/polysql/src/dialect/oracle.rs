use super::{PAGE_END, PAGE_ROWS, PAGE_START, Paging, SqlDialect, format_datetime, quote};
use crate::sql::SqlBuffer;
use crate::version::DbVersion;
use chrono::{NaiveDate, NaiveDateTime};

/// Oracle: `ROWNUM` pagination, `TO_TIMESTAMP`/`TO_DATE` literals.
#[derive(Debug, Clone)]
pub struct OracleDialect {
    version: DbVersion,
}

impl OracleDialect {
    pub fn new(version: DbVersion) -> Self {
        Self { version }
    }
}

impl SqlDialect for OracleDialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn paginate(&self, body: &mut SqlBuffer, paging: &Paging) {
        if paging.from_beginning() {
            body.indent(1, true);
            body.prepend("SELECT * FROM (\n");
            body.append("\n) WHERE ROWNUM <= ")
                .add_named_variable(PAGE_ROWS, paging.rows);
        } else {
            body.indent(2, true);
            body.prepend("SELECT * FROM (\n\tSELECT T_T.*, ROWNUM R_N FROM (\n");
            body.append("\n\t) T_T WHERE ROWNUM <= ")
                .add_named_variable(PAGE_END, paging.end())
                .append("\n) WHERE R_N > ")
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

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        format!("HEXTORAW('{hex}')")
    }
}
