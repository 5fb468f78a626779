use super::{MatchMode, PAGE_ROWS, PAGE_START, Paging, SqlDialect, format_datetime, quote};
use crate::sql::SqlBuffer;
use crate::value::SqlValue;
use crate::version::DbVersion;
use chrono::{NaiveDate, NaiveDateTime};

macro_rules! dialect_struct {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            version: DbVersion,
        }

        impl $name {
            pub fn new(version: DbVersion) -> Self {
                Self { version }
            }
        }
    };
}

dialect_struct!(
    /// PostgreSQL: default `LIMIT/OFFSET` rules.
    PostgresDialect
);
dialect_struct!(
    /// H2: `LIMIT/OFFSET`, `PARSEDATETIME` literals.
    H2Dialect
);
dialect_struct!(SqliteDialect);
dialect_struct!(
    /// SQL Server 2012+: `OFFSET/FETCH` paging, `+` string concatenation.
    SqlServerDialect
);

impl SqlDialect for PostgresDialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("'\\x{hex}'::bytea")
    }
}

impl SqlDialect for H2Dialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "h2"
    }

    fn datetime_literal(&self, dt: &NaiveDateTime) -> String {
        format!(
            "PARSEDATETIME({}, 'yyyy-MM-dd HH:mm:ss.SSS')",
            quote(&format_datetime(dt))
        )
    }

    fn date_literal(&self, d: &NaiveDate) -> String {
        format!(
            "PARSEDATETIME({}, 'yyyy-MM-dd')",
            quote(&d.format("%Y-%m-%d").to_string())
        )
    }
}

impl SqlDialect for SqliteDialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

impl SqlDialect for SqlServerDialect {
    fn version(&self) -> &DbVersion {
        &self.version
    }

    fn name(&self) -> &'static str {
        "sqlserver"
    }

    // OFFSET/FETCH requires an ORDER BY in the body.
    fn paginate(&self, body: &mut SqlBuffer, paging: &Paging) {
        body.append("\nOFFSET")
            .add_named_variable(PAGE_START, paging.start.max(0))
            .append("ROWS FETCH NEXT")
            .add_named_variable(PAGE_ROWS, paging.rows)
            .append("ROWS ONLY");
    }

    fn append_like_operand(&self, buffer: &mut SqlBuffer, value: SqlValue, mode: MatchMode) {
        if matches!(mode, MatchMode::Contains | MatchMode::Ends) {
            buffer.append("'%'+");
        }
        buffer.add_variable(value);
        if matches!(mode, MatchMode::Contains | MatchMode::Starts) {
            buffer.push("+'%'");
        }
    }

    fn current_timestamp(&self) -> &'static str {
        "GETDATE()"
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        format!("0x{hex}")
    }
}
