use crate::config::SqlLogConfig;
use crate::dialect::SqlDialect;
use crate::sql::{OmitStrategy, SqlBuffer, StatementKind};
use tracing::Level;

/// Emits every executed statement as a `polysql.sql` tracing event.
///
/// The SQL is rendered with values inlined as dialect literals, long batch
/// row runs collapsed per [`OmitStrategy`], and the result cut to
/// `max_sql_length` bytes. Execution always uses the parameterized render.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    pub omit: OmitStrategy,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(4000),
            omit: OmitStrategy::default(),
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SqlLogConfig, omit: OmitStrategy) -> Self {
        Self {
            level: config.level.into(),
            max_sql_length: config.max_sql_length,
            omit,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn omit(mut self, omit: OmitStrategy) -> Self {
        self.omit = omit;
        self
    }

    /// The text that [`log`](Self::log) would emit.
    pub fn format(&self, sql: &SqlBuffer, dialect: &dyn SqlDialect) -> String {
        let text = sql.render_literal_omitted(dialect, &self.omit);
        match self.max_sql_length {
            Some(max) if text.len() > max => format!("{}...", truncate_sql_bytes(&text, max)),
            _ => text,
        }
    }

    pub fn log(&self, sql: &SqlBuffer, dialect: &dyn SqlDialect, tag: Option<&str>) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        if !self.enabled() {
            return;
        }
        let text = self.format(sql, dialect);
        let kind = StatementKind::from_sql(&text);
        emit_at_level!(
            self.level,
            target: "polysql.sql",
            kind = ?kind,
            tag = tag.unwrap_or("-"),
            dialect = dialect.name(),
            param_count = sql.variable_count(),
            sql = %text,
        );
    }

    /// Skip rendering when no subscriber listens at this level.
    fn enabled(&self) -> bool {
        match self.level {
            Level::ERROR => tracing::enabled!(target: "polysql.sql", Level::ERROR),
            Level::WARN => tracing::enabled!(target: "polysql.sql", Level::WARN),
            Level::INFO => tracing::enabled!(target: "polysql.sql", Level::INFO),
            Level::DEBUG => tracing::enabled!(target: "polysql.sql", Level::DEBUG),
            Level::TRACE => tracing::enabled!(target: "polysql.sql", Level::TRACE),
        }
    }
}

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
