//! Startup configuration.
//!
//! Read once (usually from a `polysql.toml`) and turned into immutable
//! registries and strategies:
//!
//! ```toml
//! unaffected = "error"
//!
//! [batch]
//! multi_statement_enabled = true
//! disabled = ["join_using"]
//!
//! [batch.omit]
//! min_size = 8
//! keep_size = 3
//!
//! [[batch.overrides]]
//! strategy = "multi_row_values"
//! db_types = ["mysql", "postgresql"]
//!
//! [logical_delete]
//! field = "deleteFlag"
//! effective = 0
//! ineffective = 1
//! random_digits = 10
//!
//! [sql_log]
//! level = "info"
//! max_sql_length = 4000
//! ```

use crate::error::{OrmError, OrmResult};
use crate::sql::OmitStrategy;
use crate::value::SqlValue;
use crate::version::DbType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Names of the shipped batch strategies (insert and update share
/// `multi_statement` and `per_row`).
pub const BATCH_STRATEGY_NAMES: &[&str] = &[
    "multi_row_values",
    "union_all_dual",
    "multi_statement",
    "per_row",
    "join_using",
    "case_when",
];

/// Batch strategy that accepts every database.
pub const FALLBACK_STRATEGY: &str = "per_row";

/// Smallest and largest accepted random marker width.
pub const RANDOM_DIGITS_MIN: u32 = 5;
pub const RANDOM_DIGITS_MAX: u32 = 18;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolysqlConfig {
    pub batch: BatchConfig,
    pub logical_delete: Option<LogicalDeleteConfig>,
    pub unaffected: UnaffectedPolicy,
    pub sql_log: SqlLogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// The connection accepts several `;`-separated statements per call.
    pub multi_statement_enabled: bool,
    pub omit: OmitStrategy,
    pub overrides: Vec<StrategyOverride>,
    pub disabled: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            multi_statement_enabled: false,
            omit: OmitStrategy::default(),
            overrides: Vec::new(),
            disabled: Vec::new(),
        }
    }
}

/// Replaces the built-in `supports` check of a named strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOverride {
    pub strategy: String,
    pub db_types: Vec<DbType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDeleteConfig {
    pub field: String,
    pub effective: SqlValue,
    pub ineffective: SqlValue,
    /// Store a random number of this many digits instead of `ineffective`.
    #[serde(default)]
    pub random_digits: Option<u32>,
}

/// What to do when an UPDATE or DELETE matches no row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaffectedPolicy {
    /// Log at debug level and carry on.
    #[default]
    Ignore,
    /// Return [`OrmError::ZeroRowsAffected`].
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlLogConfig {
    pub level: LogLevel,
    /// Truncate logged SQL (in bytes). `None` logs it whole.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            max_sql_length: Some(4000),
        }
    }
}

impl PolysqlConfig {
    pub fn from_toml_str(content: &str) -> OrmResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrmError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> OrmResult<()> {
        let mut seen = HashSet::new();
        for o in &self.batch.overrides {
            check_strategy_name(&o.strategy)?;
            if !seen.insert(o.strategy.as_str()) {
                return Err(OrmError::invalid_config(format!(
                    "batch strategy '{}' overridden twice",
                    o.strategy
                )));
            }
            if o.db_types.is_empty() {
                return Err(OrmError::invalid_config(format!(
                    "override for '{}' lists no db_types",
                    o.strategy
                )));
            }
        }
        for name in &self.batch.disabled {
            check_strategy_name(name)?;
        }
        self.batch.check_fallback()?;
        if let Some(ld) = &self.logical_delete {
            ld.validate()?;
        }
        Ok(())
    }

    pub fn with_multi_statement(mut self, enabled: bool) -> Self {
        self.batch.multi_statement_enabled = enabled;
        self
    }

    pub fn with_omit(mut self, omit: OmitStrategy) -> Self {
        self.batch.omit = omit;
        self
    }

    pub fn override_strategy(mut self, strategy: impl Into<String>, db_types: Vec<DbType>) -> Self {
        self.batch.overrides.push(StrategyOverride {
            strategy: strategy.into(),
            db_types,
        });
        self
    }

    pub fn disable_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.batch.disabled.push(strategy.into());
        self
    }

    pub fn with_logical_delete(mut self, logical_delete: LogicalDeleteConfig) -> Self {
        self.logical_delete = Some(logical_delete);
        self
    }

    pub fn with_unaffected(mut self, policy: UnaffectedPolicy) -> Self {
        self.unaffected = policy;
        self
    }

    pub fn with_sql_log(mut self, sql_log: SqlLogConfig) -> Self {
        self.sql_log = sql_log;
        self
    }
}

impl LogicalDeleteConfig {
    pub fn new(
        field: impl Into<String>,
        effective: impl Into<SqlValue>,
        ineffective: impl Into<SqlValue>,
    ) -> Self {
        Self {
            field: field.into(),
            effective: effective.into(),
            ineffective: ineffective.into(),
            random_digits: None,
        }
    }

    pub fn random_digits(mut self, digits: u32) -> Self {
        self.random_digits = Some(digits);
        self
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.field.trim().is_empty() {
            return Err(OrmError::invalid_config("logical_delete.field is empty"));
        }
        if self.effective == self.ineffective {
            return Err(OrmError::invalid_config(
                "logical_delete.effective and ineffective must differ",
            ));
        }
        if let Some(digits) = self.random_digits {
            check_random_digits(digits)?;
        }
        Ok(())
    }
}

pub(crate) fn check_random_digits(digits: u32) -> OrmResult<()> {
    if !(RANDOM_DIGITS_MIN..=RANDOM_DIGITS_MAX).contains(&digits) {
        return Err(OrmError::invalid_config(format!(
            "random marker needs {RANDOM_DIGITS_MIN}..={RANDOM_DIGITS_MAX} digits, got {digits}"
        )));
    }
    Ok(())
}

impl BatchConfig {
    /// The per-row fallback must stay selectable for every database.
    pub(crate) fn check_fallback(&self) -> OrmResult<()> {
        if self.disabled.iter().any(|n| n == FALLBACK_STRATEGY) {
            return Err(OrmError::invalid_config(format!(
                "{FALLBACK_STRATEGY} is the fallback batch strategy and cannot be disabled"
            )));
        }
        if self.overrides.iter().any(|o| o.strategy == FALLBACK_STRATEGY) {
            return Err(OrmError::invalid_config(format!(
                "{FALLBACK_STRATEGY} is the fallback batch strategy and cannot be restricted to db_types"
            )));
        }
        Ok(())
    }
}

fn check_strategy_name(name: &str) -> OrmResult<()> {
    if BATCH_STRATEGY_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(OrmError::invalid_config(format!(
            "unknown batch strategy '{name}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PolysqlConfig::from_toml_str("").unwrap();
        assert_eq!(config, PolysqlConfig::default());
        assert_eq!(config.batch.omit, OmitStrategy::new(8, 3));
        assert_eq!(config.unaffected, UnaffectedPolicy::Ignore);
        assert!(!config.batch.multi_statement_enabled);
    }

    #[test]
    fn parses_full_file() {
        let config = PolysqlConfig::from_toml_str(
            r#"
unaffected = "error"

[batch]
multi_statement_enabled = true
disabled = ["join_using"]

[batch.omit]
min_size = 20
keep_size = 5

[[batch.overrides]]
strategy = "multi_row_values"
db_types = ["mysql", "postgresql"]

[logical_delete]
field = "deleteFlag"
effective = 0
ineffective = 1
random_digits = 10

[sql_log]
level = "info"
"#,
        )
        .unwrap();

        assert_eq!(config.unaffected, UnaffectedPolicy::Error);
        assert!(config.batch.multi_statement_enabled);
        assert_eq!(config.batch.disabled, vec!["join_using".to_string()]);
        assert_eq!(config.batch.omit, OmitStrategy::new(20, 5));
        assert_eq!(
            config.batch.overrides[0].db_types,
            vec![DbType::MySql, DbType::PostgreSql]
        );
        let ld = config.logical_delete.unwrap();
        assert_eq!(ld.effective, SqlValue::Int(0));
        assert_eq!(ld.ineffective, SqlValue::Int(1));
        assert_eq!(ld.random_digits, Some(10));
        assert_eq!(config.sql_log.level, LogLevel::Info);
        assert_eq!(config.sql_log.max_sql_length, Some(4000));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = PolysqlConfig::from_toml_str("[batch]\ndisabled = [\"bulk_copy\"]\n").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("bulk_copy"));
    }

    #[test]
    fn fallback_cannot_be_disabled() {
        let err = PolysqlConfig::default()
            .disable_strategy("per_row")
            .validate()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn fallback_cannot_be_overridden() {
        let err = PolysqlConfig::default()
            .override_strategy("per_row", vec![DbType::Oracle])
            .validate()
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("per_row"));

        let err = PolysqlConfig::from_toml_str(
            "[[batch.overrides]]\nstrategy = \"per_row\"\ndb_types = [\"oracle\"]\n",
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn rejects_duplicate_override() {
        let err = PolysqlConfig::default()
            .override_strategy("case_when", vec![DbType::Oracle])
            .override_strategy("case_when", vec![DbType::Db2])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn random_digits_bounds() {
        for digits in [0, 4, 19] {
            let config = PolysqlConfig::default()
                .with_logical_delete(LogicalDeleteConfig::new("deleteFlag", 0, 1).random_digits(digits));
            assert!(config.validate().unwrap_err().is_config_error(), "{digits}");
        }
        for digits in [5, 10, 18] {
            let config = PolysqlConfig::default()
                .with_logical_delete(LogicalDeleteConfig::new("deleteFlag", 0, 1).random_digits(digits));
            config.validate().unwrap();
        }
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = PolysqlConfig::from_toml_str("[batch\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn unknown_db_type_is_kept() {
        let config = PolysqlConfig::from_toml_str(
            "[[batch.overrides]]\nstrategy = \"case_when\"\ndb_types = [\"informix\"]\n",
        )
        .unwrap();
        assert_eq!(
            config.batch.overrides[0].db_types,
            vec![DbType::Unknown("informix".into())]
        );
    }
}
