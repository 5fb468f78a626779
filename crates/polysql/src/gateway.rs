//! Execution boundary.
//!
//! The core only builds SQL. A [`SqlGateway`] owns the connection: it sends
//! [`NamedSql`] to the database and reports the connected [`DbVersion`].

use crate::condition::Entity;
use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldScene, TableMapping};
use crate::sql::NamedSql;
use crate::value::SqlValue;
use crate::version::DbVersion;
use std::future::Future;
use std::sync::Arc;

/// One result row: `(column, value)` in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// Value of a column, matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<&SqlValue> {
        self.columns.first().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Re-key by field name; columns the mapping does not select are dropped.
    pub fn into_entity(self, mapping: &dyn TableMapping) -> Entity {
        let fields = mapping.fields(FieldScene::Select);
        let mut entity = Entity::new();
        for (column, value) in self.columns {
            let field = fields.iter().find(|f| {
                mapping
                    .column_name(f)
                    .is_some_and(|c| c.eq_ignore_ascii_case(&column))
            });
            if let Some(field) = field {
                entity.insert(field.to_string(), value);
            }
        }
        entity
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Sends SQL to a database.
///
/// Implementations decide how named placeholders reach the driver, usually via
/// [`NamedSql::to_positional`].
pub trait SqlGateway: Send + Sync {
    /// Connected database, probed at most once per connection.
    fn db_version(&self) -> impl Future<Output = OrmResult<Arc<DbVersion>>> + Send;

    /// Execute a statement and return the number of rows affected.
    fn execute(&self, sql: &NamedSql) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute a query and return all rows.
    fn query(&self, sql: &NamedSql) -> impl Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Execute statements in order and return the total rows affected.
    fn execute_all(&self, statements: &[NamedSql]) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let mut total = 0;
            for sql in statements {
                total += self.execute(sql).await?;
            }
            Ok(total)
        }
    }

    /// Run a `SELECT COUNT(*)`-shaped query and read the first column of its
    /// first row.
    fn query_count(&self, sql: &NamedSql) -> impl Future<Output = OrmResult<i64>> + Send {
        async move {
            let rows = self.query(sql).await?;
            let value = rows
                .first()
                .and_then(Record::first)
                .ok_or_else(|| OrmError::decode("count", "count query returned no rows"))?;
            value.as_i64().ok_or_else(|| {
                OrmError::decode("count", format!("expected an integer, got {}", value.type_name()))
            })
        }
    }
}
