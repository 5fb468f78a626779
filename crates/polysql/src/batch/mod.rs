//! Capability-based batch insert/update strategies.
//!
//! Each registry is an ordered list (fastest first). [`BatchRegistry::select`]
//! returns the first strategy whose `supports` accepts the connected
//! [`DbVersion`]; the per-row fallback at the end accepts everything.
//!
//! Strategies receive a normalized [`BatchInput`]: every row carries the same
//! field list (the union of all rows' fields, in mapping order), so a shape
//! like `VALUES (...),(...)` always lines up.

mod insert;
mod update;

#[cfg(test)]
mod tests;

pub use insert::{MultiRowValuesInsert, MultiStatementInsert, PerRowInsert, UnionAllDualInsert};
pub use update::{CaseWhenUpdate, JoinUsingUpdate, MultiStatementUpdate, PerRowUpdate};

use crate::condition::Entity;
use crate::config::BatchConfig;
use crate::error::{OrmError, OrmResult};
use crate::fragment::FragmentBuilder;
use crate::mapping::FieldScene;
use crate::sql::SqlBuffer;
use crate::value::SqlValue;
use crate::version::{DbType, DbVersion};
use std::fmt;
use std::sync::Arc;

/// One row queued for a batch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PkEntity {
    /// Pre-generated by the caller; never assigned by the database.
    pub primary_key: SqlValue,
    pub entity: Entity,
}

impl PkEntity {
    pub fn new(primary_key: impl Into<SqlValue>, entity: Entity) -> Self {
        Self {
            primary_key: primary_key.into(),
            entity,
        }
    }

    fn has_key(&self) -> bool {
        match &self.primary_key {
            SqlValue::Null => false,
            SqlValue::Text(s) => !s.trim().is_empty(),
            _ => true,
        }
    }
}

/// SQL produced by a batch strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatements {
    /// One statement covering every row.
    One(SqlBuffer),
    /// One statement per row, executed in order.
    PerRow(Vec<SqlBuffer>),
}

impl BatchStatements {
    pub fn statements(&self) -> &[SqlBuffer] {
        match self {
            BatchStatements::One(sql) => std::slice::from_ref(sql),
            BatchStatements::PerRow(list) => list,
        }
    }

    pub fn into_statements(self) -> Vec<SqlBuffer> {
        match self {
            BatchStatements::One(sql) => vec![sql],
            BatchStatements::PerRow(list) => list,
        }
    }
}

/// Normalized rows for one batch.
#[derive(Debug, Clone)]
pub struct BatchInput<'a> {
    pub pk_field: &'a str,
    pub pk_column: &'a str,
    /// Uniform field list, in mapping order. Includes the key for inserts and
    /// excludes it for updates.
    pub fields: Vec<&'a str>,
    pub rows: Vec<PkEntity>,
}

impl<'a> BatchInput<'a> {
    /// Rows for INSERT: the key is written into every row's entity.
    pub fn for_insert(rows: &[PkEntity], helper: &FragmentBuilder<'a>) -> OrmResult<Self> {
        let (pk_field, pk_column) = helper.primary_key()?;
        let rows = checked_rows(rows, helper)?
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.entity
                    .insert(pk_field.to_string(), row.primary_key.clone());
                row
            })
            .collect::<Vec<_>>();
        let fields = helper.union_fields(rows.iter().map(|r| &r.entity), FieldScene::Insert)?;
        Ok(Self {
            pk_field,
            pk_column,
            fields,
            rows,
        })
    }

    /// Rows for UPDATE: the key identifies the row and is never SET.
    pub fn for_update(rows: &[PkEntity], helper: &FragmentBuilder<'a>) -> OrmResult<Self> {
        let (pk_field, pk_column) = helper.primary_key()?;
        let rows = checked_rows(rows, helper)?
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.entity.remove(pk_field);
                row
            })
            .collect::<Vec<_>>();
        let fields = helper.union_fields(rows.iter().map(|r| &r.entity), FieldScene::Update)?;
        if fields.is_empty() {
            return Err(OrmError::validation(format!(
                "batch update of {} has nothing to set",
                helper.table()
            )));
        }
        Ok(Self {
            pk_field,
            pk_column,
            fields,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fields present in every row.
    pub(crate) fn is_uniform(&self, field: &str) -> bool {
        self.rows.iter().all(|r| r.entity.contains_key(field))
    }
}

fn checked_rows<'r>(rows: &'r [PkEntity], helper: &FragmentBuilder<'_>) -> OrmResult<&'r [PkEntity]> {
    if rows.is_empty() {
        return Err(OrmError::validation(format!(
            "empty batch for {}",
            helper.table()
        )));
    }
    if let Some(pos) = rows.iter().position(|r| !r.has_key()) {
        return Err(OrmError::PrimaryKeyRequired(format!(
            "row {pos} of batch for {} has no primary key",
            helper.table()
        )));
    }
    Ok(rows)
}

/// Capability shared by insert and update strategies.
pub trait BatchStrategy: Send + Sync + fmt::Debug {
    /// Stable identifier used by configuration overrides.
    fn name(&self) -> &'static str;

    /// Pure predicate over the connected database.
    fn supports(&self, version: &DbVersion) -> bool;

    /// Requirement that no database can reveal, such as a driver flag.
    ///
    /// Checked on every selection, also when a configured allow-list replaces
    /// [`supports`](Self::supports).
    fn precondition(&self) -> bool {
        true
    }
}

/// Expresses an N-row INSERT as one or more statements.
pub trait BatchInsertStrategy: BatchStrategy {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements>;
}

/// Expresses an N-row UPDATE (by primary key) as one or more statements.
pub trait BatchUpdateStrategy: BatchStrategy {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements>;
}

#[derive(Debug)]
struct Entry<S: ?Sized> {
    strategy: Arc<S>,
    /// Replaces the strategy's own `supports` when set.
    allow: Option<Vec<DbType>>,
    disabled: bool,
}

/// Ordered strategy list; the first supporting entry wins.
///
/// Configured once at startup and read-only afterwards.
#[derive(Debug)]
pub struct BatchRegistry<S: ?Sized> {
    kind: &'static str,
    entries: Vec<Entry<S>>,
}

pub type InsertRegistry = BatchRegistry<dyn BatchInsertStrategy>;
pub type UpdateRegistry = BatchRegistry<dyn BatchUpdateStrategy>;

impl<S: BatchStrategy + ?Sized> BatchRegistry<S> {
    /// An empty registry. Without a catch-all entry, selection can fail.
    pub fn empty(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Add at the lowest preference.
    pub fn push(&mut self, strategy: Arc<S>) -> &mut Self {
        self.entries.push(Entry {
            strategy,
            allow: None,
            disabled: false,
        });
        self
    }

    /// Add at the highest preference.
    pub fn prepend(&mut self, strategy: Arc<S>) -> &mut Self {
        self.entries.insert(
            0,
            Entry {
                strategy,
                allow: None,
                disabled: false,
            },
        );
        self
    }

    /// Strategy names in preference order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.strategy.name()).collect()
    }

    /// Replace a strategy's allow-list with `db_types`.
    pub fn override_db_types(&mut self, name: &str, db_types: Vec<DbType>) -> OrmResult<()> {
        self.entry_mut(name)?.allow = Some(db_types);
        Ok(())
    }

    /// Never select the named strategy.
    pub fn disable(&mut self, name: &str) -> OrmResult<()> {
        self.entry_mut(name)?.disabled = true;
        Ok(())
    }

    fn entry_mut(&mut self, name: &str) -> OrmResult<&mut Entry<S>> {
        let kind = self.kind;
        self.entries
            .iter_mut()
            .find(|e| e.strategy.name() == name)
            .ok_or_else(|| {
                OrmError::invalid_config(format!("unknown {kind} batch strategy '{name}'"))
            })
    }

    fn apply_config(&mut self, config: &BatchConfig) -> OrmResult<()> {
        config.check_fallback()?;
        for o in &config.overrides {
            if self.entries.iter().any(|e| e.strategy.name() == o.strategy) {
                self.override_db_types(&o.strategy, o.db_types.clone())?;
            }
        }
        for name in &config.disabled {
            if self.entries.iter().any(|e| e.strategy.name() == name.as_str()) {
                self.disable(name)?;
            }
        }
        Ok(())
    }

    /// First strategy that supports `version`.
    pub fn select(&self, version: &DbVersion) -> OrmResult<Arc<S>> {
        let found = self.entries.iter().find(|e| {
            !e.disabled
                && e.strategy.precondition()
                && match &e.allow {
                    Some(types) => types.contains(&version.db_type),
                    None => e.strategy.supports(version),
                }
        });
        match found {
            Some(e) => {
                tracing::debug!(
                    target: "polysql.batch",
                    kind = self.kind,
                    strategy = e.strategy.name(),
                    db = %version,
                    "batch strategy selected"
                );
                Ok(Arc::clone(&e.strategy))
            }
            None => Err(OrmError::NoBatchStrategy {
                kind: self.kind,
                db: version.to_string(),
            }),
        }
    }
}

impl InsertRegistry {
    /// Shipped insert strategies, fastest first, with `config` applied.
    pub fn with_defaults(config: &BatchConfig) -> OrmResult<Self> {
        let mut registry = Self::empty("insert");
        registry
            .push(Arc::new(MultiRowValuesInsert))
            .push(Arc::new(UnionAllDualInsert))
            .push(Arc::new(MultiStatementInsert::new(config.multi_statement_enabled)))
            .push(Arc::new(PerRowInsert));
        registry.apply_config(config)?;
        Ok(registry)
    }

    /// Select and build in one step.
    pub fn build(
        &self,
        version: &DbVersion,
        rows: &[PkEntity],
        helper: &FragmentBuilder<'_>,
    ) -> OrmResult<BatchStatements> {
        let batch = BatchInput::for_insert(rows, helper)?;
        self.select(version)?.build(&batch, helper)
    }
}

impl UpdateRegistry {
    /// Shipped update strategies, fastest first, with `config` applied.
    pub fn with_defaults(config: &BatchConfig) -> OrmResult<Self> {
        let mut registry = Self::empty("update");
        registry
            .push(Arc::new(JoinUsingUpdate))
            .push(Arc::new(CaseWhenUpdate))
            .push(Arc::new(MultiStatementUpdate::new(config.multi_statement_enabled)))
            .push(Arc::new(PerRowUpdate));
        registry.apply_config(config)?;
        Ok(registry)
    }

    /// Select and build in one step.
    pub fn build(
        &self,
        version: &DbVersion,
        rows: &[PkEntity],
        helper: &FragmentBuilder<'_>,
    ) -> OrmResult<BatchStatements> {
        let batch = BatchInput::for_update(rows, helper)?;
        self.select(version)?.build(&batch, helper)
    }
}

