//! Logical (soft) delete.
//!
//! A row is "deleted" when its flag field holds the ineffective value. With a
//! random marker configured, a deleted row instead holds a random number of
//! exactly `R` digits, so unique keys that include the flag don't collide
//! between deleted rows.
//!
//! # Marker invariant
//!
//! Effective values must stay below `10^(R-1)` and every marker lies in
//! `[10^(R-1), 10^R)`: the deleted range is the numeric top of the flag's
//! code space. Comparisons against the ineffective value are rewritten into
//! range tests on that boundary, so `R` must not change once rows have been
//! soft deleted.

use crate::condition::{Condition, DbUpdate, DbWhere, Entity, Operator, UpdateItem};
use crate::config::{LogicalDeleteConfig, check_random_digits};
use crate::error::OrmResult;
use crate::mapping::TableMapping;
use crate::value::SqlValue;
use rand::Rng;
use std::fmt;

/// Generates `digits`-digit random numbers for deleted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomMarker {
    digits: u32,
}

impl RandomMarker {
    pub fn new(digits: u32) -> OrmResult<Self> {
        check_random_digits(digits)?;
        Ok(Self { digits })
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// `10^(R-1)`, the smallest marker.
    pub fn min_deleted(&self) -> i64 {
        10_i64.pow(self.digits - 1)
    }

    /// `10^(R-1) - 1`, the largest value that still means "not deleted".
    pub fn max_undeleted(&self) -> i64 {
        self.min_deleted() - 1
    }

    /// `10^R - 1`, the largest marker.
    pub fn max_deleted(&self) -> i64 {
        10_i64.pow(self.digits) - 1
    }

    pub fn generate(&self) -> i64 {
        rand::thread_rng().gen_range(self.min_deleted()..=self.max_deleted())
    }

    pub fn is_marker(&self, value: i64) -> bool {
        (self.min_deleted()..=self.max_deleted()).contains(&value)
    }

    /// Range test equivalent to `field <op> <ineffective>`, or `None` when the
    /// operator has no range meaning (IN, LIKE, ...).
    pub fn rewrite(&self, op: Operator) -> Option<(Operator, i64)> {
        match op {
            // deleted
            Operator::Eq | Operator::Ge => Some((Operator::Gt, self.max_undeleted())),
            // not deleted
            Operator::Lt | Operator::Ne => Some((Operator::Lt, self.min_deleted())),
            // everything
            Operator::Le => Some((Operator::Ge, 0)),
            // nothing
            Operator::Gt => Some((Operator::Gt, self.max_deleted())),
            _ => None,
        }
    }
}

/// Fill points applied by [`Dao`](crate::Dao) around every statement.
///
/// Every method is a no-op for tables whose mapping has no flag field.
pub trait LogicalDeleteFill: Send + Sync + fmt::Debug {
    /// Whether `mapping` carries the flag field.
    fn supports(&self, mapping: &dyn TableMapping) -> bool;

    /// WHERE of a SELECT (list, page, count).
    fn fill_query_where(&self, mapping: &dyn TableMapping, filter: &mut DbWhere);

    /// WHERE of an UPDATE.
    fn fill_update_where(&self, mapping: &dyn TableMapping, filter: &mut DbWhere) {
        self.fill_query_where(mapping, filter);
    }

    /// WHERE of the UPDATE that soft deletes rows.
    fn fill_delete_where(&self, mapping: &dyn TableMapping, filter: &mut DbWhere) {
        self.fill_query_where(mapping, filter);
    }

    /// Row about to be inserted.
    fn fill_create(&self, mapping: &dyn TableMapping, entity: &mut Entity);

    /// SET clause that soft deletes rows.
    fn fill_logical_delete(&self, mapping: &dyn TableMapping, update: &mut DbUpdate);
}

/// Tables without soft delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogicalDelete;

impl LogicalDeleteFill for NoLogicalDelete {
    fn supports(&self, _mapping: &dyn TableMapping) -> bool {
        false
    }

    fn fill_query_where(&self, _mapping: &dyn TableMapping, _filter: &mut DbWhere) {}

    fn fill_create(&self, _mapping: &dyn TableMapping, _entity: &mut Entity) {}

    fn fill_logical_delete(&self, _mapping: &dyn TableMapping, _update: &mut DbUpdate) {}
}

/// Flag-field soft delete, optionally with a random marker.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDeleteStrategy {
    field: String,
    effective: SqlValue,
    ineffective: SqlValue,
    marker: Option<RandomMarker>,
}

impl LogicalDeleteStrategy {
    pub fn new(
        field: impl Into<String>,
        effective: impl Into<SqlValue>,
        ineffective: impl Into<SqlValue>,
    ) -> Self {
        Self {
            field: field.into(),
            effective: effective.into(),
            ineffective: ineffective.into(),
            marker: None,
        }
    }

    /// Store a random `digits`-digit marker instead of the ineffective value.
    pub fn with_random_marker(mut self, digits: u32) -> OrmResult<Self> {
        self.marker = Some(RandomMarker::new(digits)?);
        Ok(self)
    }

    pub fn from_config(config: &LogicalDeleteConfig) -> OrmResult<Self> {
        config.validate()?;
        let strategy = Self::new(
            config.field.clone(),
            config.effective.clone(),
            config.ineffective.clone(),
        );
        match config.random_digits {
            Some(digits) => strategy.with_random_marker(digits),
            None => Ok(strategy),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn effective(&self) -> &SqlValue {
        &self.effective
    }

    pub fn ineffective(&self) -> &SqlValue {
        &self.ineffective
    }

    pub fn marker(&self) -> Option<&RandomMarker> {
        self.marker.as_ref()
    }

    /// Value written when a row is soft deleted.
    pub fn deleted_value(&self) -> SqlValue {
        match &self.marker {
            Some(marker) => SqlValue::Int(marker.generate()),
            None => self.ineffective.clone(),
        }
    }

    fn is_ineffective(&self, value: &SqlValue) -> bool {
        if *value == self.ineffective {
            return true;
        }
        match (value.as_i64(), self.ineffective.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Rewrite every `flag <op> ineffective` comparison into a range test.
    ///
    /// Only active with a random marker. Returns the number of conditions
    /// rewritten.
    pub fn rewrite_where(&self, filter: &mut DbWhere) -> usize {
        let Some(marker) = self.marker else {
            return 0;
        };
        let mut rewritten = 0;
        filter.for_each_condition_mut(|cond| {
            if cond.field != self.field || cond.values.len() != 1 || !self.is_ineffective(&cond.values[0]) {
                return;
            }
            if let Some((op, bound)) = marker.rewrite(cond.op) {
                *cond = Condition::new(cond.field.clone(), op, vec![SqlValue::Int(bound)]);
                rewritten += 1;
            }
        });
        rewritten
    }

    fn fill_where(&self, mapping: &dyn TableMapping, filter: &mut DbWhere) {
        if !self.supports(mapping) {
            return;
        }
        if filter.contains_field(&self.field) {
            self.rewrite_where(filter);
        } else {
            filter.push(Condition::eq(self.field.clone(), self.effective.clone()));
        }
    }
}

impl LogicalDeleteFill for LogicalDeleteStrategy {
    fn supports(&self, mapping: &dyn TableMapping) -> bool {
        mapping.contains_field(&self.field)
    }

    fn fill_query_where(&self, mapping: &dyn TableMapping, filter: &mut DbWhere) {
        self.fill_where(mapping, filter);
    }

    fn fill_create(&self, mapping: &dyn TableMapping, entity: &mut Entity) {
        if !self.supports(mapping) {
            return;
        }
        match entity.get_mut(&self.field) {
            None => {
                entity.insert(self.field.clone(), self.effective.clone());
            }
            Some(value) => {
                if let Some(marker) = self.marker {
                    if self.is_ineffective(value) {
                        *value = SqlValue::Int(marker.generate());
                    }
                }
            }
        }
    }

    fn fill_logical_delete(&self, mapping: &dyn TableMapping, update: &mut DbUpdate) {
        if !self.supports(mapping) {
            return;
        }
        update.put(UpdateItem::Set {
            field: self.field.clone(),
            value: self.deleted_value(),
        });
    }
}
