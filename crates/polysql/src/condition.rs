//! Structured WHERE conditions, SET clauses, and ORDER BY.
//!
//! These types name *fields*, not columns. [`FragmentBuilder`](crate::FragmentBuilder)
//! resolves fields through a [`TableMapping`](crate::TableMapping) and renders the
//! dialect-specific SQL.

use crate::value::SqlValue;
use std::collections::BTreeMap;

/// One row's field values.
pub type Entity = BTreeMap<String, SqlValue>;

/// Comparison operator for a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `field = value`
    Eq,
    /// `field != value`
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `field IN (values...)`
    In,
    NotIn,
    /// Contains: `field LIKE '%' || value || '%'`
    Like,
    NotLike,
    /// `field LIKE value || '%'`
    Starts,
    /// `field LIKE '%' || value`
    Ends,
    IsNull,
    IsNotNull,
    /// `field BETWEEN a AND b`
    Between,
}

impl Operator {
    /// SQL symbol for simple binary comparisons.
    pub fn comparison_symbol(self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("="),
            Operator::Ne => Some("!="),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Ge => Some(">="),
            _ => None,
        }
    }

    /// Number of values the operator binds; `None` means "a list".
    pub fn arity(self) -> Option<usize> {
        match self {
            Operator::IsNull | Operator::IsNotNull => Some(0),
            Operator::Between => Some(2),
            Operator::In | Operator::NotIn => None,
            _ => Some(1),
        }
    }
}

/// `field <op> values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub values: Vec<SqlValue>,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, values: Vec<SqlValue>) -> Self {
        Self {
            field: field.into(),
            op,
            values,
        }
    }

    fn single(field: impl Into<String>, op: Operator, value: impl Into<SqlValue>) -> Self {
        Self::new(field, op, vec![value.into()])
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Ge, value)
    }

    pub fn like(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Like, value)
    }

    pub fn not_like(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::NotLike, value)
    }

    pub fn starts(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Starts, value)
    }

    pub fn ends(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::single(field, Operator::Ends, value)
    }

    pub fn in_list<T: Into<SqlValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::new(field, Operator::In, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<T: Into<SqlValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::new(field, Operator::NotIn, values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Vec::new())
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, Vec::new())
    }

    pub fn between(
        field: impl Into<String>,
        from: impl Into<SqlValue>,
        to: impl Into<SqlValue>,
    ) -> Self {
        Self::new(field, Operator::Between, vec![from.into(), to.into()])
    }
}

/// A boolean expression tree over [`Condition`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereExpr {
    Atom(Condition),
    And(Vec<WhereExpr>),
    Or(Vec<WhereExpr>),
    Not(Box<WhereExpr>),
}

impl WhereExpr {
    pub fn or(exprs: Vec<WhereExpr>) -> Self {
        WhereExpr::Or(exprs)
    }

    pub fn and(exprs: Vec<WhereExpr>) -> Self {
        WhereExpr::And(exprs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: WhereExpr) -> Self {
        WhereExpr::Not(Box::new(expr))
    }

    fn contains_field(&self, field: &str) -> bool {
        match self {
            WhereExpr::Atom(c) => c.field == field,
            WhereExpr::And(exprs) | WhereExpr::Or(exprs) => {
                exprs.iter().any(|e| e.contains_field(field))
            }
            WhereExpr::Not(e) => e.contains_field(field),
        }
    }

    fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Condition)) {
        match self {
            WhereExpr::Atom(c) => f(c),
            WhereExpr::And(exprs) | WhereExpr::Or(exprs) => {
                for e in exprs {
                    e.visit_mut(f);
                }
            }
            WhereExpr::Not(e) => e.visit_mut(f),
        }
    }
}

impl From<Condition> for WhereExpr {
    fn from(cond: Condition) -> Self {
        WhereExpr::Atom(cond)
    }
}

/// A WHERE clause: expressions joined by AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbWhere {
    exprs: Vec<WhereExpr>,
}

impl DbWhere {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition (builder style).
    pub fn and(mut self, expr: impl Into<WhereExpr>) -> Self {
        self.exprs.push(expr.into());
        self
    }

    pub fn push(&mut self, expr: impl Into<WhereExpr>) -> &mut Self {
        self.exprs.push(expr.into());
        self
    }

    pub fn exprs(&self) -> &[WhereExpr] {
        &self.exprs
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// `true` when any condition, at any nesting depth, names `field`.
    pub fn contains_field(&self, field: &str) -> bool {
        self.exprs.iter().any(|e| e.contains_field(field))
    }

    /// Visit every condition, at any nesting depth.
    pub fn for_each_condition_mut(&mut self, mut f: impl FnMut(&mut Condition)) {
        for e in &mut self.exprs {
            e.visit_mut(&mut f);
        }
    }
}

impl From<Condition> for DbWhere {
    fn from(cond: Condition) -> Self {
        DbWhere::new().and(cond)
    }
}

/// One assignment in a SET clause.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateItem {
    /// `COL = value`
    Set { field: String, value: SqlValue },
    /// `COL = COL + delta`
    Add { field: String, delta: SqlValue },
    /// `COL = NULL`
    ToNull { field: String },
    /// `COL = <raw expression>`, e.g. the dialect's current timestamp.
    Raw { field: String, expr: String },
}

impl UpdateItem {
    pub fn field(&self) -> &str {
        match self {
            UpdateItem::Set { field, .. }
            | UpdateItem::Add { field, .. }
            | UpdateItem::ToNull { field }
            | UpdateItem::Raw { field, .. } => field,
        }
    }
}

/// A SET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbUpdate {
    items: Vec<UpdateItem>,
}

impl DbUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.put(UpdateItem::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn add(mut self, field: impl Into<String>, delta: impl Into<SqlValue>) -> Self {
        self.put(UpdateItem::Add {
            field: field.into(),
            delta: delta.into(),
        });
        self
    }

    pub fn to_null(mut self, field: impl Into<String>) -> Self {
        self.put(UpdateItem::ToNull {
            field: field.into(),
        });
        self
    }

    pub fn raw(mut self, field: impl Into<String>, expr: impl Into<String>) -> Self {
        self.put(UpdateItem::Raw {
            field: field.into(),
            expr: expr.into(),
        });
        self
    }

    /// Add or replace the assignment for the item's field.
    pub fn put(&mut self, item: UpdateItem) -> &mut Self {
        match self.items.iter_mut().find(|i| i.field() == item.field()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        self
    }

    pub fn items(&self) -> &[UpdateItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.items.iter().any(|i| i.field() == field)
    }

    /// `SET` every field of `entity`, except `skip` (usually the primary key).
    pub fn from_entity(entity: &Entity, skip: Option<&str>) -> Self {
        let mut update = Self::new();
        for (field, value) in entity {
            if Some(field.as_str()) != skip {
                update.put(UpdateItem::Set {
                    field: field.clone(),
                    value: value.clone(),
                });
            }
        }
        update
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub field: String,
    pub dir: SortDir,
    /// Sort by the dialect's human-name collation.
    pub by_name: bool,
}

/// ORDER BY clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    items: Vec<OrderItem>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.add(field, SortDir::Asc, false)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.add(field, SortDir::Desc, false)
    }

    /// Order by a human-readable name column using the dialect's collation.
    pub fn by_name(self, field: impl Into<String>, dir: SortDir) -> Self {
        self.add(field, dir, true)
    }

    fn add(mut self, field: impl Into<String>, dir: SortDir, by_name: bool) -> Self {
        self.items.push(OrderItem {
            field: field.into(),
            dir,
            by_name,
        });
        self
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
