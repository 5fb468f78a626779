//! Column lists, VALUES tuples, WHERE and SET fragments for one table.

use crate::condition::{
    Condition, DbUpdate, DbWhere, Entity, Operator, OrderBy, UpdateItem, WhereExpr,
};
use crate::dialect::{MatchMode, SqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{FieldScene, TableMapping};
use crate::sql::SqlBuffer;
use crate::value::SqlValue;

/// Renders fragments for one table in one dialect.
///
/// Every field is resolved through the mapping; a field the mapping does not
/// know (or hides in the relevant scene) is an [`OrmError::UnsupportedField`].
#[derive(Debug, Clone, Copy)]
pub struct FragmentBuilder<'a> {
    mapping: &'a dyn TableMapping,
    dialect: &'a dyn SqlDialect,
}

impl<'a> FragmentBuilder<'a> {
    pub fn new(mapping: &'a dyn TableMapping, dialect: &'a dyn SqlDialect) -> Self {
        Self { mapping, dialect }
    }

    pub fn mapping(&self) -> &'a dyn TableMapping {
        self.mapping
    }

    pub fn dialect(&self) -> &'a dyn SqlDialect {
        self.dialect
    }

    pub fn table(&self) -> &'a str {
        self.mapping.table_name()
    }

    /// Column for `field` in `scene`.
    pub fn column(&self, field: &str, scene: FieldScene) -> OrmResult<&'a str> {
        let column = self.mapping.column_of(field)?;
        if !self.mapping.fields(scene).contains(&field) {
            return Err(OrmError::unsupported_field(self.table(), field));
        }
        Ok(column)
    }

    /// `(field, column)` of the primary key.
    pub fn primary_key(&self) -> OrmResult<(&'a str, &'a str)> {
        self.mapping.primary_key_column()
    }

    // ==================== Column lists and VALUES ====================

    /// `ID, USER_NAME, ...` for every field visible in SELECT.
    pub fn select_columns(&self) -> SqlBuffer {
        let mut buffer = SqlBuffer::new();
        for (i, field) in self.mapping.fields(FieldScene::Select).into_iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            if let Some(column) = self.mapping.column_name(field) {
                buffer.push(column);
            }
        }
        buffer
    }

    /// `ID, USER_NAME, ...` for the given fields.
    pub fn columns(&self, fields: &[&str], scene: FieldScene) -> OrmResult<SqlBuffer> {
        let mut buffer = SqlBuffer::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            buffer.push(self.column(field, scene)?);
        }
        Ok(buffer)
    }

    /// `:$1$id, :$2$userName, ...` for one row; absent fields bind NULL.
    pub fn values(&self, entity: &Entity, fields: &[&str]) -> SqlBuffer {
        let mut buffer = SqlBuffer::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            let value = entity.get(*field).cloned().unwrap_or(SqlValue::Null);
            buffer.add_named_variable(field, value);
        }
        buffer
    }

    /// Fields of `entity` in mapping declaration order, validated for `scene`.
    pub fn entity_fields(&self, entity: &Entity, scene: FieldScene) -> OrmResult<Vec<&'a str>> {
        self.union_fields(std::iter::once(entity), scene)
    }

    /// Union of the fields present in any row, in mapping declaration order.
    pub fn union_fields<'e>(
        &self,
        entities: impl IntoIterator<Item = &'e Entity>,
        scene: FieldScene,
    ) -> OrmResult<Vec<&'a str>> {
        let visible = self.mapping.fields(scene);
        let mut present = vec![false; visible.len()];
        for entity in entities {
            for field in entity.keys() {
                let Some(pos) = visible.iter().position(|f| *f == field.as_str()) else {
                    return Err(OrmError::unsupported_field(self.table(), field.as_str()));
                };
                present[pos] = true;
            }
        }
        Ok(visible
            .into_iter()
            .zip(present)
            .filter_map(|(f, p)| p.then_some(f))
            .collect())
    }

    // ==================== WHERE ====================

    /// Conditions joined by AND, without the `WHERE` keyword.
    pub fn where_clause(&self, filter: &DbWhere) -> OrmResult<SqlBuffer> {
        let mut buffer = SqlBuffer::new();
        for (i, expr) in filter.exprs().iter().enumerate() {
            if i > 0 {
                buffer.append("AND").push(" ");
            }
            self.append_expr(&mut buffer, expr, filter.exprs().len() > 1)?;
        }
        Ok(buffer)
    }

    fn append_expr(&self, buffer: &mut SqlBuffer, expr: &WhereExpr, nested: bool) -> OrmResult<()> {
        match expr {
            WhereExpr::Atom(cond) => self.append_condition(buffer, cond),
            WhereExpr::And(exprs) => self.append_group(buffer, exprs, "AND", "1=1", nested),
            WhereExpr::Or(exprs) => self.append_group(buffer, exprs, "OR", "1=0", nested),
            WhereExpr::Not(inner) => {
                buffer.append("NOT (");
                self.append_expr(buffer, inner, false)?;
                buffer.push(")");
                Ok(())
            }
        }
    }

    fn append_group(
        &self,
        buffer: &mut SqlBuffer,
        exprs: &[WhereExpr],
        joiner: &str,
        empty: &str,
        nested: bool,
    ) -> OrmResult<()> {
        match exprs {
            [] => {
                buffer.append(empty);
            }
            [only] => self.append_expr(buffer, only, nested)?,
            _ => {
                if nested {
                    buffer.append("(");
                }
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        buffer.append(joiner).push(" ");
                    }
                    self.append_expr(buffer, e, true)?;
                }
                if nested {
                    buffer.push(")");
                }
            }
        }
        Ok(())
    }

    /// Append one condition, e.g. `DEPT_CODE=:$1$deptCode`.
    pub fn append_condition(&self, buffer: &mut SqlBuffer, cond: &Condition) -> OrmResult<()> {
        let column = self.column(&cond.field, FieldScene::Where)?;
        check_arity(cond)?;
        let field = cond.field.as_str();
        let values = &cond.values;

        match cond.op {
            Operator::Eq if values[0].is_null() => {
                buffer.append(column).append("IS NULL");
            }
            Operator::Ne if values[0].is_null() => {
                buffer.append(column).append("IS NOT NULL");
            }
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                let symbol = cond.op.comparison_symbol().unwrap_or("=");
                buffer.append(column).push(symbol);
                buffer.add_named_variable(field, values[0].clone());
            }
            Operator::In | Operator::NotIn => {
                let keyword = if cond.op == Operator::In { "IN (" } else { "NOT IN (" };
                buffer.append(column).append(keyword);
                buffer.add_variables(values.iter().cloned()).push(")");
            }
            Operator::Like | Operator::NotLike | Operator::Starts | Operator::Ends => {
                let (keyword, mode) = match cond.op {
                    Operator::NotLike => ("NOT LIKE", MatchMode::Contains),
                    Operator::Starts => ("LIKE", MatchMode::Starts),
                    Operator::Ends => ("LIKE", MatchMode::Ends),
                    _ => ("LIKE", MatchMode::Contains),
                };
                buffer.append(column).append(keyword);
                self.dialect
                    .append_like_operand(buffer, values[0].clone(), mode);
            }
            Operator::IsNull => {
                buffer.append(column).append("IS NULL");
            }
            Operator::IsNotNull => {
                buffer.append(column).append("IS NOT NULL");
            }
            Operator::Between => {
                buffer.append(column).append("BETWEEN");
                buffer.add_variable(values[0].clone());
                buffer.append("AND").add_variable(values[1].clone());
            }
        }
        Ok(())
    }

    // ==================== SET / ORDER BY ====================

    /// `COL=:$1$field, COL2=COL2+:$2$other, ...`, without the `SET` keyword.
    pub fn set_clause(&self, update: &DbUpdate) -> OrmResult<SqlBuffer> {
        if update.is_empty() {
            return Err(OrmError::validation(format!(
                "update of {} has nothing to set",
                self.table()
            )));
        }
        let mut buffer = SqlBuffer::new();
        for (i, item) in update.items().iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            let column = self.column(item.field(), FieldScene::Update)?;
            buffer.append(column).push("=");
            match item {
                UpdateItem::Set { field, value } => {
                    buffer.add_named_variable(field, value.clone());
                }
                UpdateItem::Add { field, delta } => {
                    buffer.push(column).push("+").add_named_variable(field, delta.clone());
                }
                UpdateItem::ToNull { .. } => {
                    buffer.push("NULL");
                }
                UpdateItem::Raw { expr, .. } => {
                    buffer.add_raw(expr);
                }
            }
        }
        Ok(buffer)
    }

    /// `ID DESC, CONVERT(NAME USING GBK) ASC`, without the `ORDER BY` keyword.
    pub fn order_by(&self, order: &OrderBy) -> OrmResult<SqlBuffer> {
        let mut buffer = SqlBuffer::new();
        for (i, item) in order.items().iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            let column = self.column(&item.field, FieldScene::Select)?;
            if item.by_name {
                buffer.append(&self.dialect.collate_for_name(column));
            } else {
                buffer.append(column);
            }
            buffer.append(item.dir.to_sql());
        }
        Ok(buffer)
    }

    // ==================== Statements ====================

    /// `SELECT cols\nFROM T\nWHERE ...\nORDER BY ...`
    pub fn select(&self, filter: &DbWhere, order: &OrderBy) -> OrmResult<SqlBuffer> {
        let mut sql = SqlBuffer::of("SELECT");
        sql.append_buffer(self.select_columns());
        sql.append("\nFROM").append(self.table());
        self.append_where(&mut sql, filter)?;
        if !order.is_empty() {
            sql.append("\nORDER BY").append_buffer(self.order_by(order)?);
        }
        Ok(sql)
    }

    /// `INSERT INTO T(cols) VALUES(...)` for one row.
    pub fn insert(&self, entity: &Entity) -> OrmResult<SqlBuffer> {
        let fields = self.entity_fields(entity, FieldScene::Insert)?;
        if fields.is_empty() {
            return Err(OrmError::validation(format!(
                "insert into {} has no fields",
                self.table()
            )));
        }
        let mut sql = SqlBuffer::of("INSERT INTO");
        sql.append(self.table()).push("(");
        sql.append_buffer(self.columns(&fields, FieldScene::Insert)?);
        sql.push(") VALUES(");
        sql.append_buffer(self.values(entity, &fields));
        sql.push(")");
        Ok(sql)
    }

    /// `UPDATE T SET ...\nWHERE ...`
    pub fn update(&self, update: &DbUpdate, filter: &DbWhere) -> OrmResult<SqlBuffer> {
        let mut sql = SqlBuffer::of("UPDATE");
        sql.append(self.table()).append("SET");
        sql.append_buffer(self.set_clause(update)?);
        self.append_where(&mut sql, filter)?;
        Ok(sql)
    }

    /// `DELETE FROM T\nWHERE ...`
    pub fn delete(&self, filter: &DbWhere) -> OrmResult<SqlBuffer> {
        let mut sql = SqlBuffer::of("DELETE FROM");
        sql.append(self.table());
        self.append_where(&mut sql, filter)?;
        Ok(sql)
    }

    fn append_where(&self, sql: &mut SqlBuffer, filter: &DbWhere) -> OrmResult<()> {
        if !filter.is_empty() {
            sql.append("\nWHERE").append_buffer(self.where_clause(filter)?);
        }
        Ok(())
    }
}

fn check_arity(cond: &Condition) -> OrmResult<()> {
    let ok = match cond.op.arity() {
        Some(n) => cond.values.len() == n,
        None => true,
    };
    if ok {
        Ok(())
    } else {
        Err(OrmError::validation(format!(
            "{:?} on '{}' takes {} value(s), got {}",
            cond.op,
            cond.field,
            cond.op.arity().unwrap_or(0),
            cond.values.len()
        )))
    }
}
