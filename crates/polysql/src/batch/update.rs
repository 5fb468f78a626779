use super::{BatchInput, BatchStatements, BatchStrategy, BatchUpdateStrategy, PkEntity};
use crate::condition::{Condition, DbUpdate, DbWhere, UpdateItem};
use crate::error::OrmResult;
use crate::fragment::FragmentBuilder;
use crate::mapping::FieldScene;
use crate::sql::SqlBuffer;
use crate::value::SqlValue;
use crate::version::{DbType, DbVersion};

fn update_columns<'a>(batch: &BatchInput<'_>, helper: &FragmentBuilder<'a>) -> OrmResult<Vec<&'a str>> {
    batch
        .fields
        .iter()
        .map(|f| helper.column(f, FieldScene::Update))
        .collect()
}

/// `UPDATE T SET ... WHERE PK=:key` for the fields this row carries.
///
/// Fields absent from the row are left out so they keep their current value.
/// SET order follows `batch.fields`, so every strategy emits columns in
/// mapping order.
fn row_update(batch: &BatchInput<'_>, row: &PkEntity, helper: &FragmentBuilder<'_>) -> OrmResult<Option<SqlBuffer>> {
    let mut update = DbUpdate::new();
    for field in &batch.fields {
        if let Some(value) = row.entity.get(*field) {
            update.put(UpdateItem::Set {
                field: field.to_string(),
                value: value.clone(),
            });
        }
    }
    if update.is_empty() {
        return Ok(None);
    }
    let filter = DbWhere::from(Condition::eq(batch.pk_field, row.primary_key.clone()));
    helper.update(&update, &filter).map(Some)
}

/// `UPDATE T A JOIN (SELECT ... UNION SELECT ...) B USING(PK) SET A.X=B.X, ...`
///
/// MySQL/MariaDB only. A column missing from some rows is set with
/// `COALESCE(B.X, A.X)`, so in such a column an explicit NULL also keeps the
/// current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinUsingUpdate;

impl BatchStrategy for JoinUsingUpdate {
    fn name(&self) -> &'static str {
        "join_using"
    }

    fn supports(&self, version: &DbVersion) -> bool {
        version.db_type.is_mysql_family()
    }
}

impl BatchUpdateStrategy for JoinUsingUpdate {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let columns = update_columns(batch, helper)?;

        let mut sql = SqlBuffer::of("UPDATE");
        sql.append(helper.table()).append("A JOIN (");
        for (i, row) in batch.rows.iter().enumerate() {
            sql.mark_row(i);
            sql.push(if i == 0 { "\n\tSELECT " } else { "\n\tUNION SELECT " });
            sql.add_named_variable(batch.pk_field, row.primary_key.clone());
            if i == 0 {
                sql.append("AS").append(batch.pk_column);
            }
            for (field, column) in batch.fields.iter().zip(&columns) {
                let value = row.entity.get(*field).cloned().unwrap_or(SqlValue::Null);
                sql.push(", ").add_named_variable(field, value);
                if i == 0 {
                    sql.append("AS").append(column);
                }
            }
        }
        sql.mark_rows_end();

        sql.push("\n) B USING(").push(batch.pk_column).push(")\nSET ");
        for (i, (field, column)) in batch.fields.iter().zip(&columns).enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            if batch.is_uniform(field) {
                sql.push(&format!("A.{column}=B.{column}"));
            } else {
                sql.push(&format!("A.{column}=COALESCE(B.{column}, A.{column})"));
            }
        }
        Ok(BatchStatements::One(sql))
    }
}

/// `UPDATE T SET X=(CASE PK WHEN k1 THEN v1 ... ELSE X END), ... WHERE PK IN (...)`
///
/// Portable across Oracle, MySQL/MariaDB and DB2. Rows missing a field get no
/// `WHEN` arm for it and fall through to `ELSE X`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseWhenUpdate;

impl BatchStrategy for CaseWhenUpdate {
    fn name(&self) -> &'static str {
        "case_when"
    }

    fn supports(&self, version: &DbVersion) -> bool {
        matches!(
            version.db_type,
            DbType::Oracle | DbType::MySql | DbType::MariaDb | DbType::Db2
        )
    }
}

impl BatchUpdateStrategy for CaseWhenUpdate {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let columns = update_columns(batch, helper)?;

        let mut sql = SqlBuffer::of("UPDATE");
        sql.append(helper.table()).append("SET");
        for (i, (field, column)) in batch.fields.iter().zip(&columns).enumerate() {
            if i > 0 {
                sql.push(",");
            }
            sql.push("\n\t")
                .push(column)
                .push("=(CASE ")
                .push(batch.pk_column);
            let mut arm = 0;
            for row in &batch.rows {
                let Some(value) = row.entity.get(*field) else {
                    continue;
                };
                sql.mark_row(arm);
                arm += 1;
                sql.push("\n\t\tWHEN ")
                    .add_named_variable(batch.pk_field, row.primary_key.clone())
                    .append("THEN")
                    .add_named_variable(field, value.clone());
            }
            sql.mark_rows_end();
            sql.push("\n\t\tELSE ").push(column).push(" END)");
        }

        sql.push("\nWHERE ").push(batch.pk_column).push(" IN (");
        for (i, row) in batch.rows.iter().enumerate() {
            sql.mark_row(i);
            if i > 0 {
                sql.push(",");
            }
            sql.push("\n\t")
                .add_named_variable(batch.pk_field, row.primary_key.clone());
        }
        sql.mark_rows_end();
        sql.push("\n)");
        Ok(BatchStatements::One(sql))
    }
}

/// One UPDATE per row, joined by `;` and sent as a single batch.
///
/// Same precondition as [`MultiStatementInsert`](super::MultiStatementInsert).
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiStatementUpdate {
    enabled: bool,
}

impl MultiStatementUpdate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl BatchStrategy for MultiStatementUpdate {
    fn name(&self) -> &'static str {
        "multi_statement"
    }

    fn supports(&self, version: &DbVersion) -> bool {
        version.db_type.is_mysql_family()
    }

    fn precondition(&self) -> bool {
        self.enabled
    }
}

impl BatchUpdateStrategy for MultiStatementUpdate {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let mut sql = SqlBuffer::new();
        let mut n = 0;
        for row in &batch.rows {
            let Some(statement) = row_update(batch, row, helper)? else {
                continue;
            };
            sql.mark_row(n);
            if n > 0 {
                sql.push(";\n");
            }
            sql.append_buffer(statement);
            n += 1;
        }
        sql.mark_rows_end();
        Ok(BatchStatements::One(sql))
    }
}

/// One statement per row. Always supported; the registry's last resort.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerRowUpdate;

impl BatchStrategy for PerRowUpdate {
    fn name(&self) -> &'static str {
        "per_row"
    }

    fn supports(&self, _version: &DbVersion) -> bool {
        true
    }
}

impl BatchUpdateStrategy for PerRowUpdate {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let mut statements = Vec::with_capacity(batch.len());
        for row in &batch.rows {
            if let Some(statement) = row_update(batch, row, helper)? {
                statements.push(statement);
            }
        }
        Ok(BatchStatements::PerRow(statements))
    }
}
