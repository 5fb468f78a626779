use super::{BatchInput, BatchInsertStrategy, BatchStatements, BatchStrategy};
use crate::error::OrmResult;
use crate::fragment::FragmentBuilder;
use crate::mapping::FieldScene;
use crate::sql::SqlBuffer;
use crate::version::{DbType, DbVersion};

/// `INSERT INTO T(cols)` shared by every insert shape.
fn insert_head(batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<SqlBuffer> {
    let mut sql = SqlBuffer::of("INSERT INTO");
    sql.append(helper.table()).push("(");
    sql.append_buffer(helper.columns(&batch.fields, FieldScene::Insert)?);
    sql.push(")");
    Ok(sql)
}

/// `INSERT INTO T(cols) VALUES (...), (...), ...`
///
/// MySQL/MariaDB, PostgreSQL 8.2+, SQLite 3.7+ and H2.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiRowValuesInsert;

impl BatchStrategy for MultiRowValuesInsert {
    fn name(&self) -> &'static str {
        "multi_row_values"
    }

    fn supports(&self, version: &DbVersion) -> bool {
        match version.db_type {
            DbType::MySql | DbType::MariaDb | DbType::H2 => true,
            DbType::PostgreSql => version.at_least(8, 2),
            DbType::Sqlite => version.at_least(3, 7),
            _ => false,
        }
    }
}

impl BatchInsertStrategy for MultiRowValuesInsert {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let mut sql = insert_head(batch, helper)?;
        sql.append("VALUES");
        for (i, row) in batch.rows.iter().enumerate() {
            sql.mark_row(i);
            if i > 0 {
                sql.push(",");
            }
            sql.push("\n\t(");
            sql.append_buffer(helper.values(&row.entity, &batch.fields));
            sql.push(")");
        }
        sql.mark_rows_end();
        Ok(BatchStatements::One(sql))
    }
}

/// `INSERT INTO T(cols) SELECT ... FROM DUAL UNION ALL SELECT ... FROM DUAL`
///
/// Oracle has no multi-row VALUES.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionAllDualInsert;

impl BatchStrategy for UnionAllDualInsert {
    fn name(&self) -> &'static str {
        "union_all_dual"
    }

    fn supports(&self, version: &DbVersion) -> bool {
        version.db_type == DbType::Oracle
    }
}

impl BatchInsertStrategy for UnionAllDualInsert {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let mut sql = insert_head(batch, helper)?;
        for (i, row) in batch.rows.iter().enumerate() {
            sql.mark_row(i);
            sql.push(if i == 0 { "\nSELECT " } else { "\nUNION ALL SELECT " });
            sql.append_buffer(helper.values(&row.entity, &batch.fields));
            sql.append("FROM DUAL");
        }
        sql.mark_rows_end();
        Ok(BatchStatements::One(sql))
    }
}

/// One INSERT per row, joined by `;` and sent as a single batch.
///
/// Requires the connection to allow multiple statements per call
/// (`allowMultiQueries` and friends). That cannot be detected from the
/// server version, so it is enabled only by configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiStatementInsert {
    enabled: bool,
}

impl MultiStatementInsert {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl BatchStrategy for MultiStatementInsert {
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

impl BatchInsertStrategy for MultiStatementInsert {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let head = insert_head(batch, helper)?;
        let mut sql = SqlBuffer::new();
        for (i, row) in batch.rows.iter().enumerate() {
            sql.mark_row(i);
            if i > 0 {
                sql.push(";\n");
            }
            sql.append_buffer_ref(&head);
            sql.push(" VALUES(");
            sql.append_buffer(helper.values(&row.entity, &batch.fields));
            sql.push(")");
        }
        sql.mark_rows_end();
        Ok(BatchStatements::One(sql))
    }
}

/// One statement per row. Always supported; the registry's last resort.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerRowInsert;

impl BatchStrategy for PerRowInsert {
    fn name(&self) -> &'static str {
        "per_row"
    }

    fn supports(&self, _version: &DbVersion) -> bool {
        true
    }
}

impl BatchInsertStrategy for PerRowInsert {
    fn build(&self, batch: &BatchInput<'_>, helper: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
        let head = insert_head(batch, helper)?;
        let statements = batch
            .rows
            .iter()
            .map(|row| {
                let mut sql = head.clone();
                sql.push(" VALUES(");
                sql.append_buffer(helper.values(&row.entity, &batch.fields));
                sql.push(")");
                sql
            })
            .collect();
        Ok(BatchStatements::PerRow(statements))
    }
}
