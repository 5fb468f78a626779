//! Thin CRUD orchestration.
//!
//! [`DaoContext`] is built once from [`PolysqlConfig`] and shared; a [`Dao`]
//! binds it to one gateway and one table for the duration of a call site.
//!
//! ```ignore
//! let ctx = DaoContext::new(&PolysqlConfig::load("polysql.toml")?)?;
//! let gateway = PgGateway::connect(&url).await?;
//! let users = Dao::new(&gateway, &ctx, &USERS);
//!
//! users.insert_batch(rows).await?;
//! let page = users
//!     .page(DbWhere::from(Condition::eq("deptCode", "D01")), OrderBy::new().desc("id"), Paging::page(2, 20)?)
//!     .await?;
//! ```

use crate::batch::{BatchStatements, InsertRegistry, PkEntity, UpdateRegistry};
use crate::condition::{DbUpdate, DbWhere, Entity, OrderBy};
use crate::config::{PolysqlConfig, UnaffectedPolicy};
use crate::count::CountSqlDeriver;
use crate::dialect::{DialectRegistry, Paging, SqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::fragment::FragmentBuilder;
use crate::gateway::SqlGateway;
use crate::logging::SqlLogger;
use crate::logical_delete::{LogicalDeleteFill, LogicalDeleteStrategy, NoLogicalDelete};
use crate::mapping::TableMapping;
use crate::sql::{NamedSql, SqlBuffer};
use std::sync::Arc;

/// Long-lived, read-only state shared by every [`Dao`].
#[derive(Debug)]
pub struct DaoContext {
    dialects: DialectRegistry,
    inserts: InsertRegistry,
    updates: UpdateRegistry,
    counts: CountSqlDeriver,
    logical_delete: Arc<dyn LogicalDeleteFill>,
    unaffected: UnaffectedPolicy,
    logger: SqlLogger,
}

impl DaoContext {
    pub fn new(config: &PolysqlConfig) -> OrmResult<Self> {
        config.validate()?;
        let logical_delete: Arc<dyn LogicalDeleteFill> = match &config.logical_delete {
            Some(ld) => Arc::new(LogicalDeleteStrategy::from_config(ld)?),
            None => Arc::new(NoLogicalDelete),
        };
        Ok(Self {
            dialects: DialectRegistry::new(),
            inserts: InsertRegistry::with_defaults(&config.batch)?,
            updates: UpdateRegistry::with_defaults(&config.batch)?,
            counts: CountSqlDeriver::new(),
            logical_delete,
            unaffected: config.unaffected,
            logger: SqlLogger::from_config(&config.sql_log, config.batch.omit),
        })
    }

    /// Replace the logical-delete fills, e.g. with a custom [`LogicalDeleteFill`].
    pub fn with_logical_delete(mut self, fill: Arc<dyn LogicalDeleteFill>) -> Self {
        self.logical_delete = fill;
        self
    }

    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Register custom insert strategies before sharing the context.
    pub fn inserts_mut(&mut self) -> &mut InsertRegistry {
        &mut self.inserts
    }

    pub fn updates_mut(&mut self) -> &mut UpdateRegistry {
        &mut self.updates
    }

    pub fn dialects(&self) -> &DialectRegistry {
        &self.dialects
    }

    pub fn counts(&self) -> &CountSqlDeriver {
        &self.counts
    }
}

/// One page of rows plus the total row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Entity>,
    pub total: i64,
    pub paging: Paging,
}

/// CRUD for one table over one gateway.
#[derive(Debug, Clone, Copy)]
pub struct Dao<'a, G> {
    gateway: &'a G,
    ctx: &'a DaoContext,
    mapping: &'a dyn TableMapping,
}

impl<'a, G: SqlGateway> Dao<'a, G> {
    pub fn new(gateway: &'a G, ctx: &'a DaoContext, mapping: &'a dyn TableMapping) -> Self {
        Self {
            gateway,
            ctx,
            mapping,
        }
    }

    async fn dialect(&self) -> OrmResult<Arc<dyn SqlDialect>> {
        let version = self.gateway.db_version().await?;
        self.ctx.dialects.resolve(&version)
    }

    fn fill(&self) -> &dyn LogicalDeleteFill {
        &*self.ctx.logical_delete
    }

    async fn execute(&self, sql: &SqlBuffer, dialect: &dyn SqlDialect, tag: &str) -> OrmResult<u64> {
        self.ctx.logger.log(sql, dialect, Some(tag));
        self.gateway.execute(&sql.render_named()).await
    }

    async fn execute_batch(
        &self,
        statements: BatchStatements,
        dialect: &dyn SqlDialect,
        tag: &str,
    ) -> OrmResult<u64> {
        let named: Vec<NamedSql> = statements
            .statements()
            .iter()
            .map(|sql| {
                self.ctx.logger.log(sql, dialect, Some(tag));
                sql.render_named()
            })
            .collect();
        self.gateway.execute_all(&named).await
    }

    fn check_affected(&self, affected: u64, operation: &str) -> OrmResult<u64> {
        if affected > 0 {
            return Ok(affected);
        }
        match self.ctx.unaffected {
            UnaffectedPolicy::Error => Err(OrmError::zero_rows(self.mapping.table_name(), operation)),
            UnaffectedPolicy::Ignore => {
                tracing::debug!(
                    target: "polysql.dao",
                    table = self.mapping.table_name(),
                    operation,
                    "no rows affected"
                );
                Ok(0)
            }
        }
    }

    fn require_filter(&self, filter: &DbWhere, operation: &str) -> OrmResult<()> {
        if filter.is_empty() {
            return Err(OrmError::validation(format!(
                "{operation} on {} without a WHERE condition",
                self.mapping.table_name()
            )));
        }
        Ok(())
    }

    pub async fn insert(&self, mut entity: Entity) -> OrmResult<u64> {
        let dialect = self.dialect().await?;
        self.fill().fill_create(self.mapping, &mut entity);
        let sql = FragmentBuilder::new(self.mapping, &*dialect).insert(&entity)?;
        self.execute(&sql, &*dialect, "insert").await
    }

    /// Insert rows whose primary keys were generated by the caller.
    pub async fn insert_batch(&self, mut rows: Vec<PkEntity>) -> OrmResult<u64> {
        let version = self.gateway.db_version().await?;
        let dialect = self.ctx.dialects.resolve(&version)?;
        for row in &mut rows {
            self.fill().fill_create(self.mapping, &mut row.entity);
        }
        let statements = {
            let helper = FragmentBuilder::new(self.mapping, &*dialect);
            self.ctx.inserts.build(&version, &rows, &helper)?
        };
        self.execute_batch(statements, &*dialect, "insert_batch").await
    }

    pub async fn update(&self, update: DbUpdate, mut filter: DbWhere) -> OrmResult<u64> {
        self.require_filter(&filter, "update")?;
        let dialect = self.dialect().await?;
        self.fill().fill_update_where(self.mapping, &mut filter);
        let sql = FragmentBuilder::new(self.mapping, &*dialect).update(&update, &filter)?;
        let affected = self.execute(&sql, &*dialect, "update").await?;
        self.check_affected(affected, "update")
    }

    /// Update rows by primary key; fields missing from a row keep their value.
    pub async fn update_batch(&self, rows: Vec<PkEntity>) -> OrmResult<u64> {
        let version = self.gateway.db_version().await?;
        let dialect = self.ctx.dialects.resolve(&version)?;
        let statements = {
            let helper = FragmentBuilder::new(self.mapping, &*dialect);
            self.ctx.updates.build(&version, &rows, &helper)?
        };
        let affected = self.execute_batch(statements, &*dialect, "update_batch").await?;
        self.check_affected(affected, "update_batch")
    }

    /// Mark matching rows deleted.
    pub async fn logical_delete(&self, mut filter: DbWhere) -> OrmResult<u64> {
        if !self.fill().supports(self.mapping) {
            return Err(OrmError::UnsupportedOperation(format!(
                "{} has no logical delete field",
                self.mapping.table_name()
            )));
        }
        self.require_filter(&filter, "logical delete")?;
        let dialect = self.dialect().await?;
        self.fill().fill_delete_where(self.mapping, &mut filter);
        let mut update = DbUpdate::new();
        self.fill().fill_logical_delete(self.mapping, &mut update);
        let sql = FragmentBuilder::new(self.mapping, &*dialect).update(&update, &filter)?;
        let affected = self.execute(&sql, &*dialect, "logical_delete").await?;
        self.check_affected(affected, "logical_delete")
    }

    /// `DELETE FROM`, regardless of any logical delete flag.
    pub async fn physical_delete(&self, filter: DbWhere) -> OrmResult<u64> {
        self.require_filter(&filter, "delete")?;
        let dialect = self.dialect().await?;
        let sql = FragmentBuilder::new(self.mapping, &*dialect).delete(&filter)?;
        let affected = self.execute(&sql, &*dialect, "physical_delete").await?;
        self.check_affected(affected, "physical_delete")
    }

    pub async fn list(&self, mut filter: DbWhere, order: OrderBy) -> OrmResult<Vec<Entity>> {
        let dialect = self.dialect().await?;
        self.fill().fill_query_where(self.mapping, &mut filter);
        let sql = FragmentBuilder::new(self.mapping, &*dialect).select(&filter, &order)?;
        self.ctx.logger.log(&sql, &*dialect, Some("list"));
        let records = self.gateway.query(&sql.render_named()).await?;
        Ok(records
            .into_iter()
            .map(|r| r.into_entity(self.mapping))
            .collect())
    }

    /// One page plus the total count, derived from the paged query.
    pub async fn page(&self, mut filter: DbWhere, order: OrderBy, paging: Paging) -> OrmResult<Page> {
        let dialect = self.dialect().await?;
        self.fill().fill_query_where(self.mapping, &mut filter);
        let mut sql = FragmentBuilder::new(self.mapping, &*dialect).select(&filter, &order)?;
        dialect.paginate(&mut sql, &paging);
        self.ctx.logger.log(&sql, &*dialect, Some("page"));

        let query = sql.render_named();
        let records = self.gateway.query(&query).await?;
        let count = self.ctx.counts.derive(&query)?;
        let total = self.gateway.query_count(&count).await?;
        Ok(Page {
            items: records
                .into_iter()
                .map(|r| r.into_entity(self.mapping))
                .collect(),
            total,
            paging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::config::LogicalDeleteConfig;
    use crate::gateway::Record;
    use crate::mapping::EntityMapping;
    use crate::sql::NamedSql;
    use crate::value::SqlValue;
    use crate::version::{DbType, DbVersion, DbVersionCell};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct RecordingGateway {
        db: DbVersion,
        version: DbVersionCell,
        affected: u64,
        results: Mutex<VecDeque<Vec<Record>>>,
        sent: Mutex<Vec<NamedSql>>,
        batches: Mutex<Vec<usize>>,
    }

    impl RecordingGateway {
        fn new(db: DbType, major: u32) -> Self {
            Self {
                db: DbVersion::new(db, major, 0),
                version: DbVersionCell::new(),
                affected: 1,
                results: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
            }
        }

        fn affecting(mut self, rows: u64) -> Self {
            self.affected = rows;
            self
        }

        fn returning(self, rows: Vec<Record>) -> Self {
            self.results.lock().unwrap().push_back(rows);
            self
        }

        fn sent(&self) -> Vec<NamedSql> {
            self.sent.lock().unwrap().clone()
        }

        fn batches(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl SqlGateway for RecordingGateway {
        async fn db_version(&self) -> OrmResult<Arc<DbVersion>> {
            self.version
                .get_or_probe(|| async { Ok::<_, OrmError>(self.db.clone()) })
                .await
        }

        async fn execute(&self, sql: &NamedSql) -> OrmResult<u64> {
            self.sent.lock().unwrap().push(sql.clone());
            Ok(self.affected)
        }

        async fn execute_all(&self, statements: &[NamedSql]) -> OrmResult<u64> {
            self.batches.lock().unwrap().push(statements.len());
            let mut total = 0;
            for sql in statements {
                total += self.execute(sql).await?;
            }
            Ok(total)
        }

        async fn query(&self, sql: &NamedSql) -> OrmResult<Vec<Record>> {
            self.sent.lock().unwrap().push(sql.clone());
            Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn users() -> EntityMapping {
        EntityMapping::builder("SYS_USER")
            .primary_key("id")
            .field("userName")
            .field("deptCode")
            .field("deleteFlag")
            .build()
            .unwrap()
    }

    fn logs() -> EntityMapping {
        EntityMapping::builder("SYS_LOG")
            .primary_key("id")
            .field("message")
            .build()
            .unwrap()
    }

    fn context(config: PolysqlConfig) -> DaoContext {
        DaoContext::new(&config.with_logical_delete(LogicalDeleteConfig::new("deleteFlag", 0, 1)))
            .unwrap()
    }

    fn entity(pairs: &[(&str, SqlValue)]) -> Entity {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn insert_fills_effective_flag() {
        let gw = RecordingGateway::new(DbType::MySql, 8);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        let dao = Dao::new(&gw, &ctx, &m);

        let affected = dao
            .insert(entity(&[("id", 1.into()), ("userName", "bob".into())]))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let sent = gw.sent();
        assert_eq!(
            sent[0].sql,
            "INSERT INTO SYS_USER(ID, USER_NAME, DELETE_FLAG) VALUES(:$1$id, :$2$userName, :$3$deleteFlag)"
        );
        assert_eq!(sent[0].get("$3$deleteFlag"), Some(&SqlValue::Int(0)));
    }

    #[tokio::test]
    async fn insert_batch_follows_the_selected_strategy() {
        let rows = || {
            vec![
                PkEntity::new(1, entity(&[("userName", "a".into())])),
                PkEntity::new(2, entity(&[("userName", "b".into())])),
            ]
        };
        let ctx = context(PolysqlConfig::default());
        let m = users();

        let mysql = RecordingGateway::new(DbType::MySql, 8).affecting(2);
        assert_eq!(Dao::new(&mysql, &ctx, &m).insert_batch(rows()).await.unwrap(), 2);
        let sent = mysql.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].sql.contains("VALUES\n\t("));
        assert_eq!(sent[0].params.len(), 6);
        assert_eq!(mysql.batches(), [1]);

        let db2 = RecordingGateway::new(DbType::Db2, 11);
        assert_eq!(Dao::new(&db2, &ctx, &m).insert_batch(rows()).await.unwrap(), 2);
        assert_eq!(db2.sent().len(), 2);
        assert_eq!(db2.batches(), [2]);
    }

    #[tokio::test]
    async fn zero_rows_follow_policy() {
        let m = users();
        let filter = || DbWhere::from(Condition::eq("id", 9));

        let gw = RecordingGateway::new(DbType::PostgreSql, 16).affecting(0);
        let ctx = context(PolysqlConfig::default());
        let dao = Dao::new(&gw, &ctx, &m);
        assert_eq!(dao.update(DbUpdate::new().set("userName", "x"), filter()).await.unwrap(), 0);

        let ctx = context(PolysqlConfig::default().with_unaffected(UnaffectedPolicy::Error));
        let dao = Dao::new(&gw, &ctx, &m);
        let err = dao
            .update(DbUpdate::new().set("userName", "x"), filter())
            .await
            .unwrap_err();
        assert!(err.is_zero_rows());
        assert!(dao.physical_delete(filter()).await.unwrap_err().is_zero_rows());
    }

    #[tokio::test]
    async fn update_only_touches_live_rows() {
        let gw = RecordingGateway::new(DbType::Sqlite, 3);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        Dao::new(&gw, &ctx, &m)
            .update(
                DbUpdate::new().set("userName", "x"),
                DbWhere::from(Condition::eq("id", 9)),
            )
            .await
            .unwrap();
        assert_eq!(
            gw.sent()[0].sql,
            "UPDATE SYS_USER SET USER_NAME=:$1$userName\nWHERE ID=:$2$id AND DELETE_FLAG=:$3$deleteFlag"
        );
    }

    #[tokio::test]
    async fn logical_delete_writes_random_marker() {
        let gw = RecordingGateway::new(DbType::Oracle, 19);
        let config = PolysqlConfig::default().with_logical_delete(
            LogicalDeleteConfig::new("deleteFlag", 0, 1).random_digits(10),
        );
        let ctx = DaoContext::new(&config).unwrap();
        let m = users();
        Dao::new(&gw, &ctx, &m)
            .logical_delete(DbWhere::from(Condition::eq("userName", "bob")))
            .await
            .unwrap();

        let sent = gw.sent();
        assert_eq!(
            sent[0].sql,
            "UPDATE SYS_USER SET DELETE_FLAG=:$1$deleteFlag\nWHERE USER_NAME=:$2$userName AND DELETE_FLAG=:$3$deleteFlag"
        );
        let marker = sent[0].get("$1$deleteFlag").and_then(SqlValue::as_i64).unwrap();
        assert!((1_000_000_000..=9_999_999_999).contains(&marker));
        assert_eq!(sent[0].get("$3$deleteFlag"), Some(&SqlValue::Int(0)));
    }

    #[tokio::test]
    async fn deleted_rows_query_is_rewritten() {
        let gw = RecordingGateway::new(DbType::MySql, 8);
        let config = PolysqlConfig::default().with_logical_delete(
            LogicalDeleteConfig::new("deleteFlag", 0, 1).random_digits(5),
        );
        let ctx = DaoContext::new(&config).unwrap();
        let m = users();
        Dao::new(&gw, &ctx, &m)
            .list(DbWhere::from(Condition::eq("deleteFlag", 1)), OrderBy::new())
            .await
            .unwrap();
        let sent = gw.sent();
        assert!(sent[0].sql.ends_with("WHERE DELETE_FLAG>:$1$deleteFlag"), "{}", sent[0].sql);
        assert_eq!(sent[0].get("$1$deleteFlag"), Some(&SqlValue::Int(9999)));
    }

    #[tokio::test]
    async fn logical_delete_needs_flag_field() {
        let gw = RecordingGateway::new(DbType::MySql, 8);
        let ctx = context(PolysqlConfig::default());
        let m = logs();
        let err = Dao::new(&gw, &ctx, &m)
            .logical_delete(DbWhere::from(Condition::eq("id", 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedOperation(_)));
        assert!(gw.sent().is_empty());
    }

    #[tokio::test]
    async fn unconditional_writes_are_rejected() {
        let gw = RecordingGateway::new(DbType::MySql, 8);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        let dao = Dao::new(&gw, &ctx, &m);
        assert!(matches!(
            dao.physical_delete(DbWhere::new()).await,
            Err(OrmError::Validation(_))
        ));
        assert!(matches!(
            dao.update(DbUpdate::new().set("userName", "x"), DbWhere::new()).await,
            Err(OrmError::Validation(_))
        ));
        assert!(gw.sent().is_empty());
    }

    #[tokio::test]
    async fn list_maps_rows_back_to_fields() {
        let mut record = Record::new();
        record.push("ID", 1).push("USER_NAME", "bob").push("DEPT_CODE", "D01").push("DELETE_FLAG", 0);
        let gw = RecordingGateway::new(DbType::PostgreSql, 16).returning(vec![record]);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        let rows = Dao::new(&gw, &ctx, &m)
            .list(DbWhere::new(), OrderBy::new().asc("id"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("userName"), Some(&SqlValue::from("bob")));
        assert_eq!(
            gw.sent()[0].sql,
            "SELECT ID, USER_NAME, DEPT_CODE, DELETE_FLAG\nFROM SYS_USER\nWHERE DELETE_FLAG=:$1$deleteFlag\nORDER BY ID ASC"
        );
    }

    #[tokio::test]
    async fn page_runs_rows_then_derived_count() {
        let count: Record = [("COUNT(*)", SqlValue::Int(42))].into_iter().collect();
        let gw = RecordingGateway::new(DbType::MySql, 8)
            .returning(Vec::new())
            .returning(vec![count]);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        let dao = Dao::new(&gw, &ctx, &m);
        let page = dao
            .page(
                DbWhere::from(Condition::eq("deptCode", "D01")),
                OrderBy::new().desc("id"),
                Paging::page(2, 10).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.paging, Paging::new(10, 10));

        let sent = gw.sent();
        assert_eq!(
            sent[0].sql,
            "SELECT ID, USER_NAME, DEPT_CODE, DELETE_FLAG\nFROM SYS_USER\n\
             WHERE DEPT_CODE=:$1$deptCode AND DELETE_FLAG=:$2$deleteFlag\n\
             ORDER BY ID DESC\nLIMIT :$3$_start_,:$4$_rows_"
        );
        assert_eq!(
            sent[1].sql,
            "SELECT COUNT(*) FROM SYS_USER\nWHERE DEPT_CODE=:$1$deptCode AND DELETE_FLAG=:$2$deleteFlag"
        );
        assert_eq!(sent[1].params.len(), 2);

        // Same shape again: the count query comes from the cache.
        dao.page(
            DbWhere::from(Condition::eq("deptCode", "D02")),
            OrderBy::new().desc("id"),
            Paging::page(3, 10).unwrap(),
        )
        .await
        .unwrap();
        let stats = ctx.counts().cache().stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(gw.version.probe_count(), 1);
    }

    #[tokio::test]
    async fn update_batch_uses_case_when_on_oracle() {
        let gw = RecordingGateway::new(DbType::Oracle, 19).affecting(2);
        let ctx = context(PolysqlConfig::default());
        let m = users();
        let rows = vec![
            PkEntity::new(1, entity(&[("userName", "a".into())])),
            PkEntity::new(2, entity(&[("userName", "b".into())])),
        ];
        assert_eq!(Dao::new(&gw, &ctx, &m).update_batch(rows).await.unwrap(), 2);
        let sent = gw.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].sql.starts_with("UPDATE SYS_USER SET\n\tUSER_NAME=(CASE ID"));
        assert_eq!(ctx.dialects().created(), 1);
    }
}
