//! # polysql
//!
//! Dialect-aware SQL building and CRUD for relational databases.
//!
//! ## Features
//!
//! - **Structured SQL**: [`SqlBuffer`] keeps text, bound variables and raw
//!   expressions apart, so fragments can be spliced, indented and rendered as
//!   named SQL for execution or literal SQL for logs
//! - **Dialects**: pagination, LIKE operands, literals and timestamps for
//!   Oracle, MySQL, MariaDB, DB2, PostgreSQL, H2, SQLite and SQL Server, resolved
//!   per [`DbVersion`] and cached
//! - **Batch strategies**: ordered insert/update registries pick the best shape
//!   the connected database supports (multi-row VALUES, UNION ALL, CASE WHEN,
//!   JOIN, per-row fallback)
//! - **Logical delete**: a configurable flag field filled on create, query,
//!   update and delete, with optional random deleted markers
//! - **Count derivation**: `SELECT COUNT(*)` derived from a page query, cached
//!   per SQL shape
//! - **Safe defaults**: UPDATE and DELETE require a WHERE condition
//!
//! ## Example
//!
//! ```ignore
//! use polysql::prelude::*;
//!
//! static USERS: LazyLock<EntityMapping> = LazyLock::new(|| {
//!     EntityMapping::builder("SYS_USER")
//!         .primary_key("id")
//!         .field("userName")
//!         .field("deptCode")
//!         .field("deleteFlag")
//!         .build()
//!         .expect("valid mapping")
//! });
//!
//! let ctx = DaoContext::new(&PolysqlConfig::load("polysql.toml")?)?;
//! let gateway = PgGateway::connect(&database_url).await?;
//! let users = Dao::new(&gateway, &ctx, &*USERS);
//!
//! let page = users
//!     .page(
//!         DbWhere::from(Condition::eq("deptCode", "D01")),
//!         OrderBy::new().desc("id"),
//!         Paging::page(1, 20)?,
//!     )
//!     .await?;
//! ```

pub mod batch;
pub mod condition;
pub mod config;
pub mod count;
pub mod dao;
pub mod dialect;
pub mod error;
pub mod fragment;
pub mod gateway;
pub mod logging;
pub mod logical_delete;
pub mod mapping;
pub mod prelude;
pub mod sql;
pub mod value;
pub mod version;

#[cfg(feature = "postgres")]
pub mod pg_gateway;

pub use batch::{
    BatchInput, BatchInsertStrategy, BatchRegistry, BatchStatements, BatchStrategy,
    BatchUpdateStrategy, InsertRegistry, PkEntity, UpdateRegistry,
};
pub use condition::{
    Condition, DbUpdate, DbWhere, Entity, Operator, OrderBy, SortDir, UpdateItem, WhereExpr,
};
pub use config::{
    BatchConfig, LogLevel, LogicalDeleteConfig, PolysqlConfig, SqlLogConfig, StrategyOverride,
    UnaffectedPolicy,
};
pub use count::{CountSql, CountSqlCache, CountSqlDeriver, derive_count_sql};
pub use dao::{Dao, DaoContext, Page};
pub use dialect::{DialectRegistry, MatchMode, Paging, SqlDialect, create_dialect};
pub use error::{OrmError, OrmResult};
pub use fragment::FragmentBuilder;
pub use gateway::{Record, SqlGateway};
pub use logging::SqlLogger;
pub use logical_delete::{LogicalDeleteFill, LogicalDeleteStrategy, NoLogicalDelete, RandomMarker};
pub use mapping::{EntityMapping, FieldScene, TableMapping};
pub use sql::{NamedSql, OmitStrategy, ParamStyle, PositionalSql, SqlBuffer, StatementKind};
pub use value::SqlValue;
pub use version::{DbType, DbVersion, DbVersionCell};

#[cfg(feature = "postgres")]
pub use pg_gateway::PgGateway;
