//! Convenient imports for typical `polysql` usage.
//!
//! ```ignore
//! use polysql::prelude::*;
//! ```

pub use crate::{
    Condition, Dao, DaoContext, DbType, DbUpdate, DbVersion, DbWhere, Entity, EntityMapping,
    FragmentBuilder, NamedSql, OrderBy, OrmError, OrmResult, Page, Paging, PkEntity,
    PolysqlConfig, Record, SqlBuffer, SqlDialect, SqlGateway, SqlValue, TableMapping,
};

#[cfg(feature = "postgres")]
pub use crate::PgGateway;
