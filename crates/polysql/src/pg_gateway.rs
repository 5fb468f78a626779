//! [`SqlGateway`] over `tokio-postgres`.

use crate::error::{OrmError, OrmResult};
use crate::gateway::{Record, SqlGateway};
use crate::sql::{NamedSql, ParamStyle, PositionalSql};
use crate::value::SqlValue;
use crate::version::{DbVersion, DbVersionCell};
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row};

/// One PostgreSQL connection.
///
/// The server version is read with `SHOW server_version` on first use and
/// cached for the lifetime of the connection.
pub struct PgGateway {
    client: Client,
    version: DbVersionCell,
}

impl std::fmt::Debug for PgGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgGateway")
            .field("version", &self.version.get())
            .finish_non_exhaustive()
    }
}

impl PgGateway {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            version: DbVersionCell::new(),
        }
    }

    /// Connect with `NoTls` and drive the connection on the current runtime.
    pub async fn connect(database_url: &str) -> OrmResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "polysql.sql", error = %e, "postgres connection error");
            }
        });
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Number of version probes sent on this connection (0 or 1).
    pub fn version_probes(&self) -> u64 {
        self.version.probe_count()
    }
}

fn positional(sql: &NamedSql) -> OrmResult<PositionalSql> {
    sql.to_positional(ParamStyle::Dollar)
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn to_record(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value: SqlValue = row
            .try_get(i)
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        record.push(column.name(), value);
    }
    Ok(record)
}

impl SqlGateway for PgGateway {
    async fn db_version(&self) -> OrmResult<Arc<DbVersion>> {
        self.version
            .get_or_probe(|| async {
                let row = self.client.query_one("SHOW server_version", &[]).await?;
                let version: String = row.try_get(0)?;
                Ok::<_, OrmError>(DbVersion::parse("PostgreSQL", &version))
            })
            .await
    }

    async fn execute(&self, sql: &NamedSql) -> OrmResult<u64> {
        let stmt = positional(sql)?;
        let params = param_refs(&stmt.params);
        Ok(self.client.execute(stmt.sql.as_str(), &params).await?)
    }

    async fn query(&self, sql: &NamedSql) -> OrmResult<Vec<Record>> {
        let stmt = positional(sql)?;
        let params = param_refs(&stmt.params);
        let rows = self.client.query(stmt.sql.as_str(), &params).await?;
        rows.iter().map(to_record).collect()
    }
}
