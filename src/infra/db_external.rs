use sqlx::mysql::{MySqlArguments, MySqlPoolOptions};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{MySql, Pool, Postgres, Row};

use crate::core::query::{BoundQuery, Dialect};
use crate::infra::export::Extract;
use crate::infra::settings::DatabaseKind;
use crate::infra::utils::{mysql_row_to_cells, pg_row_to_cells};
use crate::models::config::{Lookup, LookupCode};
use crate::models::state::SqlValue;

/// 当前所连数据库的连接池
#[derive(Debug, Clone)]
pub enum DynamicPool {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
}

const PG_TABLE_COLUMNS: &str = "SELECT column_name::text FROM information_schema.columns \
     WHERE table_schema = current_schema() AND lower(table_name) = lower($1)";

const MYSQL_TABLE_COLUMNS: &str = "SELECT CAST(column_name AS CHAR) FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER(?)";

impl DynamicPool {
    pub async fn connect(kind: DatabaseKind, url: &str) -> Result<Self, sqlx::Error> {
        let pool = match kind {
            DatabaseKind::Postgres => {
                DynamicPool::Postgres(PgPoolOptions::new().max_connections(5).connect(url).await?)
            }
            DatabaseKind::Mysql => {
                DynamicPool::MySql(MySqlPoolOptions::new().max_connections(5).connect(url).await?)
            }
        };
        Ok(pool)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DynamicPool::Postgres(_) => Dialect::Postgres,
            DynamicPool::MySql(_) => Dialect::MySql,
        }
    }

    /// 探测当前 schema 下表的列名，表不存在时为空
    /// 表名不区分大小写，与查询中未加引号的标识符一致
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows = match self {
            DynamicPool::Postgres(p) => {
                sqlx::query(PG_TABLE_COLUMNS)
                .bind(table)
                .fetch_all(p)
                .await?
                .into_iter()
                .filter_map(|r| r.try_get::<String, _>(0).ok())
                .collect()
            }
            DynamicPool::MySql(p) => {
                sqlx::query(MYSQL_TABLE_COLUMNS)
                .bind(table)
                .fetch_all(p)
                .await?
                .into_iter()
                .filter_map(|r| r.try_get::<String, _>(0).ok())
                .collect()
            }
        };
        Ok(rows)
    }

    /// 查找表的全部 (码值, 描述)，按码值排序
    pub async fn lookup_codes(&self, lookup: &Lookup) -> Result<Vec<LookupCode>, sqlx::Error> {
        let to_code = |code: Option<String>, description: Option<String>| LookupCode {
            code: code.unwrap_or_default(),
            description: description.unwrap_or_default(),
        };
        let codes = match self {
            DynamicPool::Postgres(p) => {
                let sql = format!(
                    "SELECT {code}::text, {desc}::text FROM {table} ORDER BY 1",
                    code = lookup.code_column,
                    desc = lookup.description_column,
                    table = lookup.table,
                );
                sqlx::query(&sql)
                    .fetch_all(p)
                    .await?
                    .iter()
                    .map(|r| to_code(r.try_get(0).ok().flatten(), r.try_get(1).ok().flatten()))
                    .collect()
            }
            DynamicPool::MySql(p) => {
                let sql = format!(
                    "SELECT CAST({code} AS CHAR), CAST({desc} AS CHAR) FROM {table} ORDER BY 1",
                    code = lookup.code_column,
                    desc = lookup.description_column,
                    table = lookup.table,
                );
                sqlx::query(&sql)
                    .fetch_all(p)
                    .await?
                    .iter()
                    .map(|r| to_code(r.try_get(0).ok().flatten(), r.try_get(1).ok().flatten()))
                    .collect()
            }
        };
        Ok(codes)
    }

    pub async fn count_rows(&self, query: &BoundQuery) -> Result<i64, sqlx::Error> {
        match self {
            DynamicPool::Postgres(p) => {
                bind_pg(sqlx::query(&query.sql), &query.params)
                    .fetch_one(p)
                    .await?
                    .try_get(0)
            }
            DynamicPool::MySql(p) => {
                bind_mysql(sqlx::query(&query.sql), &query.params)
                    .fetch_one(p)
                    .await?
                    .try_get(0)
            }
        }
    }

    pub async fn fetch_extract(
        &self,
        query: &BoundQuery,
        columns: &[String],
    ) -> Result<Extract, sqlx::Error> {
        let rows = match self {
            DynamicPool::Postgres(p) => bind_pg(sqlx::query(&query.sql), &query.params)
                .fetch_all(p)
                .await?
                .iter()
                .map(pg_row_to_cells)
                .collect(),
            DynamicPool::MySql(p) => bind_mysql(sqlx::query(&query.sql), &query.params)
                .fetch_all(p)
                .await?
                .iter()
                .map(mysql_row_to_cells)
                .collect(),
        };
        Ok(Extract {
            columns: columns.to_vec(),
            rows,
        })
    }
}

fn bind_pg<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Number(n) => query.bind(*n),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::DateTime(dt) => query.bind(*dt),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Number(n) => query.bind(*n),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::DateTime(dt) => query.bind(*dt),
        };
    }
    query
}
