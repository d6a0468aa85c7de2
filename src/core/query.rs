//! 将完成的向导状态翻译为 SQL：标识符只取自配置，值在展示文本中内联、执行时绑定

use thiserror::Error;

use crate::models::config::TableConfig;
use crate::models::state::{Predicate, SqlValue, WizardState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// 第 n 个（从 1 开始）绑定参数的占位符
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("your mined extract would access too many records ({count}) [limit: {limit}]")]
pub struct TooManyRecords {
    pub count: u64,
    pub limit: u64,
}

/// 行数不超过表的上限时通过
pub fn check_ceiling(table: &TableConfig, count: i64) -> Result<u64, TooManyRecords> {
    let count = u64::try_from(count).unwrap_or(0);
    if count > table.max_records {
        return Err(TooManyRecords {
            count,
            limit: table.max_records,
        });
    }
    Ok(count)
}

#[derive(Debug, Clone)]
pub struct MineQuery<'a> {
    table: &'a TableConfig,
    select: Vec<String>,
    group_by: Vec<String>,
    predicates: &'a [Predicate],
}

impl<'a> MineQuery<'a> {
    pub fn assemble(table: &'a TableConfig, state: &'a WizardState) -> Self {
        let aggregated = state.has_aggregates();
        let mut select = Vec::new();
        let mut group_by = Vec::new();

        for &index in &state.selected {
            let Some(column) = table.column(index) else {
                continue;
            };
            let counted = state.count.contains(&index);
            let summed = state.sum.contains(&index);
            if counted {
                select.push(format!("count({})", column.column));
            }
            if summed {
                select.push(format!("sum({})", column.column));
            }
            if !counted && !summed {
                select.push(column.column.clone());
                if aggregated {
                    group_by.push(column.column.clone());
                }
            }
        }

        Self {
            table,
            select,
            group_by,
            predicates: &state.predicates,
        }
    }

    /// 输出列标题，按 SELECT 顺序
    pub fn columns(&self) -> &[String] {
        &self.select
    }

    pub fn where_fragment(&self) -> String {
        where_fragment(self.table, self.predicates)
    }

    pub fn sql(&self) -> String {
        self.render(&self.select.join(", "), &self.where_fragment(), true, " ")
    }

    /// 与 `sql` 相同的语句，每个子句一行
    pub fn pretty_sql(&self) -> String {
        let fragment = self.where_fragment().replace(" AND ", "\n      AND ");
        self.render(&self.select.join(", "), &fragment, true, "\n")
    }

    pub fn count_sql(&self) -> String {
        self.render("count(*) AS count", &self.where_fragment(), false, " ")
    }

    pub fn bound(&self, dialect: Dialect) -> BoundQuery {
        let (fragment, params) = bound_fragment(self.table, self.predicates, dialect);
        BoundQuery {
            sql: self.render(&self.select.join(", "), &fragment, true, " "),
            params,
        }
    }

    pub fn bound_count(&self, dialect: Dialect) -> BoundQuery {
        let (fragment, params) = bound_fragment(self.table, self.predicates, dialect);
        BoundQuery {
            sql: self.render("count(*) AS count", &fragment, false, " "),
            params,
        }
    }

    fn render(&self, select: &str, fragment: &str, grouped: bool, sep: &str) -> String {
        let mut sql = format!("SELECT {select}{sep}FROM {}", self.table.id);
        if !fragment.is_empty() {
            sql.push_str(sep);
            sql.push_str("WHERE ");
            sql.push_str(fragment);
        }
        if grouped && !self.group_by.is_empty() {
            sql.push_str(sep);
            sql.push_str("GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        sql
    }
}

fn column_id(table: &TableConfig, index: usize) -> &str {
    table.column(index).map(|c| c.column.as_str()).unwrap_or_default()
}

pub fn where_fragment(table: &TableConfig, predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(|predicate| match predicate {
            Predicate::Compare { column, op, value } => format!(
                "{} {} {}",
                column_id(table, *column),
                op.sql(),
                value.display_sql()
            ),
            Predicate::InList { column, codes } => format!(
                "{} in ({})",
                column_id(table, *column),
                codes
                    .iter()
                    .map(|c| SqlValue::Text(c.clone()).display_sql())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn bound_fragment(
    table: &TableConfig,
    predicates: &[Predicate],
    dialect: Dialect,
) -> (String, Vec<SqlValue>) {
    let mut params = Vec::new();
    let next = |value: SqlValue, params: &mut Vec<SqlValue>| {
        params.push(value);
        dialect.placeholder(params.len())
    };

    let parts: Vec<String> = predicates
        .iter()
        .map(|predicate| match predicate {
            Predicate::Compare { column, op, value } => {
                let placeholder = next(value.clone(), &mut params);
                format!("{} {} {}", column_id(table, *column), op.sql(), placeholder)
            }
            Predicate::InList { column, codes } => {
                let placeholders: Vec<String> = codes
                    .iter()
                    .map(|c| next(SqlValue::Text(c.clone()), &mut params))
                    .collect();
                format!(
                    "{} in ({})",
                    column_id(table, *column),
                    placeholders.join(", ")
                )
            }
        })
        .collect();
    (parts.join(" AND "), params)
}
