use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::codec::{self, CodecError};
use crate::models::config::{Datatype, MinerConfig, TableConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "like",
            CompareOp::NotLike => "not like",
        }
    }

    fn is_pattern(&self) -> bool {
        matches!(self, CompareOp::Like | CompareOp::NotLike)
    }
}

/// 按数据类型转换后的约束值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    Number(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// 展示用 SQL 文本：数字原样，其余加双引号
    pub fn display_sql(&self) -> String {
        match self {
            SqlValue::Number(n) => n.to_string(),
            other => format!("\"{}\"", other.to_string().replace('"', "\"\"")),
        }
    }

    fn fits(&self, datatype: Datatype) -> bool {
        match self {
            SqlValue::Number(_) => datatype.is_numeric(),
            SqlValue::Text(s) => datatype == Datatype::String && !s.trim().is_empty(),
            SqlValue::Date(_) => datatype == Datatype::Date,
            SqlValue::DateTime(_) => datatype == Datatype::DateTime,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Number(n) => write!(f, "{n}"),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Predicate {
    Compare {
        column: usize,
        op: CompareOp,
        value: SqlValue,
    },
    InList {
        column: usize,
        codes: Vec<String>,
    },
}

impl Predicate {
    pub fn column(&self) -> usize {
        match self {
            Predicate::Compare { column, .. } | Predicate::InList { column, .. } => *column,
        }
    }

    fn validate(&self, table: &TableConfig) -> Result<(), CodecError> {
        let column = self.column();
        let datatype = table
            .column(column)
            .ok_or(CodecError::ColumnOutOfRange(column))?
            .datatype;

        match self {
            Predicate::InList { codes, .. } => {
                if codes.is_empty() {
                    return Err(CodecError::Inconsistent("empty code list"));
                }
                if datatype != Datatype::String {
                    return Err(CodecError::Inconsistent("code list on a non-string column"));
                }
            }
            Predicate::Compare { op, value, .. } => {
                if op.is_pattern() && datatype != Datatype::String {
                    return Err(CodecError::Inconsistent("pattern match on a non-string column"));
                }
                if !value.fits(datatype) {
                    return Err(CodecError::Inconsistent("value does not fit the column datatype"));
                }
            }
        }
        Ok(())
    }
}

/// 向导累积的全部选择，只对 `table` 对应的表配置有意义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WizardState {
    pub table: String,
    pub selected: Vec<usize>,
    /// `selected` 的子集
    pub constrained: Vec<usize>,
    pub cursor: usize,
    /// AND 连接，只追加
    #[serde(rename = "where")]
    pub predicates: Vec<Predicate>,
    pub count: BTreeSet<usize>,
    pub sum: BTreeSet<usize>,
}

impl WizardState {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            selected: Vec::new(),
            constrained: Vec::new(),
            cursor: 0,
            predicates: Vec::new(),
            count: BTreeSet::new(),
            sum: BTreeSet::new(),
        }
    }

    /// 游标所在的列，全部约束完成后为 `None`
    pub fn current_column(&self) -> Option<usize> {
        self.constrained.get(self.cursor).copied()
    }

    pub fn has_aggregates(&self) -> bool {
        !self.count.is_empty() || !self.sum.is_empty()
    }

    pub fn encode(&self) -> String {
        // 纯数据序列化不会失败；空令牌解码时按状态丢失处理
        codec::encode(self).unwrap_or_default()
    }

    /// 解析令牌并按配置校验
    pub fn decode(token: &str, config: &MinerConfig) -> Result<Self, CodecError> {
        let state: WizardState = codec::decode(token)?;
        let table = config
            .table(&state.table)
            .ok_or_else(|| CodecError::UnknownTable(state.table.clone()))?;
        state.validate(table)?;
        Ok(state)
    }

    fn validate(&self, table: &TableConfig) -> Result<(), CodecError> {
        if let Some(&bad) = self.selected.iter().find(|&&c| c >= table.columns.len()) {
            return Err(CodecError::ColumnOutOfRange(bad));
        }
        if has_duplicates(&self.selected) || has_duplicates(&self.constrained) {
            return Err(CodecError::Inconsistent("repeated column"));
        }
        if self.constrained.iter().any(|c| !self.selected.contains(c)) {
            return Err(CodecError::Inconsistent("constrained column was not selected"));
        }
        if self.cursor > self.constrained.len() {
            return Err(CodecError::Inconsistent("cursor past the constrained columns"));
        }
        if self
            .predicates
            .iter()
            .any(|p| !self.constrained[..self.cursor].contains(&p.column()))
        {
            return Err(CodecError::Inconsistent("predicate on an unconstrained column"));
        }
        for predicate in &self.predicates {
            predicate.validate(table)?;
        }
        let numeric_selected = |c: &usize| {
            self.selected.contains(c)
                && table.column(*c).is_some_and(|col| col.datatype.is_numeric())
        };
        if !self.count.iter().all(numeric_selected) || !self.sum.iter().all(numeric_selected) {
            return Err(CodecError::Inconsistent("aggregate on a non-numeric or unselected column"));
        }
        Ok(())
    }
}

fn has_duplicates(items: &[usize]) -> bool {
    items.iter().enumerate().any(|(i, a)| items[..i].contains(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::fixtures;
    use pretty_assertions::assert_eq;

    fn full_state() -> WizardState {
        WizardState {
            table: "orders".to_string(),
            selected: vec![0, 1, 2, 3, 5],
            constrained: vec![0, 1, 3, 2, 5],
            cursor: 5,
            predicates: vec![
                Predicate::Compare {
                    column: 0,
                    op: CompareOp::Gt,
                    value: SqlValue::Number(Decimal::new(10050, 2)),
                },
                Predicate::InList {
                    column: 1,
                    codes: vec!["A".to_string(), "B'C".to_string()],
                },
                Predicate::Compare {
                    column: 3,
                    op: CompareOp::NotLike,
                    value: SqlValue::Text("%no\"rth%".to_string()),
                },
                Predicate::Compare {
                    column: 2,
                    op: CompareOp::Gte,
                    value: SqlValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
                },
                Predicate::Compare {
                    column: 5,
                    op: CompareOp::Lt,
                    value: SqlValue::DateTime(
                        NaiveDate::from_ymd_opt(2021, 6, 30)
                            .unwrap()
                            .and_hms_milli_opt(12, 30, 5, 250)
                            .unwrap(),
                    ),
                },
            ],
            count: BTreeSet::from([0]),
            sum: BTreeSet::from([0]),
        }
    }

    #[test]
    fn round_trips_every_predicate_shape() {
        let config = fixtures::config();
        for state in [WizardState::new("orders"), full_state()] {
            assert_eq!(WizardState::decode(&state.encode(), &config), Ok(state));
        }
    }

    #[test]
    fn encodes_as_compact_json() {
        let mut state = WizardState::new("orders");
        state.selected = vec![0, 1];
        state.constrained = vec![0];
        state.cursor = 1;
        state.predicates.push(Predicate::Compare {
            column: 0,
            op: CompareOp::NotEq,
            value: SqlValue::Number(Decimal::new(5, 0)),
        });
        assert_eq!(
            state.encode(),
            r#"{"table":"orders","selected":[0,1],"constrained":[0],"cursor":1,"where":[{"compare":{"column":0,"op":"not_eq","value":{"number":"5"}}}],"count":[],"sum":[]}"#
        );
    }

    #[test]
    fn rejects_states_that_do_not_fit_the_table() {
        let config = fixtures::config();
        let decode = |token: &str| WizardState::decode(token, &config);

        assert_eq!(
            decode(r#"{"table":"invoices","selected":[],"constrained":[],"cursor":0,"where":[],"count":[],"sum":[]}"#),
            Err(CodecError::UnknownTable("invoices".to_string()))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[9],"constrained":[],"cursor":0,"where":[],"count":[],"sum":[]}"#),
            Err(CodecError::ColumnOutOfRange(9))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[0],"constrained":[1],"cursor":0,"where":[],"count":[],"sum":[]}"#),
            Err(CodecError::Inconsistent("constrained column was not selected"))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[3],"constrained":[],"cursor":0,"where":[],"count":[3],"sum":[]}"#),
            Err(CodecError::Inconsistent("aggregate on a non-numeric or unselected column"))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[0],"constrained":[0],"cursor":1,"where":[{"compare":{"column":0,"op":"gt","value":{"text":"lots"}}}],"count":[],"sum":[]}"#),
            Err(CodecError::Inconsistent("value does not fit the column datatype"))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[0],"constrained":[0],"cursor":1,"where":[{"compare":{"column":0,"op":"like","value":{"number":"1"}}}],"count":[],"sum":[]}"#),
            Err(CodecError::Inconsistent("pattern match on a non-string column"))
        );
        assert_eq!(
            decode(r#"{"table":"orders","selected":[1],"constrained":[1],"cursor":1,"where":[{"in_list":{"column":1,"codes":[]}}],"count":[],"sum":[]}"#),
            Err(CodecError::Inconsistent("empty code list"))
        );
    }

    #[test]
    fn rejects_tokens_outside_the_state_shape() {
        let config = fixtures::config();
        for token in [
            r#"{"table":"orders","selected":[0]}"#,
            r#"{"table":"orders","selected":[],"constrained":[],"cursor":0,"where":[],"count":[],"sum":[],"sql":"DROP TABLE orders"}"#,
            r#"{"table":"orders","selected":[0],"constrained":[0],"cursor":1,"where":[{"compare":{"column":0,"op":"between","value":{"number":"1"}}}],"count":[],"sum":[]}"#,
            "{'table': 'orders', 'selected': [0]}",
        ] {
            assert!(
                matches!(WizardState::decode(token, &config), Err(CodecError::Syntax(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn display_sql_quotes_only_non_numeric_values() {
        assert_eq!(SqlValue::Number(Decimal::new(100, 0)).display_sql(), "100");
        assert_eq!(SqlValue::Text("say \"x\"".to_string()).display_sql(), "\"say \"\"x\"\"\"");
        assert_eq!(
            SqlValue::Date(NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()).display_sql(),
            "\"2020-12-31\""
        );
    }
}
