use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::config::Datatype;
use crate::models::state::SqlValue;

// 先按月在前解析，月份越界时再按日在前
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%b %d %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("value \"{value}\" is not valid for the {datatype} datatype")]
pub struct InvalidValue {
    pub value: String,
    pub datatype: Datatype,
}

/// 按数据类型校验输入，返回写入 SQL 的值；空值一律无效
pub fn coerce(raw: &str, datatype: Datatype) -> Result<SqlValue, InvalidValue> {
    let invalid = || InvalidValue {
        value: raw.to_string(),
        datatype,
    };
    if raw.trim().is_empty() {
        return Err(invalid());
    }

    match datatype {
        Datatype::String => Ok(SqlValue::Text(raw.to_string())),
        Datatype::Int | Datatype::Float | Datatype::Numeric | Datatype::Decimal => {
            parse_number(raw.trim()).map(SqlValue::Number).ok_or_else(invalid)
        }
        Datatype::Date => parse_date(raw.trim())
            .or_else(|| parse_datetime(raw.trim()).map(|dt| dt.date()))
            .map(SqlValue::Date)
            .ok_or_else(invalid),
        Datatype::DateTime => parse_datetime(raw.trim())
            .or_else(|| parse_date(raw.trim()).and_then(|d| d.and_hms_opt(0, 0, 0)))
            .map(SqlValue::DateTime)
            .ok_or_else(invalid),
    }
}

fn parse_number(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
