use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

use crate::infra::export::Cell;

/// 将结果行转换为单元格，按列的原生类型读取
pub fn pg_row_to_cells(row: &PgRow) -> Vec<Cell> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            // 原生类型名，如 "INT4"、"NUMERIC"
            match col.type_info().name() {
                "INT2" => number(row.try_get::<Option<i16>, _>(i).ok().flatten()),
                "INT4" => number(row.try_get::<Option<i32>, _>(i).ok().flatten()),
                "INT8" => number(row.try_get::<Option<i64>, _>(i).ok().flatten().map(|v| v as f64)),
                "FLOAT4" => number(row.try_get::<Option<f32>, _>(i).ok().flatten()),
                "FLOAT8" => number(row.try_get::<Option<f64>, _>(i).ok().flatten()),
                "NUMERIC" => decimal(row.try_get::<Option<Decimal>, _>(i).ok().flatten()),
                "BOOL" => row
                    .try_get::<Option<bool>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::Bool),
                "DATE" => row
                    .try_get::<Option<NaiveDate>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::Date),
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::DateTime),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, |dt| Cell::DateTime(dt.naive_utc())),
                _ => text(row.try_get::<Option<String>, _>(i).ok().flatten()),
            }
        })
        .collect()
}

pub fn mysql_row_to_cells(row: &MySqlRow) -> Vec<Cell> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            match col.type_info().name() {
                "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" | "BIGINT" => {
                    number(row.try_get::<Option<i64>, _>(i).ok().flatten().map(|v| v as f64))
                }
                "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "INT UNSIGNED" | "MEDIUMINT UNSIGNED"
                | "BIGINT UNSIGNED" => {
                    number(row.try_get::<Option<u64>, _>(i).ok().flatten().map(|v| v as f64))
                }
                "FLOAT" => number(row.try_get::<Option<f32>, _>(i).ok().flatten()),
                "DOUBLE" => number(row.try_get::<Option<f64>, _>(i).ok().flatten()),
                "DECIMAL" => decimal(row.try_get::<Option<Decimal>, _>(i).ok().flatten()),
                "BOOLEAN" => row
                    .try_get::<Option<bool>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::Bool),
                "DATE" => row
                    .try_get::<Option<NaiveDate>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::Date),
                "DATETIME" => row
                    .try_get::<Option<NaiveDateTime>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, Cell::DateTime),
                "TIMESTAMP" => row
                    .try_get::<Option<DateTime<Utc>>, _>(i)
                    .ok()
                    .flatten()
                    .map_or(Cell::Empty, |dt| Cell::DateTime(dt.naive_utc())),
                _ => text(row.try_get::<Option<String>, _>(i).ok().flatten()),
            }
        })
        .collect()
}

fn number<T: Into<f64>>(value: Option<T>) -> Cell {
    value.map_or(Cell::Empty, |v| Cell::Number(v.into()))
}

fn decimal(value: Option<Decimal>) -> Cell {
    value
        .and_then(|d| d.to_f64())
        .map_or(Cell::Empty, Cell::Number)
}

fn text(value: Option<String>) -> Cell {
    value.map_or(Cell::Empty, Cell::Text)
}
