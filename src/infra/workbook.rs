use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use thiserror::Error;
use tracing::{debug, info};

use crate::infra::db_external::DynamicPool;
use crate::models::config::{ColumnConfig, Datatype, Lookup, MinerConfig, TableConfig, UnknownDatatype};

pub const TABLES_SHEET: &str = "tables";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open workbook {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("no sheet named \"{0}\" in workbook")]
    MissingSheet(String),

    #[error("cannot read sheet \"{sheet}\": {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("missing \"{heading}\" heading in \"{sheet}\" worksheet")]
    MissingHeading {
        sheet: String,
        heading: &'static str,
    },

    #[error("bad \"{heading}\" value in row {row} of \"{sheet}\" worksheet")]
    BadCell {
        sheet: String,
        row: usize,
        heading: &'static str,
    },

    #[error("invalid datatype for column \"{column}\" in table \"{table}\": {source}")]
    Datatype {
        table: String,
        column: String,
        #[source]
        source: UnknownDatatype,
    },

    #[error("table \"{0}\" not in database")]
    UnknownTable(String),

    #[error("no column named \"{column}\" in table \"{table}\"")]
    UnknownColumn { table: String, column: String },

    #[error("cannot read database metadata: {0}")]
    Metadata(#[from] sqlx::Error),
}

/// 工作表：标题行及其下方的非空行
struct Sheet {
    name: String,
    headings: Vec<String>,
    /// 附带从 1 开始的工作表行号
    rows: Vec<(usize, Vec<Data>)>,
}

impl Sheet {
    fn from_range(name: &str, range: Range<Data>) -> Self {
        let first = range.start().map_or(0, |(row, _)| row as usize);
        let mut rows = range.rows().enumerate();
        let headings = rows
            .next()
            .map(|(_, r)| r.iter().map(|c| text(c).unwrap_or_default()).collect())
            .unwrap_or_default();
        let rows = rows
            .filter(|(_, r)| r.iter().any(|c| text(c).is_some()))
            .map(|(i, r)| (first + i + 1, r.to_vec()))
            .collect();
        Self {
            name: name.to_string(),
            headings,
            rows,
        }
    }

    fn heading(&self, heading: &'static str) -> Result<usize, ConfigError> {
        self.headings
            .iter()
            .position(|h| h == heading)
            .ok_or_else(|| ConfigError::MissingHeading {
                sheet: self.name.clone(),
                heading,
            })
    }

    fn bad(&self, row: usize, heading: &'static str) -> ConfigError {
        ConfigError::BadCell {
            sheet: self.name.clone(),
            row,
            heading,
        }
    }
}

fn cell(row: &[Data], index: usize) -> Option<&Data> {
    row.get(index)
}

fn text(cell: &Data) -> Option<String> {
    let value = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty | Data::Error(_) => return None,
        other => other.to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn flag(cell: &Data) -> bool {
    match cell {
        Data::Bool(b) => *b,
        Data::Int(i) => *i != 0,
        Data::Float(f) => *f != 0.0,
        Data::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        ),
        _ => false,
    }
}

fn count(cell: &Data) -> Option<u64> {
    match cell {
        Data::Int(i) => u64::try_from(*i).ok(),
        Data::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_sheet(workbook: &mut Sheets<BufReader<File>>, name: &str) -> Result<Sheet, ConfigError> {
    if !workbook.sheet_names().iter().any(|s| s == name) {
        return Err(ConfigError::MissingSheet(name.to_string()));
    }
    let range = workbook
        .worksheet_range(name)
        .map_err(|source| ConfigError::Sheet {
            sheet: name.to_string(),
            source,
        })?;
    Ok(Sheet::from_range(name, range))
}

/// 读取工作簿中所有可挖掘的表，不访问数据库
pub fn load_workbook(path: &Path) -> Result<MinerConfig, ConfigError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| ConfigError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let tables = read_sheet(&mut workbook, TABLES_SHEET)?;
    let table_col = tables.heading("table")?;
    let name_col = tables.heading("tableName")?;
    let sheet_col = tables.heading("worksheet")?;
    let max_col = tables.heading("maxRecords")?;

    let mut configs = Vec::new();
    for (line, row) in &tables.rows {
        let id = cell(row, table_col)
            .and_then(text)
            .ok_or_else(|| tables.bad(*line, "table"))?;
        let worksheet = cell(row, sheet_col)
            .and_then(text)
            .ok_or_else(|| tables.bad(*line, "worksheet"))?;
        let max_records = cell(row, max_col)
            .and_then(count)
            .ok_or_else(|| tables.bad(*line, "maxRecords"))?;
        let name = cell(row, name_col).and_then(text).unwrap_or_else(|| id.clone());

        let sheet = read_sheet(&mut workbook, &worksheet)?;
        let columns = read_columns(&id, &sheet)?;
        debug!(table = %id, columns = columns.len(), "loaded table configuration");
        configs.push(TableConfig {
            id,
            name,
            max_records,
            columns,
        });
    }

    info!(tables = configs.len(), "table configuration workbook loaded");
    Ok(MinerConfig::new(configs))
}

fn read_columns(table: &str, sheet: &Sheet) -> Result<Vec<ColumnConfig>, ConfigError> {
    let column_col = sheet.heading("column")?;
    let name_col = sheet.heading("columnName")?;
    let datatype_col = sheet.heading("datatype")?;
    let indexed_col = sheet.heading("isIndexed")?;
    let lookup_col = sheet.heading("lookupTable")?;
    let code_col = sheet.heading("lookupCodeColumn")?;
    let description_col = sheet.heading("lookupDescriptionColumn")?;

    sheet
        .rows
        .iter()
        .map(|(line, row)| -> Result<ColumnConfig, ConfigError> {
            let column = cell(row, column_col)
                .and_then(text)
                .ok_or_else(|| sheet.bad(*line, "column"))?;
            let datatype = cell(row, datatype_col)
                .and_then(text)
                .unwrap_or_default()
                .parse::<Datatype>()
                .map_err(|source| ConfigError::Datatype {
                    table: table.to_string(),
                    column: column.clone(),
                    source,
                })?;
            let lookup = match cell(row, lookup_col).and_then(text) {
                None => None,
                Some(lookup_table) => Some(Lookup {
                    table: lookup_table,
                    code_column: cell(row, code_col)
                        .and_then(text)
                        .ok_or_else(|| sheet.bad(*line, "lookupCodeColumn"))?,
                    description_column: cell(row, description_col)
                        .and_then(text)
                        .ok_or_else(|| sheet.bad(*line, "lookupDescriptionColumn"))?,
                }),
            };
            Ok(ColumnConfig {
                name: cell(row, name_col)
                    .and_then(text)
                    .unwrap_or_else(|| column.clone()),
                column,
                datatype,
                indexed: cell(row, indexed_col).is_some_and(flag),
                lookup,
            })
        })
        .collect()
}

/// 校验配置中的每张表、每一列及查找表都存在于数据库
pub async fn verify_against_database(
    config: &MinerConfig,
    db: &DynamicPool,
) -> Result<(), ConfigError> {
    for table in config.tables() {
        let known = existing_columns(db, &table.id).await?;
        for column in &table.columns {
            require_column(&table.id, &known, &column.column)?;
            if let Some(lookup) = &column.lookup {
                let lookup_known = existing_columns(db, &lookup.table).await?;
                require_column(&lookup.table, &lookup_known, &lookup.code_column)?;
                require_column(&lookup.table, &lookup_known, &lookup.description_column)?;
            }
        }
    }
    info!("table configuration matches the database");
    Ok(())
}

async fn existing_columns(db: &DynamicPool, table: &str) -> Result<Vec<String>, ConfigError> {
    let columns = db.table_columns(table).await?;
    if columns.is_empty() {
        return Err(ConfigError::UnknownTable(table.to_string()));
    }
    Ok(columns)
}

fn require_column(table: &str, known: &[String], column: &str) -> Result<(), ConfigError> {
    if known.iter().any(|k| k.eq_ignore_ascii_case(column)) {
        Ok(())
    } else {
        Err(ConfigError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}
