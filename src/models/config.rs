use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 配置工作簿中允许的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    String,
    Int,
    Float,
    Numeric,
    Decimal,
    Date,
    DateTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown datatype \"{0}\"")]
pub struct UnknownDatatype(pub String);

impl Datatype {
    pub const ALL: [Datatype; 7] = [
        Datatype::String,
        Datatype::Int,
        Datatype::Float,
        Datatype::Numeric,
        Datatype::Decimal,
        Datatype::Date,
        Datatype::DateTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Int => "int",
            Datatype::Float => "float",
            Datatype::Numeric => "numeric",
            Datatype::Decimal => "decimal",
            Datatype::Date => "date",
            Datatype::DateTime => "datetime",
        }
    }

    /// 数值类型：SQL 中不加引号，可计数、可求和
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datatype::Int | Datatype::Float | Datatype::Numeric | Datatype::Decimal
        )
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datatype {
    type Err = UnknownDatatype;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Datatype::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| UnknownDatatype(wanted.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub table: String,
    pub code_column: String,
    pub description_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupCode {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    /// 数据库中的列名
    pub column: String,
    /// 展示给用户的名称
    pub name: String,
    pub datatype: Datatype,
    pub indexed: bool,
    pub lookup: Option<Lookup>,
}

impl ColumnConfig {
    /// 只对字符串列生效
    pub fn code_lookup(&self) -> Option<&Lookup> {
        match self.datatype {
            Datatype::String => self.lookup.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    /// 单次提取允许涉及的最大行数
    pub max_records: u64,
    pub columns: Vec<ColumnConfig>,
}

impl TableConfig {
    pub fn column(&self, index: usize) -> Option<&ColumnConfig> {
        self.columns.get(index)
    }
}

/// 启动时构建的只读表配置，所有处理器共享
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerConfig {
    tables: Vec<TableConfig>,
}

impl MinerConfig {
    pub fn new(tables: Vec<TableConfig>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableConfig] {
        &self.tables
    }

    pub fn table(&self, id: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.id == id)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_configured_datatype() {
        for d in Datatype::ALL {
            assert_eq!(d.as_str().parse::<Datatype>(), Ok(d));
        }
        assert_eq!(
            "time".parse::<Datatype>(),
            Err(UnknownDatatype("time".to_string()))
        );
    }

    #[test]
    fn lookup_only_applies_to_string_columns() {
        let mut table = fixtures::orders();
        assert!(table.columns[1].code_lookup().is_some());

        table.columns[1].datatype = Datatype::Int;
        assert!(table.columns[1].code_lookup().is_none());
    }
}
