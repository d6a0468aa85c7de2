use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

pub const EXTRACT_FILENAME: &str = "SimpleDataMinerExtract.xlsx";
pub const EXTRACT_SHEET: &str = "extract";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// 查询结果行及其列标题
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extract {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// 将提取结果写成 xlsx，标题行加粗
pub fn write_workbook(extract: &Extract) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXTRACT_SHEET)?;
    for (col, name) in extract.columns.iter().enumerate() {
        sheet.write_string_with_format(0, col_num(col), name, &header)?;
    }

    for (r, row) in extract.rows.iter().enumerate() {
        let r = u32::try_from(r + 1).unwrap_or(u32::MAX);
        for (c, cell) in row.iter().enumerate() {
            let c = col_num(c);
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n)?;
                }
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::Date(d) => {
                    sheet.write_datetime_with_format(r, c, &excel_date(d)?, &date)?;
                }
                Cell::DateTime(dt) => {
                    sheet.write_datetime_with_format(r, c, &excel_datetime(dt)?, &datetime)?;
                }
            }
        }
    }
    sheet.autofit();

    workbook.save_to_buffer()
}

fn col_num(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

fn excel_date(d: &NaiveDate) -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(
        u16::try_from(d.year()).unwrap_or_default(),
        d.month() as u8,
        d.day() as u8,
    )
}

fn excel_datetime(dt: &NaiveDateTime) -> Result<ExcelDateTime, XlsxError> {
    let seconds = f64::from(dt.second()) + f64::from(dt.nanosecond()) / 1e9;
    excel_date(&dt.date())?.and_hms(dt.hour() as u16, dt.minute() as u8, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use std::io::Cursor;

    #[test]
    fn writes_a_header_row_and_typed_cells() {
        let extract = Extract {
            columns: vec!["sum(amount)".to_string(), "status".to_string(), "placed".to_string()],
            rows: vec![
                vec![
                    Cell::Number(250.5),
                    Cell::Text("A".to_string()),
                    Cell::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()),
                ],
                vec![Cell::Number(10.0), Cell::Empty, Cell::Empty],
            ],
        };

        let bytes = write_workbook(&extract).unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(EXTRACT_SHEET).unwrap();

        assert_eq!(range.get_value((0, 0)), Some(&Data::String("sum(amount)".to_string())));
        assert_eq!(range.get_value((0, 2)), Some(&Data::String("placed".to_string())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(250.5)));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("A".to_string())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::Float(10.0)));
        assert_eq!(range.get_size().0, 3);
    }

    #[test]
    fn empty_extract_still_has_its_header() {
        let extract = Extract {
            columns: vec!["region".to_string()],
            rows: Vec::new(),
        };
        let bytes = write_workbook(&extract).unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(EXTRACT_SHEET).unwrap();
        assert_eq!(range.get_size(), (1, 1));
    }
}
