use std::fmt::Write;

use crate::core::wizard::{
    ConstraintKind, Entered, RANGE_HIGH, RANGE_HIGH_EXCLUSIVE, RANGE_LOW, RANGE_LOW_EXCLUSIVE,
};
use crate::models::config::{ColumnConfig, LookupCode, MinerConfig, TableConfig};
use crate::models::state::WizardState;

pub const TITLE: &str = "Simple Data Miner";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn shell(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{TITLE}</title>\
         <link rel=\"icon\" href=\"data:,\"></head><body style=\"font-size:120%\">\
         <h1 style=\"text-align:center\">{TITLE}</h1>{body}</body></html>"
    )
}

fn form(action: &str, state: Option<&WizardState>, inner: &str, submit: &str) -> String {
    let hidden = state
        .map(|s| {
            format!(
                "<input type=\"hidden\" name=\"state\" value=\"{}\">",
                escape(&s.encode())
            )
        })
        .unwrap_or_default();
    format!(
        "<form action=\"{action}\" method=\"post\">{hidden}{inner}<br/>\
         <input type=\"submit\" value=\"{}\" style=\"font-size:120%\"></form>",
        escape(submit)
    )
}

fn error_line(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p style=\"color:#b00020\"><b>{}</b></p>", escape(e)))
        .unwrap_or_default()
}

fn checkbox_row(name: &str, value: &str, cells: &[&str]) -> String {
    let mut row = format!(
        "<tr><td><input type=\"checkbox\" name=\"{name}\" value=\"{}\"></td>",
        escape(value)
    );
    for cell in cells {
        let _ = write!(row, "<td>{}</td>", escape(cell));
    }
    row.push_str("</tr>");
    row
}

/// 只有一条消息、链接回首页的页面
pub fn restart(message: &str) -> String {
    shell(&format!(
        "<p style=\"text-align:center\"><b><a href=\"/\">{} - please click here to start again</a></b></p>",
        escape(message)
    ))
}

pub fn welcome(config: &MinerConfig) -> String {
    let mut rows = String::new();
    for (i, table) in config.tables().iter().enumerate() {
        let _ = write!(
            rows,
            "<tr><td><input type=\"radio\" name=\"table\" value=\"{}\"{}></td><td>{}</td></tr>",
            escape(&table.id),
            if i == 0 { " checked" } else { "" },
            escape(&table.name)
        );
    }
    shell(&format!(
        "<h2 style=\"text-align:center\">Please select the table you want to mine</h2>{}",
        form(
            "/columns",
            None,
            &format!("<table>{rows}</table>"),
            "Please mine this table"
        )
    ))
}

pub fn select_columns(table: &TableConfig, state: &WizardState, error: Option<&str>) -> String {
    let rows: String = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| checkbox_row("column", &i.to_string(), &[c.name.as_str()]))
        .collect();
    shell(&format!(
        "<h2 style=\"text-align:center\">Please select the columns to mine from the {} table</h2>{}{}",
        escape(&table.name),
        error_line(error),
        form(
            "/constraints",
            Some(state),
            &format!("<table>{rows}</table>"),
            &format!("Please mine these columns in the {} table", table.name)
        )
    ))
}

pub fn select_constraint_columns(table: &TableConfig, state: &WizardState) -> String {
    let rows: String = state
        .selected
        .iter()
        .filter_map(|&i| Some((i, table.column(i)?)))
        .map(|(i, c)| {
            let hint = if c.indexed { "(indexed)" } else { "" };
            checkbox_row("constrain", &i.to_string(), &[c.name.as_str(), hint])
        })
        .collect();
    shell(&format!(
        "<h2 style=\"text-align:center\">Select the columns whose values you want to constrain</h2>\
         <p style=\"text-align:center\">Leave them all clear to mine every row</p>{}",
        form(
            "/constraint/next",
            Some(state),
            &format!("<table>{rows}</table>"),
            &format!(
                "Please constrain these columns when mining the {} table",
                table.name
            )
        )
    ))
}

pub fn constrain_column(
    table: &TableConfig,
    state: &WizardState,
    column: &ColumnConfig,
    codes: Option<&[LookupCode]>,
    error: Option<&str>,
) -> String {
    let (heading, rows, submit) = match codes {
        Some(codes) => (
            "Select the values to include",
            codes
                .iter()
                .map(|c| checkbox_row("code", &c.code, &[c.code.as_str(), c.description.as_str()]))
                .collect::<String>(),
            format!(
                "Please only include these values from the '{}' column when mining the '{}' table",
                column.name, table.name
            ),
        ),
        None => (
            "Select the constraints to apply",
            ConstraintKind::for_datatype(column.datatype)
                .iter()
                .map(|k| checkbox_row("kind", k.token(), &[k.label()]))
                .collect::<String>(),
            format!(
                "Please apply these constraints to the '{}' column when mining the '{}' table",
                column.name, table.name
            ),
        ),
    };
    shell(&format!(
        "<h2 style=\"text-align:center\">For column \"{}\" in table \"{}\"</h2>\
         <h3 style=\"text-align:center\">{heading}</h3>{}{}",
        escape(&column.name),
        escape(&table.name),
        error_line(error),
        form(
            "/constraint/kind",
            Some(state),
            &format!("<table>{rows}</table>"),
            &submit
        )
    ))
}

pub fn enter_values(
    table: &TableConfig,
    state: &WizardState,
    column: &ColumnConfig,
    kinds: &[ConstraintKind],
    entered: &Entered,
    error: Option<&str>,
) -> String {
    let text_input = |name: &str| {
        format!(
            "<input type=\"text\" name=\"{name}\" value=\"{}\">",
            escape(entered.get(name).unwrap_or_default())
        )
    };
    let exclude = |name: &str| {
        format!(
            "<tr><td></td><td><input type=\"checkbox\" name=\"{name}\"{}> Exclude this value from the mined data</td></tr>",
            if entered.get(name).is_some() { " checked" } else { "" }
        )
    };

    let mut inner = String::new();
    for kind in kinds {
        let _ = write!(
            inner,
            "<input type=\"hidden\" name=\"kinds\" value=\"{}\">",
            kind.token()
        );
    }
    inner.push_str("<table>");
    for kind in kinds {
        match kind {
            ConstraintKind::Range => {
                let _ = write!(
                    inner,
                    "<tr><td>Enter the minimum value for column \"{name}\"</td><td>{}</td></tr>{}\
                     <tr><td>Enter the maximum value for column \"{name}\"</td><td>{}</td></tr>{}",
                    text_input(RANGE_LOW),
                    exclude(RANGE_LOW_EXCLUSIVE),
                    text_input(RANGE_HIGH),
                    exclude(RANGE_HIGH_EXCLUSIVE),
                    name = escape(&column.name),
                );
            }
            kind => {
                let _ = write!(
                    inner,
                    "<tr><td>{} \"{}\"</td><td>{}</td></tr>",
                    kind.prompt(),
                    escape(&column.name),
                    text_input(&kind.input_name())
                );
            }
        }
    }
    inner.push_str("</table>");

    shell(&format!(
        "<h2 style=\"text-align:center\">For column \"{}\" in table \"{}\"</h2>\
         <h3 style=\"text-align:center\">Enter the values required for these constraints</h3>{}{}",
        escape(&column.name),
        escape(&table.name),
        error_line(error),
        form("/constraint/values", Some(state), &inner, "Set these constraints")
    ))
}

pub fn select_aggregates(table: &TableConfig, state: &WizardState) -> String {
    let mut rows = String::new();
    for &i in &state.selected {
        let Some(column) = table.column(i).filter(|c| c.datatype.is_numeric()) else {
            continue;
        };
        let _ = write!(
            rows,
            "<tr><td>{}</td>\
             <td><input type=\"checkbox\" name=\"count\" value=\"{i}\"></td>\
             <td><input type=\"checkbox\" name=\"sum\" value=\"{i}\"></td></tr>",
            escape(&column.name)
        );
    }
    let inner = if rows.is_empty() {
        "<p>None of the selected columns can be counted or summed</p>".to_string()
    } else {
        format!("<table><tr><th>Column</th><th>Count</th><th>Sum</th></tr>{rows}</table>")
    };
    shell(&format!(
        "<h2 style=\"text-align:center\">Select the columns to count or sum</h2>\
         <p style=\"text-align:center\">Once anything is counted or summed, the other selected columns are grouped</p>{}",
        form(
            "/aggregates",
            Some(state),
            &inner,
            &format!("Please count/sum these columns in the {} table", table.name)
        )
    ))
}

/// 结果页：格式化后的 SQL、涉及行数和下载表单
pub fn result(pretty_sql: &str, state: &WizardState, count: u64) -> String {
    shell(&format!(
        "<h2 style=\"text-align:center\">Here is your SQL query for mining your extract</h2>\
         <pre style=\"font-size:150%\">{}</pre>\
         <p>This extract will access {count} records</p>\
         <form action=\"/extract\" method=\"get\">\
         <input type=\"hidden\" name=\"query\" value=\"{}\">\
         <input type=\"submit\" value=\"Click here to execute this SQL, mine your extract and download it\" style=\"font-size:150%\">\
         </form>\
         <p style=\"font-size:150%\"><b><a href=\"/\">Click here to start a new data mining operation</a></b></p>",
        escape(pretty_sql),
        escape(&state.encode())
    ))
}
