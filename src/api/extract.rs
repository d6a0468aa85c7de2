use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::api::error::WizardError;
use crate::api::wizard::table_of;
use crate::ax_state::AppState;
use crate::core::query::{check_ceiling, MineQuery};
use crate::core::wizard::Lost;
use crate::infra::export::{write_workbook, EXTRACT_FILENAME};
use crate::models::state::WizardState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    pub query: Option<String>,
}

/// GET /extract 重新校验令牌和行数上限后执行查询，返回 xlsx 工作簿
pub async fn download(
    State(app): State<Arc<AppState>>,
    Query(params): Query<ExtractParams>,
) -> Result<Response, WizardError> {
    let token = params.query.ok_or(Lost("query"))?;
    let state = WizardState::decode(&token, &app.config)?;
    if state.current_column().is_some() {
        return Err(Lost("cursor").into());
    }
    let table = table_of(&app.config, &state)?;

    let query = MineQuery::assemble(table, &state);
    let dialect = app.db.dialect();
    let counted = app.db.count_rows(&query.bound_count(dialect)).await?;
    check_ceiling(table, counted)?;

    let extract = app
        .db
        .fetch_extract(&query.bound(dialect), query.columns())
        .await?;
    let bytes = write_workbook(&extract)?;
    info!(table = %table.id, rows = extract.rows.len(), bytes = bytes.len(), "extract mined");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXTRACT_FILENAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
