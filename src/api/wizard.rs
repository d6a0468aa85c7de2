use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::error::WizardError;
use crate::api::pages;
use crate::ax_state::AppState;
use crate::core::query::{check_ceiling, MineQuery};
use crate::core::wizard::{self, Lost, Step};
use crate::models::config::{MinerConfig, TableConfig};
use crate::models::form::FormFields;
use crate::models::state::WizardState;

type Fields = Form<Vec<(String, String)>>;

pub(crate) fn table_of<'a>(
    config: &'a MinerConfig,
    state: &WizardState,
) -> Result<&'a TableConfig, Lost> {
    config.table(&state.table).ok_or(Lost("table"))
}

/// 解码隐藏字段 `state`
fn restore<'a>(
    config: &'a MinerConfig,
    form: &FormFields,
) -> Result<(&'a TableConfig, WizardState), WizardError> {
    let token = form.get("state").ok_or(Lost("state"))?;
    let state = WizardState::decode(token, config)?;
    Ok((table_of(config, &state)?, state))
}

async fn render(app: &AppState, step: Step) -> Result<Response, WizardError> {
    let table = table_of(&app.config, step.state())?;
    let status = match step.error() {
        Some(_) => StatusCode::BAD_REQUEST,
        None => StatusCode::OK,
    };

    let page = match &step {
        Step::SelectColumns { state, error } => {
            pages::select_columns(table, state, error.as_deref())
        }
        Step::SelectConstraintColumns { state } => pages::select_constraint_columns(table, state),
        Step::ConstrainColumn { state, error } => {
            let column = state
                .current_column()
                .and_then(|c| table.column(c))
                .ok_or(Lost("cursor"))?;
            let codes = match column.code_lookup() {
                Some(lookup) => Some(app.db.lookup_codes(lookup).await?),
                None => None,
            };
            pages::constrain_column(table, state, column, codes.as_deref(), error.as_deref())
        }
        Step::EnterValues {
            state,
            kinds,
            entered,
            error,
        } => {
            let column = state
                .current_column()
                .and_then(|c| table.column(c))
                .ok_or(Lost("cursor"))?;
            pages::enter_values(table, state, column, kinds, entered, error.as_deref())
        }
        Step::SelectAggregates { state } => pages::select_aggregates(table, state),
        Step::Assemble { state } => {
            let query = MineQuery::assemble(table, state);
            debug!(sql = %query.count_sql(), "checking row count");
            let counted = app
                .db
                .count_rows(&query.bound_count(app.db.dialect()))
                .await?;
            let count = check_ceiling(table, counted)?;
            info!(table = %table.id, count, sql = %query.sql(), "query assembled");
            pages::result(&query.pretty_sql(), state, count)
        }
    };
    Ok((status, Html(page)).into_response())
}

/// GET / 选择数据表
pub async fn welcome(State(app): State<Arc<AppState>>) -> Html<String> {
    Html(pages::welcome(&app.config))
}

/// POST /columns 列出所选表的字段
pub async fn columns(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let step = wizard::start(&app.config, &form)?;
    render(&app, step).await
}

/// POST /constraints
pub async fn constraints(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let (table, state) = restore(&app.config, &form)?;
    render(&app, wizard::choose_columns(table, state, &form)?).await
}

/// POST /constraint/next
pub async fn constraint_next(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let (_, state) = restore(&app.config, &form)?;
    render(&app, wizard::choose_constraint_columns(state, &form)?).await
}

/// POST /constraint/kind
pub async fn constraint_kind(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let (table, state) = restore(&app.config, &form)?;
    render(&app, wizard::choose_constraint(table, state, &form)?).await
}

/// POST /constraint/values 录入约束值
pub async fn constraint_values(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let (table, state) = restore(&app.config, &form)?;
    render(&app, wizard::apply_constraint(table, state, &form)?).await
}

/// POST /aggregates
pub async fn aggregates(
    State(app): State<Arc<AppState>>,
    Form(fields): Fields,
) -> Result<Response, WizardError> {
    let form = FormFields::from(fields);
    let (table, state) = restore(&app.config, &form)?;
    render(&app, wizard::choose_aggregates(table, state, &form)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        Form(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn selected(columns: &[usize]) -> String {
        let mut state = WizardState::new("orders");
        state.selected = columns.to_vec();
        state.encode()
    }

    #[tokio::test]
    async fn welcome_lists_configured_tables() {
        let Html(page) = welcome(State(test_state())).await;
        assert!(page.contains("value=\"orders\""));
        assert!(page.contains("Customer orders"));
    }

    #[tokio::test]
    async fn choosing_a_table_offers_its_columns() {
        let response = columns(State(test_state()), fields(&[("table", "orders")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(response).await;
        assert!(page.contains("action=\"/constraints\""));
        assert!(page.contains("Shipped at"));
    }

    #[tokio::test]
    async fn zero_columns_is_a_bad_request_on_the_same_page() {
        let token = WizardState::new("orders").encode();
        let response = constraints(State(test_state()), fields(&[("state", token.as_str())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let page = body(response).await;
        assert!(page.contains("action=\"/constraints\""));
        assert!(page.contains("No columns selected"));
    }

    #[tokio::test]
    async fn constraining_a_plain_column_offers_kinds() {
        let token = selected(&[0, 3]);
        let response = constraint_next(
            State(test_state()),
            fields(&[("state", token.as_str()), ("constrain", "0")]),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(response).await;
        assert!(page.contains("value=\"range\""));
        assert!(page.contains("action=\"/constraint/kind\""));
    }

    #[tokio::test]
    async fn invalid_values_return_to_value_entry() {
        let mut state = WizardState::new("orders");
        state.selected = vec![4];
        state.constrained = vec![4];
        let token = state.encode();

        let response = constraint_values(
            State(test_state()),
            fields(&[("state", token.as_str()), ("kinds", "eq"), ("value_eq", "many")]),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let page = body(response).await;
        assert!(page.contains("action=\"/constraint/values\""));
        assert!(page.contains("value=\"many\""));
        assert!(page.contains(&pages::escape(&token)));
    }

    #[tokio::test]
    async fn lost_state_links_back_to_the_start() {
        let response = constraints(State(test_state()), fields(&[("column", "0")]))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(response).await.contains("href=\"/\""));

        let response = aggregates(
            State(test_state()),
            fields(&[("state", "__import__('os').system('true')")]),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
