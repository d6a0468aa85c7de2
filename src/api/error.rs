use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use rust_xlsxwriter::XlsxError;
use thiserror::Error;
use tracing::{error, warn};

use crate::api::pages;
use crate::core::codec::CodecError;
use crate::core::query::TooManyRecords;
use crate::core::wizard::Lost;

/// 终止向导请求的错误，统一渲染为重新开始页面
#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Lost(#[from] Lost),

    #[error("internal error (lost state: {0})")]
    Malformed(#[from] CodecError),

    #[error(transparent)]
    TooManyRecords(#[from] TooManyRecords),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cannot build the extract workbook: {0}")]
    Export(#[from] XlsxError),
}

impl IntoResponse for WizardError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WizardError::Lost(_) | WizardError::Malformed(_) => {
                warn!(error = %self, "wizard state rejected");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            WizardError::TooManyRecords(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            WizardError::Database(_) => {
                error!(error = %self, "query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The database could not answer this request".to_string(),
                )
            }
            WizardError::Export(_) => {
                error!(error = %self, "export failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Your extract could not be written".to_string(),
                )
            }
        };
        (status, Html(pages::restart(&message))).into_response()
    }
}
