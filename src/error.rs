use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use sea_orm::{DbErr, TransactionError};
use thiserror::Error;

use crate::response::{response_from_error, see_other_login};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{msg}")]
    Biz { code: i32, msg: String },
    #[error("{what} not found")]
    NotFound { what: &'static str },
    #[error("please login first")]
    NeedLogin { next: String },
    #[error("system_exception")]
    System,
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::Biz { code: 1, msg: msg.into() }
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    pub fn need_login(next: impl Into<String>) -> Self {
        Self::NeedLogin { next: next.into() }
    }

    pub fn system_exception() -> Self {
        Self::System
    }

    /// Logs a datastore failure and hides it behind a 500.
    pub fn db(err: DbErr) -> Self {
        error!("database error: {}", err);
        Self::System
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Biz { code, .. } => *code,
            Self::NotFound { .. } => 4,
            Self::NeedLogin { .. } => 3,
            Self::System => 99,
        }
    }

    pub fn msg(&self) -> String {
        self.to_string()
    }
}

pub fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => AppError::db(e),
        TransactionError::Transaction(app) => app,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Biz { .. } => StatusCode::OK,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NeedLogin { .. } => StatusCode::FOUND,
            Self::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::NeedLogin { next } => see_other_login(next),
            _ => response_from_error(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::LOCATION;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::param_error("x").status_code(), StatusCode::OK);
        assert_eq!(AppError::not_found("tag").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::system_exception().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::need_login("/").status_code(), StatusCode::FOUND);
    }

    #[test]
    fn need_login_redirects_with_next() {
        let resp = AppError::need_login("/tags/?page=2").error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(LOCATION).unwrap(),
            "/login/?next=/tags/%3Fpage%3D2"
        );
    }

    #[test]
    fn not_found_message_names_the_record() {
        assert_eq!(AppError::not_found("project").msg(), "project not found");
    }
}
