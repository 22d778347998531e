use actix_web::{
    error::UrlencodedError,
    http::header::LOCATION,
    HttpRequest, HttpResponse, ResponseError,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::error::AppError;

pub const LOGIN_URL: &str = "/login/";

/// Everything outside the unreserved set is escaped; `/` stays readable.
const NEXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub data: Option<T>,
    pub code: i32,
    pub msg: String,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            code: 0,
            msg: "".to_string(),
        }
    }

    /// Re-rendered form: the context travels back with its field errors.
    pub fn invalid_form(data: T) -> Self {
        Self {
            data: Some(data),
            code: 1,
            msg: "invalid form".to_string(),
        }
    }
}

pub fn form_error_handler(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected form payload: {}", err);
    AppError::param_error("invalid form payload").into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(ResponseDto::<()> {
        data: None,
        code: err.code(),
        msg: err.msg(),
    })
}

/// Redirect after a successful POST.
pub fn see_other(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location.as_ref()))
        .finish()
}

pub fn see_other_login(next: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, login_url(next)))
        .finish()
}

pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, utf8_percent_encode(next, NEXT_VALUE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_keeps_slashes() {
        assert_eq!(login_url("/dashboard/"), "/login/?next=/dashboard/");
        assert_eq!(login_url("/a b&c"), "/login/?next=/a%20b%26c");
        assert_eq!(
            login_url("/tags/?page=2&q=é"),
            "/login/?next=/tags/%3Fpage%3D2%26q%3D%C3%A9"
        );
    }

    #[test]
    fn see_other_sets_location() {
        let resp = see_other("/dashboard/");
        assert_eq!(resp.status(), actix_web::http::StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/dashboard/");
    }
}
