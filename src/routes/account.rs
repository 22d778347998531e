use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    http::header::LOCATION,
    web, HttpResponse,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use log::{error, info, warn};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::entity::user;
use crate::error::AppError;
use crate::forms::{add_error, FormErrors, NON_FIELD};
use crate::response::{see_other, ResponseDto, LOGIN_URL};
use crate::routes::project::DASHBOARD_URL;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/login/")
            .route(web::get().to(login_form))
            .route(web::post().to(login)),
    )
    .service(web::resource("/logout/").route(web::post().to(logout)));
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    username: Option<String>,
    password: Option<String>,
    next: Option<String>,
}

#[derive(Serialize)]
struct LoginContext {
    username: Option<String>,
    next: String,
    errors: FormErrors,
}

/// Creates the bootstrap account from `ADMIN_USERNAME` / `ADMIN_PASSWORD` when absent.
pub async fn init_admin(db: &DatabaseConnection, config: &AppConfig) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };
    let exists = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(db)
        .await
        .map_err(AppError::db)?
        .is_some();
    if exists {
        return Ok(());
    }
    create_user(db, username, password, DEFAULT_COST).await?;
    info!("created bootstrap user {}", username);
    Ok(())
}

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    cost: u32,
) -> Result<user::Model, AppError> {
    let password_hash = hash(password, cost).map_err(|e| {
        error!("password hashing failed: {}", e);
        AppError::system_exception()
    })?;
    user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(password_hash),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(AppError::db)
}

/// Only local absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n.to_string(),
        _ => DASHBOARD_URL.to_string(),
    }
}

async fn login_form(query: web::Query<NextQuery>) -> Result<HttpResponse, AppError> {
    let ctx = LoginContext {
        username: None,
        next: safe_next(query.next.as_deref()),
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<NextQuery>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let next = safe_next(form.next.as_deref().or(query.next.as_deref()));
    let username = form.username.clone().unwrap_or_default();
    let password = form.password.clone().unwrap_or_default();

    let found = if username.trim().is_empty() || password.is_empty() {
        None
    } else {
        user::Entity::find()
            .filter(user::Column::Username.eq(username.trim()))
            .one(db.get_ref())
            .await
            .map_err(AppError::db)?
    };

    let user = match found {
        Some(user) if verify(&password, &user.password_hash).unwrap_or(false) => user,
        _ => {
            warn!("failed login for {:?}", username);
            let mut errors = FormErrors::new();
            add_error(
                &mut errors,
                NON_FIELD,
                "Please enter a correct username and password.",
            );
            let ctx = LoginContext {
                username: form.username.clone(),
                next,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let token = issue_token(&config, user.id)?;
    let cookie = Cookie::build(config.token_cookie.clone(), token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    info!("user {} signed in", user.username);

    Ok(HttpResponse::SeeOther()
        .cookie(cookie)
        .insert_header((LOCATION, next))
        .finish())
}

async fn logout(config: web::Data<AppConfig>) -> Result<HttpResponse, AppError> {
    let cookie = Cookie::build(config.token_cookie.clone(), "")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .finish();
    let mut resp = see_other(LOGIN_URL);
    resp.add_cookie(&cookie).map_err(|_| AppError::system_exception())?;
    Ok(resp)
}
