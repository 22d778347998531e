use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::entity::user;
use crate::error::AppError;

const SESSION_DAYS: i64 = 14;

/// The signed-in user. Extraction fails with a redirect to the login page.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "loginId")]
    login_id: i32,
    exp: usize,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let next = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());
        let db = match req.app_data::<web::Data<DatabaseConnection>>() {
            Some(db) => db.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let token = extract_token(req, &config);

        Box::pin(async move {
            let token = token.ok_or_else(|| AppError::need_login(next.clone()))?;
            let auth = authenticate_token(&db, &config, &token, &next).await?;
            Ok(auth)
        })
    }
}

fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let name = config.token_cookie.as_str();
    req.cookie(name)
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn authenticate_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    token: &str,
    next: &str,
) -> Result<AuthUser, AppError> {
    let login_id = decode_jwt(config, token).ok_or_else(|| AppError::need_login(next))?;
    let user = user::Entity::find_by_id(login_id)
        .one(db)
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| {
            debug!("token for unknown user {}", login_id);
            AppError::need_login(next)
        })?;

    Ok(AuthUser {
        user_id: user.id,
        username: user.username,
    })
}

fn decode_jwt(config: &AppConfig, token: &str) -> Option<i32> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims.login_id)
        .ok()
}

pub fn issue_token(config: &AppConfig, user_id: i32) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(SESSION_DAYS)).timestamp() as usize;
    let claims = Claims {
        login_id: user_id,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_decodes_to_user() {
        let config = AppConfig::for_tests();
        let token = issue_token(&config, 42).unwrap();
        assert_eq!(decode_jwt(&config, &token), Some(42));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = AppConfig::for_tests();
        let mut other = AppConfig::for_tests();
        other.jwt_secret = "another".to_string();
        let token = issue_token(&other, 42).unwrap();
        assert_eq!(decode_jwt(&config, &token), None);
        assert_eq!(decode_jwt(&config, "garbage"), None);
    }
}
