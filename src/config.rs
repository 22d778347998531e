use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::warn;
use rand::RngCore;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_cookie: String,
    pub readme_path: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8000);

        let sqlite_path =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "./data/projement.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                warn!("JWT_SECRET is not set, sessions will not survive a restart");
                random_secret()
            });

        let token_cookie = env::var("TOKEN_COOKIE").unwrap_or_else(|_| "token".to_string());
        let readme_path = env::var("README_PATH").unwrap_or_else(|_| "README.md".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok().filter(|v| !v.trim().is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_cookie,
            readme_path,
            admin_username,
            admin_password,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            server_port: 0,
            sqlite_path: ":memory:".to_string(),
            database_url: Some("sqlite::memory:".to_string()),
            jwt_secret: "test-secret".to_string(),
            token_cookie: "token".to_string(),
            readme_path: "README.md".to_string(),
            admin_username: None,
            admin_password: None,
        }
    }
}
