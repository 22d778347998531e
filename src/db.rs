use log::info;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::config::AppConfig;

const SCHEMA: &str = include_str!("../schema-sqlite.sql");

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    ensure_sqlite_path(config);
    let url = config.database_url();
    let db = Database::connect(&url).await?;
    init_sqlite_schema(&db).await?;
    Ok(db)
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn connect_memory() -> Result<DatabaseConnection, DbErr> {
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await?;
    init_sqlite_schema(&db).await?;
    Ok(db)
}

fn ensure_sqlite_path(config: &AppConfig) {
    let raw = config.database_url();
    if raw.contains(":memory:") {
        return;
    }
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw.as_str());
    let path = Path::new(path.split('?').next().unwrap_or(path));
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new().create(true).append(true).open(path);
}

async fn init_sqlite_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_project_changes' LIMIT 1",
    );
    let exists = db.query_one(exists_stmt).await?.is_some();
    if exists {
        return Ok(());
    }

    info!("initialising sqlite schema");
    for stmt in split_sql(SCHEMA) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_skips_comments_and_blank_statements() {
        let stmts = split_sql("-- header\nCREATE TABLE a (id INT);\n\n;CREATE TABLE b (id INT);\n");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);
    }

    #[test]
    fn embedded_schema_declares_every_table() {
        let stmts = split_sql(SCHEMA);
        for table in [
            "t_user",
            "t_company",
            "t_project",
            "t_tag",
            "t_project_tag_relation",
            "t_project_changes",
        ] {
            let create = format!("CREATE TABLE IF NOT EXISTS {} ", table);
            assert!(stmts.iter().any(|s| s.starts_with(&create)), "missing {}", table);
        }
    }

    #[actix_web::test]
    async fn schema_init_is_idempotent() {
        let db = connect_memory().await.unwrap();
        init_sqlite_schema(&db).await.unwrap();
    }
}
