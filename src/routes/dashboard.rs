use std::collections::HashMap;

use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use log::error;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use sea_orm::prelude::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order, QueryOrder};

use crate::auth::AuthUser;
use crate::entity::{company, project, project_tag_relation, tag};
use crate::error::AppError;
use crate::response::ResponseDto;
use crate::routes::project::{to_project_dto, ProjectDto};

pub const EXPORT_CONTENT_TYPE: &str = "application/ms-excel";
const EXPORT_COLUMNS: [&str; 5] = ["Project", "Company", "Estimated", "Actual", "Tags"];

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(list)))
        .service(web::resource("/{file:[-\\w]+}/").route(web::get().to(export)));
}

/// One spreadsheet line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub title: String,
    pub company: String,
    pub estimated: Decimal,
    pub actual: Decimal,
    pub tags: String,
}

/// Every project with its company, open-ended projects first, then latest end date first.
pub async fn dashboard_projects<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<(project::Model, Option<company::Model>)>, AppError> {
    project::Entity::find()
        .find_also_related(company::Entity)
        .order_by(project::Column::EndDate.is_null(), Order::Desc)
        .order_by_desc(project::Column::EndDate)
        .order_by_asc(project::Column::Id)
        .all(db)
        .await
        .map_err(AppError::db)
}

async fn tag_names_by_project<C: ConnectionTrait>(
    db: &C,
) -> Result<HashMap<i32, Vec<String>>, AppError> {
    let rows = project_tag_relation::Entity::find()
        .find_also_related(tag::Entity)
        .order_by_asc(project_tag_relation::Column::Id)
        .all(db)
        .await
        .map_err(AppError::db)?;

    let mut names: HashMap<i32, Vec<String>> = HashMap::new();
    for (relation, tag) in rows {
        if let Some(tag) = tag {
            names.entry(relation.project_id).or_default().push(tag.name);
        }
    }
    Ok(names)
}

pub async fn export_rows<C: ConnectionTrait>(db: &C) -> Result<Vec<ExportRow>, AppError> {
    let projects = dashboard_projects(db).await?;
    let mut tags = tag_names_by_project(db).await?;
    Ok(projects
        .into_iter()
        .map(|(p, c)| ExportRow {
            estimated: p.total_estimated_hours(),
            actual: p.total_actual_hours(),
            tags: tags.remove(&p.id).unwrap_or_default().join(", "),
            company: c.map(|c| c.name).unwrap_or_default(),
            title: p.title,
        })
        .collect())
}

pub fn build_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("dashboard")?;
        let bold = Format::new().set_bold();
        for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &bold)?;
        }
        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string(r, 0, row.title.as_str())?;
            sheet.write_string(r, 1, row.company.as_str())?;
            sheet.write_number(r, 2, row.estimated.to_f64().unwrap_or_default())?;
            sheet.write_number(r, 3, row.actual.to_f64().unwrap_or_default())?;
            sheet.write_string(r, 4, row.tags.as_str())?;
        }
    }
    workbook.save_to_buffer()
}

async fn list(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let projects = dashboard_projects(db.get_ref())
        .await?
        .iter()
        .map(|(p, c)| to_project_dto(p, c.as_ref()))
        .collect::<Vec<ProjectDto>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(projects))))
}

async fn export(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    _file: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let rows = export_rows(db.get_ref()).await?;
    let bytes = build_workbook(&rows).map_err(|e| {
        error!("dashboard export failed: {}", e);
        AppError::system_exception()
    })?;

    let filename = format!("Dashboard_{}.xlsx", Utc::now().format("%Y-%m-%d_%H-%M-%S"));
    Ok(HttpResponse::Ok()
        .content_type(EXPORT_CONTENT_TYPE)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(bytes))
}
