use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use sea_orm::prelude::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthUser;
use crate::entity::{company, project, project_changes, project_tag_relation, tag, user};
use crate::error::{map_tx_error, AppError};
use crate::forms::{
    add_error, check_hour_totals, parse_tag_ids, FormErrors, HourDeltas, HoursForm, NewProject, ProjectForm,
};
use crate::response::{see_other, ResponseDto};

pub const DASHBOARD_URL: &str = "/dashboard/";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/add/")
            .route(web::get().to(create_form))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/{id:\\d+}-{slug:[-\\w]*}/")
            .route(web::get().to(hours_form))
            .route(web::post().to(update_hours)),
    )
    .service(
        web::resource("/{id:\\d+}-{slug:[-\\w]*}/tags/")
            .route(web::get().to(tags_form))
            .route(web::post().to(update_tags)),
    )
    .service(web::resource("/{id:\\d+}-{slug:[-\\w]*}/changes/").route(web::get().to(changes)));
}

#[derive(Serialize)]
pub struct ProjectDto {
    pub id: i32,
    pub title: String,
    pub company_id: i32,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub estimated_design: Decimal,
    pub actual_design: Decimal,
    pub estimated_development: Decimal,
    pub actual_development: Decimal,
    pub estimated_testing: Decimal,
    pub actual_testing: Decimal,
    pub total_estimated_hours: Decimal,
    pub total_actual_hours: Decimal,
    pub is_over_budget: bool,
    pub has_ended: bool,
    pub url: String,
}

pub fn to_project_dto(model: &project::Model, company: Option<&company::Model>) -> ProjectDto {
    ProjectDto {
        id: model.id,
        title: model.title.clone(),
        company_id: model.company_id,
        company: company.map(|c| c.name.clone()),
        start_date: model.start_date,
        end_date: model.end_date,
        estimated_design: model.estimated_design,
        actual_design: model.actual_design,
        estimated_development: model.estimated_development,
        actual_development: model.actual_development,
        estimated_testing: model.estimated_testing,
        actual_testing: model.actual_testing,
        total_estimated_hours: model.total_estimated_hours(),
        total_actual_hours: model.total_actual_hours(),
        is_over_budget: model.is_over_budget(),
        has_ended: model.has_ended(),
        url: model.absolute_url(),
    }
}

#[derive(Serialize)]
struct HoursContext {
    project: ProjectDto,
    form: HoursForm,
    errors: FormErrors,
}

#[derive(Serialize)]
struct TagsContext {
    project: ProjectDto,
    tags: Vec<tag::Model>,
    selected: Vec<i32>,
    errors: FormErrors,
}

#[derive(Serialize)]
struct CreateContext {
    companies: Vec<company::Model>,
    form: ProjectForm,
    errors: FormErrors,
}

#[derive(Serialize)]
struct ChangeDto {
    id: i32,
    user: Option<String>,
    change_date: String,
    initial: [Decimal; 3],
    delta: [Decimal; 3],
    result: [Decimal; 3],
}

/// Outcome of adding hours: the saved project and, unless every delta was
/// zero, the audit record written alongside it.
#[derive(Debug)]
pub struct HourUpdate {
    pub project: project::Model,
    pub change: Option<project_changes::Model>,
}

#[derive(Debug, Error)]
pub enum HoursError {
    /// A running total would no longer fit its column.
    #[error("hour totals out of range")]
    OutOfRange(FormErrors),
    #[error(transparent)]
    App(#[from] AppError),
}

async fn find_project<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<(project::Model, Option<company::Model>), AppError> {
    project::Entity::find_by_id(id)
        .find_also_related(company::Entity)
        .one(db)
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("project"))
}

/// Adds `deltas` to the stored actual hours of a project and records the change.
///
/// The project row is read again through `db` so the increment applies to the
/// stored values, not to whatever the caller loaded earlier. Concurrent
/// submissions for the same project are not serialised against each other.
pub async fn add_actual_hours<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    user_id: i32,
    deltas: HourDeltas,
) -> Result<HourUpdate, HoursError> {
    let stored = project::Entity::find_by_id(project_id)
        .one(db)
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("project"))?;

    let design = (stored.actual_design + deltas.design).round_dp(2);
    let development = (stored.actual_development + deltas.development).round_dp(2);
    let testing = (stored.actual_testing + deltas.testing).round_dp(2);
    check_hour_totals(&[
        ("actual_design", design),
        ("actual_development", development),
        ("actual_testing", testing),
    ])
    .map_err(HoursError::OutOfRange)?;

    let mut active: project::ActiveModel = stored.clone().into();
    active.actual_design = Set(design);
    active.actual_development = Set(development);
    active.actual_testing = Set(testing);
    let updated = active.update(db).await.map_err(AppError::db)?;

    if deltas.is_zero() {
        debug!("project {} saved without hour changes", project_id);
        return Ok(HourUpdate {
            project: updated,
            change: None,
        });
    }

    let change = project_changes::ActiveModel {
        user_id: Set(user_id),
        project_id: Set(project_id),
        change_date: Set(Utc::now()),
        initial_actual_design: Set(stored.actual_design),
        delta_actual_design: Set(deltas.design),
        result_actual_design: Set(updated.actual_design),
        initial_actual_development: Set(stored.actual_development),
        delta_actual_development: Set(deltas.development),
        result_actual_development: Set(updated.actual_development),
        initial_actual_testing: Set(stored.actual_testing),
        delta_actual_testing: Set(deltas.testing),
        result_actual_testing: Set(updated.actual_testing),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(AppError::db)?;

    Ok(HourUpdate {
        project: updated,
        change: Some(change),
    })
}

async fn hours_form(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse, AppError> {
    let (id, _slug) = path.into_inner();
    let (project, company) = find_project(db.get_ref(), id).await?;
    let zero = Some("0".to_string());
    let ctx = HoursContext {
        project: to_project_dto(&project, company.as_ref()),
        form: HoursForm {
            actual_design: zero.clone(),
            actual_development: zero.clone(),
            actual_testing: zero,
        },
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn update_hours(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<(i32, String)>,
    form: web::Form<HoursForm>,
) -> Result<HttpResponse, AppError> {
    let (id, _slug) = path.into_inner();
    let (project, company) = find_project(db.get_ref(), id).await?;
    let form = form.into_inner();

    let deltas = match form.validate() {
        Ok(deltas) => deltas,
        Err(errors) => {
            let ctx = HoursContext {
                project: to_project_dto(&project, company.as_ref()),
                form,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let user_id = auth.user_id;
    let update = match db
        .transaction::<_, HourUpdate, HoursError>(|txn| {
            Box::pin(async move { add_actual_hours(txn, id, user_id, deltas).await })
        })
        .await
    {
        Ok(update) => update,
        Err(TransactionError::Transaction(HoursError::OutOfRange(errors))) => {
            let ctx = HoursContext {
                project: to_project_dto(&project, company.as_ref()),
                form,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
        Err(TransactionError::Transaction(HoursError::App(e))) => return Err(e),
        Err(TransactionError::Connection(e)) => return Err(AppError::db(e)),
    };

    if let Some(change) = &update.change {
        info!(
            "{} added hours to project {} (change {})",
            auth.username, update.project.id, change.id
        );
    }

    Ok(see_other(DASHBOARD_URL))
}

async fn tags_form(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse, AppError> {
    let (id, _slug) = path.into_inner();
    let (project, company) = find_project(db.get_ref(), id).await?;
    let selected = project_tag_relation::Entity::find()
        .filter(project_tag_relation::Column::ProjectId.eq(id))
        .order_by_asc(project_tag_relation::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(AppError::db)?
        .into_iter()
        .map(|r| r.tag_id)
        .collect();
    let ctx = TagsContext {
        project: to_project_dto(&project, company.as_ref()),
        tags: all_tags(db.get_ref()).await?,
        selected,
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn update_tags(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<(i32, String)>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let (id, _slug) = path.into_inner();
    let (project, company) = find_project(db.get_ref(), id).await?;
    let tags = all_tags(db.get_ref()).await?;

    let checked = parse_tag_ids(&form).and_then(|ids| {
        let mut errors = FormErrors::new();
        if ids.is_empty() {
            add_error(&mut errors, "tags", "This field is required.");
        }
        for tag_id in &ids {
            if !tags.iter().any(|t| t.id == *tag_id) {
                add_error(
                    &mut errors,
                    "tags",
                    format!("Select a valid choice. {} is not one of the available choices.", tag_id),
                );
            }
        }
        if errors.is_empty() {
            Ok(ids)
        } else {
            Err(errors)
        }
    });

    let tag_ids = match checked {
        Ok(ids) => ids,
        Err(errors) => {
            let ctx = TagsContext {
                project: to_project_dto(&project, company.as_ref()),
                tags,
                selected: Vec::new(),
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move { replace_project_tags(txn, id, &tag_ids).await })
    })
    .await
    .map_err(map_tx_error)?;

    Ok(see_other(DASHBOARD_URL))
}

/// Makes the project's tag set equal to `tag_ids`. Relations that stay keep
/// their original `attached_date`.
pub async fn replace_project_tags<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    tag_ids: &[i32],
) -> Result<(), AppError> {
    let existing = project_tag_relation::Entity::find()
        .filter(project_tag_relation::Column::ProjectId.eq(project_id))
        .all(db)
        .await
        .map_err(AppError::db)?;

    let wanted: HashSet<i32> = tag_ids.iter().copied().collect();
    let stale: Vec<i32> = existing
        .iter()
        .filter(|r| !wanted.contains(&r.tag_id))
        .map(|r| r.id)
        .collect();
    if !stale.is_empty() {
        project_tag_relation::Entity::delete_many()
            .filter(project_tag_relation::Column::Id.is_in(stale))
            .exec(db)
            .await
            .map_err(AppError::db)?;
    }

    let now = Utc::now();
    for tag_id in tag_ids {
        if existing.iter().any(|r| r.tag_id == *tag_id) {
            continue;
        }
        project_tag_relation::ActiveModel {
            project_id: Set(project_id),
            tag_id: Set(*tag_id),
            attached_date: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(AppError::db)?;
    }
    Ok(())
}

async fn all_tags(db: &DatabaseConnection) -> Result<Vec<tag::Model>, AppError> {
    tag::Entity::find()
        .order_by_asc(tag::Column::Id)
        .all(db)
        .await
        .map_err(AppError::db)
}

async fn all_companies(db: &DatabaseConnection) -> Result<Vec<company::Model>, AppError> {
    company::Entity::find()
        .order_by_asc(company::Column::Name)
        .all(db)
        .await
        .map_err(AppError::db)
}

async fn create_form(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let ctx = CreateContext {
        companies: all_companies(db.get_ref()).await?,
        form: ProjectForm::default(),
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    form: web::Form<ProjectForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let companies = all_companies(db.get_ref()).await?;

    let checked = form.validate().and_then(|new_project| {
        if companies.iter().any(|c| c.id == new_project.company_id) {
            Ok(new_project)
        } else {
            let mut errors = FormErrors::new();
            add_error(&mut errors, "company", "Select a valid choice.");
            Err(errors)
        }
    });

    let new_project: NewProject = match checked {
        Ok(p) => p,
        Err(errors) => {
            let ctx = CreateContext {
                companies,
                form,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let zero = Decimal::ZERO;
    let saved = project::ActiveModel {
        company_id: Set(new_project.company_id),
        title: Set(new_project.title),
        start_date: Set(new_project.start_date),
        end_date: Set(new_project.end_date),
        estimated_design: Set(new_project.estimated.design),
        actual_design: Set(zero),
        estimated_development: Set(new_project.estimated.development),
        actual_development: Set(zero),
        estimated_testing: Set(new_project.estimated.testing),
        actual_testing: Set(zero),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await
    .map_err(AppError::db)?;

    info!("project {} created", saved.id);
    Ok(see_other(saved.absolute_url()))
}

async fn changes(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse, AppError> {
    let (id, _slug) = path.into_inner();
    find_project(db.get_ref(), id).await?;

    let rows = project_changes::Entity::find()
        .filter(project_changes::Column::ProjectId.eq(id))
        .find_also_related(user::Entity)
        .order_by_desc(project_changes::Column::ChangeDate)
        .order_by_desc(project_changes::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(AppError::db)?;

    let list = rows
        .into_iter()
        .map(|(c, u)| ChangeDto {
            id: c.id,
            user: u.map(|u| u.username),
            change_date: c.change_date.to_rfc3339(),
            initial: [
                c.initial_actual_design,
                c.initial_actual_development,
                c.initial_actual_testing,
            ],
            delta: [
                c.delta_actual_design,
                c.delta_actual_development,
                c.delta_actual_testing,
            ],
            result: [
                c.result_actual_design,
                c.result_actual_development,
                c.result_actual_testing,
            ],
        })
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}
