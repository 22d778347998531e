use actix_web::{web, HttpResponse};
use log::{info, warn};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entity::{company, project};
use crate::error::AppError;
use crate::forms::{CompanyForm, FormErrors};
use crate::response::{see_other, ResponseDto};

const COMPANIES_URL: &str = "/companies/";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(list)))
        .service(
            web::resource("/add/")
                .route(web::get().to(create_form))
                .route(web::post().to(create)),
        )
        .service(
            web::resource("/{id:\\d+}/delete/")
                .route(web::delete().to(remove))
                .route(web::post().to(remove)),
        );
}

#[derive(Serialize)]
struct CompanyFormContext {
    form: CompanyForm,
    errors: FormErrors,
}

async fn list(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let rows = company::Entity::find()
        .order_by_asc(company::Column::Name)
        .all(db.get_ref())
        .await
        .map_err(AppError::db)?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(rows))))
}

async fn create_form(_auth: AuthUser) -> Result<HttpResponse, AppError> {
    let ctx = CompanyFormContext {
        form: CompanyForm::default(),
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    form: web::Form<CompanyForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let ctx = CompanyFormContext { form, errors };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let saved = company::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await
    .map_err(AppError::db)?;
    info!("company {} created", saved.id);

    Ok(see_other(COMPANIES_URL))
}

/// Companies that still own projects cannot be removed.
async fn remove(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let company = company::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("company"))?;

    let owned = project::Entity::find()
        .filter(project::Column::CompanyId.eq(company.id))
        .count(db.get_ref())
        .await
        .map_err(AppError::db)?;
    if owned > 0 {
        warn!(
            "refusing to delete company {}: referenced by {} projects",
            company.id, owned
        );
        return Err(AppError::system_exception());
    }

    company::Entity::delete_by_id(company.id)
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;
    info!("company {} deleted", company.id);

    Ok(see_other(COMPANIES_URL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, init_app};
    use actix_web::{http::StatusCode, test};

    #[actix_web::test]
    async fn company_with_projects_cannot_be_deleted() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let company_id = fx.projects[0].company_id;

        let req = test::TestRequest::delete()
            .uri(&format!("/companies/{}/delete/", company_id))
            .cookie(fx.cookie())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(company::Entity::find_by_id(company_id)
            .one(&fx.db)
            .await
            .unwrap()
            .is_some());
    }

    #[actix_web::test]
    async fn datastore_rejects_deleting_a_referenced_company() {
        let fx = fixture().await;
        let result = company::Entity::delete_by_id(fx.projects[0].company_id)
            .exec(&fx.db)
            .await;
        assert!(result.is_err());
    }

    #[actix_web::test]
    async fn create_then_delete_unused_company() {
        let fx = fixture().await;
        let app = init_app!(fx);

        let req = test::TestRequest::post()
            .uri("/companies/add/")
            .cookie(fx.cookie())
            .set_form([("name", "Acme")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let acme = company::Entity::find()
            .filter(company::Column::Name.eq("Acme"))
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        let req = test::TestRequest::post()
            .uri(&format!("/companies/{}/delete/", acme.id))
            .cookie(fx.cookie())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert!(company::Entity::find_by_id(acme.id).one(&fx.db).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn blank_company_name_is_a_form_error() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let req = test::TestRequest::post()
            .uri("/companies/add/")
            .cookie(fx.cookie())
            .set_form([("name", " ")])
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);
        assert!(body["data"]["errors"]["name"].is_array());
    }
}
