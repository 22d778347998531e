use actix_web::{web, HttpResponse};
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entity::{project_tag_relation, tag};
use crate::error::{map_tx_error, AppError};
use crate::forms::{FormErrors, TagForm};
use crate::response::{see_other, ResponseDto};

const TAGS_URL: &str = "/tags/";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(list)))
        .service(
            web::resource("/add/")
                .route(web::get().to(create_form))
                .route(web::post().to(create)),
        )
        .service(web::resource("/{id:\\d+}/").route(web::get().to(retrieve)))
        .service(
            web::resource("/{id:\\d+}/update/")
                .route(web::get().to(update_form))
                .route(web::post().to(update)),
        )
        .service(
            web::resource("/{id:\\d+}/delete/")
                .route(web::delete().to(remove))
                .route(web::post().to(remove)),
        );
}

#[derive(Serialize)]
struct TagDto {
    id: i32,
    name: String,
    url: String,
}

#[derive(Serialize)]
struct TagFormContext {
    tag: Option<TagDto>,
    form: TagForm,
    errors: FormErrors,
}

fn to_dto(model: tag::Model) -> TagDto {
    TagDto {
        url: model.absolute_url(),
        id: model.id,
        name: model.name,
    }
}

async fn find_tag(db: &DatabaseConnection, id: i32) -> Result<tag::Model, AppError> {
    tag::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("tag"))
}

async fn list(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let rows = tag::Entity::find()
        .order_by_asc(tag::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(AppError::db)?;
    let list = rows.into_iter().map(to_dto).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn retrieve(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tag = find_tag(db.get_ref(), *path).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(to_dto(tag)))))
}

async fn create_form(_auth: AuthUser) -> Result<HttpResponse, AppError> {
    let ctx = TagFormContext {
        tag: None,
        form: TagForm::default(),
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    form: web::Form<TagForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let ctx = TagFormContext {
                tag: None,
                form,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let saved = tag::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await
    .map_err(AppError::db)?;
    info!("tag {} created", saved.id);

    Ok(see_other(TAGS_URL))
}

async fn update_form(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tag = find_tag(db.get_ref(), *path).await?;
    let ctx = TagFormContext {
        form: TagForm {
            name: Some(tag.name.clone()),
        },
        tag: Some(to_dto(tag)),
        errors: FormErrors::new(),
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(ctx))))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
    form: web::Form<TagForm>,
) -> Result<HttpResponse, AppError> {
    let tag = find_tag(db.get_ref(), *path).await?;
    let form = form.into_inner();
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let ctx = TagFormContext {
                tag: Some(to_dto(tag)),
                form,
                errors,
            };
            return Ok(HttpResponse::Ok().json(ResponseDto::invalid_form(ctx)));
        }
    };

    let mut active: tag::ActiveModel = tag.into();
    active.name = Set(name);
    let saved = active.update(db.get_ref()).await.map_err(AppError::db)?;

    Ok(see_other(saved.absolute_url()))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tag = find_tag(db.get_ref(), *path).await?;
    let tag_id = tag.id;

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move { delete_tag(txn, tag_id).await })
    })
    .await
    .map_err(map_tx_error)?;
    info!("tag {} ({}) deleted", tag_id, tag.name);

    Ok(see_other(TAGS_URL))
}

/// Removes the tag together with every project attachment it has.
pub async fn delete_tag<C: ConnectionTrait>(db: &C, tag_id: i32) -> Result<(), AppError> {
    project_tag_relation::Entity::delete_many()
        .filter(project_tag_relation::Column::TagId.eq(tag_id))
        .exec(db)
        .await
        .map_err(AppError::db)?;
    tag::Entity::delete_by_id(tag_id)
        .exec(db)
        .await
        .map_err(AppError::db)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::project;
    use crate::test_support::{fixture, init_app};
    use actix_web::{http::header::LOCATION, http::StatusCode, test};
    use sea_orm::{ModelTrait, PaginatorTrait};

    #[actix_web::test]
    async fn create_tag() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let before = tag::Entity::find().count(&fx.db).await.unwrap();

        let req = test::TestRequest::post()
            .uri("/tags/add/")
            .cookie(fx.cookie())
            .set_form([("name", "devops")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), TAGS_URL);

        assert_eq!(tag::Entity::find().count(&fx.db).await.unwrap(), before + 1);
        let newest = tag::Entity::find()
            .order_by_desc(tag::Column::Id)
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(newest.name, "devops");
    }

    #[actix_web::test]
    async fn create_tag_rejects_long_names() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let before = tag::Entity::find().count(&fx.db).await.unwrap();

        let req = test::TestRequest::post()
            .uri("/tags/add/")
            .cookie(fx.cookie())
            .set_form([("name", "a-name-longer-than-16")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 1);
        assert!(body["data"]["errors"]["name"].is_array());
        assert_eq!(tag::Entity::find().count(&fx.db).await.unwrap(), before);
    }

    #[actix_web::test]
    async fn list_tags() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let req = test::TestRequest::get()
            .uri("/tags/")
            .cookie(fx.cookie())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        let expected: Vec<&str> = fx.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[actix_web::test]
    async fn retrieve_tag() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let tag = fx.tags.last().unwrap();
        let req = test::TestRequest::get()
            .uri(&tag.absolute_url())
            .cookie(fx.cookie())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["id"], tag.id);
        assert_eq!(body["data"]["name"], tag.name.as_str());

        let req = test::TestRequest::get()
            .uri("/tags/999/")
            .cookie(fx.cookie())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn update_tag() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let tag = fx.tags.last().unwrap();
        let req = test::TestRequest::post()
            .uri(&format!("/tags/{}/update/", tag.id))
            .cookie(fx.cookie())
            .set_form([("name", "devops")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers().get(LOCATION).unwrap().to_str().unwrap(),
            tag.absolute_url()
        );

        let saved = tag::Entity::find_by_id(tag.id).one(&fx.db).await.unwrap().unwrap();
        assert_eq!(saved.name, "devops");
    }

    #[actix_web::test]
    async fn delete_tag_cascades_to_projects() {
        let fx = fixture().await;
        let app = init_app!(fx);
        let python = fx.tag("python");
        let tagged = &fx.projects[0];

        let req = test::TestRequest::delete()
            .uri(&format!("/tags/{}/delete/", python.id))
            .cookie(fx.cookie())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), TAGS_URL);

        assert!(tag::Entity::find_by_id(python.id).one(&fx.db).await.unwrap().is_none());
        let remaining = project_tag_relation::Entity::find()
            .filter(project_tag_relation::Column::TagId.eq(python.id))
            .count(&fx.db)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        let tags = tagged.find_related(tag::Entity).all(&fx.db).await.unwrap();
        assert!(tags.iter().all(|t| t.id != python.id));
        assert_eq!(tags.len(), 1);
        assert!(project::Entity::find_by_id(tagged.id).one(&fx.db).await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn tag_routes_require_login() {
        let fx = fixture().await;
        let app = init_app!(fx);
        for uri in ["/tags/", "/tags/add/", "/tags/1/", "/tags/1/update/"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
        }
    }
}
