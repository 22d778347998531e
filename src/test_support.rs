//! Seeded in-memory database shared by the route tests.

use actix_web::cookie::Cookie;
use chrono::{NaiveDate, Utc};
use sea_orm::prelude::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::db::connect_memory;
use crate::entity::{company, project, project_tag_relation, tag, user};
use crate::routes::account::create_user;

pub const USERNAME: &str = "Thorgate";
pub const PASSWORD: &str = "thorgate123";

pub struct Fixture {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub user: user::Model,
    /// In insertion order: two finished projects, then one without an end date.
    pub projects: Vec<project::Model>,
    pub tags: Vec<tag::Model>,
}

impl Fixture {
    pub fn cookie(&self) -> Cookie<'static> {
        let token = issue_token(&self.config, self.user.id).unwrap();
        Cookie::new(self.config.token_cookie.clone(), token)
    }

    pub fn tag(&self, name: &str) -> tag::Model {
        self.tags.iter().find(|t| t.name == name).cloned().unwrap()
    }
}

macro_rules! init_app {
    ($fx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($fx.config.clone()))
                .app_data(actix_web::web::Data::new($fx.db.clone()))
                .app_data($crate::routes::form_config())
                .configure($crate::routes::configure),
        )
        .await
    };
}
pub(crate) use init_app;

fn hours(v: i64) -> Decimal {
    Decimal::from(v)
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

async fn insert_company(db: &DatabaseConnection, name: &str) -> company::Model {
    company::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn insert_project(
    db: &DatabaseConnection,
    company_id: i32,
    title: &str,
    dates: (Option<NaiveDate>, Option<NaiveDate>),
    estimated: [i64; 3],
    actual: [i64; 3],
) -> project::Model {
    project::ActiveModel {
        company_id: Set(company_id),
        title: Set(title.to_string()),
        start_date: Set(dates.0),
        end_date: Set(dates.1),
        estimated_design: Set(hours(estimated[0])),
        actual_design: Set(hours(actual[0])),
        estimated_development: Set(hours(estimated[1])),
        actual_development: Set(hours(actual[1])),
        estimated_testing: Set(hours(estimated[2])),
        actual_testing: Set(hours(actual[2])),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn attach(db: &DatabaseConnection, project_id: i32, tag_id: i32) {
    project_tag_relation::ActiveModel {
        project_id: Set(project_id),
        tag_id: Set(tag_id),
        attached_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn fixture() -> Fixture {
    let db = connect_memory().await.unwrap();
    let config = AppConfig::for_tests();
    let user = create_user(&db, USERNAME, PASSWORD, 4).await.unwrap();

    let bank = insert_company(&db, "Big Bank").await;
    let candy = insert_company(&db, "Sweet Candy").await;
    let thorgate = insert_company(&db, "Thorgate").await;

    let projects = vec![
        insert_project(
            &db,
            bank.id,
            "Mobile banking app",
            (date(2018, 1, 1), date(2018, 6, 30)),
            [300, 300, 90],
            [350, 300, 89],
        )
        .await,
        insert_project(
            &db,
            candy.id,
            "Candy shop website",
            (date(2019, 1, 7), date(2019, 3, 31)),
            [100, 50, 20],
            [30, 20, 10],
        )
        .await,
        insert_project(
            &db,
            thorgate.id,
            "Internal tools",
            (date(2020, 2, 1), None),
            [20, 10, 10],
            [2, 2, 1],
        )
        .await,
    ];

    let mut tags = Vec::new();
    for name in ["python", "rust", "design"] {
        let saved = tag::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        tags.push(saved);
    }

    attach(&db, projects[0].id, tags[0].id).await;
    attach(&db, projects[0].id, tags[2].id).await;
    attach(&db, projects[1].id, tags[1].id).await;

    Fixture {
        db,
        config,
        user,
        projects,
        tags,
    }
}

#[actix_web::test]
async fn fixture_matches_reference_figures() {
    let fx = fixture().await;
    let today = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();

    let ended: Vec<bool> = fx.projects.iter().map(|p| p.has_ended_at(today)).collect();
    assert_eq!(ended, vec![true, true, false]);

    let over: Vec<bool> = fx.projects.iter().map(|p| p.is_over_budget()).collect();
    assert_eq!(over, vec![true, false, false]);

    let estimated: Vec<Decimal> = fx.projects.iter().map(|p| p.total_estimated_hours()).collect();
    assert_eq!(estimated, vec![hours(690), hours(170), hours(40)]);

    let actual: Vec<Decimal> = fx.projects.iter().map(|p| p.total_actual_hours()).collect();
    assert_eq!(actual, vec![hours(739), hours(60), hours(5)]);
}
