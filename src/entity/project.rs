use chrono::{NaiveDate, Utc};
use sea_orm::entity::prelude::*;

use crate::slug::slugify;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_project")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub company_id: i32,
    pub title: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub estimated_design: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub actual_design: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub estimated_development: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub actual_development: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub estimated_testing: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub actual_testing: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id",
        on_delete = "Restrict"
    )]
    Company,
    #[sea_orm(has_many = "super::project_tag_relation::Entity")]
    ProjectTagRelation,
    #[sea_orm(has_many = "super::project_changes::Entity")]
    ProjectChanges,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::project_tag_relation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectTagRelation.def()
    }
}

impl Related<super::project_changes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectChanges.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::project_tag_relation::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::project_tag_relation::Relation::Project.def().rev())
    }
}

impl Model {
    pub fn total_estimated_hours(&self) -> Decimal {
        self.estimated_design + self.estimated_development + self.estimated_testing
    }

    pub fn total_actual_hours(&self) -> Decimal {
        self.actual_design + self.actual_development + self.actual_testing
    }

    pub fn is_over_budget(&self) -> bool {
        self.total_actual_hours() > self.total_estimated_hours()
    }

    pub fn has_ended(&self) -> bool {
        self.has_ended_at(Utc::now().date_naive())
    }

    /// True when an end date is set and lies strictly before `today`.
    pub fn has_ended_at(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }

    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    pub fn absolute_url(&self) -> String {
        format!("/projects/{}-{}/", self.id, self.slug())
    }
}

impl ActiveModelBehavior for ActiveModel {}
