use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "t_tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_tag_relation::Entity")]
    ProjectTagRelation,
}

impl Related<super::project_tag_relation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectTagRelation.def()
    }
}

impl Model {
    pub fn absolute_url(&self) -> String {
        format!("/tags/{}/", self.id)
    }
}

impl ActiveModelBehavior for ActiveModel {}
