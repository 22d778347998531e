use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub created: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_changes::Entity")]
    ProjectChanges,
}

impl Related<super::project_changes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectChanges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
