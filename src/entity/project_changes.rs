use sea_orm::entity::prelude::*;

/// Append-only record of one hour update. For every phase `result = initial + delta`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_project_changes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub change_date: DateTimeUtc,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub initial_actual_design: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub delta_actual_design: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub result_actual_design: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub initial_actual_development: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub delta_actual_development: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub result_actual_development: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub initial_actual_testing: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub delta_actual_testing: Decimal,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub result_actual_testing: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
