use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::status::RecordStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "department")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(indexed)]
    pub manager_id: Option<Uuid>,
    pub status: RecordStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::employee_department::Entity")]
    EmployeeDepartment,
}

impl Related<super::employee_department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmployeeDepartment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
