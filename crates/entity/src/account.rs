use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Application login account. `employee_id` links back to the employee
/// record the account belongs to; employees provisioned while the identity
/// store was unavailable may have no account at all.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub employee_id: Option<Uuid>,
    pub locked_until: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_role::Entity")]
    AccountRole,
    #[sea_orm(has_one = "super::account_secret::Entity")]
    AccountSecret,
}

impl Related<super::account_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountRole.def()
    }
}

impl Related<super::account_secret::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountSecret.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
