//! Sub-ledgers.
//!
//! A [`Subledger`] is an auxiliary register (a cash box, a bank account) that
//! mirrors the balance of one leaf ASSET account. It is never written
//! directly: every change goes through the linker, which leaves an
//! [`audit`](crate::subledger_audit) row with the previous value.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subledger {
    pub id: Uuid,
    pub name: String,
    pub linked_account_id: Uuid,
    pub balance: Amount,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "subledgers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub linked_account_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::LinkedAccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(has_many = "super::subledger_audit::Entity")]
    Audit,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::subledger_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Audit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Subledger> for ActiveModel {
    fn from(subledger: &Subledger) -> Self {
        Self {
            id: ActiveValue::Set(subledger.id),
            name: ActiveValue::Set(subledger.name.clone()),
            linked_account_id: ActiveValue::Set(subledger.linked_account_id),
            balance: ActiveValue::Set(subledger.balance.minor()),
            updated_at: ActiveValue::Set(subledger.updated_at),
        }
    }
}

impl From<Model> for Subledger {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            linked_account_id: model.linked_account_id,
            balance: Amount::new(model.balance),
            updated_at: model.updated_at,
        }
    }
}
