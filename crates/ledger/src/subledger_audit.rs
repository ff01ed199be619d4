//! Append-only trail of every sub-ledger balance change.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

/// Why a sub-ledger balance was rewritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// Initial value when the sub-ledger was linked.
    Linked,
    /// Mirrored from a posting on the linked account.
    Posting,
    /// Explicit `sync_subledger` / `resync` call.
    Resync,
}

impl SyncReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::Posting => "posting",
            Self::Resync => "resync",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerAudit {
    pub id: Uuid,
    pub subledger_id: Uuid,
    pub previous_balance: Amount,
    pub new_balance: Amount,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "subledger_audit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subledger_id: Uuid,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub reason: String,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subledgers::Entity",
        from = "Column::SubledgerId",
        to = "super::subledgers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Subledgers,
}

impl Related<super::subledgers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subledgers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn record(
        subledger_id: Uuid,
        previous_balance: Amount,
        new_balance: Amount,
        reason: SyncReason,
    ) -> Self {
        Self {
            id: ActiveValue::Set(Uuid::new_v4()),
            subledger_id: ActiveValue::Set(subledger_id),
            previous_balance: ActiveValue::Set(previous_balance.minor()),
            new_balance: ActiveValue::Set(new_balance.minor()),
            reason: ActiveValue::Set(reason.as_str().to_string()),
            recorded_at: ActiveValue::Set(Utc::now()),
        }
    }
}

impl From<Model> for SubledgerAudit {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            subledger_id: model.subledger_id,
            previous_balance: Amount::new(model.previous_balance),
            new_balance: Amount::new(model.new_balance),
            reason: model.reason,
            recorded_at: model.recorded_at,
        }
    }
}
