//! Accounting periods.
//!
//! Closing a period moves its revenue and expense balances into retained
//! earnings with one closing entry and freezes every date in the range: the
//! gate refuses to write entries dated inside a closed period. Reopening
//! reverses the closing entry and lifts the freeze.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: String,
    pub is_closed: bool,
    /// `None` when the period had no revenue or expense to close.
    pub closing_entry_id: Option<Uuid>,
    pub total_revenue: Amount,
    pub total_expense: Amount,
    pub net_income: Amount,
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: String,
}

impl AccountingPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounting_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub description: String,
    pub is_closed: bool,
    pub closing_entry_id: Option<Uuid>,
    pub total_revenue: i64,
    pub total_expense: i64,
    pub net_income: i64,
    pub closed_at: Option<DateTimeUtc>,
    pub notes: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entries::Entity",
        from = "Column::ClosingEntryId",
        to = "super::entries::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ClosingEntry,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClosingEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AccountingPeriod> for ActiveModel {
    fn from(period: &AccountingPeriod) -> Self {
        Self {
            id: ActiveValue::Set(period.id),
            start_date: ActiveValue::Set(period.start_date),
            end_date: ActiveValue::Set(period.end_date),
            description: ActiveValue::Set(period.description.clone()),
            is_closed: ActiveValue::Set(period.is_closed),
            closing_entry_id: ActiveValue::Set(period.closing_entry_id),
            total_revenue: ActiveValue::Set(period.total_revenue.minor()),
            total_expense: ActiveValue::Set(period.total_expense.minor()),
            net_income: ActiveValue::Set(period.net_income.minor()),
            closed_at: ActiveValue::Set(period.closed_at),
            notes: ActiveValue::Set(period.notes.clone()),
        }
    }
}

impl From<Model> for AccountingPeriod {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            start_date: model.start_date,
            end_date: model.end_date,
            description: model.description,
            is_closed: model.is_closed,
            closing_entry_id: model.closing_entry_id,
            total_revenue: Amount::new(model.total_revenue),
            total_expense: Amount::new(model.total_expense),
            net_income: Amount::new(model.net_income),
            closed_at: model.closed_at,
            notes: model.notes,
        }
    }
}
