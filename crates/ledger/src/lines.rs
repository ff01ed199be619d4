//! Journal lines.
//!
//! A [`JournalLine`] is a single debit or credit against one leaf account,
//! owned by exactly one [`JournalEntry`](crate::JournalEntry).
//!
//! Amounts are unsigned integer **minor units** split across two columns:
//! exactly one of `debit` / `credit` is positive, the other is zero.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: Uuid,
    pub debit: i64,
    pub credit: i64,
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn debit(entry_id: Uuid, line_no: i32, account_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            line_no,
            account_id,
            debit: amount,
            credit: 0,
            memo: None,
        }
    }

    pub fn credit(entry_id: Uuid, line_no: i32, account_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            line_no,
            account_id,
            debit: 0,
            credit: amount,
            memo: None,
        }
    }

    /// The same line with debit and credit swapped, for reversing entries.
    pub fn reversed(&self, entry_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            line_no: self.line_no,
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            memo: self.memo.clone(),
        }
    }

    /// Exactly one side positive, the other zero.
    pub fn validate(&self) -> ResultEngine<()> {
        let valid = match (self.debit, self.credit) {
            (d, 0) if d > 0 => true,
            (0, c) if c > 0 => true,
            _ => false,
        };
        if !valid {
            return Err(EngineError::InvalidAmount(format!(
                "line {} must carry exactly one positive side (debit {}, credit {})",
                self.line_no, self.debit, self.credit
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "journal_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: Uuid,
    pub debit: i64,
    pub credit: i64,
    pub memo: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entries::Entity",
        from = "Column::EntryId",
        to = "super::entries::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Entries,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&JournalLine> for ActiveModel {
    fn from(line: &JournalLine) -> Self {
        Self {
            id: ActiveValue::Set(line.id),
            entry_id: ActiveValue::Set(line.entry_id),
            line_no: ActiveValue::Set(line.line_no),
            account_id: ActiveValue::Set(line.account_id),
            debit: ActiveValue::Set(line.debit),
            credit: ActiveValue::Set(line.credit),
            memo: ActiveValue::Set(line.memo.clone()),
        }
    }
}

impl From<Model> for JournalLine {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            entry_id: model.entry_id,
            line_no: model.line_no,
            account_id: model.account_id,
            debit: model.debit,
            credit: model.credit,
            memo: model.memo,
        }
    }
}
