//! Journal entry primitives.
//!
//! A [`JournalEntry`] is an atomic, append-only fact that changes account
//! balances via two or more [`JournalLine`](crate::JournalLine)s. Once
//! POSTED it is never edited: corrections are made by posting a reversing
//! entry that links back through `reversal_of`.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, JournalLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Sale,
    Purchase,
    Payment,
    Adjustment,
    OpeningBalance,
    /// System entries that move revenue and expense into retained earnings.
    PeriodClose,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Purchase => "purchase",
            Self::Payment => "payment",
            Self::Adjustment => "adjustment",
            Self::OpeningBalance => "opening_balance",
            Self::PeriodClose => "period_close",
        }
    }
}

impl TryFrom<&str> for SourceType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "sale" => Ok(Self::Sale),
            "purchase" => Ok(Self::Purchase),
            "payment" => Ok(Self::Payment),
            "adjustment" => Ok(Self::Adjustment),
            "opening_balance" => Ok(Self::OpeningBalance),
            "period_close" => Ok(Self::PeriodClose),
            other => Err(EngineError::InvalidState(format!(
                "invalid source type: {other}"
            ))),
        }
    }
}

/// The business event a posting records for its source document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Invoice,
    Settlement,
    Adjustment,
    OpeningBalance,
    /// Reserved for reversing entries created by `void_entry`.
    Reversal,
    /// Reserved for the entry written by `close_period`.
    Closing,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Settlement => "settlement",
            Self::Adjustment => "adjustment",
            Self::OpeningBalance => "opening_balance",
            Self::Reversal => "reversal",
            Self::Closing => "closing",
        }
    }
}

impl TryFrom<&str> for EventKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "invoice" => Ok(Self::Invoice),
            "settlement" => Ok(Self::Settlement),
            "adjustment" => Ok(Self::Adjustment),
            "opening_balance" => Ok(Self::OpeningBalance),
            "reversal" => Ok(Self::Reversal),
            "closing" => Ok(Self::Closing),
            other => Err(EngineError::InvalidState(format!(
                "invalid event kind: {other}"
            ))),
        }
    }
}

/// Entry status.
///
/// Only `Draft` and `Posted` are ever written. `Void` is reported for an
/// entry that a later reversing entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Draft,
    Posted,
    Void,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
            Self::Void => "void",
        }
    }
}

impl TryFrom<&str> for EntryStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "posted" => Ok(Self::Posted),
            "void" => Ok(Self::Void),
            other => Err(EngineError::InvalidState(format!(
                "invalid entry status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub entry_date: NaiveDate,
    pub source_type: SourceType,
    pub source_id: String,
    pub event_kind: EventKind,
    pub description: String,
    pub status: EntryStatus,
    pub reversal_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// A fresh draft with no lines.
    pub fn draft(
        entry_date: NaiveDate,
        source_type: SourceType,
        source_id: String,
        event_kind: EventKind,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_date,
            source_type,
            source_id,
            event_kind,
            description,
            status: EntryStatus::Draft,
            reversal_of: None,
            created_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    pub fn total_debit(&self) -> i64 {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> i64 {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    /// Whether writing this entry binds its `(source, event)` posting key.
    ///
    /// Reversals and closing entries are tracked through `reversal_of` and
    /// the period they close instead.
    pub fn records_posting_key(&self) -> bool {
        self.reversal_of.is_none() && self.event_kind != EventKind::Closing
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entry_date: Date,
    pub source_type: String,
    pub source_id: String,
    pub event_kind: String,
    pub description: String,
    pub status: String,
    #[sea_orm(unique)]
    pub reversal_of: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::lines::Entity")]
    Lines,
}

impl Related<super::lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&JournalEntry> for ActiveModel {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id),
            entry_date: ActiveValue::Set(entry.entry_date),
            source_type: ActiveValue::Set(entry.source_type.as_str().to_string()),
            source_id: ActiveValue::Set(entry.source_id.clone()),
            event_kind: ActiveValue::Set(entry.event_kind.as_str().to_string()),
            description: ActiveValue::Set(entry.description.clone()),
            status: ActiveValue::Set(entry.status.as_str().to_string()),
            reversal_of: ActiveValue::Set(entry.reversal_of),
            created_at: ActiveValue::Set(entry.created_at),
        }
    }
}

impl TryFrom<Model> for JournalEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            entry_date: model.entry_date,
            source_type: SourceType::try_from(model.source_type.as_str())?,
            source_id: model.source_id,
            event_kind: EventKind::try_from(model.event_kind.as_str())?,
            description: model.description,
            status: EntryStatus::try_from(model.status.as_str())?,
            reversal_of: model.reversal_of,
            created_at: model.created_at,
            lines: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms_round_trip() {
        for kind in [
            SourceType::Sale,
            SourceType::Purchase,
            SourceType::Payment,
            SourceType::Adjustment,
            SourceType::OpeningBalance,
            SourceType::PeriodClose,
        ] {
            assert_eq!(SourceType::try_from(kind.as_str()).unwrap(), kind);
        }
        assert_eq!(
            EventKind::try_from("OPENING_BALANCE").unwrap(),
            EventKind::OpeningBalance
        );
        assert!(EntryStatus::try_from("deleted").is_err());
    }
}
