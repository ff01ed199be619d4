use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    EngineError, EntryStatus, EventKind, JournalEntry, JournalLine, ResultEngine, SourceType,
    entries, lines, posting_keys,
};

use super::Engine;

/// Which stored entry statuses `lines_for_account` returns.
///
/// Voided entries keep their stored POSTED status, so `Posted` includes both
/// the voided original and its reversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    Posted,
    Draft,
}

/// Inclusive entry-date bounds. Either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// A journal line together with the header fields of its entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerLine {
    pub line: JournalLine,
    pub entry_date: NaiveDate,
    pub entry_status: EntryStatus,
    pub source_type: SourceType,
    pub source_id: String,
    pub event_kind: EventKind,
}

impl Engine {
    /// Persists an entry, its lines and (when `record_key`) its posting key.
    ///
    /// Runs inside the caller's transaction. The posting key goes first so a
    /// duplicate is refused before anything else is written.
    pub(in crate::ops) async fn append(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &JournalEntry,
        record_key: bool,
    ) -> ResultEngine<Uuid> {
        if entry.status == EntryStatus::Void {
            return Err(EngineError::InvalidState(
                "entries are stored as draft or posted".to_string(),
            ));
        }

        if record_key {
            posting_keys::ActiveModel::new(
                entry.source_type,
                &entry.source_id,
                entry.event_kind,
                entry.id,
                entry.created_at,
            )
            .insert(db_tx)
            .await?;
        }

        entries::ActiveModel::from(entry).insert(db_tx).await?;
        for line in &entry.lines {
            lines::ActiveModel::from(line).insert(db_tx).await?;
        }

        tracing::debug!(
            entry_id = %entry.id,
            source = %entry.source_id,
            lines = entry.lines.len(),
            "journal entry appended"
        );
        Ok(entry.id)
    }

    /// Returns one entry with its lines and effective status.
    pub async fn entry(&self, entry_id: Uuid) -> ResultEngine<JournalEntry> {
        load_entry(&self.database, entry_id).await
    }

    /// Every entry recorded for a source document, reversals included.
    ///
    /// The id is trimmed the same way `request_posting` trims it.
    pub async fn entries_for_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> ResultEngine<Vec<JournalEntry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::SourceType.eq(source_type.as_str()))
            .filter(entries::Column::SourceId.eq(source_id.trim()))
            .order_by_asc(entries::Column::CreatedAt)
            .all(&self.database)
            .await?;
        hydrate(&self.database, models).await
    }

    /// Lines posted against one account, ordered by entry date, entry
    /// creation time and line number.
    pub async fn lines_for_account(
        &self,
        account_id: Uuid,
        status: StatusFilter,
        range: DateRange,
    ) -> ResultEngine<Vec<LedgerLine>> {
        let mut query = lines::Entity::find()
            .find_also_related(entries::Entity)
            .filter(lines::Column::AccountId.eq(account_id));
        query = match status {
            StatusFilter::Any => query,
            StatusFilter::Posted => {
                query.filter(entries::Column::Status.eq(EntryStatus::Posted.as_str()))
            }
            StatusFilter::Draft => {
                query.filter(entries::Column::Status.eq(EntryStatus::Draft.as_str()))
            }
        };
        if let Some(from) = range.from {
            query = query.filter(entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(entries::Column::EntryDate.lte(to));
        }

        let rows = query
            .order_by_asc(entries::Column::EntryDate)
            .order_by_asc(entries::Column::CreatedAt)
            .order_by_asc(lines::Column::LineNo)
            .all(&self.database)
            .await?;

        let mut result = Vec::with_capacity(rows.len());
        for (line, entry) in rows {
            let entry = entry.ok_or_else(|| {
                EngineError::KeyNotFound(format!("entry {} of line {}", line.entry_id, line.id))
            })?;
            result.push(LedgerLine {
                line: JournalLine::from(line),
                entry_date: entry.entry_date,
                entry_status: EntryStatus::try_from(entry.status.as_str())?,
                source_type: SourceType::try_from(entry.source_type.as_str())?,
                source_id: entry.source_id,
                event_kind: EventKind::try_from(entry.event_kind.as_str())?,
            });
        }
        Ok(result)
    }
}

pub(in crate::ops) async fn load_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> ResultEngine<JournalEntry> {
    let model = entries::Entity::find_by_id(entry_id)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("journal entry {entry_id}")))?;
    hydrate(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| EngineError::KeyNotFound(format!("journal entry {entry_id}")))
}

/// The entry recorded under a posting key, if any.
pub(in crate::ops) async fn entry_for_key<C: ConnectionTrait>(
    conn: &C,
    source_type: SourceType,
    source_id: &str,
    event_kind: EventKind,
) -> ResultEngine<Option<JournalEntry>> {
    let key = posting_keys::Entity::find_by_id((
        source_type.as_str().to_string(),
        source_id.to_string(),
        event_kind.as_str().to_string(),
    ))
    .one(conn)
    .await?;
    match key {
        Some(key) => Ok(Some(load_entry(conn, key.entry_id).await?)),
        None => Ok(None),
    }
}

/// The reversing entry pointing at `entry_id`, if any.
pub(in crate::ops) async fn reversal_of<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> ResultEngine<Option<JournalEntry>> {
    let model = entries::Entity::find()
        .filter(entries::Column::ReversalOf.eq(entry_id))
        .one(conn)
        .await?;
    match model {
        Some(model) => Ok(hydrate(conn, vec![model]).await?.pop()),
        None => Ok(None),
    }
}

/// Attaches lines and derives the VOID status from existing reversals.
async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<entries::Model>,
) -> ResultEngine<Vec<JournalEntry>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();

    let mut lines_by_entry: HashMap<Uuid, Vec<JournalLine>> = HashMap::new();
    for line in lines::Entity::find()
        .filter(lines::Column::EntryId.is_in(ids.clone()))
        .order_by_asc(lines::Column::LineNo)
        .all(conn)
        .await?
    {
        lines_by_entry
            .entry(line.entry_id)
            .or_default()
            .push(JournalLine::from(line));
    }

    let reversed: HashSet<Uuid> = entries::Entity::find()
        .filter(entries::Column::ReversalOf.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|m| m.reversal_of)
        .collect();

    models
        .into_iter()
        .map(|model| {
            let mut entry = JournalEntry::try_from(model)?;
            entry.lines = lines_by_entry.remove(&entry.id).unwrap_or_default();
            if entry.status == EntryStatus::Posted && reversed.contains(&entry.id) {
                entry.status = EntryStatus::Void;
            }
            Ok(entry)
        })
        .collect()
}
