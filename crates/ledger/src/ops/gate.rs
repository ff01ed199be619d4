use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AccountKind, Amount, DocumentStatus, EngineError, EntryStatus, EventKind, JournalEntry,
    JournalLine, LineDraft, ResultEngine, SourceDocument, SourceType, SyncReason, accounts,
    subledger_audit, subledgers,
    util::{is_unique_violation, normalize_required},
};

use super::{
    Engine,
    periods::ensure_open,
    projector::project_model,
    store::{entry_for_key, reversal_of},
    with_tx,
};

/// Lifecycle states in which a `(source type, event)` pair may post.
///
/// `None` means the pair is not a business event the ledger records.
pub fn allowed_statuses(
    source_type: SourceType,
    event_kind: EventKind,
) -> Option<&'static [DocumentStatus]> {
    use DocumentStatus as S;
    match (source_type, event_kind) {
        (SourceType::Sale, EventKind::Invoice) => Some(&[S::Invoiced, S::Paid]),
        (SourceType::Purchase, EventKind::Invoice) => {
            Some(&[S::Approved, S::Completed, S::Paid])
        }
        (SourceType::Payment, EventKind::Settlement) => Some(&[S::Completed]),
        (SourceType::Adjustment, EventKind::Adjustment) => Some(&[S::Approved]),
        (SourceType::OpeningBalance, EventKind::OpeningBalance) => Some(&[S::Approved]),
        _ => None,
    }
}

fn ensure_postable(document: &SourceDocument, event_kind: EventKind) -> ResultEngine<()> {
    let allowed = allowed_statuses(document.source_type, event_kind).ok_or_else(|| {
        EngineError::InvalidState(format!(
            "event {} not supported for source type {}",
            event_kind.as_str(),
            document.source_type.as_str()
        ))
    })?;
    if !allowed.contains(&document.status) {
        let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        return Err(EngineError::InvalidState(format!(
            "{} is {}; {} posting requires one of [{}]",
            document.label(),
            document.status.as_str(),
            event_kind.as_str(),
            names.join(", ")
        )));
    }
    Ok(())
}

/// Checks every invariant of a journal entry before it can be written.
pub(in crate::ops) fn validate_entry(entry: &JournalEntry) -> ResultEngine<()> {
    if entry.lines.len() < 2 {
        return Err(EngineError::InvalidAmount(format!(
            "entry needs at least two lines, got {}",
            entry.lines.len()
        )));
    }
    for line in &entry.lines {
        line.validate()?;
    }

    let overflow = || EngineError::InvalidAmount("entry totals overflow".to_string());
    let mut debit: i64 = 0;
    let mut credit: i64 = 0;
    for line in &entry.lines {
        debit = debit.checked_add(line.debit).ok_or_else(overflow)?;
        credit = credit.checked_add(line.credit).ok_or_else(overflow)?;
    }
    if debit != credit {
        return Err(EngineError::UnbalancedEntry { debit, credit });
    }
    Ok(())
}

impl Engine {
    /// Records a business event of a source document as a POSTED journal
    /// entry.
    ///
    /// The document status must be allowed for the event. Posting the same
    /// `(source type, source id, event)` again returns the entry recorded
    /// the first time.
    pub async fn request_posting(
        &self,
        document: &SourceDocument,
        event_kind: EventKind,
    ) -> ResultEngine<JournalEntry> {
        let source_id = normalize_required(&document.source_id, "source id")
            .map_err(|_| EngineError::InvalidId("source id must not be empty".to_string()))?;
        if let Err(err) = ensure_postable(document, event_kind) {
            tracing::info!(source = %document.label(), "posting refused: {err}");
            return Err(err);
        }

        if let Some(existing) =
            entry_for_key(&self.database, document.source_type, &source_id, event_kind).await?
        {
            tracing::debug!(
                entry_id = %existing.id,
                source = %document.label(),
                "posting already recorded"
            );
            return Ok(existing);
        }

        let builder = self
            .builders
            .get(&(document.source_type, event_kind))
            .ok_or_else(|| {
                EngineError::InvalidState(format!(
                    "no line builder for {} {}",
                    document.source_type.as_str(),
                    event_kind.as_str()
                ))
            })?;
        let drafts = builder.build(document, &self.settings.accounts)?;

        let description = format!("{} {}", document.label(), event_kind.as_str());
        let mut entry = JournalEntry::draft(
            document.date,
            document.source_type,
            source_id,
            event_kind,
            description,
        );
        entry.lines = self.resolve_lines(entry.id, &drafts).await?;
        validate_entry(&entry)?;
        entry.status = EntryStatus::Posted;

        let posted = self
            .retrying("request_posting", || self.commit_entry(&entry))
            .await?;
        tracing::info!(
            entry_id = %posted.id,
            source = %document.label(),
            event = event_kind.as_str(),
            amount = posted.total_debit(),
            "entry posted"
        );
        Ok(posted)
    }

    /// Voids a POSTED entry by posting its reversal.
    ///
    /// The reversal carries the same accounts with debit and credit swapped.
    /// Voiding twice returns the first reversal.
    pub async fn void_entry(&self, entry_id: Uuid, reason: &str) -> ResultEngine<JournalEntry> {
        let reason = normalize_required(reason, "void reason")
            .map_err(|_| EngineError::InvalidState("a void reason is required".to_string()))?;
        let original = self.entry(entry_id).await?;

        if original.reversal_of.is_some() {
            return Err(EngineError::InvalidState(format!(
                "entry {entry_id} is itself a reversal"
            )));
        }
        if original.source_type == SourceType::PeriodClose {
            return Err(EngineError::InvalidState(format!(
                "entry {entry_id} closes a period; reopen the period instead"
            )));
        }
        match original.status {
            EntryStatus::Draft => {
                return Err(EngineError::InvalidState(format!(
                    "entry {entry_id} is a draft and cannot be voided"
                )));
            }
            EntryStatus::Void => {
                if let Some(existing) = reversal_of(&self.database, entry_id).await? {
                    return Ok(existing);
                }
            }
            EntryStatus::Posted => {}
        }

        let mut reversal = JournalEntry::draft(
            Utc::now().date_naive(),
            original.source_type,
            original.source_id.clone(),
            EventKind::Reversal,
            format!("Void of {}: {reason}", original.description),
        );
        reversal.reversal_of = Some(original.id);
        reversal.lines = original
            .lines
            .iter()
            .map(|line| line.reversed(reversal.id))
            .collect();
        validate_entry(&reversal)?;
        reversal.status = EntryStatus::Posted;

        let posted = self
            .retrying("void_entry", || self.commit_entry(&reversal))
            .await?;
        tracing::info!(
            entry_id = %entry_id,
            reversal_id = %posted.id,
            reason = %reason,
            "entry voided"
        );
        Ok(posted)
    }

    /// Maps account codes to leaf accounts and numbers the lines.
    async fn resolve_lines(
        &self,
        entry_id: Uuid,
        drafts: &[LineDraft],
    ) -> ResultEngine<Vec<JournalLine>> {
        let codes: Vec<String> = drafts.iter().map(|d| d.account_code.clone()).collect();
        let by_code: HashMap<String, accounts::Model> = accounts::Entity::find()
            .filter(accounts::Column::Code.is_in(codes))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| (m.code.clone(), m))
            .collect();

        let mut lines = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts.iter().enumerate() {
            let account = by_code.get(&draft.account_code).ok_or_else(|| {
                EngineError::InvalidAccount(format!("unknown account code {}", draft.account_code))
            })?;
            if account.is_header {
                return Err(EngineError::InvalidAccount(format!(
                    "account {} is a header and cannot carry lines",
                    account.code
                )));
            }
            let line_no = i32::try_from(index + 1)
                .map_err(|_| EngineError::InvalidAmount("too many lines".to_string()))?;
            lines.push(JournalLine {
                id: Uuid::new_v4(),
                entry_id,
                line_no,
                account_id: account.id,
                debit: draft.debit,
                credit: draft.credit,
                memo: draft.memo.clone(),
            });
        }
        Ok(lines)
    }

    /// One attempt at writing a validated entry.
    ///
    /// Locks every touched account, then in a single transaction: re-checks
    /// idempotency, refuses dates in closed periods, appends, applies balance
    /// deltas and mirrors linked sub-ledgers.
    async fn commit_entry(&self, entry: &JournalEntry) -> ResultEngine<JournalEntry> {
        let _guards = self
            .locks
            .acquire(entry.lines.iter().map(|l| l.account_id))
            .await;

        with_tx!(self, |db_tx| {
            if let Some(existing) = self.existing_for(&db_tx, entry).await? {
                return Ok(existing);
            }
            ensure_open(&db_tx, entry.entry_date).await?;
            match self.append(&db_tx, entry, entry.records_posting_key()).await {
                Ok(_) => {}
                Err(EngineError::Database(err)) if is_unique_violation(&err) => {
                    if let Some(existing) = self.existing_for(&db_tx, entry).await? {
                        return Ok(existing);
                    }
                    return Err(EngineError::Database(err));
                }
                Err(err) => return Err(err),
            }
            self.apply_entry(&db_tx, &entry.lines).await?;
            Ok(entry.clone())
        })
    }

    /// Brings cached balances and linked sub-ledgers up to date with lines
    /// just appended in `db_tx`.
    pub(in crate::ops) async fn apply_entry(
        &self,
        db_tx: &DatabaseTransaction,
        lines: &[JournalLine],
    ) -> ResultEngine<()> {
        let account_ids: Vec<Uuid> = lines.iter().map(|l| l.account_id).collect();
        self.apply_deltas(db_tx, lines).await?;
        self.mirror_subledgers(db_tx, &account_ids).await
    }

    async fn existing_for(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &JournalEntry,
    ) -> ResultEngine<Option<JournalEntry>> {
        match entry.reversal_of {
            Some(original) => reversal_of(db_tx, original).await,
            None => {
                entry_for_key(db_tx, entry.source_type, &entry.source_id, entry.event_kind).await
            }
        }
    }

    /// Adds each line's normal-positive effect to the cached balances.
    async fn apply_deltas(
        &self,
        db_tx: &DatabaseTransaction,
        lines: &[JournalLine],
    ) -> ResultEngine<()> {
        let mut deltas: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for line in lines {
            let slot = deltas.entry(line.account_id).or_insert((0, 0));
            slot.0 += line.debit;
            slot.1 += line.credit;
        }

        let now = Utc::now();
        for (account_id, (debit, credit)) in deltas {
            let model = accounts::Entity::find_by_id(account_id)
                .one(db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))?;
            let side = AccountKind::try_from(model.kind.as_str())?.normal_side();
            let balance = model
                .balance
                .checked_add(side.delta(debit, credit))
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;

            let mut active: accounts::ActiveModel = model.into();
            active.balance = ActiveValue::Set(balance);
            active.updated_at = ActiveValue::Set(now);
            active.update(db_tx).await?;
        }
        Ok(())
    }

    /// Copies the projection of every touched account into the sub-ledgers
    /// linked to it.
    async fn mirror_subledgers(
        &self,
        db_tx: &DatabaseTransaction,
        account_ids: &[Uuid],
    ) -> ResultEngine<()> {
        let linked = subledgers::Entity::find()
            .filter(subledgers::Column::LinkedAccountId.is_in(account_ids.to_vec()))
            .all(db_tx)
            .await?;
        for subledger in linked {
            let account = accounts::Entity::find_by_id(subledger.linked_account_id)
                .one(db_tx)
                .await?
                .ok_or_else(|| {
                    EngineError::KeyNotFound(format!("account {}", subledger.linked_account_id))
                })?;
            let projected = project_model(db_tx, &account).await?;
            let previous = Amount::new(subledger.balance);

            subledger_audit::ActiveModel::record(
                subledger.id,
                previous,
                projected,
                SyncReason::Posting,
            )
            .insert(db_tx)
            .await?;

            let mut active: subledgers::ActiveModel = subledger.into();
            active.balance = ActiveValue::Set(projected.minor());
            active.updated_at = ActiveValue::Set(Utc::now());
            active.update(db_tx).await?;
        }
        Ok(())
    }
}
