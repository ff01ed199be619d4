use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    AccountKind, AccountingPeriod, Amount, EngineError, EntryStatus, EventKind, JournalEntry,
    JournalLine, NormalSide, ResultEngine, SourceType, accounts, fold_lines, periods,
    util::normalize_required,
};

use super::{
    Engine,
    gate::validate_entry,
    projector::posted_totals_through,
    store::{load_entry, reversal_of},
    with_tx,
};

/// Fails with `InvalidState` when `date` falls in a closed period.
pub(in crate::ops) async fn ensure_open<C: ConnectionTrait>(
    conn: &C,
    date: NaiveDate,
) -> ResultEngine<()> {
    match closed_period_at(conn, date).await? {
        Some(period) => Err(EngineError::InvalidState(format!(
            "{date} falls in the closed period {} to {}",
            period.start_date, period.end_date
        ))),
        None => Ok(()),
    }
}

async fn closed_period_at<C: ConnectionTrait>(
    conn: &C,
    date: NaiveDate,
) -> ResultEngine<Option<periods::Model>> {
    Ok(periods::Entity::find()
        .filter(periods::Column::IsClosed.eq(true))
        .filter(periods::Column::StartDate.lte(date))
        .filter(periods::Column::EndDate.gte(date))
        .one(conn)
        .await?)
}

async fn overlapping_closed<C: ConnectionTrait>(
    conn: &C,
    start: NaiveDate,
    end: NaiveDate,
) -> ResultEngine<Option<periods::Model>> {
    Ok(periods::Entity::find()
        .filter(periods::Column::IsClosed.eq(true))
        .filter(periods::Column::StartDate.lte(end))
        .filter(periods::Column::EndDate.gte(start))
        .one(conn)
        .await?)
}

/// Revenue and expense balances through `end`, and the lines that zero them
/// against retained earnings.
struct ClosingLines {
    lines: Vec<JournalLine>,
    total_revenue: Amount,
    total_expense: Amount,
    net_income: Amount,
}

fn closing_lines(
    entry_id: Uuid,
    temporary: &[(Uuid, AccountKind, Amount)],
    retained_earnings: Uuid,
) -> ResultEngine<ClosingLines> {
    let overflow = || EngineError::InvalidAmount("closing totals overflow".to_string());
    let mut lines = Vec::new();
    let mut total_revenue: i64 = 0;
    let mut total_expense: i64 = 0;

    let mut push = |account_id: Uuid, debit: bool, amount: i64| -> ResultEngine<()> {
        let line_no = i32::try_from(lines.len() + 1)
            .map_err(|_| EngineError::InvalidAmount("too many lines".to_string()))?;
        lines.push(if debit {
            JournalLine::debit(entry_id, line_no, account_id, amount)
        } else {
            JournalLine::credit(entry_id, line_no, account_id, amount)
        });
        Ok(())
    };

    for (account_id, kind, balance) in temporary {
        let balance = balance.minor();
        if balance == 0 {
            continue;
        }
        match kind {
            AccountKind::Revenue => {
                total_revenue = total_revenue.checked_add(balance).ok_or_else(overflow)?;
            }
            _ => total_expense = total_expense.checked_add(balance).ok_or_else(overflow)?,
        }
        // the zeroing line sits on the side opposite to where the balance grew
        let grew_on_credit = (kind.normal_side() == NormalSide::Credit) == (balance > 0);
        let amount = balance.checked_abs().ok_or_else(overflow)?;
        push(*account_id, grew_on_credit, amount)?;
    }

    let net_income = total_revenue
        .checked_sub(total_expense)
        .ok_or_else(overflow)?;
    if net_income != 0 {
        let amount = net_income.checked_abs().ok_or_else(overflow)?;
        push(retained_earnings, net_income < 0, amount)?;
    }

    Ok(ClosingLines {
        lines,
        total_revenue: Amount::new(total_revenue),
        total_expense: Amount::new(total_expense),
        net_income: Amount::new(net_income),
    })
}

impl Engine {
    /// Closes `[start, end]`: moves revenue and expense balances accumulated
    /// through `end` into retained earnings with one POSTED closing entry
    /// dated `end`, then refuses any further entry dated inside the range.
    ///
    /// Fails with `InvalidState` when the range is inverted or overlaps a
    /// period that is already closed.
    pub async fn close_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        description: &str,
    ) -> ResultEngine<AccountingPeriod> {
        if end < start {
            return Err(EngineError::InvalidState(format!(
                "period end {end} is before its start {start}"
            )));
        }
        let description = match description.trim() {
            "" => format!("Period closing {start} to {end}"),
            text => text.to_string(),
        };

        let retained = self
            .require_account_by_code(&self.settings.accounts.retained_earnings)
            .await?;
        if retained.is_header || AccountKind::try_from(retained.kind.as_str())? != AccountKind::Equity
        {
            return Err(EngineError::InvalidAccount(format!(
                "retained earnings account {} must be a leaf equity account",
                retained.code
            )));
        }

        let period = self
            .retrying("close_period", || {
                self.commit_close(start, end, &description, retained.id)
            })
            .await?;
        tracing::info!(
            period_id = %period.id,
            start = %start,
            end = %end,
            net_income = period.net_income.minor(),
            "period closed"
        );
        Ok(period)
    }

    async fn commit_close(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        description: &str,
        retained_earnings: Uuid,
    ) -> ResultEngine<AccountingPeriod> {
        let temporary = accounts::Entity::find()
            .filter(accounts::Column::IsHeader.eq(false))
            .filter(
                accounts::Column::Kind
                    .is_in([AccountKind::Revenue.as_str(), AccountKind::Expense.as_str()]),
            )
            .order_by_asc(accounts::Column::Code)
            .all(&self.database)
            .await?;
        let _guards = self
            .locks
            .acquire(
                temporary
                    .iter()
                    .map(|m| m.id)
                    .chain(std::iter::once(retained_earnings)),
            )
            .await;

        with_tx!(self, |db_tx| {
            if let Some(closed) = overlapping_closed(&db_tx, start, end).await? {
                return Err(EngineError::InvalidState(format!(
                    "{start} to {end} overlaps the closed period {} to {}",
                    closed.start_date, closed.end_date
                )));
            }

            let totals = posted_totals_through(&db_tx, end).await?;
            let mut balances = Vec::with_capacity(temporary.len());
            for account in &temporary {
                let kind = AccountKind::try_from(account.kind.as_str())?;
                let pair = totals.get(&account.id).copied().unwrap_or((0, 0));
                balances.push((account.id, kind, fold_lines(kind.normal_side(), [pair])?));
            }

            let period_id = Uuid::new_v4();
            let mut entry = JournalEntry::draft(
                end,
                SourceType::PeriodClose,
                period_id.to_string(),
                EventKind::Closing,
                description.to_string(),
            );
            let closing = closing_lines(entry.id, &balances, retained_earnings)?;

            let closing_entry_id = if closing.lines.is_empty() {
                None
            } else {
                entry.lines = closing.lines;
                validate_entry(&entry)?;
                entry.status = EntryStatus::Posted;
                self.append(&db_tx, &entry, entry.records_posting_key()).await?;
                self.apply_entry(&db_tx, &entry.lines).await?;
                Some(entry.id)
            };

            let period = AccountingPeriod {
                id: period_id,
                start_date: start,
                end_date: end,
                description: description.to_string(),
                is_closed: true,
                closing_entry_id,
                total_revenue: closing.total_revenue,
                total_expense: closing.total_expense,
                net_income: closing.net_income,
                closed_at: Some(Utc::now()),
                notes: String::new(),
            };
            periods::ActiveModel::from(&period).insert(&db_tx).await?;
            Ok(period)
        })
    }

    /// Reopens a closed period and reverses its closing entry.
    ///
    /// The reversal is dated on the period's last day so a later close of
    /// the same range sees the balances as they were before the first close.
    /// Only the latest closed period can be reopened.
    pub async fn reopen_period(
        &self,
        period_id: Uuid,
        reason: &str,
    ) -> ResultEngine<AccountingPeriod> {
        let reason = normalize_required(reason, "reopen reason")
            .map_err(|_| EngineError::InvalidState("a reopen reason is required".to_string()))?;
        let model = periods::Entity::find_by_id(period_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("accounting period {period_id}")))?;

        let closing = match model.closing_entry_id {
            Some(entry_id) => Some(self.entry(entry_id).await?),
            None => None,
        };

        let period = self
            .retrying("reopen_period", || {
                self.commit_reopen(period_id, closing.as_ref(), &reason)
            })
            .await?;
        tracing::info!(period_id = %period_id, reason = %reason, "period reopened");
        Ok(period)
    }

    async fn commit_reopen(
        &self,
        period_id: Uuid,
        closing: Option<&JournalEntry>,
        reason: &str,
    ) -> ResultEngine<AccountingPeriod> {
        let _guards = self
            .locks
            .acquire(
                closing
                    .into_iter()
                    .flat_map(|entry| entry.lines.iter().map(|l| l.account_id)),
            )
            .await;

        with_tx!(self, |db_tx| {
            let model = periods::Entity::find_by_id(period_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| {
                    EngineError::KeyNotFound(format!("accounting period {period_id}"))
                })?;
            if !model.is_closed {
                return Err(EngineError::InvalidState(format!(
                    "period {} to {} is not closed",
                    model.start_date, model.end_date
                )));
            }
            let newer = periods::Entity::find()
                .filter(periods::Column::IsClosed.eq(true))
                .filter(periods::Column::StartDate.gt(model.end_date))
                .one(&db_tx)
                .await?;
            if let Some(newer) = newer {
                return Err(EngineError::InvalidState(format!(
                    "the later period {} to {} is still closed",
                    newer.start_date, newer.end_date
                )));
            }

            let end_date = model.end_date;
            let notes = if model.notes.is_empty() {
                format!("reopened {}: {reason}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
            } else {
                format!(
                    "{}\nreopened {}: {reason}",
                    model.notes,
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                )
            };
            let mut active: periods::ActiveModel = model.into();
            active.is_closed = ActiveValue::Set(false);
            active.notes = ActiveValue::Set(notes);
            let reopened = active.update(&db_tx).await?;

            if let Some(closing) = closing {
                self.reverse_closing(&db_tx, closing, end_date, reason).await?;
            }
            Ok(AccountingPeriod::from(reopened))
        })
    }

    async fn reverse_closing(
        &self,
        db_tx: &DatabaseTransaction,
        closing: &JournalEntry,
        date: NaiveDate,
        reason: &str,
    ) -> ResultEngine<()> {
        if reversal_of(db_tx, closing.id).await?.is_some() {
            return Ok(());
        }
        let closing = load_entry(db_tx, closing.id).await?;
        let mut reversal = JournalEntry::draft(
            date,
            SourceType::PeriodClose,
            closing.source_id.clone(),
            EventKind::Reversal,
            format!("Reopen of {}: {reason}", closing.description),
        );
        reversal.reversal_of = Some(closing.id);
        reversal.lines = closing
            .lines
            .iter()
            .map(|line| line.reversed(reversal.id))
            .collect();
        validate_entry(&reversal)?;
        reversal.status = EntryStatus::Posted;
        self.append(db_tx, &reversal, reversal.records_posting_key())
            .await?;
        self.apply_entry(db_tx, &reversal.lines).await
    }

    /// Every accounting period ever closed, oldest first. Reopened periods
    /// stay listed with `is_closed == false`.
    pub async fn periods(&self) -> ResultEngine<Vec<AccountingPeriod>> {
        Ok(periods::Entity::find()
            .order_by_asc(periods::Column::StartDate)
            .order_by_asc(periods::Column::ClosedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(AccountingPeriod::from)
            .collect())
    }

    /// The closed period containing `date`, if any.
    pub async fn closed_period_for(&self, date: NaiveDate) -> ResultEngine<Option<AccountingPeriod>> {
        Ok(closed_period_at(&self.database, date)
            .await?
            .map(AccountingPeriod::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_lines_zero_temporary_accounts_into_retained_earnings() {
        let entry = Uuid::new_v4();
        let revenue = Uuid::new_v4();
        let expense = Uuid::new_v4();
        let retained = Uuid::new_v4();

        let closing = closing_lines(
            entry,
            &[
                (revenue, AccountKind::Revenue, Amount::new(1_000)),
                (expense, AccountKind::Expense, Amount::new(300)),
            ],
            retained,
        )
        .unwrap();

        assert_eq!(closing.total_revenue, Amount::new(1_000));
        assert_eq!(closing.total_expense, Amount::new(300));
        assert_eq!(closing.net_income, Amount::new(700));
        assert_eq!(
            closing
                .lines
                .iter()
                .map(|l| (l.account_id, l.debit, l.credit))
                .collect::<Vec<_>>(),
            vec![(revenue, 1_000, 0), (expense, 0, 300), (retained, 0, 700)]
        );
    }

    #[test]
    fn net_loss_debits_retained_earnings() {
        let retained = Uuid::new_v4();
        let expense = Uuid::new_v4();
        let closing = closing_lines(
            Uuid::new_v4(),
            &[(expense, AccountKind::Expense, Amount::new(50))],
            retained,
        )
        .unwrap();
        assert_eq!(closing.net_income, Amount::new(-50));
        assert_eq!(closing.lines[1].account_id, retained);
        assert_eq!(closing.lines[1].debit, 50);
    }

    #[test]
    fn nothing_to_close_yields_no_lines() {
        let closing = closing_lines(
            Uuid::new_v4(),
            &[(Uuid::new_v4(), AccountKind::Revenue, Amount::ZERO)],
            Uuid::new_v4(),
        )
        .unwrap();
        assert!(closing.lines.is_empty());
        assert_eq!(closing.net_income, Amount::ZERO);
    }
}
