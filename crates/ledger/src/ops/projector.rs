use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AccountKind, Amount, EngineError, EntryStatus, ResultEngine, accounts, fold_lines,
};

use super::{Engine, with_tx};

/// A cached balance rewritten by `sync_all`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceCorrection {
    pub account_id: Uuid,
    pub code: String,
    pub previous: Amount,
    pub corrected: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub accounts_checked: usize,
    pub corrections: Vec<BalanceCorrection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub total_debit: Amount,
    pub total_credit: Amount,
    pub balance: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Amount,
    pub total_credit: Amount,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// Debit/credit totals of one account over POSTED entries.
pub(in crate::ops) async fn posted_totals<C: ConnectionTrait>(
    conn: &C,
    account_id: Uuid,
) -> ResultEngine<(i64, i64)> {
    let backend = conn.get_database_backend();
    let stmt = Statement::from_sql_and_values(
        backend,
        "SELECT COALESCE(SUM(l.debit), 0) AS debit, COALESCE(SUM(l.credit), 0) AS credit \
         FROM journal_lines l \
         INNER JOIN journal_entries e ON e.id = l.entry_id \
         WHERE l.account_id = ? AND e.status = ?",
        vec![account_id.into(), EntryStatus::Posted.as_str().into()],
    );
    let Some(row) = conn.query_one(stmt).await? else {
        return Ok((0, 0));
    };
    let debit: i64 = row.try_get("", "debit")?;
    let credit: i64 = row.try_get("", "credit")?;
    Ok((debit, credit))
}

/// Debit/credit totals of every account with POSTED lines.
pub(in crate::ops) async fn posted_totals_by_account<C: ConnectionTrait>(
    conn: &C,
) -> ResultEngine<HashMap<Uuid, (i64, i64)>> {
    grouped_totals(conn, None).await
}

/// Like `posted_totals_by_account`, limited to entries dated on or before
/// `through`.
pub(in crate::ops) async fn posted_totals_through<C: ConnectionTrait>(
    conn: &C,
    through: NaiveDate,
) -> ResultEngine<HashMap<Uuid, (i64, i64)>> {
    grouped_totals(conn, Some(through)).await
}

async fn grouped_totals<C: ConnectionTrait>(
    conn: &C,
    through: Option<NaiveDate>,
) -> ResultEngine<HashMap<Uuid, (i64, i64)>> {
    let backend = conn.get_database_backend();
    let mut values: Vec<sea_orm::Value> = vec![EntryStatus::Posted.as_str().into()];
    let date_filter = match through {
        Some(date) => {
            values.push(date.into());
            " AND e.entry_date <= ?"
        }
        None => "",
    };
    let sql = format!(
        "SELECT l.account_id AS account_id, \
                COALESCE(SUM(l.debit), 0) AS debit, \
                COALESCE(SUM(l.credit), 0) AS credit \
         FROM journal_lines l \
         INNER JOIN journal_entries e ON e.id = l.entry_id \
         WHERE e.status = ?{date_filter} \
         GROUP BY l.account_id"
    );
    let stmt = Statement::from_sql_and_values(backend, &sql, values);
    let mut totals = HashMap::new();
    for row in conn.query_all(stmt).await? {
        let account_id: Uuid = row.try_get("", "account_id")?;
        let debit: i64 = row.try_get("", "debit")?;
        let credit: i64 = row.try_get("", "credit")?;
        totals.insert(account_id, (debit, credit));
    }
    Ok(totals)
}

/// Normal-positive projection of one account. Header accounts project to 0.
pub(in crate::ops) async fn project_model<C: ConnectionTrait>(
    conn: &C,
    account: &accounts::Model,
) -> ResultEngine<Amount> {
    if account.is_header {
        return Ok(Amount::ZERO);
    }
    let side = AccountKind::try_from(account.kind.as_str())?.normal_side();
    let totals = posted_totals(conn, account.id).await?;
    fold_lines(side, [totals])
}

impl Engine {
    /// Rebuilds an account balance from POSTED journal lines.
    ///
    /// Debit-normal accounts return `debit - credit`, credit-normal accounts
    /// `credit - debit`. Reads only; the cached balance is left untouched.
    pub async fn project(&self, account_id: Uuid) -> ResultEngine<Amount> {
        let account = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))?;
        project_model(&self.database, &account).await
    }

    /// Recomputes and stores every cached balance.
    ///
    /// Each account is locked while its balance is rewritten, so this is
    /// safe to run next to live postings.
    pub async fn sync_all(&self) -> ResultEngine<SyncSummary> {
        let ids: Vec<Uuid> = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let mut summary = SyncSummary {
            accounts_checked: ids.len(),
            corrections: Vec::new(),
        };
        for account_id in ids {
            if let Some(correction) = self.sync_account(account_id).await? {
                tracing::warn!(
                    account = %correction.code,
                    previous = correction.previous.minor(),
                    corrected = correction.corrected.minor(),
                    "cached balance corrected"
                );
                summary.corrections.push(correction);
            }
        }
        tracing::info!(
            checked = summary.accounts_checked,
            corrected = summary.corrections.len(),
            "balances synchronized"
        );
        Ok(summary)
    }

    async fn sync_account(&self, account_id: Uuid) -> ResultEngine<Option<BalanceCorrection>> {
        let _guard = self.locks.acquire([account_id]).await;
        with_tx!(self, |db_tx| {
            let Some(model) = accounts::Entity::find_by_id(account_id).one(&db_tx).await? else {
                return Ok(None);
            };
            let projected = project_model(&db_tx, &model).await?;
            if model.balance == projected.minor() {
                return Ok(None);
            }

            let correction = BalanceCorrection {
                account_id,
                code: model.code.clone(),
                previous: Amount::new(model.balance),
                corrected: projected,
            };
            let mut active: accounts::ActiveModel = model.into();
            active.balance = ActiveValue::Set(projected.minor());
            active.updated_at = ActiveValue::Set(Utc::now());
            active.update(&db_tx).await?;
            Ok(Some(correction))
        })
    }

    /// Debit/credit totals and projected balance of every leaf account.
    ///
    /// Grand totals are checked: a chart whose totals do not fit in an `i64`
    /// fails with `InvalidAmount`.
    pub async fn trial_balance(&self) -> ResultEngine<TrialBalance> {
        let (leaves, totals) = with_tx!(self, |db_tx| {
            let leaves = accounts::Entity::find()
                .filter(accounts::Column::IsHeader.eq(false))
                .order_by_asc(accounts::Column::Code)
                .all(&db_tx)
                .await?;
            let totals = posted_totals_by_account(&db_tx).await?;
            Ok((leaves, totals))
        })?;

        let mut rows = Vec::with_capacity(leaves.len());
        for account in leaves {
            let kind = AccountKind::try_from(account.kind.as_str())?;
            let (debit, credit) = totals.get(&account.id).copied().unwrap_or((0, 0));
            let balance = fold_lines(kind.normal_side(), [(debit, credit)])?;
            rows.push(TrialBalanceRow {
                account_id: account.id,
                code: account.code,
                name: account.name,
                kind,
                total_debit: Amount::new(debit),
                total_credit: Amount::new(credit),
                balance,
            });
        }
        let total_debit = Amount::total(
            rows.iter().map(|row| row.total_debit.minor()),
            "trial balance debit",
        )?;
        let total_credit = Amount::total(
            rows.iter().map(|row| row.total_credit.minor()),
            "trial balance credit",
        )?;
        Ok(TrialBalance {
            rows,
            total_debit,
            total_credit,
        })
    }
}
