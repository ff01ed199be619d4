use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AccountKind, Amount, EngineError, ResultEngine, Subledger, SubledgerAudit, SyncReason,
    accounts, subledger_audit, subledgers, util::normalize_required,
};

use super::{Engine, projector::project_model, with_tx};

/// Outcome of one sub-ledger sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubledgerSync {
    pub subledger_id: Uuid,
    pub previous: Amount,
    pub current: Amount,
}

impl SubledgerSync {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

impl Engine {
    /// Links a new sub-ledger to a leaf ASSET account.
    ///
    /// The initial balance is the account's projection.
    pub async fn create_subledger(&self, name: &str, account_code: &str) -> ResultEngine<Subledger> {
        let name = normalize_required(name, "sub-ledger name")?;
        let account = self.require_account_by_code(account_code).await?;
        if account.is_header {
            return Err(EngineError::InvalidAccount(format!(
                "sub-ledgers link to leaf accounts, {} is a header",
                account.code
            )));
        }
        if AccountKind::try_from(account.kind.as_str())? != AccountKind::Asset {
            return Err(EngineError::InvalidAccount(format!(
                "sub-ledgers link to asset accounts, {} is {}",
                account.code, account.kind
            )));
        }

        let _guard = self.locks.acquire([account.id]).await;
        let subledger = with_tx!(self, |db_tx| {
            if subledgers::Entity::find()
                .filter(subledgers::Column::Name.eq(name.as_str()))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(name));
            }

            let subledger = Subledger {
                id: Uuid::new_v4(),
                name: name.clone(),
                linked_account_id: account.id,
                balance: project_model(&db_tx, &account).await?,
                updated_at: Utc::now(),
            };
            subledgers::ActiveModel::from(&subledger)
                .insert(&db_tx)
                .await?;
            subledger_audit::ActiveModel::record(
                subledger.id,
                Amount::ZERO,
                subledger.balance,
                SyncReason::Linked,
            )
            .insert(&db_tx)
            .await?;
            Ok(subledger)
        })?;

        tracing::info!(
            subledger = %subledger.name,
            account = %account.code,
            balance = subledger.balance.minor(),
            "sub-ledger linked"
        );
        Ok(subledger)
    }

    /// Sets the sub-ledger balance to its linked account's projection and
    /// records the previous value.
    pub async fn sync_subledger(&self, subledger_id: Uuid) -> ResultEngine<SubledgerSync> {
        let linked = self.subledger(subledger_id).await?.linked_account_id;
        let _guard = self.locks.acquire([linked]).await;

        let sync = with_tx!(self, |db_tx| {
            let model = subledgers::Entity::find_by_id(subledger_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("sub-ledger {subledger_id}")))?;
            let account = accounts::Entity::find_by_id(model.linked_account_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| {
                    EngineError::KeyNotFound(format!("account {}", model.linked_account_id))
                })?;
            let current = project_model(&db_tx, &account).await?;
            let previous = Amount::new(model.balance);

            subledger_audit::ActiveModel::record(
                subledger_id,
                previous,
                current,
                SyncReason::Resync,
            )
            .insert(&db_tx)
            .await?;
            let mut active: subledgers::ActiveModel = model.into();
            active.balance = ActiveValue::Set(current.minor());
            active.updated_at = ActiveValue::Set(Utc::now());
            active.update(&db_tx).await?;

            Ok(SubledgerSync {
                subledger_id,
                previous,
                current,
            })
        })?;

        if sync.changed() {
            tracing::warn!(
                subledger_id = %subledger_id,
                previous = sync.previous.minor(),
                current = sync.current.minor(),
                "sub-ledger corrected"
            );
        }
        Ok(sync)
    }

    pub async fn sync_all_subledgers(&self) -> ResultEngine<Vec<SubledgerSync>> {
        let mut synced = Vec::new();
        for subledger in self.subledgers().await? {
            synced.push(self.sync_subledger(subledger.id).await?);
        }
        Ok(synced)
    }

    pub async fn subledger(&self, subledger_id: Uuid) -> ResultEngine<Subledger> {
        subledgers::Entity::find_by_id(subledger_id)
            .one(&self.database)
            .await?
            .map(Subledger::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("sub-ledger {subledger_id}")))
    }

    pub async fn subledgers(&self) -> ResultEngine<Vec<Subledger>> {
        Ok(subledgers::Entity::find()
            .order_by_asc(subledgers::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Subledger::from)
            .collect())
    }

    /// Audit trail of a sub-ledger, oldest first.
    pub async fn subledger_history(&self, subledger_id: Uuid) -> ResultEngine<Vec<SubledgerAudit>> {
        self.subledger(subledger_id).await?;
        Ok(subledger_audit::Entity::find()
            .filter(subledger_audit::Column::SubledgerId.eq(subledger_id))
            .order_by_asc(subledger_audit::Column::RecordedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(SubledgerAudit::from)
            .collect())
    }
}
