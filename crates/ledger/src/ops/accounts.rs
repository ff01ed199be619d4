use std::collections::HashMap;

use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    Account, AccountKind, Amount, EngineError, ResultEngine, accounts, fold_lines,
    util::normalize_required,
};

use super::{Engine, projector::posted_totals_by_account};

/// Parameters for [`Engine::create_account`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent_code: Option<String>,
    pub is_header: bool,
}

impl NewAccount {
    pub fn leaf(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
            parent_code: None,
            is_header: false,
        }
    }

    pub fn header(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            is_header: true,
            ..Self::leaf(code, name, kind)
        }
    }

    #[must_use]
    pub fn parent(mut self, code: impl Into<String>) -> Self {
        self.parent_code = Some(code.into());
        self
    }
}

impl Engine {
    /// Adds an account to the chart.
    ///
    /// A parent must be a header of the same kind.
    pub async fn create_account(&self, new: NewAccount) -> ResultEngine<Account> {
        let code = normalize_required(&new.code, "account code")?;
        let name = normalize_required(&new.name, "account name")?;

        if accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code.as_str()))
            .one(&self.database)
            .await?
            .is_some()
        {
            return Err(EngineError::ExistingKey(code));
        }

        let mut account = Account::new(code, name, new.kind);
        account.is_header = new.is_header;
        if let Some(parent_code) = new.parent_code.as_deref() {
            let parent = Account::try_from(self.require_account_by_code(parent_code).await?)?;
            if !parent.is_header {
                return Err(EngineError::InvalidAccount(format!(
                    "parent {} is not a header account",
                    parent.code
                )));
            }
            if parent.kind != account.kind {
                return Err(EngineError::InvalidAccount(format!(
                    "parent {} is {}, child would be {}",
                    parent.code,
                    parent.kind.as_str(),
                    account.kind.as_str()
                )));
            }
            account.parent_id = Some(parent.id);
        }

        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;
        tracing::info!(
            account = %account.code,
            kind = account.kind.as_str(),
            header = account.is_header,
            "account created"
        );
        Ok(account)
    }

    pub async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))?;
        Account::try_from(model)
    }

    pub async fn account_by_code(&self, code: &str) -> ResultEngine<Account> {
        Account::try_from(self.require_account_by_code(code).await?)
    }

    /// The whole chart, ordered by code.
    pub async fn accounts(&self) -> ResultEngine<Vec<Account>> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Display value of an account: its projection for a leaf, the sum of
    /// its leaf descendants' projections for a header. Never stored.
    pub async fn header_balance(&self, account_id: Uuid) -> ResultEngine<Amount> {
        let chart = self.accounts().await?;
        let root = chart
            .iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))?;

        let mut children: HashMap<Uuid, Vec<&Account>> = HashMap::new();
        for account in &chart {
            if let Some(parent) = account.parent_id {
                children.entry(parent).or_default().push(account);
            }
        }
        let totals = posted_totals_by_account(&self.database).await?;

        let mut total = Amount::ZERO;
        let mut stack = vec![root];
        while let Some(account) = stack.pop() {
            if account.is_header {
                if let Some(kids) = children.get(&account.id) {
                    stack.extend(kids.iter().copied());
                }
                continue;
            }
            let pair = totals.get(&account.id).copied().unwrap_or((0, 0));
            total = total
                .checked_add(fold_lines(account.normal_side(), [pair])?)
                .ok_or_else(|| EngineError::InvalidAmount("roll-up overflow".to_string()))?;
        }
        Ok(total)
    }

    pub(in crate::ops) async fn require_account_by_code(
        &self,
        code: &str,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code.trim()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("account code {code}")))
    }
}
