//! Chart of accounts.
//!
//! An [`Account`] is either a *leaf* (it receives journal lines and carries a
//! cached balance) or a *header* (it only groups children; its display value
//! is the roll-up of its leaves and is never stored).
//!
//! The cached `balance` column is a projection of the journal kept in
//! *normal-positive* convention, see [`NormalSide`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }

    /// The side on which a balance of this kind normally grows.
    pub fn normal_side(self) -> NormalSide {
        match self {
            Self::Asset | Self::Expense => NormalSide::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalSide::Credit,
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            "equity" => Ok(Self::Equity),
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidAccount(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalSide {
    Debit,
    Credit,
}

impl NormalSide {
    /// Folds debit/credit totals into a normal-positive balance.
    ///
    /// Debit-normal: `debit - credit`. Credit-normal: `credit - debit`.
    pub fn balance(self, debit: Amount, credit: Amount) -> ResultEngine<Amount> {
        let (plus, minus) = match self {
            Self::Debit => (debit, credit),
            Self::Credit => (credit, debit),
        };
        plus.checked_sub(minus)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))
    }

    /// Signed effect of a single line on a normal-positive balance.
    pub fn delta(self, debit: i64, credit: i64) -> i64 {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Sums `(debit, credit)` pairs and folds them into a normal-positive balance.
///
/// The result only depends on the multiset of pairs, never on their order.
pub fn fold_lines(
    side: NormalSide,
    lines: impl IntoIterator<Item = (i64, i64)>,
) -> ResultEngine<Amount> {
    let overflow = || EngineError::InvalidAmount("balance overflow".to_string());
    let mut debit: i64 = 0;
    let mut credit: i64 = 0;
    for (d, c) in lines {
        debit = debit.checked_add(d).ok_or_else(overflow)?;
        credit = credit.checked_add(c).ok_or_else(overflow)?;
    }
    side.balance(Amount::new(debit), Amount::new(credit))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent_id: Option<Uuid>,
    pub is_header: bool,
    /// Cached projection; rebuildable at any time from the journal.
    pub balance: Amount,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(code: String, name: String, kind: AccountKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            kind,
            parent_id: None,
            is_header: false,
            balance: Amount::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn normal_side(&self) -> NormalSide {
        self.kind.normal_side()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub kind: String,
    pub parent_id: Option<Uuid>,
    pub is_header: bool,
    pub balance: i64,
    pub updated_at: DateTimeUtc,
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

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id),
            code: ActiveValue::Set(account.code.clone()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            parent_id: ActiveValue::Set(account.parent_id),
            is_header: ActiveValue::Set(account.is_header),
            balance: ActiveValue::Set(account.balance.minor()),
            updated_at: ActiveValue::Set(account.updated_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            code: model.code,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            parent_id: model.parent_id,
            is_header: model.is_header,
            balance: Amount::new(model.balance),
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn normal_side_follows_kind() {
        assert_eq!(AccountKind::Asset.normal_side(), NormalSide::Debit);
        assert_eq!(AccountKind::Expense.normal_side(), NormalSide::Debit);
        assert_eq!(AccountKind::Liability.normal_side(), NormalSide::Credit);
        assert_eq!(AccountKind::Equity.normal_side(), NormalSide::Credit);
        assert_eq!(AccountKind::Revenue.normal_side(), NormalSide::Credit);
    }

    #[test]
    fn credit_normal_accounts_report_positive_balances() {
        let lines = [(0, 1_000_000), (0, 250_000), (100_000, 0)];
        assert_eq!(
            fold_lines(NormalSide::Credit, lines).unwrap(),
            Amount::new(1_150_000)
        );
        assert_eq!(
            fold_lines(NormalSide::Debit, lines).unwrap(),
            Amount::new(-1_150_000)
        );
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(AccountKind::try_from("ASSET").unwrap(), AccountKind::Asset);
        assert_eq!(
            AccountKind::try_from("revenue").unwrap(),
            AccountKind::Revenue
        );
        assert!(AccountKind::try_from("income").is_err());
    }

    proptest! {
        #[test]
        fn fold_is_order_independent(
            mut lines in proptest::collection::vec(
                prop_oneof![
                    (1i64..1_000_000_000).prop_map(|d| (d, 0)),
                    (1i64..1_000_000_000).prop_map(|c| (0, c)),
                ],
                0..64,
            ),
            debit_normal in any::<bool>(),
        ) {
            let side = if debit_normal { NormalSide::Debit } else { NormalSide::Credit };
            let forward = fold_lines(side, lines.iter().copied()).unwrap();
            lines.reverse();
            let backward = fold_lines(side, lines.iter().copied()).unwrap();
            lines.sort_unstable();
            let sorted = fold_lines(side, lines.iter().copied()).unwrap();
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward, sorted);
        }
    }
}
