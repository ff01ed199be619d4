//! Source documents handed to the posting gate.
//!
//! The engine does not own sales, purchases or payments. Collaborating
//! services describe them with a [`SourceDocument`]: its identity, its
//! lifecycle [`DocumentStatus`] (the sole authority over whether posting is
//! allowed) and a typed [`DocumentDetail`] payload the line builders read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{EngineError, SourceType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Pending,
    PendingApproval,
    Confirmed,
    Approved,
    Invoiced,
    Overdue,
    Completed,
    Paid,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Confirmed => "CONFIRMED",
            Self::Approved => "APPROVED",
            Self::Invoiced => "INVOICED",
            Self::Overdue => "OVERDUE",
            Self::Completed => "COMPLETED",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl TryFrom<&str> for DocumentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "PENDING" => Ok(Self::Pending),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "CONFIRMED" => Ok(Self::Confirmed),
            "APPROVED" => Ok(Self::Approved),
            "INVOICED" => Ok(Self::Invoiced),
            "OVERDUE" => Ok(Self::Overdue),
            "COMPLETED" => Ok(Self::Completed),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidState(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

/// How a trade document or payment is settled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Settlement {
    /// Receivable (sales) or payable (purchases).
    #[default]
    OnCredit,
    Cash,
    /// A bank account; `None` falls back to the default bank account code.
    Bank { account_code: Option<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Money received from a customer.
    Receipt,
    /// Money paid to a supplier.
    Disbursement,
}

/// A pre-built line for manual documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub account_code: String,
    pub debit: i64,
    pub credit: i64,
    pub memo: Option<String>,
}

impl LineDraft {
    pub fn debit(account_code: impl Into<String>, amount: i64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: 0,
            memo: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: i64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: 0,
            credit: amount,
            memo: None,
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentDetail {
    /// Sale or purchase invoice. `tax` is already computed by the caller.
    ///
    /// `shipping`, `withheld_tax` and `cogs` only apply to sales: shipping
    /// billed to the customer, tax the customer withholds from what it pays,
    /// and the cost of the goods leaving inventory.
    Trade {
        subtotal: i64,
        tax: i64,
        #[serde(default)]
        shipping: i64,
        #[serde(default)]
        withheld_tax: i64,
        #[serde(default)]
        cogs: i64,
        settlement: Settlement,
    },
    Payment {
        amount: i64,
        direction: PaymentDirection,
        settlement: Settlement,
    },
    /// Adjustments and opening balances carry their own lines.
    Manual { lines: Vec<LineDraft> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_type: SourceType,
    pub source_id: String,
    pub status: DocumentStatus,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub detail: DocumentDetail,
}

impl SourceDocument {
    /// A sale invoice without tax, settled on credit.
    #[must_use]
    pub fn sale(
        source_id: impl Into<String>,
        status: DocumentStatus,
        date: NaiveDate,
        subtotal: i64,
    ) -> Self {
        Self {
            source_type: SourceType::Sale,
            source_id: source_id.into(),
            status,
            date,
            reference: None,
            detail: DocumentDetail::Trade {
                subtotal,
                tax: 0,
                shipping: 0,
                withheld_tax: 0,
                cogs: 0,
                settlement: Settlement::OnCredit,
            },
        }
    }

    /// A purchase invoice without tax, settled on credit.
    #[must_use]
    pub fn purchase(
        source_id: impl Into<String>,
        status: DocumentStatus,
        date: NaiveDate,
        subtotal: i64,
    ) -> Self {
        Self {
            source_type: SourceType::Purchase,
            source_id: source_id.into(),
            status,
            date,
            reference: None,
            detail: DocumentDetail::Trade {
                subtotal,
                tax: 0,
                shipping: 0,
                withheld_tax: 0,
                cogs: 0,
                settlement: Settlement::OnCredit,
            },
        }
    }

    /// A payment settled in cash.
    #[must_use]
    pub fn payment(
        source_id: impl Into<String>,
        status: DocumentStatus,
        date: NaiveDate,
        amount: i64,
        direction: PaymentDirection,
    ) -> Self {
        Self {
            source_type: SourceType::Payment,
            source_id: source_id.into(),
            status,
            date,
            reference: None,
            detail: DocumentDetail::Payment {
                amount,
                direction,
                settlement: Settlement::Cash,
            },
        }
    }

    /// An adjustment or opening balance carrying explicit lines.
    #[must_use]
    pub fn manual(
        source_type: SourceType,
        source_id: impl Into<String>,
        status: DocumentStatus,
        date: NaiveDate,
        lines: Vec<LineDraft>,
    ) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
            status,
            date,
            reference: None,
            detail: DocumentDetail::Manual { lines },
        }
    }

    #[must_use]
    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the tax amount of a trade document; no-op for other details.
    #[must_use]
    pub fn tax(mut self, amount: i64) -> Self {
        if let DocumentDetail::Trade { tax, .. } = &mut self.detail {
            *tax = amount;
        }
        self
    }

    /// Sets the shipping billed on a trade document.
    #[must_use]
    pub fn shipping(mut self, amount: i64) -> Self {
        if let DocumentDetail::Trade { shipping, .. } = &mut self.detail {
            *shipping = amount;
        }
        self
    }

    /// Sets the tax withheld by the customer on a trade document.
    #[must_use]
    pub fn withheld_tax(mut self, amount: i64) -> Self {
        if let DocumentDetail::Trade { withheld_tax, .. } = &mut self.detail {
            *withheld_tax = amount;
        }
        self
    }

    /// Sets the cost of goods sold on a trade document.
    #[must_use]
    pub fn cogs(mut self, amount: i64) -> Self {
        if let DocumentDetail::Trade { cogs, .. } = &mut self.detail {
            *cogs = amount;
        }
        self
    }

    /// Sets the settlement of a trade or payment document.
    #[must_use]
    pub fn settlement(mut self, value: Settlement) -> Self {
        match &mut self.detail {
            DocumentDetail::Trade { settlement, .. }
            | DocumentDetail::Payment { settlement, .. } => *settlement = value,
            DocumentDetail::Manual { .. } => {}
        }
        self
    }

    /// Human label used in entry descriptions.
    pub fn label(&self) -> String {
        match &self.reference {
            Some(reference) => format!("{} {}", self.source_type.as_str(), reference),
            None => format!("{} #{}", self.source_type.as_str(), self.source_id),
        }
    }
}
