//! General-ledger posting and reconciliation engine.
//!
//! Business documents (sales, purchases, payments, adjustments) are turned
//! into balanced, append-only journal entries by the posting gate
//! ([`Engine::request_posting`]). Account balances are always derivable from
//! POSTED journal lines ([`Engine::project`]); the cached balance column is a
//! projection that [`Engine::verify_integrity`] checks and
//! [`Engine::resync`] rebuilds. Sub-ledgers mirror leaf asset accounts with
//! an audit trail. Closed accounting periods ([`Engine::close_period`])
//! freeze their dates and carry revenue and expense into retained earnings.
//!
//! ```rust,no_run
//! # async fn run(db: sea_orm::DatabaseConnection) -> Result<(), ledger::EngineError> {
//! use chrono::NaiveDate;
//! use ledger::{DocumentStatus, Engine, EventKind, SourceDocument};
//!
//! let engine = Engine::builder().database(db).build().await?;
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
//! let sale = SourceDocument::sale("S-1", DocumentStatus::Invoiced, date, 1_000_000);
//! let entry = engine.request_posting(&sale, EventKind::Invoice).await?;
//! assert!(entry.is_balanced());
//! # Ok(())
//! # }
//! ```

pub use accounts::{Account, AccountKind, NormalSide, fold_lines};
pub use amount::Amount;
pub use builders::{
    LineBuilder, ManualBuilder, PaymentBuilder, PurchaseInvoiceBuilder, SaleInvoiceBuilder,
    ensure_balanced,
};
pub use documents::{
    DocumentDetail, DocumentStatus, LineDraft, PaymentDirection, Settlement, SourceDocument,
};
pub use entries::{EntryStatus, EventKind, JournalEntry, SourceType};
pub use error::EngineError;
pub use lines::JournalLine;
pub use ops::{
    BalanceCorrection, DateRange, Discrepancy, Engine, EngineBuilder, IntegrityReport,
    LedgerLine, NewAccount, ResyncSummary, StatusFilter, SubledgerDiscrepancy, SubledgerSync,
    SyncSummary, TrialBalance, TrialBalanceRow, allowed_statuses,
};
pub use periods::AccountingPeriod;
pub use reconciler::{Reconciler, ReconcilerHandle};
pub use settings::{EngineSettings, PostingAccounts, ReconcilerSettings, RetrySettings};
pub use subledger_audit::{SubledgerAudit, SyncReason};
pub use subledgers::Subledger;

mod accounts;
mod amount;
mod builders;
mod documents;
mod entries;
mod error;
mod lines;
mod locks;
mod ops;
mod periods;
mod posting_keys;
mod reconciler;
mod settings;
mod subledger_audit;
mod subledgers;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
