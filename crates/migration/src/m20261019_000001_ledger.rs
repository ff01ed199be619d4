//! Initial ledger schema.
//!
//! - `accounts`: chart of accounts with the cached balance projection
//! - `journal_entries`: append-only entry headers
//! - `journal_lines`: debit/credit lines of each entry
//! - `posting_keys`: one row per recorded `(source, event)` for idempotency
//! - `subledgers`: auxiliary registers linked to an asset account
//! - `subledger_audit`: every sub-ledger balance change
//! - `accounting_periods`: closed (and reopened) date ranges

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Code,
    Name,
    Kind,
    ParentId,
    IsHeader,
    Balance,
    UpdatedAt,
}

#[derive(Iden)]
enum JournalEntries {
    Table,
    Id,
    EntryDate,
    SourceType,
    SourceId,
    EventKind,
    Description,
    Status,
    ReversalOf,
    CreatedAt,
}

#[derive(Iden)]
enum JournalLines {
    Table,
    Id,
    EntryId,
    LineNo,
    AccountId,
    Debit,
    Credit,
    Memo,
}

#[derive(Iden)]
enum PostingKeys {
    Table,
    SourceType,
    SourceId,
    EventKind,
    EntryId,
    CreatedAt,
}

#[derive(Iden)]
enum Subledgers {
    Table,
    Id,
    Name,
    LinkedAccountId,
    Balance,
    UpdatedAt,
}

#[derive(Iden)]
enum SubledgerAudit {
    Table,
    Id,
    SubledgerId,
    PreviousBalance,
    NewBalance,
    Reason,
    RecordedAt,
}

#[derive(Iden)]
enum AccountingPeriods {
    Table,
    Id,
    StartDate,
    EndDate,
    Description,
    IsClosed,
    ClosingEntryId,
    TotalRevenue,
    TotalExpense,
    NetIncome,
    ClosedAt,
    Notes,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Accounts::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(ColumnDef::new(Accounts::ParentId).uuid())
                    .col(
                        ColumnDef::new(Accounts::IsHeader)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-parent_id")
                            .from(Accounts::Table, Accounts::ParentId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Journal entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(JournalEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JournalEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JournalEntries::EntryDate).date().not_null())
                    .col(ColumnDef::new(JournalEntries::SourceType).string().not_null())
                    .col(ColumnDef::new(JournalEntries::SourceId).string().not_null())
                    .col(ColumnDef::new(JournalEntries::EventKind).string().not_null())
                    .col(
                        ColumnDef::new(JournalEntries::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(JournalEntries::Status).string().not_null())
                    .col(ColumnDef::new(JournalEntries::ReversalOf).uuid())
                    .col(
                        ColumnDef::new(JournalEntries::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-journal_entries-reversal_of-unique")
                    .table(JournalEntries::Table)
                    .col(JournalEntries::ReversalOf)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-journal_entries-source")
                    .table(JournalEntries::Table)
                    .col(JournalEntries::SourceType)
                    .col(JournalEntries::SourceId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Journal lines
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(JournalLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JournalLines::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JournalLines::EntryId).uuid().not_null())
                    .col(ColumnDef::new(JournalLines::LineNo).integer().not_null())
                    .col(ColumnDef::new(JournalLines::AccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(JournalLines::Debit)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(JournalLines::Credit)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(JournalLines::Memo).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-journal_lines-entry_id")
                            .from(JournalLines::Table, JournalLines::EntryId)
                            .to(JournalEntries::Table, JournalEntries::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-journal_lines-account_id")
                            .from(JournalLines::Table, JournalLines::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-journal_lines-account_id")
                    .table(JournalLines::Table)
                    .col(JournalLines::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-journal_lines-entry_id")
                    .table(JournalLines::Table)
                    .col(JournalLines::EntryId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Posting keys
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PostingKeys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PostingKeys::SourceType).string().not_null())
                    .col(ColumnDef::new(PostingKeys::SourceId).string().not_null())
                    .col(ColumnDef::new(PostingKeys::EventKind).string().not_null())
                    .col(ColumnDef::new(PostingKeys::EntryId).uuid().not_null())
                    .col(
                        ColumnDef::new(PostingKeys::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PostingKeys::SourceType)
                            .col(PostingKeys::SourceId)
                            .col(PostingKeys::EventKind),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Sub-ledgers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Subledgers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subledgers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Subledgers::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Subledgers::LinkedAccountId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subledgers::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Subledgers::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-subledgers-linked_account_id")
                            .from(Subledgers::Table, Subledgers::LinkedAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubledgerAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubledgerAudit::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubledgerAudit::SubledgerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubledgerAudit::PreviousBalance)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubledgerAudit::NewBalance)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubledgerAudit::Reason).string().not_null())
                    .col(
                        ColumnDef::new(SubledgerAudit::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-subledger_audit-subledger_id")
                            .from(SubledgerAudit::Table, SubledgerAudit::SubledgerId)
                            .to(Subledgers::Table, Subledgers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-subledger_audit-subledger_id")
                    .table(SubledgerAudit::Table)
                    .col(SubledgerAudit::SubledgerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Accounting periods
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AccountingPeriods::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountingPeriods::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccountingPeriods::StartDate).date().not_null())
                    .col(ColumnDef::new(AccountingPeriods::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(AccountingPeriods::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountingPeriods::IsClosed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AccountingPeriods::ClosingEntryId).uuid())
                    .col(
                        ColumnDef::new(AccountingPeriods::TotalRevenue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountingPeriods::TotalExpense)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountingPeriods::NetIncome)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AccountingPeriods::ClosedAt).timestamp())
                    .col(
                        ColumnDef::new(AccountingPeriods::Notes)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounting_periods-closing_entry_id")
                            .from(AccountingPeriods::Table, AccountingPeriods::ClosingEntryId)
                            .to(JournalEntries::Table, JournalEntries::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounting_periods-dates")
                    .table(AccountingPeriods::Table)
                    .col(AccountingPeriods::StartDate)
                    .col(AccountingPeriods::EndDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountingPeriods::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubledgerAudit::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subledgers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PostingKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JournalLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JournalEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
