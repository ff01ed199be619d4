mod common;

use chrono::NaiveDate;
use ledger::{
    Amount, DocumentStatus, Engine, EngineError, EngineSettings, EntryStatus, EventKind,
    LineDraft, PostingAccounts, SourceDocument, SourceType,
};

use common::{account_id, date, engine_with_db, engine_with_settings};

fn april(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

/// 10_000 of revenue and 3_000 of expense in March.
async fn march_activity(engine: &Engine) {
    let sale = SourceDocument::sale("S-1", DocumentStatus::Invoiced, date(5), 10_000);
    engine
        .request_posting(&sale, EventKind::Invoice)
        .await
        .unwrap();
    let rent = SourceDocument::manual(
        SourceType::Adjustment,
        "ADJ-1",
        DocumentStatus::Approved,
        date(6),
        vec![LineDraft::debit("6101", 3_000), LineDraft::credit("1101", 3_000)],
    );
    engine
        .request_posting(&rent, EventKind::Adjustment)
        .await
        .unwrap();
}

async fn balance(engine: &Engine, code: &str) -> Amount {
    engine.project(account_id(engine, code).await).await.unwrap()
}

#[tokio::test]
async fn closing_moves_income_into_retained_earnings() {
    let (engine, _db) = engine_with_db().await;
    march_activity(&engine).await;

    let period = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();
    assert!(period.is_closed);
    assert_eq!(period.total_revenue, Amount::new(10_000));
    assert_eq!(period.total_expense, Amount::new(3_000));
    assert_eq!(period.net_income, Amount::new(7_000));

    assert_eq!(balance(&engine, "4101").await, Amount::ZERO);
    assert_eq!(balance(&engine, "6101").await, Amount::ZERO);
    assert_eq!(balance(&engine, "3201").await, Amount::new(7_000));

    let closing = engine
        .entry(period.closing_entry_id.unwrap())
        .await
        .unwrap();
    assert_eq!(closing.source_type, SourceType::PeriodClose);
    assert_eq!(closing.event_kind, EventKind::Closing);
    assert_eq!(closing.entry_date, date(31));
    assert_eq!(closing.status, EntryStatus::Posted);
    assert!(closing.is_balanced());

    assert!(engine.verify_integrity().await.unwrap().consistent);
    let periods = engine.periods().await.unwrap();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].id, period.id);
    assert_eq!(periods[0].closing_entry_id, Some(closing.id));
}

#[tokio::test]
async fn closed_dates_refuse_postings() {
    let (engine, _db) = engine_with_db().await;
    march_activity(&engine).await;
    engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();

    let late = SourceDocument::sale("S-2", DocumentStatus::Invoiced, date(31), 500);
    let err = engine
        .request_posting(&late, EventKind::Invoice)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert!(
        engine
            .entries_for_source(SourceType::Sale, "S-2")
            .await
            .unwrap()
            .is_empty()
    );

    let next = SourceDocument::sale("S-3", DocumentStatus::Invoiced, april(1), 500);
    engine
        .request_posting(&next, EventKind::Invoice)
        .await
        .unwrap();
    assert_eq!(balance(&engine, "4101").await, Amount::new(500));

    assert!(engine.closed_period_for(date(15)).await.unwrap().is_some());
    assert!(engine.closed_period_for(april(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn overlapping_or_inverted_ranges_are_refused() {
    let (engine, _db) = engine_with_db().await;
    engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();

    let err = engine
        .close_period(date(15), april(15), "overlap")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = engine
        .close_period(april(30), april(1), "inverted")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(engine.periods().await.unwrap().len(), 1);
}

#[tokio::test]
async fn quiet_period_closes_without_an_entry() {
    let (engine, _db) = engine_with_db().await;
    let period = engine.close_period(date(1), date(31), "").await.unwrap();
    assert!(period.is_closed);
    assert_eq!(period.closing_entry_id, None);
    assert_eq!(period.net_income, Amount::ZERO);
    assert!(period.description.contains("2024-03-01"));
}

#[tokio::test]
async fn net_loss_debits_retained_earnings() {
    let (engine, _db) = engine_with_db().await;
    let cost = SourceDocument::manual(
        SourceType::Adjustment,
        "ADJ-1",
        DocumentStatus::Approved,
        date(2),
        vec![LineDraft::debit("6101", 800), LineDraft::credit("1102", 800)],
    );
    engine
        .request_posting(&cost, EventKind::Adjustment)
        .await
        .unwrap();

    let period = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();
    assert_eq!(period.net_income, Amount::new(-800));
    assert_eq!(balance(&engine, "3201").await, Amount::new(-800));
    assert_eq!(balance(&engine, "6101").await, Amount::ZERO);
}

#[tokio::test]
async fn reopening_reverses_the_close_and_allows_reclosing() {
    let (engine, _db) = engine_with_db().await;
    march_activity(&engine).await;
    let first = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();

    let err = engine.reopen_period(first.id, "  ").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let reopened = engine
        .reopen_period(first.id, "late supplier invoice")
        .await
        .unwrap();
    assert!(!reopened.is_closed);
    assert!(reopened.notes.contains("late supplier invoice"));
    assert_eq!(balance(&engine, "4101").await, Amount::new(10_000));
    assert_eq!(balance(&engine, "3201").await, Amount::ZERO);
    let closing_id = first.closing_entry_id.unwrap();
    assert_eq!(
        engine.entry(closing_id).await.unwrap().status,
        EntryStatus::Void
    );

    let err = engine
        .reopen_period(first.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let late = SourceDocument::sale("S-2", DocumentStatus::Invoiced, date(20), 1_000);
    engine
        .request_posting(&late, EventKind::Invoice)
        .await
        .unwrap();

    let second = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.net_income, Amount::new(8_000));
    assert_eq!(balance(&engine, "4101").await, Amount::ZERO);
    assert_eq!(balance(&engine, "3201").await, Amount::new(8_000));

    let periods = engine.periods().await.unwrap();
    assert_eq!(periods.len(), 2);
    assert_eq!(periods.iter().filter(|p| p.is_closed).count(), 1);
    assert!(engine.verify_integrity().await.unwrap().consistent);
}

#[tokio::test]
async fn only_the_latest_closed_period_reopens() {
    let (engine, _db) = engine_with_db().await;
    march_activity(&engine).await;
    let march = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();
    let april_sale = SourceDocument::sale("S-4", DocumentStatus::Invoiced, april(3), 2_000);
    engine
        .request_posting(&april_sale, EventKind::Invoice)
        .await
        .unwrap();
    let april_period = engine
        .close_period(april(1), april(30), "April 2024")
        .await
        .unwrap();
    assert_eq!(april_period.net_income, Amount::new(2_000));
    assert_eq!(balance(&engine, "3201").await, Amount::new(9_000));

    let err = engine
        .reopen_period(march.id, "audit")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    engine.reopen_period(april_period.id, "audit").await.unwrap();
    engine.reopen_period(march.id, "audit").await.unwrap();
    assert_eq!(balance(&engine, "3201").await, Amount::ZERO);
    assert_eq!(balance(&engine, "4101").await, Amount::new(12_000));
}

#[tokio::test]
async fn closing_entries_cannot_be_voided() {
    let (engine, _db) = engine_with_db().await;
    march_activity(&engine).await;
    let period = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap();

    let err = engine
        .void_entry(period.closing_entry_id.unwrap(), "undo")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(balance(&engine, "3201").await, Amount::new(7_000));
}

#[tokio::test]
async fn retained_earnings_must_be_a_leaf_equity_account() {
    let (engine, _db) = engine_with_settings(EngineSettings {
        accounts: PostingAccounts {
            retained_earnings: "1101".to_string(),
            ..PostingAccounts::default()
        },
        ..EngineSettings::default()
    })
    .await;

    let err = engine
        .close_period(date(1), date(31), "March 2024")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));
    assert!(engine.periods().await.unwrap().is_empty());
}
