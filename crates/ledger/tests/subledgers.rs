mod common;

use ledger::{
    Amount, DocumentStatus, EngineError, EventKind, PaymentDirection, Settlement, SourceDocument,
};
use sea_orm::{ConnectionTrait, Statement};

use common::{account_id, date, engine_with_db};

async fn cash_sale(engine: &ledger::Engine, id: &str, amount: i64) {
    let sale = SourceDocument::sale(id, DocumentStatus::Paid, date(1), amount)
        .settlement(Settlement::Cash);
    engine
        .request_posting(&sale, EventKind::Invoice)
        .await
        .unwrap();
}

#[tokio::test]
async fn linking_starts_from_the_projection() {
    let (engine, _db) = engine_with_db().await;
    cash_sale(&engine, "S-1", 5_000).await;

    let drawer = engine.create_subledger("Front drawer", "1101").await.unwrap();
    assert_eq!(drawer.balance, Amount::new(5_000));
    assert_eq!(drawer.linked_account_id, account_id(&engine, "1101").await);

    let history = engine.subledger_history(drawer.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, "linked");
    assert_eq!(history[0].previous_balance, Amount::ZERO);
    assert_eq!(history[0].new_balance, Amount::new(5_000));
}

#[tokio::test]
async fn postings_mirror_into_linked_subledgers() {
    let (engine, _db) = engine_with_db().await;
    let drawer = engine.create_subledger("Front drawer", "1101").await.unwrap();

    cash_sale(&engine, "S-1", 2_000).await;
    let receipt = SourceDocument::payment(
        "PAY-1",
        DocumentStatus::Completed,
        date(2),
        500,
        PaymentDirection::Receipt,
    );
    engine
        .request_posting(&receipt, EventKind::Settlement)
        .await
        .unwrap();

    let drawer = engine.subledger(drawer.id).await.unwrap();
    assert_eq!(drawer.balance, Amount::new(2_500));

    let history = engine.subledger_history(drawer.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].reason, "posting");
    assert_eq!(history[1].previous_balance, Amount::ZERO);
    assert_eq!(history[1].new_balance, Amount::new(2_000));
    assert_eq!(history[2].previous_balance, Amount::new(2_000));
    assert_eq!(history[2].new_balance, Amount::new(2_500));

    // untouched sub-ledgers keep their trail short
    let vault = engine.create_subledger("Bank vault", "1102").await.unwrap();
    cash_sale(&engine, "S-2", 100).await;
    assert_eq!(engine.subledger_history(vault.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sync_repairs_drift_with_an_audit_row() {
    let (engine, db) = engine_with_db().await;
    cash_sale(&engine, "S-1", 9_000).await;
    let drawer = engine.create_subledger("Front drawer", "1101").await.unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE subledgers SET balance = ? WHERE name = ?",
        vec![1_i64.into(), "Front drawer".into()],
    ))
    .await
    .unwrap();

    let report = engine.verify_integrity().await.unwrap();
    assert!(!report.consistent);
    assert_eq!(report.subledger_discrepancies.len(), 1);
    assert_eq!(report.subledger_discrepancies[0].balance, Amount::new(1));
    assert_eq!(
        report.subledger_discrepancies[0].projected,
        Amount::new(9_000)
    );

    let sync = engine.sync_subledger(drawer.id).await.unwrap();
    assert!(sync.changed());
    assert_eq!(sync.previous, Amount::new(1));
    assert_eq!(sync.current, Amount::new(9_000));

    let history = engine.subledger_history(drawer.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.reason, "resync");
    assert_eq!(last.previous_balance, Amount::new(1));
    assert!(engine.verify_integrity().await.unwrap().consistent);
}

#[tokio::test]
async fn resync_covers_every_subledger() {
    let (engine, _db) = engine_with_db().await;
    engine.create_subledger("Front drawer", "1101").await.unwrap();
    engine.create_subledger("Bank vault", "1102").await.unwrap();

    let summary = engine.resync().await.unwrap();
    assert_eq!(summary.subledgers.len(), 2);
    assert!(summary.subledgers.iter().all(|s| !s.changed()));
}

#[tokio::test]
async fn only_leaf_asset_accounts_can_be_linked() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.create_subledger("Assets", "1000").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));

    let err = engine.create_subledger("Payables", "2101").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));

    let err = engine.create_subledger("Ghost", "9999").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    engine.create_subledger("Front drawer", "1101").await.unwrap();
    let err = engine
        .create_subledger("Front drawer", "1102")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let missing = engine
        .subledger_history(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(missing, EngineError::KeyNotFound(_)));
}
