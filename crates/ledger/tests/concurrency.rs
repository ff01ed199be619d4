mod common;

use ledger::{Amount, DocumentStatus, EventKind, Settlement, SourceDocument, SourceType};

use common::{account_id, date, engine_with_db, engine_with_file_db};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_postings_yield_one_entry() {
    let (engine, _db) = engine_with_db().await;
    let sale = SourceDocument::sale("S-1", DocumentStatus::Invoiced, date(1), 1_000_000);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        let sale = sale.clone();
        tasks.push(tokio::spawn(async move {
            engine.request_posting(&sale, EventKind::Invoice).await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let entries = engine
        .entries_for_source(SourceType::Sale, "S-1")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    let ar = account_id(&engine, "1201").await;
    assert_eq!(engine.project(ar).await.unwrap(), Amount::new(1_000_000));
    assert!(engine.verify_integrity().await.unwrap().consistent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_postings_on_shared_accounts_stay_consistent() {
    let (engine, _db) = engine_with_db().await;
    engine.create_subledger("Front drawer", "1101").await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..20 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let settlement = if n % 2 == 0 {
                Settlement::Cash
            } else {
                Settlement::OnCredit
            };
            let sale = SourceDocument::sale(format!("S-{n}"), DocumentStatus::Paid, date(1), 100)
                .settlement(settlement);
            engine.request_posting(&sale, EventKind::Invoice).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let cash = account_id(&engine, "1101").await;
    let ar = account_id(&engine, "1201").await;
    let revenue = account_id(&engine, "4101").await;
    assert_eq!(engine.project(cash).await.unwrap(), Amount::new(1_000));
    assert_eq!(engine.project(ar).await.unwrap(), Amount::new(1_000));
    assert_eq!(engine.project(revenue).await.unwrap(), Amount::new(2_000));

    let report = engine.verify_integrity().await.unwrap();
    assert!(report.consistent);

    let drawer = &engine.subledgers().await.unwrap()[0];
    assert_eq!(drawer.balance, Amount::new(1_000));
    // one row for linking, one per cash sale
    assert_eq!(engine.subledger_history(drawer.id).await.unwrap().len(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn postings_and_resync_interleave_on_a_file_database() {
    let (engine, _db, path) = engine_with_file_db().await;

    let mut tasks = Vec::new();
    for n in 0..10 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let sale = SourceDocument::sale(format!("S-{n}"), DocumentStatus::Invoiced, date(1), 250);
            engine.request_posting(&sale, EventKind::Invoice).await
        }));
    }
    let resync = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.resync().await })
    };
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    resync.await.unwrap().unwrap();

    let ar = account_id(&engine, "1201").await;
    assert_eq!(engine.project(ar).await.unwrap(), Amount::new(2_500));
    assert!(engine.verify_integrity().await.unwrap().consistent);

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verification_during_postings_never_reports_drift() {
    let (engine, _db, path) = engine_with_file_db().await;

    let poster = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for n in 0..100 {
                let sale = SourceDocument::sale(format!("S-{n}"), DocumentStatus::Paid, date(1), 100)
                    .tax(10)
                    .settlement(Settlement::Cash);
                engine.request_posting(&sale, EventKind::Invoice).await?;
            }
            Ok::<_, ledger::EngineError>(())
        })
    };

    let mut checks = 0;
    while !poster.is_finished() {
        let report = engine.verify_integrity().await.unwrap();
        assert!(
            report.consistent,
            "drift reported mid-posting: {:?}",
            report.discrepancies
        );
        checks += 1;
    }
    poster.await.unwrap().unwrap();
    assert!(checks > 0);

    let cash = account_id(&engine, "1101").await;
    assert_eq!(engine.project(cash).await.unwrap(), Amount::new(11_000));
    assert!(engine.verify_integrity().await.unwrap().consistent);

    let _ = std::fs::remove_file(path);
}
