#![allow(dead_code)]

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{AccountKind, Engine, EngineSettings, NewAccount};
use migration::MigratorTrait;
use uuid::Uuid;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_settings(EngineSettings::default()).await
}

pub async fn engine_with_settings(settings: EngineSettings) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .settings(settings)
        .build()
        .await
        .unwrap();
    seed_chart(&engine).await;
    (engine, db)
}

pub async fn engine_with_file_db() -> (Engine, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    seed_chart(&engine).await;
    (engine, db, path)
}

/// A small chart covering the default posting accounts.
pub async fn seed_chart(engine: &Engine) {
    let headers = [
        ("1000", "Assets", AccountKind::Asset),
        ("2000", "Liabilities", AccountKind::Liability),
        ("3000", "Equity", AccountKind::Equity),
        ("4000", "Revenue", AccountKind::Revenue),
        ("5000", "Cost of sales", AccountKind::Expense),
        ("6000", "Expenses", AccountKind::Expense),
    ];
    for (code, name, kind) in headers {
        engine
            .create_account(NewAccount::header(code, name, kind))
            .await
            .unwrap();
    }

    let leaves = [
        ("1101", "Cash", AccountKind::Asset, "1000"),
        ("1102", "Bank", AccountKind::Asset, "1000"),
        ("1114", "Prepaid income tax", AccountKind::Asset, "1000"),
        ("1201", "Accounts receivable", AccountKind::Asset, "1000"),
        ("1240", "Input tax", AccountKind::Asset, "1000"),
        ("1301", "Inventory", AccountKind::Asset, "1000"),
        ("2101", "Accounts payable", AccountKind::Liability, "2000"),
        ("2103", "Output tax", AccountKind::Liability, "2000"),
        ("3101", "Owner capital", AccountKind::Equity, "3000"),
        ("3201", "Retained earnings", AccountKind::Equity, "3000"),
        ("4101", "Sales revenue", AccountKind::Revenue, "4000"),
        ("4102", "Shipping revenue", AccountKind::Revenue, "4000"),
        ("5101", "Cost of goods sold", AccountKind::Expense, "5000"),
        ("6101", "Operating expenses", AccountKind::Expense, "6000"),
    ];
    for (code, name, kind, parent) in leaves {
        engine
            .create_account(NewAccount::leaf(code, name, kind).parent(parent))
            .await
            .unwrap();
    }
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

pub async fn account_id(engine: &Engine, code: &str) -> Uuid {
    engine.account_by_code(code).await.unwrap().id
}

/// Overwrites a cached balance behind the engine's back.
pub async fn corrupt_balance(db: &DatabaseConnection, code: &str, balance: i64) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE accounts SET balance = ? WHERE code = ?",
        vec![balance.into(), code.into()],
    ))
    .await
    .unwrap();
}
