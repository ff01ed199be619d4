use ledger::Reconciler;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgerd={level},ledger={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = ledger::Engine::builder()
        .database(db)
        .settings(settings.engine)
        .build()
        .await?;

    let report = engine.verify_integrity().await?;
    tracing::info!(
        accounts = report.accounts_checked,
        consistent = report.consistent,
        "startup integrity check"
    );

    let reconciler = Reconciler::spawn(engine, settings.reconciler);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    reconciler.shutdown().await;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
