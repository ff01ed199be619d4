use std::{collections::HashMap, future::Future, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    EngineError, EngineSettings, EventKind, LineBuilder, ManualBuilder, PaymentBuilder,
    PurchaseInvoiceBuilder, ResultEngine, SaleInvoiceBuilder, SourceType, locks::AccountLocks,
    util::map_db_err,
};

mod accounts;
mod gate;
mod periods;
mod projector;
mod store;
mod subledgers;
mod verifier;

pub use accounts::NewAccount;
pub use gate::allowed_statuses;
pub use projector::{BalanceCorrection, SyncSummary, TrialBalance, TrialBalanceRow};
pub use store::{DateRange, LedgerLine, StatusFilter};
pub use subledgers::SubledgerSync;
pub use verifier::{Discrepancy, IntegrityReport, ResyncSummary, SubledgerDiscrepancy};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

type BuilderKey = (SourceType, EventKind);

/// The ledger engine.
///
/// Cheap to clone: clones share the connection pool, the per-account locks
/// and the registered line builders, so one engine can serve many
/// concurrent tasks.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    locks: Arc<AccountLocks>,
    builders: Arc<HashMap<BuilderKey, Arc<dyn LineBuilder>>>,
    settings: Arc<EngineSettings>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. Contention is surfaced as
    /// `ConcurrencyConflict`.
    pub(crate) async fn retrying<T, F, Fut>(&self, operation: &str, mut attempt: F) -> ResultEngine<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultEngine<T>>,
    {
        let retry = &self.settings.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut tries: u32 = 0;
        loop {
            match attempt().await.map_err(classify) {
                Err(err) if err.is_retryable() && tries + 1 < max_attempts => {
                    let delay = retry.delay(tries);
                    tracing::warn!(
                        operation,
                        attempt = tries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "contention, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    tries += 1;
                }
                other => return other,
            }
        }
    }
}

fn classify(err: EngineError) -> EngineError {
    match err {
        EngineError::Database(db_err) => map_db_err(db_err),
        other => other,
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    settings: EngineSettings,
    builders: HashMap<BuilderKey, Arc<dyn LineBuilder>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Replace the line builder used for one `(source type, event)` pair.
    ///
    /// The pair must still be allowed by the posting transition table.
    pub fn line_builder(
        mut self,
        source_type: SourceType,
        event_kind: EventKind,
        builder: impl LineBuilder + 'static,
    ) -> EngineBuilder {
        self.builders
            .insert((source_type, event_kind), Arc::new(builder));
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let mut builders = self.builders;
        let defaults: [(BuilderKey, Arc<dyn LineBuilder>); 5] = [
            (
                (SourceType::Sale, EventKind::Invoice),
                Arc::new(SaleInvoiceBuilder),
            ),
            (
                (SourceType::Purchase, EventKind::Invoice),
                Arc::new(PurchaseInvoiceBuilder),
            ),
            (
                (SourceType::Payment, EventKind::Settlement),
                Arc::new(PaymentBuilder),
            ),
            (
                (SourceType::Adjustment, EventKind::Adjustment),
                Arc::new(ManualBuilder),
            ),
            (
                (SourceType::OpeningBalance, EventKind::OpeningBalance),
                Arc::new(ManualBuilder),
            ),
        ];
        for (key, builder) in defaults {
            builders.entry(key).or_insert(builder);
        }

        for (source_type, event_kind) in builders.keys() {
            if allowed_statuses(*source_type, *event_kind).is_none() {
                return Err(EngineError::InvalidState(format!(
                    "no posting transition for {} {}",
                    source_type.as_str(),
                    event_kind.as_str()
                )));
            }
        }

        Ok(Engine {
            database: self.database,
            locks: Arc::new(AccountLocks::default()),
            builders: Arc::new(builders),
            settings: Arc::new(self.settings),
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::*;

    #[test]
    fn contention_becomes_a_conflict() {
        let err = classify(EngineError::Database(DbErr::Custom(
            "database is locked".to_string(),
        )));
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
        assert!(err.is_retryable());

        let err = classify(EngineError::InvalidAmount("bad".to_string()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn retries_stop_after_the_configured_attempts() {
        let engine = Engine::builder()
            .settings(EngineSettings {
                retry: crate::RetrySettings {
                    max_attempts: 3,
                    base_delay_ms: 1,
                },
                ..EngineSettings::default()
            })
            .build()
            .await
            .unwrap();

        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: ResultEngine<()> = engine
            .retrying("test", || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(EngineError::ConcurrencyConflict("busy".to_string()))
            })
            .await;

        assert!(matches!(result, Err(EngineError::ConcurrencyConflict(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
