//! Background delivery of records the ledger did not accept the first time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::db::{AttendeeStore, DatabaseError};
use crate::ledger::{LedgerEntry, LedgerSync};

/// Outcome of a single reconciliation round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

pub struct LedgerReconciler {
    store: Arc<dyn AttendeeStore>,
    ledger: Arc<dyn LedgerSync>,
    interval: Duration,
    batch_size: u32,
    settle: Duration,
}

impl LedgerReconciler {
    /// Entries younger than `settle` are left alone: their first push may
    /// still be in flight on the request that stored them.
    pub fn new(
        store: Arc<dyn AttendeeStore>,
        ledger: Arc<dyn LedgerSync>,
        interval: Duration,
        batch_size: u32,
        settle: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            interval,
            batch_size,
            settle,
        }
    }

    fn settled_before(&self) -> DateTime<Utc> {
        let now = Utc::now();
        chrono::Duration::from_std(self.settle)
            .ok()
            .and_then(|settle| now.checked_sub_signed(settle))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Push every settled, pending registration and check-in once.
    pub async fn run_once(&self) -> Result<ReconcileReport, DatabaseError> {
        let settled_before = self.settled_before();
        let mut pending: Vec<LedgerEntry> = self
            .store
            .unsynced_registrations(settled_before, self.batch_size)
            .await?
            .into_iter()
            .map(LedgerEntry::Registration)
            .collect();
        pending.extend(
            self.store
                .unsynced_validations(settled_before, self.batch_size)
                .await?
                .into_iter()
                .map(LedgerEntry::CheckIn),
        );

        let mut report = ReconcileReport {
            attempted: pending.len(),
            ..ReconcileReport::default()
        };

        for entry in &pending {
            match self.ledger.push(entry).await {
                Ok(()) => {
                    if let Err(err) = self.store.mark_synced(entry.sheet(), entry.id()).await {
                        // Delivered, but it will be pushed again next round.
                        warn!(
                            sheet = entry.sheet().as_str(),
                            register_number = entry.register_number(),
                            error = %err,
                            "Failed to mark ledger entry as synced"
                        );
                    }
                    report.synced += 1;
                }
                Err(err) => {
                    debug!(
                        sheet = entry.sheet().as_str(),
                        register_number = entry.register_number(),
                        error = %err,
                        "Ledger retry failed"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run rounds on a fixed interval until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(report) if report.attempted == 0 => {}
                    Ok(report) if report.failed == 0 => {
                        info!(synced = report.synced, "Ledger backlog delivered");
                    }
                    Ok(report) => {
                        warn!(
                            synced = report.synced,
                            failed = report.failed,
                            "Ledger backlog partially delivered"
                        );
                    }
                    Err(err) => warn!(error = %err, "Ledger reconciliation skipped"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::CheckInDesk;
    use crate::db::MemoryStore;
    use crate::ledger::{LedgerError, Sheet};
    use crate::qr;
    use crate::testing::{attendee, RecordingLedger};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn backlog_is_delivered_once_the_ledger_recovers() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::new());
        store.insert_registration(&attendee("R1")).await.unwrap();
        let synced = store.insert_registration(&attendee("R2")).await.unwrap();
        store.mark_synced(Sheet::Registrations, synced.id).await.unwrap();
        store.insert_validation(&attendee("R1")).await.unwrap();

        let reconciler = LedgerReconciler::new(
            store.clone(),
            ledger.clone(),
            Duration::from_secs(60),
            10,
            Duration::ZERO,
        );

        ledger.set_failing(true);
        let report = reconciler.run_once().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                attempted: 2,
                synced: 0,
                failed: 2
            }
        );

        ledger.set_failing(false);
        let report = reconciler.run_once().await.unwrap();
        assert_eq!(report.synced, 2);

        let sheets: Vec<Sheet> = ledger.entries().iter().map(LedgerEntry::sheet).collect();
        assert_eq!(sheets, vec![Sheet::Registrations, Sheet::CheckIns]);

        assert_eq!(reconciler.run_once().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_retries_on_its_interval() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::new());
        store.insert_registration(&attendee("R1")).await.unwrap();

        let handle = LedgerReconciler::new(
            store.clone(),
            ledger.clone(),
            Duration::from_secs(5),
            10,
            Duration::ZERO,
        )
        .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ledger.entries().len(), 1);
        assert!(store
            .unsynced_registrations(Utc::now(), 10)
            .await
            .unwrap()
            .is_empty());

        handle.abort();
    }

    /// Ledger that holds every push for a while and counts the calls.
    struct SlowLedger {
        delay: Duration,
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl LedgerSync for SlowLedger {
        async fn push(&self, _entry: &LedgerEntry) -> Result<(), LedgerError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn entry_still_being_pushed_by_a_request_is_not_pushed_again() {
        let store = Arc::new(MemoryStore::new());
        store.insert_registration(&attendee("R100")).await.unwrap();
        store
            .mark_synced(
                Sheet::Registrations,
                store.find_registration("R100").await.unwrap().unwrap().id,
            )
            .await
            .unwrap();
        let ledger = Arc::new(SlowLedger {
            delay: Duration::from_millis(300),
            pushes: AtomicUsize::new(0),
        });

        let desk = Arc::new(CheckInDesk::new(store.clone(), ledger.clone()));
        let scan = tokio::spawn({
            let desk = desk.clone();
            async move { desk.validate(&qr::encode(&attendee("R100"))).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let reconciler = LedgerReconciler::new(
            store.clone(),
            ledger.clone(),
            Duration::from_secs(60),
            10,
            Duration::from_secs(30),
        );
        assert_eq!(reconciler.run_once().await.unwrap(), ReconcileReport::default());

        scan.await.unwrap().unwrap();
        assert_eq!(ledger.pushes.load(Ordering::SeqCst), 1);
    }

    /// Delivers normally, then takes the store down before it can be marked.
    struct OutageLedger {
        store: Arc<MemoryStore>,
        inner: RecordingLedger,
    }

    #[async_trait]
    impl LedgerSync for OutageLedger {
        async fn push(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
            self.inner.push(entry).await?;
            self.store.set_unavailable(true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_mark_does_not_abandon_the_rest_of_the_round() {
        let store = Arc::new(MemoryStore::new());
        store.insert_registration(&attendee("R1")).await.unwrap();
        store.insert_registration(&attendee("R2")).await.unwrap();
        let ledger = Arc::new(OutageLedger {
            store: store.clone(),
            inner: RecordingLedger::new(),
        });

        let reconciler = LedgerReconciler::new(
            store.clone(),
            ledger.clone(),
            Duration::from_secs(60),
            10,
            Duration::ZERO,
        );
        let report = reconciler.run_once().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.synced, 2);
        assert_eq!(ledger.inner.entries().len(), 2);
    }
}
