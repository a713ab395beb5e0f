//! Registration flow: store the attendee once, sync to the ledger, mail the QR code.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::models::{AttendeeRecord, Registration};
use crate::db::{AttendeeStore, DatabaseError};
use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerEntry, LedgerError, LedgerSync};
use crate::notify::{NotificationSink, NotifyError};
use crate::qr;

/// What happened after the registration itself was stored.
#[derive(Debug)]
pub struct RegistrationReceipt {
    pub registration: Registration,
    /// Set when the ledger refused the entry; it stays queued for retry.
    pub ledger_error: Option<LedgerError>,
    /// Set when the QR email could not be produced or sent.
    pub notification_error: Option<NotifyError>,
}

pub struct RegistrationService {
    store: Arc<dyn AttendeeStore>,
    ledger: Arc<dyn LedgerSync>,
    notifier: Arc<dyn NotificationSink>,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn AttendeeStore>,
        ledger: Arc<dyn LedgerSync>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
        }
    }

    /// Register an attendee. Fails only when the register number is taken or
    /// storage is unavailable; ledger and email problems are reported on the
    /// receipt.
    pub async fn register(&self, attendee: AttendeeRecord) -> AppResult<RegistrationReceipt> {
        let register_number = attendee.register_number.clone();

        if self.store.find_registration(&register_number).await?.is_some() {
            return Err(AppError::DuplicateRegistration(register_number));
        }

        let registration = match self.store.insert_registration(&attendee).await {
            Ok(registration) => registration,
            Err(DatabaseError::Duplicate) => {
                return Err(AppError::DuplicateRegistration(register_number))
            }
            Err(err) => return Err(err.into()),
        };
        info!(register_number = %register_number, id = %registration.id, "Attendee registered");

        let ledger_error = self.sync_ledger(&registration).await.err();

        let notification_error = self.send_qr(&registration.attendee).await.err();
        if let Some(err) = &notification_error {
            warn!(register_number = %register_number, error = %err, "Failed to send QR email");
        }

        Ok(RegistrationReceipt {
            registration,
            ledger_error,
            notification_error,
        })
    }

    async fn sync_ledger(&self, registration: &Registration) -> Result<(), LedgerError> {
        let entry = LedgerEntry::Registration(registration.clone());
        if let Err(err) = self.ledger.push(&entry).await {
            warn!(
                register_number = %registration.attendee.register_number,
                error = %err,
                "Ledger sync failed, registration left for the reconciler"
            );
            return Err(err);
        }

        if let Err(err) = self.store.mark_synced(entry.sheet(), registration.id).await {
            warn!(id = %registration.id, error = %err, "Failed to mark registration as synced");
        }
        Ok(())
    }

    async fn send_qr(&self, attendee: &AttendeeRecord) -> Result<(), NotifyError> {
        let payload = qr::encode(attendee);
        let png = qr::render_png(&payload)?;
        self.notifier.send_confirmation(attendee, png).await
    }
}
