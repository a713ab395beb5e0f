use std::sync::Arc;

use cookie::Key;
use secrecy::ExposeSecret;

use crate::checkin::CheckInDesk;
use crate::config::Config;
use crate::db::AttendeeStore;
use crate::ledger::LedgerSync;
use crate::notify::NotificationSink;
use crate::registration::RegistrationService;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub store: Arc<dyn AttendeeStore>,
    pub registrations: Arc<RegistrationService>,
    pub check_in: Arc<CheckInDesk>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(
        env: Arc<Config>,
        store: Arc<dyn AttendeeStore>,
        ledger: Arc<dyn LedgerSync>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        // Config guarantees the secret is long enough to derive from.
        let cookie_key = match &env.session.secret {
            Some(secret) => Key::derive_from(secret.expose_secret().as_bytes()),
            None => Key::generate(),
        };

        let registrations = Arc::new(RegistrationService::new(
            store.clone(),
            ledger.clone(),
            notifier,
        ));
        let check_in = Arc::new(CheckInDesk::new(store.clone(), ledger));

        Self {
            env,
            store,
            registrations,
            check_in,
            cookie_key,
        }
    }
}
