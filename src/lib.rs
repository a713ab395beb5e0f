pub mod app;
pub mod app_state;
pub mod checkin;
pub mod config;
pub mod db;
pub mod error;
pub mod flash;
pub mod ledger;
pub mod middleware;
pub mod modules;
pub mod notify;
pub mod qr;
pub mod reconcile;
pub mod registration;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
