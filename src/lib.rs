pub mod api;
pub mod api_log;
pub mod clock;
pub mod config;
pub mod customers;
pub mod docs;
pub mod engine;
pub mod error;
pub mod models;
pub mod notifier;
pub mod reminders;
pub mod renewal;
pub mod services;
pub mod status;
pub mod store;
pub mod trial;

#[cfg(test)]
pub(crate) mod testing;

use engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    /// Shared secret device clients present to `/renew`.
    pub renew_password: String,
    pub jwt_secret: String,
}
