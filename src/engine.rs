// src/engine.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Calendar, Clock, SystemClock};
use crate::error::{EngineError, EngineResult};
use crate::models::Service;
use crate::store::Store;

pub const DEFAULT_NOTIFIER_LOCK_KEY: i64 = 424242;

/// Service lifecycle engine: renewals, reminders, trials and expiry alerts on top of a
/// [`Store`]. Cheap to clone; clones share the store and clock.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    notifier_lock_key: i64,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, calendar: Calendar) -> Self {
        Self {
            store,
            clock,
            calendar,
            notifier_lock_key: DEFAULT_NOTIFIER_LOCK_KEY,
        }
    }

    pub fn with_system_clock(store: Arc<dyn Store>, calendar: Calendar) -> Self {
        Self::new(store, Arc::new(SystemClock), calendar)
    }

    pub fn with_notifier_lock_key(mut self, key: i64) -> Self {
        self.notifier_lock_key = key;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn notifier_lock_key(&self) -> i64 {
        self.notifier_lock_key
    }

    pub(crate) async fn require_service(&self, id: i32) -> EngineResult<Service> {
        self.store
            .get_service(id)
            .await?
            .ok_or_else(|| EngineError::not_found("service", id))
    }
}
