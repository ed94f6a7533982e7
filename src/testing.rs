// src/testing.rs

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::clock::{Calendar, FixedClock};
use crate::engine::Engine;
use crate::models::{Currency, NewCustomer, NewService, PaymentType, Service, DEFAULT_CATEGORY};
use crate::store::{MemoryStore, Store};

/// Noon UTC on the given date.
pub(crate) fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
        .single()
        .expect("valid test date")
}

pub(crate) fn test_engine(now: DateTime<Utc>) -> (Engine, Arc<FixedClock>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(now));
    let engine = Engine::new(store.clone(), clock.clone(), Calendar::utc());
    (engine, clock, store)
}

/// Inserts a fresh customer and one service without reminders.
pub(crate) async fn seed_service(
    store: &Arc<MemoryStore>,
    payment_type: PaymentType,
    starting_date: DateTime<Utc>,
    ending_date: DateTime<Utc>,
) -> Service {
    let customer = store
        .insert_customer(NewCustomer {
            name: "Acme".into(),
            table_name: None,
            email: None,
            phone: None,
            password: None,
            created_at: starting_date,
        })
        .await
        .expect("seed customer");

    seed_owned_service(store, customer.id, None, payment_type, starting_date, ending_date).await
}

/// Inserts one service for an existing customer, without reminders.
pub(crate) async fn seed_owned_service(
    store: &Arc<MemoryStore>,
    customer_id: i32,
    description: Option<&str>,
    payment_type: PaymentType,
    starting_date: DateTime<Utc>,
    ending_date: DateTime<Utc>,
) -> Service {
    let service = NewService {
        name: "Adisyon".into(),
        description: description.map(str::to_string),
        company_name: Some("Acme".into()),
        category: DEFAULT_CATEGORY.into(),
        payment_type,
        period_price: Decimal::new(1500, 0),
        currency: Currency::TL,
        active: true,
        starting_date,
        ending_date,
        device_token: None,
        terminal: None,
        customer_id,
        created_at: starting_date,
    };
    store
        .create_services(vec![(service, None)])
        .await
        .expect("seed service")
        .remove(0)
}
