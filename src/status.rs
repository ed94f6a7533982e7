// src/status.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Service;

/// Services ending within this many days are reported as `upcoming`.
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceStatus {
    Inactive,
    NotStarted,
    Expired,
    Upcoming,
    Active,
}

/// Classifies a service at `now`. Checks run in a fixed order and the first match wins,
/// so an inactive service is `inactive` whatever its dates say.
pub fn classify_status(service: &Service, now: DateTime<Utc>) -> ServiceStatus {
    if !service.active {
        ServiceStatus::Inactive
    } else if now < service.starting_date {
        ServiceStatus::NotStarted
    } else if now > service.ending_date {
        ServiceStatus::Expired
    } else if service.ending_date <= now + Duration::days(UPCOMING_WINDOW_DAYS) {
        ServiceStatus::Upcoming
    } else {
        ServiceStatus::Active
    }
}

/// Days left until `ending_date`, rounded up to whole days. Zero or negative once expired.
pub fn days_remaining(ending_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (ending_date - now).num_milliseconds();
    // Ceiling division that also holds for negative spans.
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) == 0 {
        days
    } else {
        days + 1
    }
}

/// Rejects a validity window whose end precedes its start.
pub fn validate_window(
    starting_date: DateTime<Utc>,
    ending_date: DateTime<Utc>,
) -> Result<(), String> {
    if ending_date < starting_date {
        return Err(format!(
            "endingDate {} is before startingDate {}",
            ending_date.to_rfc3339(),
            starting_date.to_rfc3339()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, PaymentType, DEFAULT_CATEGORY};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid date")
    }

    fn service(active: bool, start: DateTime<Utc>, end: DateTime<Utc>) -> Service {
        Service {
            id: 1,
            name: "POS App".to_string(),
            description: None,
            company_name: None,
            category: DEFAULT_CATEGORY.to_string(),
            payment_type: PaymentType::OneYear,
            period_price: Decimal::ZERO,
            currency: Currency::TL,
            active,
            starting_date: start,
            ending_date: end,
            device_token: None,
            terminal: None,
            customer_id: 1,
            created_at: start,
        }
    }

    #[test]
    fn inactive_dominates_every_date_signal() {
        let now = at(2025, 6, 1);
        for (start, end) in [
            (at(2025, 7, 1), at(2026, 7, 1)),
            (at(2024, 1, 1), at(2025, 1, 1)),
            (at(2025, 1, 1), at(2025, 6, 10)),
            (at(2025, 1, 1), at(2026, 1, 1)),
        ] {
            assert_eq!(classify_status(&service(false, start, end), now), ServiceStatus::Inactive);
        }
    }

    #[test]
    fn precedence_follows_fixed_order() {
        let now = at(2025, 6, 1);
        assert_eq!(
            classify_status(&service(true, at(2025, 7, 1), at(2026, 7, 1)), now),
            ServiceStatus::NotStarted
        );
        assert_eq!(
            classify_status(&service(true, at(2024, 1, 1), at(2025, 5, 31)), now),
            ServiceStatus::Expired
        );
        assert_eq!(
            classify_status(&service(true, at(2025, 1, 1), at(2025, 7, 1)), now),
            ServiceStatus::Upcoming
        );
        assert_eq!(
            classify_status(&service(true, at(2025, 1, 1), at(2025, 7, 2)), now),
            ServiceStatus::Active
        );
    }

    #[test]
    fn end_equal_to_now_is_still_upcoming() {
        let now = at(2025, 6, 1);
        assert_eq!(
            classify_status(&service(true, at(2025, 1, 1), now), now),
            ServiceStatus::Upcoming
        );
    }

    #[test]
    fn days_remaining_rounds_up() {
        let now = at(2025, 6, 1);
        assert_eq!(days_remaining(now + Duration::days(15), now), 15);
        assert_eq!(days_remaining(now + Duration::days(14) + Duration::hours(1), now), 15);
        assert_eq!(days_remaining(now + Duration::minutes(1), now), 1);
        assert_eq!(days_remaining(now, now), 0);
        assert_eq!(days_remaining(now - Duration::hours(1), now), 0);
        assert_eq!(days_remaining(now - Duration::days(2), now), -2);
    }

    #[test]
    fn window_must_not_end_before_start() {
        assert!(validate_window(at(2025, 1, 1), at(2025, 1, 1)).is_ok());
        assert!(validate_window(at(2025, 1, 2), at(2025, 1, 1)).is_err());
    }
}
