// src/models.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_CATEGORY: &str = "Adisyon Programı";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Billing period of a service. Also used as the renewal bucket label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PaymentType {
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
    #[serde(rename = "2years")]
    TwoYears,
    #[serde(rename = "3years")]
    ThreeYears,
    #[serde(rename = "unlimited")]
    Unlimited,
    #[serde(rename = "custom")]
    Custom,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::OneMonth => "1month",
            PaymentType::SixMonths => "6months",
            PaymentType::OneYear => "1year",
            PaymentType::TwoYears => "2years",
            PaymentType::ThreeYears => "3years",
            PaymentType::Unlimited => "unlimited",
            PaymentType::Custom => "custom",
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, PaymentType::Unlimited)
    }

    /// Calendar months covered by one period; `None` for `custom`.
    pub fn months(&self) -> Option<u32> {
        match self {
            PaymentType::OneMonth => Some(1),
            PaymentType::SixMonths => Some(6),
            PaymentType::OneYear => Some(12),
            PaymentType::TwoYears => Some(24),
            PaymentType::ThreeYears => Some(36),
            PaymentType::Unlimited => Some(1200),
            PaymentType::Custom => None,
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1month" => Ok(PaymentType::OneMonth),
            "6months" => Ok(PaymentType::SixMonths),
            "1year" => Ok(PaymentType::OneYear),
            "2years" => Ok(PaymentType::TwoYears),
            "3years" => Ok(PaymentType::ThreeYears),
            "unlimited" => Ok(PaymentType::Unlimited),
            "custom" => Ok(PaymentType::Custom),
            other => Err(ParseEnumError::new("payment type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum Currency {
    #[default]
    TL,
    USD,
    EUR,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::TL => "TL",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TL" => Ok(Currency::TL),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            other => Err(ParseEnumError::new("currency", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Canceled,
    Failed,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "SCHEDULED",
            ReminderStatus::Sent => "SENT",
            ReminderStatus::Canceled => "CANCELED",
            ReminderStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for ReminderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(ReminderStatus::Scheduled),
            "SENT" => Ok(ReminderStatus::Sent),
            "CANCELED" => Ok(ReminderStatus::Canceled),
            "FAILED" => Ok(ReminderStatus::Failed),
            other => Err(ParseEnumError::new("reminder status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Error,
    Warning,
    Success,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Error => "error",
            NotificationType::Warning => "warning",
            NotificationType::Success => "success",
        }
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(NotificationType::Error),
            "warning" => Ok(NotificationType::Warning),
            "success" => Ok(NotificationType::Success),
            other => Err(ParseEnumError::new("notification type", other)),
        }
    }
}

/// Expiry category a notification was raised for. Together with the service id and the
/// period start it forms the notification dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryBucket {
    Expired,
    ExpiresToday,
    Upcoming,
}

impl ExpiryBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryBucket::Expired => "expired",
            ExpiryBucket::ExpiresToday => "expires_today",
            ExpiryBucket::Upcoming => "upcoming",
        }
    }
}

impl FromStr for ExpiryBucket {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expired" => Ok(ExpiryBucket::Expired),
            "expires_today" => Ok(ExpiryBucket::ExpiresToday),
            "upcoming" => Ok(ExpiryBucket::Upcoming),
            other => Err(ParseEnumError::new("expiry bucket", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub table_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    // Shown to staff as-is; see DESIGN.md open questions.
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub table_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub category: String,
    pub payment_type: PaymentType,
    pub period_price: Decimal,
    pub currency: Currency,
    pub active: bool,
    pub starting_date: DateTime<Utc>,
    pub ending_date: DateTime<Utc>,
    pub device_token: Option<String>,
    pub terminal: Option<String>,
    #[serde(rename = "customerID")]
    pub customer_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub category: String,
    pub payment_type: PaymentType,
    pub period_price: Decimal,
    pub currency: Currency,
    pub active: bool,
    pub starting_date: DateTime<Utc>,
    pub ending_date: DateTime<Utc>,
    pub device_token: Option<String>,
    pub terminal: Option<String>,
    pub customer_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Fields a device client may correct on its own service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMetadata {
    pub name: String,
    pub company_name: Option<String>,
    pub terminal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: i32,
    pub scheduled_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub message: String,
    #[serde(rename = "serviceID")]
    pub service_id: i32,
    pub created_at: DateTime<Utc>,
}

/// A reminder to be inserted for a service; always stored as `SCHEDULED`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDraft {
    pub scheduled_at: DateTime<Utc>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewHistory {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub renewal_type: PaymentType,
    pub previous_end_date: DateTime<Utc>,
    pub new_end_date: DateTime<Utc>,
    pub service_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRenewHistory {
    pub name: String,
    pub renewal_type: PaymentType,
    pub previous_end_date: DateTime<Utc>,
    pub new_end_date: DateTime<Utc>,
    pub service_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub service_id: Option<i32>,
    pub bucket: Option<ExpiryBucket>,
    pub period_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub service_id: Option<i32>,
    pub bucket: Option<ExpiryBucket>,
    pub period_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLog {
    pub id: i32,
    pub endpoint: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_body: Option<serde_json::Value>,
    pub response_status: i32,
    pub response_body: Option<serde_json::Value>,
    pub service_name: Option<String>,
    pub device_token: Option<String>,
    pub validation_type: Option<String>,
    pub service_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApiLog {
    pub endpoint: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_body: Option<serde_json::Value>,
    pub response_status: i32,
    pub response_body: Option<serde_json::Value>,
    pub service_name: Option<String>,
    pub device_token: Option<String>,
    pub validation_type: Option<String>,
    pub service_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}
