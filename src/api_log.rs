// src/api_log.rs

use tokio::task::JoinHandle;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{ApiLog, NewApiLog};

pub const DEFAULT_LOG_LIMIT: i64 = 100;

impl Engine {
    /// Stores an audit row for an external call without holding up the caller.
    ///
    /// Failures are only written to the process log. The handle is returned so tests can
    /// wait for the write; request handlers drop it.
    pub fn record_api_call(&self, entry: NewApiLog) -> JoinHandle<()> {
        let store = self.store().clone();
        tokio::spawn(async move {
            let endpoint = entry.endpoint.clone();
            if let Err(e) = store.insert_api_log(entry).await {
                log::warn!("api log write failed endpoint={endpoint}: {e}");
            }
        })
    }

    /// Newest first.
    pub async fn list_api_logs(
        &self,
        service_id: Option<i32>,
        limit: Option<i64>,
    ) -> EngineResult<Vec<ApiLog>> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 1000);
        Ok(self.store().list_api_logs(service_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, test_engine};
    use serde_json::json;

    fn entry(endpoint: &str, service_id: Option<i32>) -> NewApiLog {
        NewApiLog {
            endpoint: endpoint.to_string(),
            method: "POST".into(),
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
            request_body: Some(json!({"deviceToken": "dev-1"})),
            response_status: 200,
            response_body: None,
            service_name: Some("POS App".into()),
            device_token: Some("dev-1".into()),
            validation_type: Some("existing".into()),
            service_id,
            created_at: at(2025, 1, 1),
        }
    }

    #[tokio::test]
    async fn records_are_listed_newest_first() {
        let (engine, _clock, _store) = test_engine(at(2025, 1, 1));
        engine.record_api_call(entry("/validate", Some(1))).await.expect("task");
        engine.record_api_call(entry("/renew", Some(2))).await.expect("task");

        let all = engine.list_api_logs(None, None).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].endpoint, "/renew");

        let one = engine.list_api_logs(Some(1), Some(10)).await.expect("filtered");
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].endpoint, "/validate");
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let (engine, _clock, store) = test_engine(at(2025, 1, 1));
        store.set_fail_on_api_log(true).await;

        engine.record_api_call(entry("/validate", None)).await.expect("task completes");
        assert!(engine.list_api_logs(None, None).await.expect("list").is_empty());
    }
}
