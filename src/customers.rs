// src/customers.rs

use serde::Deserialize;
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{Customer, NewCustomer};
use crate::store::StoreError;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomerRequest {
    pub name: String,
    pub table_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl Engine {
    pub async fn create_customer(&self, request: NewCustomerRequest) -> EngineResult<Customer> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("name is required".into()));
        }
        let customer = self
            .store()
            .insert_customer(NewCustomer {
                name: name.to_string(),
                table_name: request.table_name,
                email: request.email,
                phone: request.phone,
                password: request.password,
                created_at: self.now(),
            })
            .await?;
        log::info!("customer created customer_id={}", customer.id);
        Ok(customer)
    }

    pub async fn list_customers(&self) -> EngineResult<Vec<Customer>> {
        Ok(self.store().list_customers().await?)
    }

    pub async fn get_customer(&self, id: i32) -> EngineResult<Customer> {
        self.store()
            .get_customer(id)
            .await?
            .ok_or_else(|| EngineError::not_found("customer", id))
    }

    /// Refused while the customer still owns services.
    pub async fn delete_customer(&self, id: i32) -> EngineResult<()> {
        self.store().delete_customer(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::not_found("customer", id),
            StoreError::Conflict(_) => {
                EngineError::Conflict(format!("customer {id} still owns services"))
            }
            other => EngineError::Store(other),
        })?;
        log::info!("customer deleted customer_id={id}");
        Ok(())
    }
}
