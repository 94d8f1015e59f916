use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::CustomerAttributes;

/// Persists customer checkout data. Every write is its own unit of work:
/// a crash between handler invocations leaves a valid intermediate state
/// the customer can resume from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn save_billing_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError>;

    /// `None` clears the shipping address assignment.
    async fn save_shipping_address(
        &self,
        customer_id: Uuid,
        address_id: Option<Uuid>,
    ) -> Result<(), ServiceError>;

    async fn save_attributes(
        &self,
        customer_id: Uuid,
        attributes: &CustomerAttributes,
    ) -> Result<(), ServiceError>;
}

/// In-memory repository for the demo server and tests.
#[derive(Debug, Default)]
pub struct InMemoryCustomerRepository {
    billing: DashMap<Uuid, Uuid>,
    shipping: DashMap<Uuid, Uuid>,
    attributes: DashMap<Uuid, CustomerAttributes>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn billing_address(&self, customer_id: Uuid) -> Option<Uuid> {
        self.billing.get(&customer_id).map(|e| *e.value())
    }

    pub fn shipping_address(&self, customer_id: Uuid) -> Option<Uuid> {
        self.shipping.get(&customer_id).map(|e| *e.value())
    }

    pub fn attributes(&self, customer_id: Uuid) -> Option<CustomerAttributes> {
        self.attributes.get(&customer_id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn save_billing_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.billing.insert(customer_id, address_id);
        Ok(())
    }

    async fn save_shipping_address(
        &self,
        customer_id: Uuid,
        address_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        match address_id {
            Some(id) => {
                self.shipping.insert(customer_id, id);
            }
            None => {
                self.shipping.remove(&customer_id);
            }
        }
        Ok(())
    }

    async fn save_attributes(
        &self,
        customer_id: Uuid,
        attributes: &CustomerAttributes,
    ) -> Result<(), ServiceError> {
        self.attributes.insert(customer_id, attributes.clone());
        Ok(())
    }
}
