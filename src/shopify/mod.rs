//! Customer directory seam towards the commerce collaborator.
//!
//! The collaborator owns the customer records and the usage-count metafield;
//! this service only reads and writes through it. Production talks to the
//! Shopify Admin GraphQL API; tests use an in-memory directory.

pub mod admin;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Customer, CustomerPage};

pub use admin::ShopifyAdminClient;

/// Read/write access to customer records and their usage-count field
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Fetches a customer with the raw usage-count field value
    async fn fetch_customer(&self, customer_id: &str) -> AppResult<Customer>;

    /// Writes the usage-count field in the given wire encoding
    async fn write_quota_field(&self, customer_id: &str, wire_value: &str) -> AppResult<()>;

    /// Pages through all customers; pass the previous page's cursor to continue
    async fn list_customers(
        &self,
        cursor: Option<&str>,
        page_size: i64,
    ) -> AppResult<CustomerPage>;
}
