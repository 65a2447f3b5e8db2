//! Shopify Admin GraphQL client.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ShopifyConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Customer, CustomerPage};
use crate::shopify::CustomerDirectory;

const CUSTOMER_QUERY: &str = r#"
query($id: ID!, $namespace: String!, $key: String!) {
  customer(id: $id) {
    id
    email
    metafield(namespace: $namespace, key: $key) { value }
  }
}
"#;

const CUSTOMERS_PAGE_QUERY: &str = r#"
query($first: Int!, $after: String, $namespace: String!, $key: String!) {
  customers(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    nodes {
      id
      email
      metafield(namespace: $namespace, key: $key) { value }
    }
  }
}
"#;

const METAFIELDS_SET_MUTATION: &str = r#"
mutation($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    userErrors { field message }
  }
}
"#;

/// Admin API client for customer records and the usage-count metafield
pub struct ShopifyAdminClient {
    client: reqwest::Client,
    endpoint: url::Url,
    config: ShopifyConfig,
}

impl ShopifyAdminClient {
    pub fn new(config: ShopifyConfig) -> AppResult<Self> {
        let endpoint = url::Url::parse(&format!(
            "https://{}/admin/api/{}/graphql.json",
            config.shop_domain, config.api_version
        ))
        .map_err(|e| AppError::Internal(format!("Invalid shop domain: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Executes one GraphQL request and returns the `data` payload
    async fn execute(&self, query: &str, variables: Value) -> AppResult<Value> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-Shopify-Access-Token", &self.config.admin_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| AppError::Collaborator(format!("Admin API request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::Collaborator(
                "Admin API rate limited".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AppError::Collaborator(format!(
                "Admin API returned HTTP {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Collaborator(format!("Invalid Admin API response: {}", e)))?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            return Err(AppError::Collaborator(format!(
                "Admin API errors: {}",
                messages.join("; ")
            )));
        }

        body.get("data")
            .cloned()
            .ok_or_else(|| AppError::Collaborator("Admin API response missing data".to_string()))
    }

    /// Expands a bare numeric id into the Admin API global id form
    fn customer_gid(customer_id: &str) -> String {
        if customer_id.starts_with("gid://") {
            customer_id.to_string()
        } else {
            format!("gid://shopify/Customer/{}", customer_id)
        }
    }

    /// Metafield type matching the wire encoding being written
    fn metafield_type(wire_value: &str) -> &'static str {
        if wire_value.trim().parse::<i64>().is_ok() {
            "number_integer"
        } else {
            "json"
        }
    }
}

/// Decodes one customer node from a GraphQL payload
fn parse_customer(node: &Value) -> AppResult<Customer> {
    let id = node
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Collaborator("Customer node missing id".to_string()))?;

    let email = node
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let quota_raw = node
        .get("metafield")
        .and_then(|m| m.get("value"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(Customer {
        id: id.to_string(),
        email,
        quota_raw,
    })
}

#[async_trait]
impl CustomerDirectory for ShopifyAdminClient {
    async fn fetch_customer(&self, customer_id: &str) -> AppResult<Customer> {
        let data = self
            .execute(
                CUSTOMER_QUERY,
                json!({
                    "id": Self::customer_gid(customer_id),
                    "namespace": self.config.metafield_namespace,
                    "key": self.config.metafield_key,
                }),
            )
            .await?;

        let node = data.get("customer").filter(|c| !c.is_null()).ok_or_else(|| {
            AppError::NotFound(format!("Customer {} not found", customer_id))
        })?;

        parse_customer(node)
    }

    async fn write_quota_field(&self, customer_id: &str, wire_value: &str) -> AppResult<()> {
        let data = self
            .execute(
                METAFIELDS_SET_MUTATION,
                json!({
                    "metafields": [{
                        "ownerId": Self::customer_gid(customer_id),
                        "namespace": self.config.metafield_namespace,
                        "key": self.config.metafield_key,
                        "type": Self::metafield_type(wire_value),
                        "value": wire_value,
                    }]
                }),
            )
            .await?;

        let user_errors = data
            .get("metafieldsSet")
            .and_then(|m| m.get("userErrors"))
            .and_then(|e| e.as_array())
            .cloned()
            .unwrap_or_default();

        if !user_errors.is_empty() {
            let messages: Vec<&str> = user_errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            return Err(AppError::Collaborator(format!(
                "Metafield write rejected: {}",
                messages.join("; ")
            )));
        }

        Ok(())
    }

    async fn list_customers(
        &self,
        cursor: Option<&str>,
        page_size: i64,
    ) -> AppResult<CustomerPage> {
        let data = self
            .execute(
                CUSTOMERS_PAGE_QUERY,
                json!({
                    "first": page_size,
                    "after": cursor,
                    "namespace": self.config.metafield_namespace,
                    "key": self.config.metafield_key,
                }),
            )
            .await?;

        let connection = data
            .get("customers")
            .ok_or_else(|| AppError::Collaborator("Response missing customers".to_string()))?;

        let customers = connection
            .get("nodes")
            .and_then(|n| n.as_array())
            .map(|nodes| nodes.iter().map(parse_customer).collect::<AppResult<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();

        let page_info = connection.get("pageInfo");
        let has_next = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let next_cursor = if has_next {
            page_info
                .and_then(|p| p.get("endCursor"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        } else {
            None
        };

        Ok(CustomerPage {
            customers,
            next_cursor,
        })
    }
}
