//! Outbound HTTP clients for the catalog collaborators. One backend service
//! fronts the vector search, the category hierarchy, and order intake; this
//! client implements all three traits against it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use salesbot_agent::catalog::{
    CatalogError, CategoryListing, OrderIntake, OrderRequest, SearchQuery, SimilaritySearch,
};
use salesbot_core::config::SearchConfig;
use salesbot_core::Product;

pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl CatalogClient {
    pub fn new(config: &SearchConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CatalogError::Backend(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

pub(crate) fn search_payload(collection: &str, query: &SearchQuery) -> serde_json::Value {
    json!({
        "collection": collection,
        "description": query.description,
        "price_range": query.price_range,
        "category_tier_one": query.category_tier_one,
        "category_tier_two": query.category_tier_two,
        "category_tier_three": query.category_tier_three,
        "limit": query.amount,
        "offset": query.offset,
        "excluded_product_names": query.excluded_product_names,
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    categories: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OrderPayload<'a> {
    product_details: &'a [String],
    amounts: &'a [u32],
    customer_name: &'a str,
    delivery_address: &'a str,
    contact_phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    confirmation: String,
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CatalogError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(CatalogError::Backend(format!("status {status}: {detail}")));
    }
    response.json().await.map_err(|error| CatalogError::Backend(error.to_string()))
}

#[async_trait]
impl SimilaritySearch for CatalogClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, CatalogError> {
        let response = self
            .client
            .post(self.url("/api/v1/products/search"))
            .json(&search_payload(&self.collection, query))
            .send()
            .await
            .map_err(|error| CatalogError::Backend(error.to_string()))?;

        let parsed: SearchResponse = read_json(response).await?;
        Ok(parsed.products)
    }
}

#[async_trait]
impl CategoryListing for CatalogClient {
    async fn list_categories(
        &self,
        tier_one: Option<&str>,
        tier_two: Option<&str>,
    ) -> Result<Vec<String>, CatalogError> {
        let mut request = self.client.get(self.url("/api/v1/categories"));
        if let Some(tier_one) = tier_one {
            request = request.query(&[("tier_one", tier_one)]);
        }
        if let Some(tier_two) = tier_two {
            request = request.query(&[("tier_two", tier_two)]);
        }

        let response =
            request.send().await.map_err(|error| CatalogError::Backend(error.to_string()))?;
        let parsed: CategoriesResponse = read_json(response).await?;
        Ok(parsed.categories)
    }
}

#[async_trait]
impl OrderIntake for CatalogClient {
    async fn submit_order(&self, order: &OrderRequest) -> Result<String, CatalogError> {
        let payload = OrderPayload {
            product_details: &order.product_details,
            amounts: &order.amounts,
            customer_name: &order.customer_name,
            delivery_address: &order.delivery_address,
            contact_phone: &order.contact_phone,
        };

        let response = self
            .client
            .post(self.url("/api/v1/orders"))
            .json(&payload)
            .send()
            .await
            .map_err(|error| CatalogError::Backend(error.to_string()))?;

        let parsed: OrderResponse = read_json(response).await?;
        Ok(parsed.confirmation)
    }
}
