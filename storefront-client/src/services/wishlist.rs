use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storefront_core::ApiEnvelope;

use super::products::ProductSummary;
use crate::client::ApiClient;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wishlist {
    pub id: Option<u64>,
    pub items: Vec<WishlistItem>,
}

impl Wishlist {
    pub fn contains(&self, product_id: u64) -> bool {
        self.items.iter().any(|item| item.product_id() == Some(product_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WishlistItem {
    pub id: u64,
    pub product: Option<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    pub added_at: Option<String>,
}

impl WishlistItem {
    pub fn product_id(&self) -> Option<u64> {
        self.product_id
            .or_else(|| self.product.as_ref().map(|product| product.id))
    }
}

/// `wishlist/` endpoints.
#[derive(Debug, Clone)]
pub struct WishlistService {
    client: ApiClient,
}

impl WishlistService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ApiEnvelope<Wishlist> {
        self.client.send(ApiRequest::get("wishlist/")).await
    }

    pub async fn add(&self, product_id: u64) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("wishlist/add/").json(&json!({ "product_id": product_id }));
        self.client.send(request).await
    }

    pub async fn remove(&self, product_id: u64) -> ApiEnvelope<Value> {
        self.client
            .send(ApiRequest::delete(format!("wishlist/remove/{}/", product_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_checks_embedded_product() {
        let wishlist: Wishlist = serde_json::from_value(json!({
            "items": [
                { "id": 1, "product": { "id": 42, "name": "Teapot", "slug": "teapot", "price": "30.00" } },
                { "id": 2, "product_id": 7 }
            ]
        }))
        .unwrap();

        assert!(wishlist.contains(42));
        assert!(wishlist.contains(7));
        assert!(!wishlist.contains(3));
    }
}
