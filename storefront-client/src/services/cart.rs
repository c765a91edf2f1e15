use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storefront_core::ApiEnvelope;

use super::decimal;
use super::products::ProductSummary;
use crate::client::ApiClient;
use crate::request::ApiRequest;

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cart {
    pub id: Option<u64>,
    pub items: Vec<CartItem>,
    pub total_items: u32,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub subtotal: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub discount: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub total: String,
    pub coupon: Option<Value>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of item quantities, falling back to the server's count.
    pub fn quantity(&self) -> u32 {
        let counted: u32 = self.items.iter().map(|item| item.quantity).sum();
        if counted == 0 { self.total_items } else { counted }
    }
}

/// One line of the cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartItem {
    pub id: u64,
    pub product: Option<ProductSummary>,
    pub product_id: Option<u64>,
    pub quantity: u32,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub unit_price: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub total_price: String,
}

/// `cart/` endpoints. All of them require a signed-in user.
#[derive(Debug, Clone)]
pub struct CartService {
    client: ApiClient,
}

impl CartService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ApiEnvelope<Cart> {
        self.client.send(ApiRequest::get("cart/")).await
    }

    /// Add `quantity` of a product. Returns the updated cart.
    pub async fn add(&self, product_id: u64, quantity: u32) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("cart/add/")
            .json(&json!({ "product_id": product_id, "quantity": quantity }));
        self.client.send(request).await
    }

    pub async fn clear(&self) -> ApiEnvelope<Value> {
        self.client.send(ApiRequest::delete("cart/clear/")).await
    }

    pub async fn apply_coupon(&self, code: &str) -> ApiEnvelope<Value> {
        let request = ApiRequest::post("cart/apply-coupon/").json(&json!({ "code": code }));
        self.client.send(request).await
    }

    pub async fn remove_coupon(&self) -> ApiEnvelope<Value> {
        self.client.send(ApiRequest::post("cart/remove-coupon/")).await
    }

    /// Set the quantity of a cart line.
    pub async fn update_item(&self, item_id: u64, quantity: u32) -> ApiEnvelope<Value> {
        let request = ApiRequest::patch(format!("cart/items/{}/", item_id))
            .json(&json!({ "quantity": quantity }));
        self.client.send(request).await
    }

    pub async fn remove_item(&self, item_id: u64) -> ApiEnvelope<Value> {
        self.client
            .send(ApiRequest::delete(format!("cart/items/{}/", item_id)))
            .await
    }
}
