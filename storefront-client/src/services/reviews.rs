use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_core::{ApiEnvelope, PageQuery, Paginated};

use crate::client::ApiClient;
use crate::request::ApiRequest;

/// A product review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub id: u64,
    pub product: Option<u64>,
    /// Display name or nested user object, depending on the endpoint.
    pub user: Option<Value>,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewReview {
    pub product: u64,
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Review endpoints. Listing is public; writing requires a signed-in user.
#[derive(Debug, Clone)]
pub struct ReviewService {
    client: ApiClient,
}

impl ReviewService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, product_id: u64, page: PageQuery) -> ApiEnvelope<Paginated<Review>> {
        let request = ApiRequest::get(format!("products/{}/reviews/", product_id))
            .page(page)
            .public();
        self.client.send(request).await
    }

    pub async fn create(&self, review: &NewReview) -> ApiEnvelope<Review> {
        self.client
            .send(ApiRequest::post("reviews/").json(review))
            .await
    }

    pub async fn update(&self, review_id: u64, update: &ReviewUpdate) -> ApiEnvelope<Review> {
        self.client
            .send(ApiRequest::patch(format!("reviews/{}/", review_id)).json(update))
            .await
    }

    pub async fn delete(&self, review_id: u64) -> ApiEnvelope<Value> {
        self.client
            .send(ApiRequest::delete(format!("reviews/{}/", review_id)))
            .await
    }
}
