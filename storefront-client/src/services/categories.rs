use serde::{Deserialize, Serialize};
use storefront_core::{ApiEnvelope, Paginated};

use crate::client::ApiClient;
use crate::request::ApiRequest;

/// A catalogue category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent: Option<u64>,
    pub product_count: Option<u32>,
    pub children: Vec<Category>,
}

/// `categories/` endpoints. Public.
#[derive(Debug, Clone)]
pub struct CategoryService {
    client: ApiClient,
}

impl CategoryService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ApiEnvelope<Vec<Category>> {
        let envelope: ApiEnvelope<Paginated<Category>> =
            self.client.send(ApiRequest::get("categories/").public()).await;
        envelope.map(|page| page.results)
    }

    pub async fn detail(&self, slug: &str) -> ApiEnvelope<Category> {
        self.client
            .send(ApiRequest::get(format!("categories/{}/", slug)).public())
            .await
    }
}
