//! FAQ and contact form. Public.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_core::{ApiEnvelope, Paginated};

use crate::client::ApiClient;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub faq_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faq {
    pub id: u64,
    pub question: String,
    pub answer: String,
    pub category: Option<u64>,
    pub helpful_count: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FaqService {
    client: ApiClient,
}

impl FaqService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn categories(&self) -> ApiEnvelope<Vec<FaqCategory>> {
        let envelope: ApiEnvelope<Paginated<FaqCategory>> =
            self.client.send(ApiRequest::get("faq/categories/").public()).await;
        envelope.map(|page| page.results)
    }

    /// FAQs, optionally narrowed to a category slug or a search term.
    pub async fn list(&self, category: Option<&str>, search: Option<&str>) -> ApiEnvelope<Vec<Faq>> {
        let request = ApiRequest::get("faq/")
            .query_opt("category", category)
            .query_opt("search", search)
            .public();
        let envelope: ApiEnvelope<Paginated<Faq>> = self.client.send(request).await;
        envelope.map(|page| page.results)
    }

    pub async fn detail(&self, faq_id: u64) -> ApiEnvelope<Faq> {
        self.client
            .send(ApiRequest::get(format!("faq/{}/", faq_id)).public())
            .await
    }

    pub async fn mark_helpful(&self, faq_id: u64) -> ApiEnvelope<Value> {
        self.client
            .send(ApiRequest::post(format!("faq/{}/helpful/", faq_id)).public())
            .await
    }

    pub async fn contact(&self, message: &ContactMessage) -> ApiEnvelope<Value> {
        self.client
            .send(ApiRequest::post("contact/").json(message).public())
            .await
    }
}
