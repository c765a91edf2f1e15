//! Catalogue endpoints. Public; no credentials are sent.

use serde::{Deserialize, Serialize};
use storefront_core::{ApiEnvelope, PageQuery, Paginated};

use super::decimal;
use crate::client::ApiClient;
use crate::request::ApiRequest;

/// A product's category, as an id, a slug or an embedded object depending
/// on the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(u64),
    Slug(String),
    Detail {
        id: u64,
        #[serde(default)]
        name: String,
        #[serde(default)]
        slug: String,
    },
}

/// A product image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductImage {
    pub id: u64,
    pub image: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
}

/// Compact product shape embedded in carts and wishlists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSummary {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub price: String,
    #[serde(deserialize_with = "decimal::option::deserialize")]
    pub sale_price: Option<String>,
    pub image: Option<String>,
}

/// A catalogue product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub price: String,
    #[serde(deserialize_with = "decimal::option::deserialize")]
    pub sale_price: Option<String>,
    pub category: Option<CategoryRef>,
    pub images: Vec<ProductImage>,
    pub stock: u32,
    pub is_featured: bool,
    pub average_rating: Option<f32>,
    pub review_count: u32,
    pub created_at: Option<String>,
}

impl Product {
    /// Sale price when set, otherwise the list price.
    pub fn effective_price(&self) -> &str {
        self.sale_price.as_deref().unwrap_or(&self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Filters for [`ProductService::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    pub search: Option<String>,
    /// Sort key, e.g. `price` or `-created_at`.
    pub ordering: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ProductFilter {
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search: Some(query.into()),
            ..Self::default()
        }
    }

    fn apply(&self, request: ApiRequest) -> ApiRequest {
        request
            .query_opt("category", self.category.as_deref())
            .query_opt("search", self.search.as_deref())
            .query_opt("ordering", self.ordering.as_deref())
            .query_opt("min_price", self.min_price.as_deref())
            .query_opt("max_price", self.max_price.as_deref())
    }
}

/// `products/` endpoints.
#[derive(Debug, Clone)]
pub struct ProductService {
    client: ApiClient,
}

impl ProductService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &ProductFilter, page: PageQuery) -> ApiEnvelope<Paginated<Product>> {
        let request = filter.apply(ApiRequest::get("products/").page(page)).public();
        self.client.send(request).await
    }

    pub async fn detail(&self, slug: &str) -> ApiEnvelope<Product> {
        let request = ApiRequest::get(format!("products/{}/", slug)).public();
        self.client.send(request).await
    }

    pub async fn related(&self, slug: &str) -> ApiEnvelope<Vec<Product>> {
        self.list_of(format!("products/{}/related/", slug)).await
    }

    pub async fn featured(&self) -> ApiEnvelope<Vec<Product>> {
        self.list_of("products/featured/".to_string()).await
    }

    pub async fn latest(&self) -> ApiEnvelope<Vec<Product>> {
        self.list_of("products/latest/".to_string()).await
    }

    // These endpoints answer with either a bare array or a page.
    async fn list_of(&self, path: String) -> ApiEnvelope<Vec<Product>> {
        let envelope: ApiEnvelope<Paginated<Product>> =
            self.client.send(ApiRequest::get(path).public()).await;
        envelope.map(|page| page.results)
    }
}
