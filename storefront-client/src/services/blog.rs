use serde::{Deserialize, Serialize};
use storefront_core::{ApiEnvelope, PageQuery, Paginated};

use crate::client::ApiClient;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPost {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    /// Only present on the detail endpoint.
    pub content: Option<String>,
    pub author: Option<String>,
    pub category: Option<BlogCategory>,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub published_at: Option<String>,
    pub views: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogComment {
    pub id: u64,
    pub name: String,
    pub content: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewComment {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Filters for [`BlogService::posts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Category slug.
    pub category: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

/// `blog/` endpoints. Reading is public; commenting sends credentials when
/// signed in.
#[derive(Debug, Clone)]
pub struct BlogService {
    client: ApiClient,
}

impl BlogService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn categories(&self) -> ApiEnvelope<Vec<BlogCategory>> {
        let envelope: ApiEnvelope<Paginated<BlogCategory>> =
            self.client.send(ApiRequest::get("blog/categories/").public()).await;
        envelope.map(|page| page.results)
    }

    pub async fn posts(&self, filter: &PostFilter, page: PageQuery) -> ApiEnvelope<Paginated<BlogPost>> {
        let request = ApiRequest::get("blog/posts/")
            .page(page)
            .query_opt("category", filter.category.as_deref())
            .query_opt("search", filter.search.as_deref())
            .query_opt("tag", filter.tag.as_deref())
            .public();
        self.client.send(request).await
    }

    pub async fn post(&self, slug: &str) -> ApiEnvelope<BlogPost> {
        self.client
            .send(ApiRequest::get(format!("blog/posts/{}/", slug)).public())
            .await
    }

    pub async fn comments(&self, slug: &str) -> ApiEnvelope<Vec<BlogComment>> {
        let request = ApiRequest::get(format!("blog/posts/{}/comments/", slug)).public();
        let envelope: ApiEnvelope<Paginated<BlogComment>> = self.client.send(request).await;
        envelope.map(|page| page.results)
    }

    pub async fn add_comment(&self, slug: &str, comment: &NewComment) -> ApiEnvelope<BlogComment> {
        self.client
            .send(ApiRequest::post(format!("blog/posts/{}/comments/", slug)).json(comment))
            .await
    }
}
