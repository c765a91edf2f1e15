//! Customer support tickets.

use serde::{Deserialize, Serialize};
use serde_json::json;
use storefront_core::{ApiEnvelope, PageQuery, Paginated};

use crate::client::ApiClient;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportCategory {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    WaitingCustomer,
    Resolved,
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketMessage {
    pub id: u64,
    pub message: String,
    pub is_staff_reply: bool,
    pub sender_name: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: u64,
    pub ticket_number: Option<String>,
    pub subject: String,
    pub category: Option<u64>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub messages: Vec<TicketMessage>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        matches!(self.status, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTicket {
    pub subject: String,
    pub category: u64,
    pub message: String,
    pub priority: TicketPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

/// `support/` endpoints. All require a signed-in user.
#[derive(Debug, Clone)]
pub struct TicketService {
    client: ApiClient,
}

impl TicketService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn categories(&self) -> ApiEnvelope<Vec<SupportCategory>> {
        let envelope: ApiEnvelope<Paginated<SupportCategory>> =
            self.client.send(ApiRequest::get("support/categories/")).await;
        envelope.map(|page| page.results)
    }

    pub async fn create(&self, ticket: &NewTicket) -> ApiEnvelope<Ticket> {
        self.client
            .send(ApiRequest::post("support/tickets/").json(ticket))
            .await
    }

    pub async fn list(&self, page: PageQuery) -> ApiEnvelope<Paginated<Ticket>> {
        self.client
            .send(ApiRequest::get("support/tickets/").page(page))
            .await
    }

    pub async fn detail(&self, ticket_id: u64) -> ApiEnvelope<Ticket> {
        self.client
            .send(ApiRequest::get(format!("support/tickets/{}/", ticket_id)))
            .await
    }

    pub async fn add_message(&self, ticket_id: u64, message: &str) -> ApiEnvelope<TicketMessage> {
        let request = ApiRequest::post(format!("support/tickets/{}/messages/", ticket_id))
            .json(&json!({ "message": message }));
        self.client.send(request).await
    }
}
