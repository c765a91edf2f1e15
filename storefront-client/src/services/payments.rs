//! Payment gateway endpoints.
//!
//! The client never talks to a gateway directly; it asks the backend to
//! open a payment, sends the shopper to the returned URL, then asks the
//! backend to verify the result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storefront_core::{ApiEnvelope, PageQuery, Paginated};

use super::decimal;
use crate::client::ApiClient;
use crate::request::ApiRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentGateway {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub is_active: bool,
    pub supported_currencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePayment {
    pub order_id: u64,
    /// Gateway `code`.
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// A payment opened with a gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSession {
    pub transaction_id: String,
    /// Where to send the shopper to complete the payment.
    pub payment_url: Option<String>,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyPayment {
    pub transaction_id: String,
    /// Gateway callback parameters, passed through untouched.
    #[serde(flatten)]
    pub gateway_response: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub id: u64,
    pub transaction_id: String,
    pub order: Option<u64>,
    pub gateway: Option<String>,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub created_at: Option<String>,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "success" | "paid")
    }
}

/// `payments/` endpoints. All require a signed-in user.
#[derive(Debug, Clone)]
pub struct PaymentService {
    client: ApiClient,
}

impl PaymentService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn gateways(&self) -> ApiEnvelope<Vec<PaymentGateway>> {
        let envelope: ApiEnvelope<Paginated<PaymentGateway>> =
            self.client.send(ApiRequest::get("payments/gateways/")).await;
        envelope.map(|page| page.results)
    }

    // Opening a payment is not idempotent on the backend.
    pub async fn create(&self, payment: &CreatePayment) -> ApiEnvelope<PaymentSession> {
        self.client
            .send(ApiRequest::post("payments/create/").json(payment).retries(0))
            .await
    }

    pub async fn verify(&self, verification: &VerifyPayment) -> ApiEnvelope<Transaction> {
        self.client
            .send(ApiRequest::post("payments/verify/").json(verification))
            .await
    }

    pub async fn transactions(&self, page: PageQuery) -> ApiEnvelope<Paginated<Transaction>> {
        self.client
            .send(ApiRequest::get("payments/transactions/").page(page))
            .await
    }

    pub async fn transaction(&self, transaction_id: u64) -> ApiEnvelope<Transaction> {
        self.client
            .send(ApiRequest::get(format!("payments/transactions/{}/", transaction_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_flattens_gateway_parameters() {
        let mut gateway_response = Map::new();
        gateway_response.insert("reference".into(), json!("ref-77"));
        let verification = VerifyPayment {
            transaction_id: "tx-1".into(),
            gateway_response,
        };
        assert_eq!(
            serde_json::to_value(&verification).unwrap(),
            json!({ "transaction_id": "tx-1", "reference": "ref-77" })
        );
    }

    #[test]
    fn test_transaction_amount_as_number() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 1, "transaction_id": "tx-1", "amount": 49.5, "currency": "USD", "status": "completed"
        }))
        .unwrap();
        assert_eq!(tx.amount, "49.5");
        assert!(tx.is_completed());
    }
}
