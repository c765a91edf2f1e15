//! Typed service modules, one per backend area.
//!
//! Every method resolves to an [`ApiEnvelope`](storefront_core::ApiEnvelope);
//! none of them return `Err`. All services built from one [`Storefront`]
//! share a single [`ApiClient`], so they share the retry policy, the
//! credential store and the refresh gate.

pub mod auth;
pub mod blog;
pub mod cart;
pub mod categories;
pub mod faq;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod tickets;
pub mod wishlist;

pub use auth::AuthService;
pub use blog::BlogService;
pub use cart::CartService;
pub use categories::CategoryService;
pub use faq::FaqService;
pub use payments::PaymentService;
pub use products::ProductService;
pub use reviews::ReviewService;
pub use tickets::TicketService;
pub use wishlist::WishlistService;

use storefront_core::{ClientConfig, CredentialStore, StorefrontError};

use crate::client::ApiClient;

/// Every service over one shared [`ApiClient`].
///
/// ```no_run
/// use storefront_client::Storefront;
/// use storefront_core::{ClientConfig, CredentialStore};
///
/// # async fn run() -> Result<(), storefront_core::StorefrontError> {
/// let shop = Storefront::new(ClientConfig::default(), CredentialStore::in_memory())?;
/// let login = shop.auth.login("shopper@example.com", "hunter22", true).await;
/// if login.is_success() {
///     let cart = shop.cart.get().await;
///     println!("{:?}", cart.data());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Storefront {
    pub auth: AuthService,
    pub cart: CartService,
    pub wishlist: WishlistService,
    pub products: ProductService,
    pub categories: CategoryService,
    pub reviews: ReviewService,
    pub tickets: TicketService,
    pub faq: FaqService,
    pub blog: BlogService,
    pub payments: PaymentService,
    client: ApiClient,
}

impl Storefront {
    /// Build a client from `config` and wire every service to it.
    pub fn new(config: ClientConfig, credentials: CredentialStore) -> Result<Self, StorefrontError> {
        Ok(Self::from_client(ApiClient::new(config, credentials)?))
    }

    /// Wire every service to an existing client.
    pub fn from_client(client: ApiClient) -> Self {
        Self {
            auth: AuthService::new(client.clone()),
            cart: CartService::new(client.clone()),
            wishlist: WishlistService::new(client.clone()),
            products: ProductService::new(client.clone()),
            categories: CategoryService::new(client.clone()),
            reviews: ReviewService::new(client.clone()),
            tickets: TicketService::new(client.clone()),
            faq: FaqService::new(client.clone()),
            blog: BlogService::new(client.clone()),
            payments: PaymentService::new(client.clone()),
            client,
        }
    }

    /// The shared client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

/// Lenient decoding for prices and other decimal amounts.
///
/// The backend serializes decimals as strings (`"19.99"`) but some endpoints
/// emit plain numbers; both are kept as strings so no precision is lost.
pub(crate) mod decimal {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(option::deserialize(deserializer)?.unwrap_or_default())
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<String>, D::Error> {
            match Value::deserialize(deserializer)? {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(s)),
                Value::Number(n) => Ok(Some(n.to_string())),
                other => Err(serde::de::Error::custom(format!(
                    "expected a decimal amount, got {}",
                    other
                ))),
            }
        }
    }
}
