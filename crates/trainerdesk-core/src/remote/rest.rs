//! JSON/HTTP implementation of the remote data service.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET  /roles/{user_id}` → `{"role": "administrator" | "subject"}`
//! - `GET  /{collection}?owner={id}&role={role}` for each resource kind
//! - `POST /transactions` to record a payment
//! - `POST /subscriptions/{id}/cancel`
//! - `PUT  /payment-settings?owner={id}`

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::models::{
    NewPayment, PaymentMetrics, PaymentSettings, Person, Plan, ResourceKind, ResourcePayload, Role,
    Subscription, Transaction,
};

use super::{FetchScope, RemoteError, RemoteService};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Bulk refreshes give up after a few seconds anyway; this only bounds
/// individual requests made outside a refresh.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct RoleResponse {
    role: Role,
}

/// REST client for the data service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`, each percent-encoded as one path
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> Result<String, RemoteError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn collection_path(kind: ResourceKind) -> &'static str {
        kind.as_str()
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, RemoteError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_status(status, &body))
        }
    }

    /// Send a request, backing off on 429 and decoding the JSON body.
    /// `build` is called once per attempt since a RequestBuilder is consumed
    /// by `send`.
    async fn send<T, F>(&self, url: &str, build: F) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        RemoteError::InvalidResponse(format!("{}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(RemoteError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        scope: &FetchScope,
    ) -> Result<T, RemoteError> {
        let url = self.endpoint(&[Self::collection_path(kind)])?;
        let role = scope.role.to_string();
        self.send(&url, || {
            self.request(Method::GET, &url, &scope.access_token)
                .query(&[("owner", scope.owner_id.as_str()), ("role", role.as_str())])
        })
        .await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        self.send(url, || self.request(method.clone(), url, token).json(body))
            .await
    }

    fn settings_request(
        &self,
        url: &str,
        settings: &PaymentSettings,
        scope: &FetchScope,
    ) -> RequestBuilder {
        self.request(Method::PUT, url, &scope.access_token)
            .query(&[("owner", scope.owner_id.as_str())])
            .json(settings)
    }
}

impl RemoteService for RestClient {
    async fn resolve_role(&self, session: &SessionData) -> Result<Role, RemoteError> {
        let url = self.endpoint(&["roles", session.user_id.as_str()])?;
        let response: RoleResponse = self
            .send(&url, || self.request(Method::GET, &url, &session.token))
            .await?;
        debug!(user = %session.user_id, role = %response.role, "Role resolved");
        Ok(response.role)
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        scope: &FetchScope,
    ) -> Result<ResourcePayload, RemoteError> {
        let payload: ResourcePayload = match kind {
            ResourceKind::Persons => self.get_collection::<Vec<Person>>(kind, scope).await?.into(),
            ResourceKind::Plans => self.get_collection::<Vec<Plan>>(kind, scope).await?.into(),
            ResourceKind::Subscriptions => {
                self.get_collection::<Vec<Subscription>>(kind, scope).await?.into()
            }
            ResourceKind::Transactions => {
                self.get_collection::<Vec<Transaction>>(kind, scope).await?.into()
            }
            ResourceKind::PaymentMetrics => {
                self.get_collection::<PaymentMetrics>(kind, scope).await?.into()
            }
            ResourceKind::PaymentSettings => {
                self.get_collection::<PaymentSettings>(kind, scope).await?.into()
            }
            ResourceKind::RoleStatus => {
                let url = self.endpoint(&["roles", scope.owner_id.as_str()])?;
                let response: RoleResponse = self
                    .send(&url, || self.request(Method::GET, &url, &scope.access_token))
                    .await?;
                ResourcePayload::RoleStatus(response.role)
            }
        };
        debug!(kind = %kind, count = payload.len(), "Fetched");
        Ok(payload)
    }

    async fn record_payment(
        &self,
        payment: &NewPayment,
        scope: &FetchScope,
    ) -> Result<Transaction, RemoteError> {
        let url = self.endpoint(&["transactions"])?;
        self.send_json(Method::POST, &url, &scope.access_token, payment)
            .await
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        scope: &FetchScope,
    ) -> Result<Subscription, RemoteError> {
        let url = self.endpoint(&["subscriptions", subscription_id, "cancel"])?;
        self.send_json(Method::POST, &url, &scope.access_token, &serde_json::json!({}))
            .await
    }

    async fn update_payment_settings(
        &self,
        settings: &PaymentSettings,
        scope: &FetchScope,
    ) -> Result<PaymentSettings, RemoteError> {
        let url = self.endpoint(&[Self::collection_path(ResourceKind::PaymentSettings)])?;
        self.send(&url, || self.settings_request(&url, settings, scope))
            .await
    }
}
