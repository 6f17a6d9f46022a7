//! Boundary to the remote data service.
//!
//! The engine only needs each call to resolve to a payload or a
//! `RemoteError`, and to be cancellable by dropping its future. `RestClient`
//! implements `RemoteService` over JSON/HTTP; tests use in-memory fakes.

use std::future::Future;

use crate::auth::SessionData;
use crate::models::{
    NewPayment, PaymentSettings, ResourceKind, ResourcePayload, Role, Subscription, Transaction,
};

pub mod error;
pub mod rest;

pub use error::RemoteError;
pub use rest::RestClient;

/// Who a request is made for, and with which privileges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchScope {
    pub owner_id: String,
    pub role: Role,
    pub access_token: String,
}

impl FetchScope {
    pub fn new(session: &SessionData, role: Role) -> Self {
        Self {
            owner_id: session.user_id.clone(),
            role,
            access_token: session.token.clone(),
        }
    }
}

/// Request/response access to the remote data service.
pub trait RemoteService: Send + Sync {
    /// Classify the signed-in identity
    fn resolve_role(
        &self,
        session: &SessionData,
    ) -> impl Future<Output = Result<Role, RemoteError>> + Send;

    /// Fetch the current value of one resource kind for `scope`
    fn fetch(
        &self,
        kind: ResourceKind,
        scope: &FetchScope,
    ) -> impl Future<Output = Result<ResourcePayload, RemoteError>> + Send;

    fn record_payment(
        &self,
        payment: &NewPayment,
        scope: &FetchScope,
    ) -> impl Future<Output = Result<Transaction, RemoteError>> + Send;

    fn cancel_subscription(
        &self,
        subscription_id: &str,
        scope: &FetchScope,
    ) -> impl Future<Output = Result<Subscription, RemoteError>> + Send;

    fn update_payment_settings(
        &self,
        settings: &PaymentSettings,
        scope: &FetchScope,
    ) -> impl Future<Output = Result<PaymentSettings, RemoteError>> + Send;
}
