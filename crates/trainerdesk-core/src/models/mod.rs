//! Data models for the cached resources.
//!
//! This module contains the entity types held in the aggregate state:
//!
//! - `Person`: students (and the signed-in subject)
//! - `Plan`, `Subscription`: what people pay for
//! - `Transaction`, `NewPayment`: money that moved or is about to
//! - `PaymentMetrics`, `PaymentSettings`: trainer-wide singletons
//! - `Role`: the authorization fact that scopes every fetch
//! - `ResourceKind`, `ResourcePayload`, `ResourceData`: the glue between
//!   the remote service, the cache and the reducer

pub mod payment;
pub mod person;
pub mod plan;
pub mod resource;
pub mod role;
pub mod subscription;
pub mod transaction;

pub use payment::{PaymentMetrics, PaymentSettings};
pub use person::{MembershipStatus, Person};
pub use plan::Plan;
pub use resource::{ResourceData, ResourceKind, ResourcePayload};
pub use role::Role;
pub use subscription::{Subscription, SubscriptionStatus};
pub use transaction::{NewPayment, PaymentMethod, Transaction, TransactionStatus};
