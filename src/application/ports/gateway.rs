//! Outbound port to the payment provider
//!
//! [`PaymentGateway`] decouples reconciliation from the concrete provider.
//! The production implementation is
//! [`MidtransGateway`](crate::infrastructure::gateway::MidtransGateway).

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Booking, PaymentSession, RemoteTransaction, VerifiedNotification};
use crate::shared::errors::GatewayError;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment session for the booking's total amount and line items.
    /// The booking code is used as the order id.
    async fn create_transaction(&self, booking: &Booking) -> Result<PaymentSession, GatewayError>;

    /// Authenticate and decode a push notification. Payloads that fail
    /// verification must never reach state.
    fn verify_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedNotification, GatewayError>;

    /// Ask the provider for the current state of `order_id`
    async fn poll_status(&self, order_id: &str) -> Result<RemoteTransaction, GatewayError>;
}

pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
