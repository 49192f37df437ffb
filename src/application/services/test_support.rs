//! Shared fixtures for service tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::booking::{BookingPolicy, BookingRequestItem, BookingService};
use super::capacity_ledger::CapacityLedger;
use super::reconciliation::{ReconciliationPolicy, ReconciliationService};
use crate::application::events::{create_event_bus, SharedEventBus};
use crate::application::ports::PaymentGateway;
use crate::domain::{
    Actor, ActorRole, Booking, CapacityCategory, CategoryCounts, Fares, PaymentSession,
    RemoteStatus, RemoteTransaction, RepositoryProvider, ScheduleOccurrence,
};
use crate::infrastructure::storage::InMemoryRepositoryProvider;
use crate::shared::errors::GatewayError;
use crate::shared::utills::RetryConfig;

pub const VALID_SIGNATURE: &str = "valid-signature";
pub const PASSENGER_FARE: i64 = 50_000;

pub fn customer() -> Actor {
    Actor::new("customer-1", ActorRole::Customer)
}

pub fn passengers(n: usize) -> Vec<BookingRequestItem> {
    (0..n)
        .map(|i| BookingRequestItem {
            category: CapacityCategory::Passenger,
            label: format!("Passenger {}", i + 1),
        })
        .collect()
}

/// Occurrence with `max_passengers` seats and two car slots
pub async fn seed_occurrence(repos: &Arc<dyn RepositoryProvider>, max_passengers: u32) -> i64 {
    let max = CategoryCounts {
        passenger: max_passengers,
        car: 2,
        ..Default::default()
    };
    let fares = Fares {
        passenger: PASSENGER_FARE,
        car: 350_000,
        ..Default::default()
    };
    repos
        .schedules()
        .insert(ScheduleOccurrence::new(
            1,
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            max,
            fares,
        ))
        .await
        .unwrap()
        .id
}

pub fn booking_service(repos: Arc<dyn RepositoryProvider>, event_bus: SharedEventBus) -> BookingService {
    let ledger = Arc::new(CapacityLedger::new(repos.clone()));
    BookingService::new(repos, ledger, event_bus, BookingPolicy::default())
}

pub fn remote(order_id: &str, status: RemoteStatus, gross_amount: i64) -> RemoteTransaction {
    RemoteTransaction {
        order_id: order_id.to_string(),
        status,
        transaction_id: Some(format!("tx-{}", order_id)),
        method: Some("bank_transfer".into()),
        channel: Some("bca".into()),
        gross_amount: Some(gross_amount),
        raw: serde_json::json!({ "order_id": order_id }),
    }
}

pub struct Fixture {
    pub repos: Arc<dyn RepositoryProvider>,
    pub bookings: Arc<BookingService>,
    pub service: Arc<ReconciliationService>,
    pub gateway: Arc<FakeGateway>,
    pub event_bus: SharedEventBus,
}

pub async fn reconciliation_fixture(gateway: FakeGateway) -> Fixture {
    let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
    let event_bus = create_event_bus();
    let bookings = Arc::new(booking_service(repos.clone(), event_bus.clone()));
    let gateway = Arc::new(gateway);
    let service = Arc::new(ReconciliationService::new(
        repos.clone(),
        gateway.clone(),
        bookings.clone(),
        event_bus.clone(),
        RetryConfig::new(3, Duration::ZERO),
        ReconciliationPolicy::default(),
    ));
    Fixture {
        repos,
        bookings,
        service,
        gateway,
        event_bus,
    }
}

/// Scripted gateway. Queued results are consumed first; after that
/// `create_transaction` succeeds and `poll_status` reports PENDING.
#[derive(Default)]
pub struct FakeGateway {
    creates: Mutex<VecDeque<Result<PaymentSession, GatewayError>>>,
    polls: Mutex<VecDeque<Result<RemoteTransaction, GatewayError>>>,
    create_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: Result<PaymentSession, GatewayError>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<RemoteTransaction, GatewayError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn notification(order_id: &str, status: &str, gross_amount: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "order_id": order_id,
            "transaction_status": status,
            "gross_amount": gross_amount,
        }))
        .unwrap()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_transaction(&self, booking: &Booking) -> Result<PaymentSession, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.creates.lock().unwrap().pop_front() {
            return result;
        }
        Ok(PaymentSession {
            order_id: booking.code.clone(),
            token: format!("tok-{}", booking.code),
            redirect_url: format!("https://pay.test/{}", booking.code),
        })
    }

    fn verify_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<RemoteTransaction, GatewayError> {
        if signature != Some(VALID_SIGNATURE) {
            return Err(GatewayError::InvalidSignature);
        }
        let body: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let order_id = body["order_id"].as_str().unwrap_or_default().to_string();
        let status = match body["transaction_status"].as_str().unwrap_or_default() {
            "settlement" => RemoteStatus::Paid,
            "pending" => RemoteStatus::Pending,
            "expire" => RemoteStatus::Expired,
            "cancel" => RemoteStatus::Cancelled {
                reason: "cancel".into(),
            },
            "deny" => RemoteStatus::Failed {
                reason: "deny".into(),
            },
            "refund" => RemoteStatus::Refunded {
                refunded_total: None,
            },
            other => RemoteStatus::Unknown(other.to_string()),
        };
        let gross_amount = body["gross_amount"].as_i64().unwrap_or_default();
        let mut tx = remote(&order_id, status, gross_amount);
        tx.raw = body;
        Ok(tx)
    }

    async fn poll_status(&self, order_id: &str) -> Result<RemoteTransaction, GatewayError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.polls.lock().unwrap().pop_front() {
            return result;
        }
        Ok(remote(order_id, RemoteStatus::Pending, 0))
    }
}
