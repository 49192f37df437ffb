//! Booking domain entity

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::schedule::{CapacityCategory, CategoryCounts};

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Capacity held, waiting for payment
    Pending,
    /// Paid
    Confirmed,
    Cancelled,
    /// Set after departure
    Completed,
    /// Payment window elapsed
    Expired,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "CANCELLED" => Some(Self::Cancelled),
            "COMPLETED" => Some(Self::Completed),
            "EXPIRED" => Some(Self::Expired),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Confirmed, Cancelled)
                | (Confirmed, Refunded)
                | (Confirmed, Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One passenger or vehicle on a booking; consumes one capacity unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItem {
    pub category: CapacityCategory,
    /// Passenger name or vehicle plate number
    pub label: String,
    /// Fare charged for this item at booking time
    pub fare: i64,
}

/// Ticket reservation against one schedule occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: String,
    /// Public booking code, also the gateway order id
    pub code: String,
    pub occurrence_id: i64,
    pub status: BookingStatus,
    pub items: Vec<BookingItem>,
    pub total_amount: i64,
    /// Actor that created the booking
    pub created_by: String,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Payment deadline
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        code: impl Into<String>,
        occurrence_id: i64,
        items: Vec<BookingItem>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
        expiry_window: Duration,
    ) -> Self {
        let total_amount = items.iter().map(|i| i.fare).sum();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            occurrence_id,
            status: BookingStatus::Pending,
            items,
            total_amount,
            created_by: created_by.into(),
            status_reason: None,
            created_at: now,
            expires_at: now + expiry_window,
            updated_at: now,
        }
    }

    /// Capacity units held by this booking
    pub fn counts(&self) -> CategoryCounts {
        counts_for(&self.items)
    }

    /// Strictly after the deadline
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

pub fn counts_for(items: &[BookingItem]) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    for item in items {
        counts.add(item.category, 1);
    }
    counts
}

/// `<prefix>-<YYMMDD>-<6 random alphanumerics>`, e.g. `FRY-261017-K3Q9ZD`
pub fn generate_booking_code(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", prefix, now.format("%y%m%d"), suffix)
}

// ── Tests ──────────────────────────────────────────────────────
