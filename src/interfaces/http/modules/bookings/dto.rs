//! Booking DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Booking, BookingItem, CapacityCategory, Payment};

/// Capacity category of one line item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CategoryDto {
    Passenger,
    Motorcycle,
    Car,
    Bus,
    Truck,
}

impl From<CategoryDto> for CapacityCategory {
    fn from(c: CategoryDto) -> Self {
        match c {
            CategoryDto::Passenger => CapacityCategory::Passenger,
            CategoryDto::Motorcycle => CapacityCategory::Motorcycle,
            CategoryDto::Car => CapacityCategory::Car,
            CategoryDto::Bus => CapacityCategory::Bus,
            CategoryDto::Truck => CapacityCategory::Truck,
        }
    }
}

impl From<CapacityCategory> for CategoryDto {
    fn from(c: CapacityCategory) -> Self {
        match c {
            CapacityCategory::Passenger => CategoryDto::Passenger,
            CapacityCategory::Motorcycle => CategoryDto::Motorcycle,
            CapacityCategory::Car => CategoryDto::Car,
            CapacityCategory::Bus => CategoryDto::Bus,
            CapacityCategory::Truck => CategoryDto::Truck,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct BookingItemRequest {
    pub category: CategoryDto,
    /// Passenger name or plate number
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "B 1234 XY")]
    pub label: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1))]
    pub occurrence_id: i64,
    #[validate(length(min = 1, max = 50), nested)]
    pub items: Vec<BookingItemRequest>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CancelBookingRequest {
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingItemDto {
    pub category: CategoryDto,
    pub label: String,
    pub fare: i64,
}

impl From<&BookingItem> for BookingItemDto {
    fn from(i: &BookingItem) -> Self {
        Self {
            category: i.category.into(),
            label: i.label.clone(),
            fare: i.fare,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentDto {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub refunded_amount: i64,
    pub method: Option<String>,
    pub snap_token: Option<String>,
    /// Where the customer completes payment
    pub redirect_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentDto {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id.clone(),
            status: p.status.as_str().to_string(),
            amount: p.amount,
            refunded_amount: p.refunded_amount,
            method: p.method.clone(),
            snap_token: p.snap_token.clone(),
            redirect_url: p.redirect_url.clone(),
            paid_at: p.paid_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingDto {
    pub id: String,
    #[schema(example = "FRY-261017-K3Q9ZD")]
    pub code: String,
    pub occurrence_id: i64,
    pub status: String,
    pub status_reason: Option<String>,
    pub total_amount: i64,
    pub items: Vec<BookingItemDto>,
    pub created_at: DateTime<Utc>,
    /// Payment deadline
    pub expires_at: DateTime<Utc>,
    pub payment: Option<PaymentDto>,
}

impl BookingDto {
    pub fn new(b: &Booking, payment: Option<&Payment>) -> Self {
        Self {
            id: b.id.clone(),
            code: b.code.clone(),
            occurrence_id: b.occurrence_id,
            status: b.status.as_str().to_string(),
            status_reason: b.status_reason.clone(),
            total_amount: b.total_amount,
            items: b.items.iter().map(BookingItemDto::from).collect(),
            created_at: b.created_at,
            expires_at: b.expires_at,
            payment: payment.map(PaymentDto::from),
        }
    }
}
