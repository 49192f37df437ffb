//! Schedule occurrence domain entity and capacity counters

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::errors::CapacityError;

/// Capacity category consumed by one booking line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityCategory {
    Passenger,
    Motorcycle,
    Car,
    Bus,
    Truck,
}

impl CapacityCategory {
    pub const ALL: [CapacityCategory; 5] = [
        Self::Passenger,
        Self::Motorcycle,
        Self::Car,
        Self::Bus,
        Self::Truck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Motorcycle => "motorcycle",
            Self::Car => "car",
            Self::Bus => "bus",
            Self::Truck => "truck",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "passenger" => Some(Self::Passenger),
            "motorcycle" => Some(Self::Motorcycle),
            "car" => Some(Self::Car),
            "bus" => Some(Self::Bus),
            "truck" => Some(Self::Truck),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapacityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One value per capacity category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCategory<T> {
    pub passenger: T,
    pub motorcycle: T,
    pub car: T,
    pub bus: T,
    pub truck: T,
}

impl<T: Copy> PerCategory<T> {
    pub fn get(&self, category: CapacityCategory) -> T {
        match category {
            CapacityCategory::Passenger => self.passenger,
            CapacityCategory::Motorcycle => self.motorcycle,
            CapacityCategory::Car => self.car,
            CapacityCategory::Bus => self.bus,
            CapacityCategory::Truck => self.truck,
        }
    }

    pub fn set(&mut self, category: CapacityCategory, value: T) {
        match category {
            CapacityCategory::Passenger => self.passenger = value,
            CapacityCategory::Motorcycle => self.motorcycle = value,
            CapacityCategory::Car => self.car = value,
            CapacityCategory::Bus => self.bus = value,
            CapacityCategory::Truck => self.truck = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapacityCategory, T)> + '_ {
        CapacityCategory::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

/// Units requested or used per category
pub type CategoryCounts = PerCategory<u32>;

/// Fare per unit per category, in the smallest currency unit (IDR)
pub type Fares = PerCategory<i64>;

impl CategoryCounts {
    pub fn add(&mut self, category: CapacityCategory, n: u32) {
        let current = self.get(category);
        self.set(category, current.saturating_add(n));
    }

    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, n)| n == 0)
    }

    pub fn total(&self) -> u32 {
        self.iter().map(|(_, n)| n).sum()
    }
}

/// Used / max counters of one occurrence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityCounters {
    pub used: CategoryCounts,
    pub max: CategoryCounts,
}

impl CapacityCounters {
    pub fn new(max: CategoryCounts) -> Self {
        Self {
            used: CategoryCounts::default(),
            max,
        }
    }

    pub fn available(&self, category: CapacityCategory) -> u32 {
        self.max.get(category).saturating_sub(self.used.get(category))
    }

    /// All-or-nothing: either every category fits or nothing changes.
    pub fn try_reserve(&self, requested: &CategoryCounts) -> Result<Self, CapacityError> {
        let mut next = *self;
        for (category, n) in requested.iter() {
            if n == 0 {
                continue;
            }
            let available = self.available(category);
            if n > available {
                return Err(CapacityError::CapacityExceeded {
                    category: category.as_str(),
                    requested: n,
                    available,
                });
            }
            next.used.set(category, self.used.get(category) + n);
        }
        Ok(next)
    }

    /// Floored at zero so a double release cannot underflow.
    pub fn release(&self, released: &CategoryCounts) -> Self {
        let mut next = *self;
        for (category, n) in released.iter() {
            next.used
                .set(category, self.used.get(category).saturating_sub(n));
        }
        next
    }

    /// Categories with zero max (e.g. no trucks on this vessel) never count as full.
    pub fn any_at_max(&self) -> bool {
        CapacityCategory::ALL
            .iter()
            .any(|c| self.max.get(*c) > 0 && self.used.get(*c) >= self.max.get(*c))
    }
}

/// Occurrence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Active,
    Cancelled,
    Delayed,
    Full,
    Departed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Delayed => "DELAYED",
            Self::Full => "FULL",
            Self::Departed => "DEPARTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "CANCELLED" => Some(Self::Cancelled),
            "DELAYED" => Some(Self::Delayed),
            "FULL" => Some(Self::Full),
            "DEPARTED" => Some(Self::Departed),
            _ => None,
        }
    }

    /// A delayed sailing still sails; cancelled and departed ones do not.
    pub fn is_bookable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Departed)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One concrete sailing of a schedule on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOccurrence {
    pub id: i64,
    /// Recurring schedule this sailing belongs to
    pub schedule_id: i64,
    pub sailing_date: NaiveDate,
    pub capacity: CapacityCounters,
    pub fares: Fares,
    pub status: ScheduleStatus,
    pub status_reason: Option<String>,
    /// Auto-recovery deadline for DELAYED
    pub status_expires_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every conditional write
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleOccurrence {
    pub fn new(schedule_id: i64, sailing_date: NaiveDate, max: CategoryCounts, fares: Fares) -> Self {
        Self {
            id: 0,
            schedule_id,
            sailing_date,
            capacity: CapacityCounters::new(max),
            fares,
            status: ScheduleStatus::Active,
            status_reason: None,
            status_expires_at: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// State after reserving `requested`. ACTIVE flips to FULL when a category hits max.
    pub fn reserved(&self, requested: &CategoryCounts) -> Result<Self, CapacityError> {
        if !self.status.is_bookable() {
            return Err(CapacityError::NotBookable(self.status.as_str()));
        }
        let mut next = self.clone();
        next.capacity = self.capacity.try_reserve(requested)?;
        if next.status == ScheduleStatus::Active && next.capacity.any_at_max() {
            next.status = ScheduleStatus::Full;
        }
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// State after releasing `released`. Only FULL reverts; overrides stay.
    pub fn released(&self, released: &CategoryCounts) -> Self {
        let mut next = self.clone();
        next.capacity = self.capacity.release(released);
        if next.status == ScheduleStatus::Full && !next.capacity.any_at_max() {
            next.status = ScheduleStatus::Active;
        }
        next.updated_at = Utc::now();
        next
    }

    pub fn delay_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Delayed
            && self.status_expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Back to normal service after a delay, clearing reason and deadline.
    pub fn recovered(&self) -> Self {
        let mut next = self.clone();
        next.status = self.capacity_status();
        next.status_reason = None;
        next.status_expires_at = None;
        next.updated_at = Utc::now();
        next
    }

    /// Operator override. ACTIVE is normalised to FULL when already at capacity.
    pub fn overridden(
        &self,
        status: ScheduleStatus,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut next = self.clone();
        next.status = match status {
            ScheduleStatus::Active | ScheduleStatus::Full => self.capacity_status(),
            other => other,
        };
        next.status_reason = reason;
        next.status_expires_at = match status {
            ScheduleStatus::Delayed => expires_at,
            _ => None,
        };
        next.updated_at = Utc::now();
        next
    }

    fn capacity_status(&self) -> ScheduleStatus {
        if self.capacity.any_at_max() {
            ScheduleStatus::Full
        } else {
            ScheduleStatus::Active
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
