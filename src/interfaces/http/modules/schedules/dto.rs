//! Schedule occurrence DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{CategoryCounts, Fares, ScheduleOccurrence, ScheduleStatus};

/// Units per capacity category
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CategoryCountsDto {
    #[validate(range(max = 2_147_483_647))]
    pub passenger: u32,
    #[validate(range(max = 2_147_483_647))]
    pub motorcycle: u32,
    #[validate(range(max = 2_147_483_647))]
    pub car: u32,
    #[validate(range(max = 2_147_483_647))]
    pub bus: u32,
    #[validate(range(max = 2_147_483_647))]
    pub truck: u32,
}

/// Fare per unit per capacity category, IDR
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct FaresDto {
    #[validate(range(min = 0))]
    pub passenger: i64,
    #[validate(range(min = 0))]
    pub motorcycle: i64,
    #[validate(range(min = 0))]
    pub car: i64,
    #[validate(range(min = 0))]
    pub bus: i64,
    #[validate(range(min = 0))]
    pub truck: i64,
}

impl From<CategoryCountsDto> for CategoryCounts {
    fn from(d: CategoryCountsDto) -> Self {
        CategoryCounts {
            passenger: d.passenger,
            motorcycle: d.motorcycle,
            car: d.car,
            bus: d.bus,
            truck: d.truck,
        }
    }
}

impl From<CategoryCounts> for CategoryCountsDto {
    fn from(c: CategoryCounts) -> Self {
        Self {
            passenger: c.passenger,
            motorcycle: c.motorcycle,
            car: c.car,
            bus: c.bus,
            truck: c.truck,
        }
    }
}

impl From<FaresDto> for Fares {
    fn from(d: FaresDto) -> Self {
        Fares {
            passenger: d.passenger,
            motorcycle: d.motorcycle,
            car: d.car,
            bus: d.bus,
            truck: d.truck,
        }
    }
}

impl From<Fares> for FaresDto {
    fn from(f: Fares) -> Self {
        Self {
            passenger: f.passenger,
            motorcycle: f.motorcycle,
            car: f.car,
            bus: f.bus,
            truck: f.truck,
        }
    }
}

/// Schedule status accepted by the override endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatusDto {
    Active,
    Cancelled,
    Delayed,
    Departed,
}

impl From<ScheduleStatusDto> for ScheduleStatus {
    fn from(s: ScheduleStatusDto) -> Self {
        match s {
            ScheduleStatusDto::Active => ScheduleStatus::Active,
            ScheduleStatusDto::Cancelled => ScheduleStatus::Cancelled,
            ScheduleStatusDto::Delayed => ScheduleStatus::Delayed,
            ScheduleStatusDto::Departed => ScheduleStatus::Departed,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOccurrenceRequest {
    #[validate(range(min = 1))]
    pub schedule_id: i64,
    #[schema(value_type = String, format = Date, example = "2026-11-02")]
    pub sailing_date: NaiveDate,
    #[validate(nested)]
    pub capacity: CategoryCountsDto,
    #[validate(nested)]
    pub fares: FaresDto,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateScheduleStatusRequest {
    pub status: ScheduleStatusDto,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    /// Auto-recovery deadline, DELAYED only
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OccurrenceDto {
    pub id: i64,
    pub schedule_id: i64,
    #[schema(value_type = String, format = Date)]
    pub sailing_date: NaiveDate,
    pub status: String,
    pub status_reason: Option<String>,
    pub status_expires_at: Option<DateTime<Utc>>,
    pub used: CategoryCountsDto,
    pub max: CategoryCountsDto,
    pub fares: FaresDto,
    pub version: i64,
}

impl From<&ScheduleOccurrence> for OccurrenceDto {
    fn from(o: &ScheduleOccurrence) -> Self {
        Self {
            id: o.id,
            schedule_id: o.schedule_id,
            sailing_date: o.sailing_date,
            status: o.status.as_str().to_string(),
            status_reason: o.status_reason.clone(),
            status_expires_at: o.status_expires_at,
            used: o.capacity.used.into(),
            max: o.capacity.max.into(),
            fares: o.fares.into(),
            version: o.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: serde_json::Value) -> CreateOccurrenceRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn capacity_above_column_range_is_rejected() {
        let req = request(serde_json::json!({
            "schedule_id": 1,
            "sailing_date": "2026-11-02",
            "capacity": { "passenger": 3_000_000_000u64 },
            "fares": { "passenger": 50_000 },
        }));
        let errors = req.validate().unwrap_err();
        assert!(errors.to_string().contains("passenger"), "{}", errors);
    }

    #[test]
    fn negative_fare_is_rejected() {
        let req = request(serde_json::json!({
            "schedule_id": 1,
            "sailing_date": "2026-11-02",
            "capacity": { "passenger": 10 },
            "fares": { "car": -5 },
        }));
        assert!(req.validate().is_err());
    }

    #[test]
    fn ordinary_sailing_passes() {
        let req = request(serde_json::json!({
            "schedule_id": 1,
            "sailing_date": "2026-11-02",
            "capacity": { "passenger": 300, "car": 40 },
            "fares": { "passenger": 50_000, "car": 350_000 },
        }));
        assert!(req.validate().is_ok());
    }
}
