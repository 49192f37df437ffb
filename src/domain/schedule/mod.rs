//! Schedule occurrence aggregate
//!
//! Sailings, their per-category capacity counters and status overrides.

pub mod model;
pub mod repository;

pub use model::{
    CapacityCategory, CapacityCounters, CategoryCounts, Fares, PerCategory, ScheduleOccurrence,
    ScheduleStatus,
};
pub use repository::ScheduleRepository;
