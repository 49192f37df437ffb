use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Database(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// Capacity ledger failures. Nothing is reserved when one of these is returned.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("no {category} capacity available (requested {requested}, available {available})")]
    CapacityExceeded {
        category: &'static str,
        requested: u32,
        available: u32,
    },

    #[error("schedule occurrence is {0} and cannot take bookings")]
    NotBookable(&'static str),

    /// The occurrence kept changing underneath the ledger; caller may retry.
    #[error("capacity update conflict on occurrence {0}")]
    Conflict(i64),

    #[error(transparent)]
    Storage(#[from] DomainError),
}

/// Errors from the external payment provider.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network failure, timeout or 5xx. Retryable.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// 4xx from the provider. Never retried.
    #[error("payment gateway rejected request ({status}): {message}")]
    GatewayRejected { status: u16, message: String },

    #[error("invalid notification signature")]
    InvalidSignature,

    #[error("invalid gateway payload: {0}")]
    InvalidPayload(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::GatewayUnavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("no seats available: {0}")]
    NoCapacity(CapacityError),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("payment window has not expired yet")]
    NotYetExpired,

    #[error("payment window expired")]
    PaymentWindowExpired,

    #[error("booking has no line items")]
    EmptyBooking,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl BookingError {
    pub fn invalid_transition(entity: &'static str, from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { entity, from, to }
    }

    /// Races against sweeps and duplicate notifications surface as these.
    pub fn is_benign_race(&self) -> bool {
        matches!(self, BookingError::InvalidTransition { .. })
    }
}

impl From<CapacityError> for BookingError {
    fn from(e: CapacityError) -> Self {
        match e {
            CapacityError::Storage(inner) => BookingError::Domain(inner),
            // Contention, not a full sailing
            CapacityError::Conflict(occurrence_id) => BookingError::Domain(DomainError::Conflict(
                format!("capacity of occurrence {} is contended, retry", occurrence_id),
            )),
            other => BookingError::NoCapacity(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_contention_is_not_reported_as_sold_out() {
        let err = BookingError::from(CapacityError::Conflict(7));
        assert!(matches!(err, BookingError::Domain(DomainError::Conflict(_))));

        let err = BookingError::from(CapacityError::NotBookable("CANCELLED"));
        assert!(matches!(err, BookingError::NoCapacity(_)));
    }
}
