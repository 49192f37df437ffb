//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::common::{actor_middleware, ApiResponse, ACTOR_ID_HEADER};
use super::modules::bookings::{self, BookingAppState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::payments::{self, PaymentAppState};
use super::modules::schedules::{self, ScheduleAppState};
use crate::application::services::{BookingService, ReconciliationService, ScheduleService};

/// Services the API delegates to
#[derive(Clone)]
pub struct ApiServices {
    pub bookings: Arc<BookingService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub schedules: Arc<ScheduleService>,
}

/// Unified router state; each handler extracts its own slice via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    services: ApiServices,
    health: HealthState,
    metrics: MetricsState,
}

impl FromRef<ApiState> for BookingAppState {
    fn from_ref(s: &ApiState) -> Self {
        BookingAppState {
            bookings: Arc::clone(&s.services.bookings),
            reconciliation: Arc::clone(&s.services.reconciliation),
        }
    }
}

impl FromRef<ApiState> for PaymentAppState {
    fn from_ref(s: &ApiState) -> Self {
        PaymentAppState {
            reconciliation: Arc::clone(&s.services.reconciliation),
        }
    }
}

impl FromRef<ApiState> for ScheduleAppState {
    fn from_ref(s: &ApiState) -> Self {
        ScheduleAppState {
            schedules: Arc::clone(&s.services.schedules),
        }
    }
}

impl FromRef<ApiState> for HealthState {
    fn from_ref(s: &ApiState) -> Self {
        s.health.clone()
    }
}

impl FromRef<ApiState> for MetricsState {
    fn from_ref(s: &ApiState) -> Self {
        s.metrics.clone()
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "actor",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ACTOR_ID_HEADER))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        bookings::create_booking,
        bookings::get_booking,
        bookings::cancel_booking,
        payments::payment_notification,
        schedules::create_occurrence,
        schedules::get_occurrence,
        schedules::update_status,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            health::ComponentHealth,
            bookings::CreateBookingRequest,
            bookings::BookingItemRequest,
            bookings::CancelBookingRequest,
            bookings::CategoryDto,
            bookings::BookingDto,
            bookings::BookingItemDto,
            bookings::PaymentDto,
            payments::NotificationAck,
            schedules::CreateOccurrenceRequest,
            schedules::UpdateScheduleStatusRequest,
            schedules::ScheduleStatusDto,
            schedules::OccurrenceDto,
            schedules::CategoryCountsDto,
            schedules::FaresDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Bookings", description = "Ticket bookings and their payment state"),
        (name = "Payments", description = "Payment gateway callbacks"),
        (name = "Schedules", description = "Sailings, capacity and operator overrides")
    ),
    info(
        title = "Ferry Booking API",
        version = "0.1.0",
        description = "Capacity-safe ferry bookings reconciled against the payment gateway"
    )
)]
pub struct ApiDoc;

/// Build the REST router.
///
/// Booking and schedule routes require the `X-Actor-Id` header set by the
/// authentication proxy; health, metrics, docs and the gateway webhook do not.
pub fn create_api_router(
    services: ApiServices,
    db: Option<DatabaseConnection>,
    prometheus: PrometheusHandle,
) -> Router {
    let state = ApiState {
        services,
        health: HealthState {
            db,
            started_at: Arc::new(Instant::now()),
        },
        metrics: MetricsState { handle: prometheus },
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let actor_routes = Router::new()
        .route("/api/v1/bookings", post(bookings::create_booking))
        .route("/api/v1/bookings/{code}", get(bookings::get_booking))
        .route("/api/v1/bookings/{code}/cancel", post(bookings::cancel_booking))
        .route("/api/v1/schedules", post(schedules::create_occurrence))
        .route("/api/v1/schedules/{id}", get(schedules::get_occurrence))
        .route("/api/v1/schedules/{id}/status", put(schedules::update_status))
        .route_layer(middleware::from_fn(actor_middleware));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(prometheus_metrics))
        .route(
            "/api/v1/payments/notification",
            post(payments::payment_notification),
        );

    Router::new()
        .merge(actor_routes)
        .merge(public_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::services::test_support::{
        booking_service, seed_occurrence, FakeGateway, PASSENGER_FARE, VALID_SIGNATURE,
    };
    use crate::application::services::{CapacityLedger, ReconciliationPolicy};
    use crate::domain::RepositoryProvider;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::interfaces::http::common::ACTOR_ROLE_HEADER;
    use crate::shared::utills::RetryConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use tower::Service;

    struct TestApp {
        router: Router,
        occurrence_id: i64,
    }

    async fn app() -> TestApp {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let event_bus = create_event_bus();
        let occurrence_id = seed_occurrence(&repos, 10).await;
        let bookings = Arc::new(booking_service(repos.clone(), event_bus.clone()));
        let reconciliation = Arc::new(ReconciliationService::new(
            repos.clone(),
            Arc::new(FakeGateway::new()),
            bookings.clone(),
            event_bus.clone(),
            RetryConfig::none(),
            ReconciliationPolicy::default(),
        ));
        let ledger = Arc::new(CapacityLedger::new(repos.clone()));
        let schedules = Arc::new(ScheduleService::new(repos, ledger, event_bus));
        let services = ApiServices {
            bookings,
            reconciliation,
            schedules,
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();
        TestApp {
            router: create_api_router(services, None, handle),
            occurrence_id,
        }
    }

    async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let mut svc = router.clone().into_service();
        let resp = svc.call(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, actor: Option<(&str, &str)>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some((id, role)) = actor {
            builder = builder
                .header(ACTOR_ID_HEADER, id)
                .header(ACTOR_ROLE_HEADER, role);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, actor: (&str, &str)) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(ACTOR_ID_HEADER, actor.0)
            .header(ACTOR_ROLE_HEADER, actor.1)
            .body(Body::empty())
            .unwrap()
    }

    async fn create_booking(app: &TestApp, customer: &str) -> Value {
        let body = json!({
            "occurrence_id": app.occurrence_id,
            "items": [{ "category": "passenger", "label": "Ayu" }],
        });
        let (status, resp) = call(
            &app.router,
            json_request("POST", "/api/v1/bookings", Some((customer, "customer")), body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", resp);
        resp["data"].clone()
    }

    #[tokio::test]
    async fn create_booking_opens_payment() {
        let app = app().await;
        let booking = create_booking(&app, "cust-1").await;

        assert_eq!(booking["status"], "PENDING");
        assert_eq!(booking["total_amount"], PASSENGER_FARE);
        assert_eq!(booking["payment"]["status"], "PENDING");
        assert!(booking["payment"]["redirect_url"].is_string());
    }

    #[tokio::test]
    async fn booking_routes_require_actor() {
        let app = app().await;
        let body = json!({
            "occurrence_id": app.occurrence_id,
            "items": [{ "category": "passenger", "label": "Ayu" }],
        });
        let (status, resp) = call(&app.router, json_request("POST", "/api/v1/bookings", None, body)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp["success"], false);
    }

    #[tokio::test]
    async fn other_customers_booking_is_forbidden() {
        let app = app().await;
        let booking = create_booking(&app, "cust-1").await;
        let code = booking["code"].as_str().unwrap();
        let uri = format!("/api/v1/bookings/{}", code);

        let (status, _) = call(&app.router, get_request(&uri, ("cust-2", "customer"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, resp) = call(&app.router, get_request(&uri, ("ops-1", "operator"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["data"]["code"], code);
    }

    #[tokio::test]
    async fn settlement_notification_confirms_booking() {
        let app = app().await;
        let booking = create_booking(&app, "cust-1").await;
        let code = booking["code"].as_str().unwrap();

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/payments/notification")
            .header("content-type", "application/json")
            .header(payments::SIGNATURE_HEADER, VALID_SIGNATURE)
            .body(Body::from(FakeGateway::notification(code, "settlement", PASSENGER_FARE)))
            .unwrap();
        let (status, resp) = call(&app.router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["data"]["outcome"], "applied");

        let uri = format!("/api/v1/bookings/{}", code);
        let (_, resp) = call(&app.router, get_request(&uri, ("cust-1", "customer"))).await;
        assert_eq!(resp["data"]["status"], "CONFIRMED");
        assert_eq!(resp["data"]["payment"]["status"], "PAID");
    }

    #[tokio::test]
    async fn notification_with_bad_signature_is_rejected() {
        let app = app().await;
        let booking = create_booking(&app, "cust-1").await;
        let code = booking["code"].as_str().unwrap();

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/payments/notification")
            .header(payments::SIGNATURE_HEADER, "forged")
            .body(Body::from(FakeGateway::notification(code, "settlement", PASSENGER_FARE)))
            .unwrap();
        let (status, _) = call(&app.router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/bookings/{}", code);
        let (_, resp) = call(&app.router, get_request(&uri, ("cust-1", "customer"))).await;
        assert_eq!(resp["data"]["status"], "PENDING");
    }

    #[tokio::test]
    async fn customer_cannot_change_schedule_status() {
        let app = app().await;
        let uri = format!("/api/v1/schedules/{}/status", app.occurrence_id);
        let body = json!({ "status": "CANCELLED", "reason": "weather" });

        let (status, _) = call(
            &app.router,
            json_request("PUT", &uri, Some(("cust-1", "customer")), body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, resp) = call(&app.router, json_request("PUT", &uri, Some(("ops-1", "operator")), body)).await;
        assert_eq!(status, StatusCode::OK, "{}", resp);
        assert_eq!(resp["data"]["status"], "CANCELLED");
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let app = app().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, resp) = call(&app.router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["database"]["status"], "memory");
    }
}
