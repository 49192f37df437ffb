//! Service runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: database init, migrations,
//! service wiring, the REST API, the expiry and payment poll loops, and
//! graceful shutdown.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::events::{create_event_bus, SharedEventBus};
use crate::application::ports::SharedPaymentGateway;
use crate::application::services::{
    start_expiry_sweep_task, start_payment_poll_task, BookingPolicy, BookingService,
    CapacityLedger, ExpirySweeper, PaymentPoller, PollerConfig, ReconciliationPolicy,
    ReconciliationService, ScheduleService,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{init_database, DatabaseConfig, MidtransGateway, SeaOrmRepositoryProvider};
use crate::interfaces::http::{create_api_router, ApiServices};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::shared::utills::RetryConfig;

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the booking service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running booking service.
///
/// # Examples
///
/// ```rust,no_run
/// use ferry_booking::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Domain events (booking confirmed, schedule changed, ...).
    pub event_bus: SharedEventBus,
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    pub bookings: Arc<BookingService>,
    pub reconciliation: Arc<ReconciliationService>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// API port the server is listening on.
    pub api_port: u16,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
    sweep_task: tokio::task::JoinHandle<()>,
    poll_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the service.
    ///
    /// 1. Install the Prometheus metrics recorder
    /// 2. Connect to the database and run migrations
    /// 3. Wire the ledger, booking, schedule and reconciliation services
    /// 4. Start the expiry sweep and payment poll loops
    /// 5. Start the REST API (with Swagger UI)
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;

        info!("Starting ferry booking service...");

        // ── Prometheus metrics recorder ────────────────────────
        // The global recorder can only be installed once per process;
        // a restart within the same process reuses it.
        use std::sync::OnceLock;
        static PROM_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
            OnceLock::new();

        let prometheus_handle = match PROM_HANDLE.get() {
            Some(handle) => handle.clone(),
            None => {
                let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
                    .install_recorder()?;
                info!("📊 Prometheus metrics recorder installed");
                PROM_HANDLE.get_or_init(|| handle).clone()
            }
        };

        // ── Database ───────────────────────────────────────────
        let db_config = DatabaseConfig {
            url: app_cfg.database.connection_url(),
            max_connections: app_cfg.database.max_connections,
        };
        info!("Database: {}", db_config.url);

        let db = init_database(&db_config).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            Migrator::up(&db, None).await?;
            info!("Migrations completed");
        }

        // ── Repositories & Services ────────────────────────────
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

        let event_bus = create_event_bus();
        info!("🔔 Event bus initialized");

        let ledger = Arc::new(CapacityLedger::new(repos.clone()));

        let bookings = Arc::new(BookingService::new(
            repos.clone(),
            ledger.clone(),
            event_bus.clone(),
            BookingPolicy {
                expiry_window: app_cfg.payment.expiry_window(),
                code_prefix: app_cfg.booking.code_prefix.clone(),
            },
        ));

        let schedules = Arc::new(ScheduleService::new(
            repos.clone(),
            ledger,
            event_bus.clone(),
        ));

        let gateway: SharedPaymentGateway = Arc::new(MidtransGateway::new(&app_cfg.payment)?);
        info!(
            production = app_cfg.payment.is_production,
            "💳 Midtrans gateway at {}",
            app_cfg.payment.api_base_url()
        );
        if app_cfg.payment.server_key.is_empty() {
            warn!("payment.server_key is empty; gateway calls and notification checks will fail");
        }

        let reconciliation = Arc::new(ReconciliationService::new(
            repos.clone(),
            gateway,
            bookings.clone(),
            event_bus.clone(),
            RetryConfig::new(
                app_cfg.payment.max_retries,
                std::time::Duration::from_millis(app_cfg.payment.retry_delay_ms),
            ),
            ReconciliationPolicy {
                full_refund_marks_booking_refunded: app_cfg
                    .booking
                    .full_refund_marks_booking_refunded,
            },
        ));

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        let sweeper = Arc::new(ExpirySweeper::new(
            repos.clone(),
            bookings.clone(),
            schedules.clone(),
            app_cfg.sweeper.batch_size,
        ));
        let sweep_task = start_expiry_sweep_task(
            sweeper,
            shutdown_signal.clone(),
            app_cfg.sweeper.interval_secs,
        );

        let poller = Arc::new(PaymentPoller::new(
            repos.clone(),
            reconciliation.clone(),
            PollerConfig {
                poll_interval: poll_interval(app_cfg.payment.poll_interval_secs),
                max_attempts: app_cfg.payment.max_poll_attempts,
                batch_size: app_cfg.sweeper.batch_size,
            },
        ));
        let poll_task = start_payment_poll_task(
            poller,
            shutdown_signal.clone(),
            app_cfg.payment.poll_interval_secs,
        );

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(
            ApiServices {
                bookings: bookings.clone(),
                reconciliation: reconciliation.clone(),
                schedules,
            },
            Some(db.clone()),
            prometheus_handle,
        );

        let api_port = app_cfg.server.api_port;
        let api_addr = format!("{}:{}", app_cfg.server.api_host, api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("🚀 Ferry booking service started.");

        Ok(Self {
            event_bus,
            repos,
            bookings,
            reconciliation,
            config: app_cfg,
            api_port,
            db,
            shutdown,
            api_task,
            sweep_task,
            poll_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    ///
    /// Background loops get `server.shutdown_timeout` seconds to finish the
    /// record they are on.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        match self.api_task.await {
            Ok(()) => info!("REST API server stopped"),
            Err(e) => error!("REST API server task panicked: {}", e),
        }

        let timeout = std::time::Duration::from_secs(self.shutdown.timeout_secs());
        let background = async {
            if let Err(e) = self.sweep_task.await {
                error!("Expiry sweep task panicked: {}", e);
            }
            if let Err(e) = self.poll_task.await {
                error!("Payment poll task panicked: {}", e);
            }
        };
        if tokio::time::timeout(timeout, background).await.is_err() {
            warn!(timeout_secs = timeout.as_secs(), "Background tasks did not stop in time");
        }

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Ferry booking service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down ferry booking service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Gap between polls of one payment; saturates instead of overflowing.
fn poll_interval(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
