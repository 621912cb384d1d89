use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentBookingService, AppointmentState, AppointmentStore, InMemoryAppointmentStore,
    InMemoryUserDirectory, SupabaseAppointmentStore, SupabaseUserDirectory, UserDirectory,
};
use notification_cell::{
    HttpNotificationGateway, NotificationGateway, Notifier, TracingNotificationGateway,
};
use reminder_cell::{
    Clock, ImmediateReminderScheduler, ReminderScheduler, ReminderSweeper, SystemClock,
};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TeleConnect API server");

    let config = Arc::new(AppConfig::from_env());

    let (store, directory): (Arc<dyn AppointmentStore>, Arc<dyn UserDirectory>) =
        if config.is_configured() {
            let supabase = Arc::new(SupabaseClient::new(&config));
            (
                Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
                Arc::new(SupabaseUserDirectory::new(supabase)),
            )
        } else {
            warn!("Supabase not configured, appointments are kept in memory");
            (
                Arc::new(InMemoryAppointmentStore::new()),
                Arc::new(InMemoryUserDirectory::new()),
            )
        };

    let gateway: Arc<dyn NotificationGateway> = if config.is_notification_configured() {
        Arc::new(HttpNotificationGateway::new(&config))
    } else {
        warn!("Notification provider not configured, messages are only logged");
        Arc::new(TracingNotificationGateway)
    };
    let notifier = Notifier::new(gateway, config.sms_country_code.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Reminders
    let immediate = ImmediateReminderScheduler::new(
        &config,
        store.clone(),
        directory.clone(),
        notifier.clone(),
        clock.clone(),
    );
    let sweeper = Arc::new(ReminderSweeper::new(
        &config,
        store.clone(),
        directory.clone(),
        notifier.clone(),
        clock,
    ));
    let scheduler = ReminderScheduler::new(&config, sweeper, immediate.clone());
    scheduler.start().await?;

    // Booking
    let booking = AppointmentBookingService::new(
        &config,
        store,
        directory,
        notifier,
        Arc::new(immediate),
    );
    let state = AppointmentState::new(config.clone(), Arc::new(booking));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
