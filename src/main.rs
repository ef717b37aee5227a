use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use medbook::config::AppConfig;
use medbook::db;
use medbook::handlers;
use medbook::services::ai;
use medbook::services::booking_link::calendly::CalendlyProvider;
use medbook::services::booking_link::BookingLinkProvider;
use medbook::services::messaging::sendgrid::SendGridEmailProvider;
use medbook::services::messaging::twilio::TwilioSmsProvider;
use medbook::services::messaging::{EmailProvider, MessagingProvider};
use medbook::services::reminders;
use medbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    db::import::seed_patients(&conn, &config.patients_csv)?;
    db::import::seed_schedule(&conn, &config.schedule_csv)?;

    let messaging: Option<Box<dyn MessagingProvider>> = if config.twilio_configured() {
        Some(Box::new(TwilioSmsProvider::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
        )))
    } else {
        tracing::warn!("Twilio not configured, SMS delivery disabled");
        None
    };
    let email: Option<Box<dyn EmailProvider>> = if config.sendgrid_configured() {
        Some(Box::new(SendGridEmailProvider::new(
            config.sendgrid_api_key.clone(),
            config.sendgrid_from_email.clone(),
        )))
    } else {
        tracing::warn!("SendGrid not configured, email delivery disabled");
        None
    };
    let booking_links: Option<Box<dyn BookingLinkProvider>> = if config.calendly_api_key.is_empty() {
        None
    } else {
        tracing::info!("Calendly booking links enabled");
        Some(Box::new(CalendlyProvider::new(config.calendly_api_key.clone())))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        llm: ai::provider_from_config(&config),
        messaging,
        email,
        booking_links,
    });

    reminders::spawn_dispatcher(Arc::clone(&state));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/chat", post(handlers::chat::post_message))
        .route("/api/chat/:session_id", get(handlers::chat::get_session))
        .route("/api/chat/:session_id/reset", post(handlers::chat::reset_session))
        .route("/webhook/sms", post(handlers::webhook::sms_webhook))
        .route("/api/admin/appointments", get(handlers::admin::get_appointments))
        .route(
            "/api/admin/appointments/:confirmation_id/cancel",
            post(handlers::admin::cancel_appointment),
        )
        .route("/api/admin/reminders", get(handlers::admin::get_reminders))
        .route(
            "/api/admin/reminders/dispatch",
            post(handlers::admin::dispatch_reminders),
        )
        .route("/api/admin/patients.csv", get(handlers::admin::export_patients))
        .route(
            "/calendar/:confirmation_id",
            get(handlers::calendar::download_ics),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
