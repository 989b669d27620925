//! ArkABA Website Backend
//!
//! REST backend for the Arkansas Association for Behavior Analysis site:
//! content pages, event registration with tiered pricing, paid membership,
//! a member chat forum, SQLite persistence and Tantivy full-text search.

mod api;
mod auth;
mod chat;
mod checkout;
mod config;
mod db;
mod errors;
mod mail;
mod models;
mod payments;
mod pricing;
mod search;
mod tasks;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat::ChatHub;
use config::{Config, LogFormat};
use db::Repository;
use mail::{HttpRelayMailer, LogMailer, Mailer};
use payments::{DisabledGateway, PaymentGateway, StripeGateway};
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub chat: ChatHub,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting ArkABA backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (ARKABA_API_PSK). Admin routes are open!");
    }

    let payments: Arc<dyn PaymentGateway> = match config.stripe.secret_key.as_deref() {
        Some(key) => Arc::new(StripeGateway::new(&config.stripe.api_base, key)?),
        None => {
            tracing::warn!("No Stripe key configured. Paid registrations and dues are disabled");
            Arc::new(DisabledGateway)
        }
    };
    if config.stripe.webhook_secret.is_none() {
        tracing::warn!("No Stripe webhook secret configured. The webhook route will answer 503");
    }

    let mailer: Arc<dyn Mailer> = match config.mail.relay_url.as_deref() {
        Some(url) => Arc::new(HttpRelayMailer::new(url, &config.mail.from)?),
        None => {
            tracing::info!("No mail relay configured. Outgoing mail is logged only");
            Arc::new(LogMailer)
        }
    };

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let indexed = search::reindex(&repo, &search, Utc::now()).await?;
    tracing::info!("Search index built with {} documents", indexed);

    // Create application state
    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
        payments,
        mailer,
        chat: ChatHub::default(),
    };

    tasks::spawn_sweeper(state.clone(), tasks::SWEEP_INTERVAL);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Content
        .route("/blogs", get(api::list_published_blogs))
        .route("/blogs/{slug}", get(api::get_published_blog))
        .route("/courses", get(api::list_published_courses))
        .route("/courses/{id}", get(api::get_published_course))
        .route("/jobs", get(api::list_open_jobs))
        .route("/jobs/{id}", get(api::get_open_job))
        // Events and registrations
        .route("/events", get(api::list_public_events))
        .route("/events/{id}", get(api::get_event))
        .route("/events/{id}/quote", get(api::quote_event))
        .route("/events/{id}/registrations", post(api::register_for_event))
        .route("/registrations/{id}/confirm", post(api::confirm_registration))
        .route("/registrations/{id}/cancel", post(api::cancel_registration))
        // Membership
        .route("/membership/dues", get(api::list_dues))
        .route("/members/signup", post(api::signup))
        .route("/members/lookup", get(api::lookup_member))
        .route("/members/{id}/confirm", post(api::confirm_membership))
        .route("/members/{id}/renew", post(api::renew_membership))
        // Chat
        .route(
            "/chat/messages",
            get(api::list_chat_messages).post(api::post_chat_message),
        )
        .route("/chat/messages/{id}/comments", get(api::list_chat_comments))
        .route("/chat/stream", get(api::chat_stream))
        // Misc
        .route("/search", get(api::search_site))
        .route("/contact", post(api::submit_contact))
        .route("/webhooks/stripe", post(api::stripe_webhook));

    let admin_routes = Router::new()
        .route("/dashboard", get(api::get_dashboard))
        // Blogs
        .route("/blogs", get(api::list_blogs).post(api::create_blog))
        .route(
            "/blogs/{id}",
            get(api::get_blog)
                .put(api::update_blog)
                .delete(api::delete_blog),
        )
        // Courses
        .route("/courses", get(api::list_courses).post(api::create_course))
        .route(
            "/courses/{id}",
            get(api::get_course)
                .put(api::update_course)
                .delete(api::delete_course),
        )
        // Jobs
        .route("/jobs", get(api::list_jobs).post(api::create_job))
        .route(
            "/jobs/{id}",
            get(api::get_job).put(api::update_job).delete(api::delete_job),
        )
        // Events
        .route("/events", get(api::list_events).post(api::create_event))
        .route(
            "/events/{id}",
            get(api::get_event)
                .put(api::update_event)
                .delete(api::delete_event),
        )
        .route("/events/{id}/registrations", get(api::event_registrations))
        .route(
            "/registrations/{id}/cancel",
            post(api::admin_cancel_registration),
        )
        .route(
            "/registrations/{id}/check-in",
            post(api::check_in_registration),
        )
        // Members
        .route("/members", get(api::list_members))
        .route(
            "/members/{id}",
            get(api::get_member)
                .put(api::update_member)
                .delete(api::delete_member),
        )
        // Chat moderation
        .route(
            "/chat/messages/{id}",
            axum::routing::delete(api::delete_chat_message),
        )
        // Apply PSK auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api/admin", admin_routes)
        .nest("/api", public_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
