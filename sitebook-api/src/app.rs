/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use sitebook_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use sitebook_shared::{
    auth::middleware::authenticate,
    mailer::{EmailTransport, HttpEmailTransport, MailerConfig},
    numbering::{PgSequenceStore, SequenceStore},
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Document number source for the standalone reserve endpoint
    pub sequences: Arc<dyn SequenceStore>,

    /// Outbound email, absent when not configured
    pub mailer: Option<Arc<dyn EmailTransport>>,

    /// Open change-feed slots; a stream holds one permit until it ends
    pub change_subscribers: Arc<Semaphore>,
}

impl AppState {
    /// Creates state backed by PostgreSQL, with email when configured
    pub fn new(db: PgPool, config: Config) -> Self {
        let mailer = config.email.as_ref().map(|email| {
            Arc::new(HttpEmailTransport::new(MailerConfig::from(email))) as Arc<dyn EmailTransport>
        });

        Self {
            change_subscribers: Arc::new(Semaphore::new(config.api.max_change_subscribers)),
            sequences: Arc::new(PgSequenceStore::new(db.clone())),
            db,
            config: Arc::new(config),
            mailer,
        }
    }

    /// Replaces the mail transport
    pub fn with_mailer(mut self, mailer: Arc<dyn EmailTransport>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Replaces the sequence store
    pub fn with_sequences(mut self, sequences: Arc<dyn SequenceStore>) -> Self {
        self.sequences = sequences;
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health                          public
/// /v1/auth/{register,login,refresh} public
/// /v1/...                          Bearer JWT
/// /v1/portal/...                   Bearer JWT, client role
/// ```
///
/// Layers, outermost first: security headers, CORS, request tracing, and
/// JWT authentication on the protected routes.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let protected = Router::new()
        .route(
            "/organization",
            get(routes::organization::get_organization).patch(routes::organization::update_organization),
        )
        .route("/members", get(routes::members::list_members).post(routes::members::add_member))
        .route(
            "/members/:user_id",
            patch(routes::members::update_member).delete(routes::members::remove_member),
        )
        .route("/projects", get(routes::projects::list_projects).post(routes::projects::create_project))
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/projects/:id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/tasks/:id/move", post(routes::tasks::move_task))
        .route(
            "/time-entries",
            get(routes::time_entries::list_time_entries).post(routes::time_entries::create_time_entry),
        )
        .route(
            "/time-entries/:id",
            patch(routes::time_entries::update_time_entry)
                .delete(routes::time_entries::delete_time_entry),
        )
        .route("/time-entries/:id/approve", post(routes::time_entries::approve_time_entry))
        .route(
            "/payroll/config",
            get(routes::payroll::get_config).put(routes::payroll::update_config),
        )
        .route("/payroll/calculate", post(routes::payroll::calculate))
        .route("/payroll/report", get(routes::payroll::report))
        .route(
            "/tax-rates",
            get(routes::tax_rates::list_tax_rates).post(routes::tax_rates::create_tax_rate),
        )
        .route(
            "/tax-rates/:id",
            patch(routes::tax_rates::update_tax_rate).delete(routes::tax_rates::delete_tax_rate),
        )
        .route("/tax-rates/:id/default", post(routes::tax_rates::set_default_tax_rate))
        .route(
            "/subcontractors",
            get(routes::subcontractors::list_subcontractors).post(routes::subcontractors::create_subcontractor),
        )
        .route(
            "/subcontractors/:id",
            get(routes::subcontractors::get_subcontractor)
                .patch(routes::subcontractors::update_subcontractor)
                .delete(routes::subcontractors::delete_subcontractor),
        )
        .route("/projects/:id/bids", get(routes::bids::list_bids).post(routes::bids::create_bid))
        .route(
            "/bids/:id",
            patch(routes::bids::update_bid).delete(routes::bids::delete_bid),
        )
        .route("/bids/:id/award", post(routes::bids::award_bid))
        .route("/invoices", get(routes::invoices::list_invoices).post(routes::invoices::create_invoice))
        .route(
            "/invoices/:id",
            get(routes::invoices::get_invoice)
                .patch(routes::invoices::update_invoice)
                .delete(routes::invoices::delete_invoice),
        )
        .route("/invoices/:id/send", post(routes::invoices::send_invoice))
        .route("/projects/:id/rfis", get(routes::rfis::list_rfis).post(routes::rfis::create_rfi))
        .route(
            "/rfis/:id",
            get(routes::rfis::get_rfi)
                .patch(routes::rfis::update_rfi)
                .delete(routes::rfis::delete_rfi),
        )
        .route("/rfis/:id/answer", post(routes::rfis::answer_rfi))
        .route(
            "/maintenance",
            get(routes::maintenance::list_records).post(routes::maintenance::create_record),
        )
        .route(
            "/maintenance/:id",
            get(routes::maintenance::get_record)
                .patch(routes::maintenance::update_record)
                .delete(routes::maintenance::delete_record),
        )
        .route("/threads", get(routes::messages::list_threads).post(routes::messages::create_thread))
        .route(
            "/threads/:id/messages",
            get(routes::messages::list_messages).post(routes::messages::post_message),
        )
        .route(
            "/templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/templates/:id",
            patch(routes::templates::update_template).delete(routes::templates::delete_template),
        )
        .route("/templates/:id/render", post(routes::templates::render_template))
        .route("/numbering", get(routes::numbering::list_numbering))
        .route("/numbering/:doc_type", put(routes::numbering::configure_numbering))
        .route("/numbering/:doc_type/reserve", post(routes::numbering::reserve))
        .route("/activity", get(routes::activity::list_activity))
        .route("/changes", get(routes::changes::stream_changes))
        .route("/portal/projects", get(routes::portal::list_projects))
        .route("/portal/projects/:id/invoices", get(routes::portal::list_invoices))
        .route(
            "/portal/projects/:id/messages",
            get(routes::portal::list_messages).post(routes::portal::post_message),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected);

    let cors = if state.config.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token and injects `AuthContext` into the request
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
