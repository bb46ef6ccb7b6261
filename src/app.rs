use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::SessionKeys;
use crate::config::AppConfig;
use crate::database::Store;
use crate::handlers;
use crate::mail::Mailer;

/// Handles shared by every request, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionKeys,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, crate::auth::SessionError> {
        let sessions = SessionKeys::new(&config.security.session_secret, config.security.session_ttl_days)?;

        Ok(Self {
            store,
            sessions,
            mailer,
            config: Arc::new(config),
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.security.secure_cookies
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .merge(public_routes())
        // Any signed-in role
        .merge(session_routes())
        // Role-gated families
        .nest("/api/user", user_routes())
        .nest("/api/employee", employee_routes())
        .nest("/api/field-exec", field_exec_routes())
        .nest("/api/admin", admin_routes())
        // Global middleware, outermost first
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use handlers::public;

    Router::new()
        .route("/api/categories", get(public::list_categories))
        .route("/api/categories/:id", get(public::show_category))
        .route("/api/careers", get(public::list_careers))
        .route("/api/payments/:order_id", get(public::payment_status))
}

fn session_routes() -> Router<AppState> {
    use handlers::session;

    Router::new()
        .route("/api/auth/whoami", get(session::whoami))
        .route("/api/auth/logout", post(session::logout))
}

fn user_routes() -> Router<AppState> {
    use handlers::user;

    Router::new()
        .route("/signup", post(user::signup))
        .route("/login", post(user::login))
        .route("/verify", post(user::verify))
        .route("/profile", get(user::profile_get).put(user::profile_put))
        .route("/bookings", get(user::bookings_list).post(user::bookings_create))
        .route("/bookings/:id", get(user::bookings_show))
        .route("/bookings/:id/payment", post(user::bookings_payment))
        .route("/bookings/:id/cancel", post(user::bookings_cancel))
        .route("/bookings/:id/review", post(user::bookings_review))
}

fn employee_routes() -> Router<AppState> {
    use handlers::employee;

    Router::new()
        .route("/login", post(employee::login))
        .route("/verify", post(employee::verify))
        .route("/profile", get(employee::profile_get))
        .route("/bank", put(employee::bank_put))
        .route("/schedules", get(employee::schedules_list))
        .route("/schedules/:id/accept", post(employee::schedules_accept))
        .route("/bookings", get(employee::bookings_list))
        .route("/bookings/:id/status", put(employee::bookings_status))
}

fn field_exec_routes() -> Router<AppState> {
    use handlers::field_exec;

    Router::new()
        .route("/login", post(field_exec::login))
        .route("/verify", post(field_exec::verify))
        .route("/profile", get(field_exec::profile_get).put(field_exec::profile_put))
        .route("/employees", get(field_exec::recruits_list).post(field_exec::recruits_create))
}

fn admin_routes() -> Router<AppState> {
    use handlers::admin;

    Router::new()
        // Admin accounts
        .route("/signup", post(admin::signup))
        .route("/signin", post(admin::signin))
        .route("/verify", post(admin::verify))
        .route("/admins/:id", delete(admin::admins_delete))
        // Staff
        .route("/employees", get(admin::employees_list))
        .route("/employees/category/:category_id", get(admin::employees_by_category))
        .route("/employees/:id/activate", put(admin::employees_activate))
        .route("/employees/:id/deactivate", put(admin::employees_deactivate))
        .route("/field-execs", get(admin::field_execs_list).post(admin::field_execs_create))
        // Catalog
        .route("/categories", post(admin::categories_create))
        .route("/categories/:id", put(admin::categories_update).delete(admin::categories_delete))
        .route("/careers", post(admin::careers_create))
        .route("/careers/:id", delete(admin::careers_delete))
        // Bookings
        .route("/bookings", get(admin::bookings_list))
        .route("/bookings/:id/schedules", post(admin::bookings_offer))
        .route("/bookings/:id/refund", post(admin::bookings_refund))
}

/// Credentialed CORS for the configured origins only
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
