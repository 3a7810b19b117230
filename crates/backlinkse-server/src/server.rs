use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth::TokenService,
    clock::{SharedClock, SystemClock},
    config::{Environment, ServerConfig},
    error::{expose_internal_detail, route_not_found},
    handlers::{
        auth, content, dashboard, health, orders, payments, projects, reports, site,
        subscriptions, support, team, users,
    },
    models::content::{
        BlogPost, CaseStudy, Faq, GuestPostingPackage, HomepageSection, LinkBuildingPackage,
        PricingPlan, Service, Testimonial,
    },
    models::site::{GlobalSettings, LiveChat, Navigation, Theme},
    rate_limit::{rate_limit, RateLimiter},
    store::Store,
    AppState,
};

/// Everything under `/api/v1`.
fn api(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Accounts and the customer dashboard.
        .nest("/auth", auth::routes(state))
        .nest("/users", users::routes(state))
        .nest("/projects", projects::routes(state))
        .nest("/orders", orders::routes(state))
        .nest("/reports", reports::routes(state))
        .nest("/support", support::routes(state))
        .nest("/team", team::routes(state))
        .nest("/payment", payments::routes(state))
        .nest("/subscriptions", subscriptions::routes(state))
        .nest("/dashboard", dashboard::routes(state))
        // Marketing content.
        .nest("/faqs", content::routes::<Faq>(state))
        .nest("/testimonials", content::routes::<Testimonial>(state))
        .nest("/blog", content::routes::<BlogPost>(state))
        .nest("/case-studies", content::routes::<CaseStudy>(state))
        .nest("/services", content::routes::<Service>(state))
        .nest("/homepage", content::routes::<HomepageSection>(state))
        .nest("/pricing", content::routes::<PricingPlan>(state))
        .nest("/link-building", content::package_routes::<LinkBuildingPackage>(state))
        .nest("/guest-posting", content::package_routes::<GuestPostingPackage>(state))
        // Site configuration.
        .nest("/settings", site::routes::<GlobalSettings>(state))
        .nest("/theme", site::routes::<Theme>(state))
        .nest("/navigation", site::routes::<Navigation>(state))
        .nest("/live-chat", site::routes::<LiveChat>(state))
}

fn assemble(state: AppState, limiter: Option<Arc<RateLimiter>>) -> Router {
    let mut api = api(&state);
    if let Some(limiter) = limiter {
        api = api.layer(middleware::from_fn_with_state(limiter, rate_limit));
    }
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .with_state(state)
}

/// Routes only: no rate limit, CORS or tracing.
pub fn router(state: AppState) -> Router {
    assemble(state, None)
}

/// The full service as `run` serves it.
pub fn app(state: AppState, cors_origins: &[String], limiter: Arc<RateLimiter>) -> Router {
    let environment = state.environment;
    let cors = build_cors(environment, cors_origins);
    let mut app = assemble(state, Some(limiter));
    if !environment.is_production() {
        app = app.layer(middleware::from_fn(expose_internal_detail));
    }
    app.layer(cors).layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = crate::dirs::data_dir(cfg.data_dir.as_deref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let db_path = data_dir.join(crate::dirs::DB_FILE);
    let store = Store::open(&db_path).context("open store")?;

    let clock: SharedClock = Arc::new(SystemClock);
    let tokens = TokenService::new(
        Some(&cfg.jwt_secret),
        Some(&cfg.jwt_refresh_secret),
        cfg.access_ttl,
        cfg.refresh_ttl,
        clock.clone(),
    );
    let limiter = Arc::new(
        RateLimiter::new(cfg.rate_limit_window, cfg.rate_limit_max, clock.clone())
            .trust_proxy(cfg.trust_proxy),
    );
    if cfg.trust_proxy {
        info!("rate limit keyed on forwarding headers");
    }

    let state = AppState {
        store,
        tokens: Arc::new(tokens),
        clock,
        environment: cfg.environment,
    };
    let app = app(state, &cfg.cors_origins, limiter);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, environment = %cfg.environment, "backlinkse api listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

fn build_cors(environment: Environment, origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true);

    if environment == Environment::Development {
        return cors.allow_origin(AllowOrigin::mirror_request());
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}
