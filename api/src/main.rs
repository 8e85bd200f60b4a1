use std::net::SocketAddr;

use axum::Router;
use axum::http::HeaderName;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::store::postgres::PgStore;

mod config;
mod engine;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spy Cat Agency API",
        version = "0.1.0",
        description = "Missions, targets, and their assignment to spy cats."
    ),
    paths(
        routes::health::health_check,
        routes::missions::create_mission,
        routes::missions::list_missions,
        routes::missions::get_mission,
        routes::missions::complete_mission,
        routes::missions::assign_mission_to_cat,
        routes::missions::add_target_to_mission,
        routes::targets::complete_target,
    ),
    components(schemas(
        HealthResponse,
        routes::MessageResponse,
        routes::missions::CreateMissionResponse,
        spycat_core::error::ApiError,
        spycat_core::mission::Mission,
        spycat_core::mission::Target,
        spycat_core::mission::NewTarget,
        spycat_core::mission::CreateMissionRequest,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spycat_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../migrations").run(&pool).await?;

    let app_state = state::AppState::new(PgStore::new(pool));
    let request_id = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router::<PgStore>())
        .merge(routes::missions::router::<PgStore>())
        .merge(routes::targets::router::<PgStore>())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TimeoutLayer::new(config.request_timeout))
                .layer(middleware::cors::build_cors_layer(&config.cors_origins)),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        max_connections = config.max_connections,
        request_timeout_secs = config.request_timeout.as_secs(),
        "Spy Cat API listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
