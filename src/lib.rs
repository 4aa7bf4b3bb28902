pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ConverterConfig;
use crate::services::converters::Converters;
use crate::services::staging::UploadStaging;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::convert::pdf_to_word,
        api::handlers::convert::word_to_pdf,
        api::handlers::convert::merge_pdf,
        api::handlers::convert::image_to_pdf,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::convert::SingleFileForm,
            api::handlers::convert::BatchFileForm,
            api::handlers::ErrorResponse,
        )
    ),
    tags(
        (name = "convert", description = "Document conversion endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConverterConfig>,
    pub staging: Arc<UploadStaging>,
    pub converters: Converters,
}

impl AppState {
    pub fn new(config: ConverterConfig) -> Self {
        let converters = Converters::from_config(&config);
        Self::with_converters(config, converters)
    }

    /// State with explicitly chosen adapters
    pub fn with_converters(config: ConverterConfig, converters: Converters) -> Self {
        Self {
            staging: Arc::new(UploadStaging::from_config(&config)),
            config: Arc::new(config),
            converters,
        }
    }
}

fn conversion_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/convert/pdf-to-word",
            post(api::handlers::convert::pdf_to_word),
        )
        .route(
            "/convert/word-to-pdf",
            post(api::handlers::convert::word_to_pdf),
        )
        .route("/convert/merge-pdf", post(api::handlers::convert::merge_pdf))
        .route(
            "/convert/image-to-pdf",
            post(api::handlers::convert::image_to_pdf),
        )
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_request_size();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(conversion_routes())
        // Same routes under the prefix used by the browser frontend
        .nest("/api", conversion_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
