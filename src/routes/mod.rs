use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod document_types;
pub mod documents;
pub mod health;
pub mod tags;

const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 512;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = build_cors(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let document_types_routes = Router::new()
        .route(
            "/",
            get(document_types::list_document_types).post(document_types::create_document_type),
        )
        .route(
            "/:id/parsing-settings",
            get(document_types::get_parsing_settings)
                .patch(document_types::update_parsing_settings),
        );

    let documents_routes = Router::new()
        .route("/", post(documents::upload_document))
        .route("/:id", get(documents::get_document))
        .route("/:id/versions", post(documents::upload_version))
        .route(
            "/:id/versions/:version_id/content",
            get(documents::version_content),
        )
        .route(
            "/:id/versions/:version_id/pages/:page_number/content",
            put(documents::put_page_content),
        )
        .route(
            "/:id/versions/:version_id/parse-errors",
            get(documents::list_parse_errors),
        )
        .route(
            "/:id/versions/:version_id/parse",
            post(documents::submit_parsing),
        )
        .route("/:id/tags", post(documents::assign_tags))
        .route("/:id/tags/widget", get(documents::document_tags_widget))
        .route("/:id/tags/:tag_id", delete(documents::remove_tag));

    let tags_routes = Router::new()
        .route("/", get(tags::list_tags).post(tags::create_tag))
        .route("/select", get(tags::select_widget))
        .route("/:id", patch(tags::update_tag).delete(tags::delete_tag));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/document-types", document_types_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/tags", tags_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn build_cors(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = %value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
