use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::Next,
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod services;
pub mod storage;

// Routing split by access level (public, authenticated).
pub mod routes;
use auth::{AuthUser, JwtKeys};
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use services::{AccountService, ContentService};
pub use storage::{LocalUploadStore, MockUploadStore, S3UploadStore, UploadState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::get_me,
        handlers::list_categories, handlers::create_category,
        handlers::list_posts, handlers::get_post, handlers::create_post,
        handlers::update_post, handlers::delete_post, handlers::add_comment
    ),
    components(
        schemas(
            models::RegisterRequest, models::LoginRequest, models::TokenResponse,
            models::AccountProfile, models::Category, models::CreateCategoryRequest,
            models::PostForm, models::PostView, models::PostPage, models::CommentView,
            models::CreateCommentRequest, models::AuthorRef, models::CategoryRef,
            models::MessageResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "inkwell", description = "Content publishing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single immutable container shared by every request: the store, the upload stash, the
/// signing keys, the services built on top of them and the configuration they came from.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub uploads: UploadState,
    pub keys: JwtKeys,
    pub accounts: AccountService,
    pub content: ContentService,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services from their collaborators. Tests call this with the in-memory
    /// repository and the mock upload store.
    pub fn new(config: AppConfig, repo: RepositoryState, uploads: UploadState) -> Self {
        let keys = JwtKeys::new(&config.jwt_secret);
        Self {
            accounts: AccountService::new(repo.clone(), keys.clone()),
            content: ContentService::new(repo.clone(), uploads.clone(), config.max_page_limit),
            repo,
            uploads,
            keys,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(app_state: &AppState) -> JwtKeys {
        app_state.keys.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards each authenticated route. Extracting `AuthUser` rejects the request with 401 before
/// any handler runs; on success the principal is stashed in the request extensions so the
/// handler's own `AuthUser` extraction does not repeat the work.
pub(crate) async fn auth_middleware(
    auth_user: AuthUser,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// api_routes
///
/// Public routes merged with the guarded authenticated routes, not yet bound to state.
fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes(state))
}

/// create_router
///
/// Assembles the complete routing structure, applies the middleware stack and binds state.
/// The API is served both at the root and under `/api`, which is the browser client's base URL.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let api = api_routes(&state);

    // 2. Base Router Assembly
    let mut base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .merge(api.clone())
        .nest("/api", api);

    // Locally stored featured images are served straight from disk.
    if state.config.upload_backend == config::UploadBackend::Local {
        base_router =
            base_router.nest_service("/uploads", ServeDir::new(&state.config.uploads_dir));
    }

    let body_limit = state.config.max_upload_bytes;
    let base_router = base_router
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with method, URI and the `x-request-id` header so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
