use crate::{AppState, auth_middleware, handlers};
use axum::{
    Router, middleware,
    routing::{MethodRouter, get, post, put},
};

/// Authenticated Router Module
///
/// Every method registered here is wrapped in the principal check. The guard is applied per
/// method router so that methods a path does not serve still answer 405 rather than 401.
/// Ownership of a post is enforced by the content service, not here.
pub fn authenticated_routes(state: &AppState) -> Router<AppState> {
    let guarded = |route: MethodRouter<AppState>| {
        route.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
    };

    Router::<AppState>::new()
        // GET /auth/me
        // The caller's own account, credential omitted.
        .route("/auth/me", guarded(get(handlers::get_me)))
        // POST /categories
        // Any authenticated account may create a category.
        .route("/categories", guarded(post(handlers::create_category)))
        // POST /posts (multipart)
        // The author is always the caller.
        .route("/posts", guarded(post(handlers::create_post)))
        // PUT/DELETE /posts/{id}
        // Owner-only; anyone else gets 403.
        .route(
            "/posts/{id}",
            guarded(put(handlers::update_post).delete(handlers::delete_post)),
        )
        // POST /posts/{id}/comments
        // Any authenticated account may comment.
        .route("/posts/{id}/comments", guarded(post(handlers::add_comment)))
}
