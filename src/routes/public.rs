use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read access to posts and categories is unrestricted; registration and login are the way
/// in for everything else.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        // Creates an account and returns `{ token }`.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Exchanges email and password for `{ token }`.
        .route("/auth/login", post(handlers::login))
        // GET /categories
        // All categories, ordered by name.
        .route("/categories", get(handlers::list_categories))
        // GET /posts?page=&limit=
        // Newest-first page of posts plus `currentPage`, `totalPages` and `total`.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // A single post with author, category and comment authors resolved.
        .route("/posts/{id}", get(handlers::get_post))
}
