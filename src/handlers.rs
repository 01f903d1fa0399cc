use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    models::{
        AccountProfile, Category, CommentView, CreateCategoryRequest, CreateCommentRequest,
        LoginRequest, MessageResponse, PostForm, PostId, PostPage, PostView, RegisterRequest,
        TokenResponse,
    },
    services::content::parse_positive,
    storage::UploadedFile,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

// --- Query & Path Helpers ---

/// PageQuery
///
/// Query parameters of `GET /posts`. Kept as raw strings so a malformed value falls back to
/// the default instead of failing the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<String>,
    /// Page size. Defaults to 10, capped by configuration.
    pub limit: Option<String>,
}

/// A path id that is not even a well-formed identifier cannot match any post.
fn post_id(raw: &str) -> AppResult<PostId> {
    PostId::parse(raw).ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// read_post_form
///
/// Drains the multipart stream into a `PostForm`. The `featuredImage` part only counts as a
/// file when it carries a filename; browsers that send the literal text "null" instead are
/// treated as sending no file.
pub async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "content" => form.content = Some(field.text().await?),
            "category" => form.category = Some(field.text().await?),
            "featuredImage" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                if file_name.is_none() {
                    continue;
                }
                let bytes = field.bytes().await?;
                form.featured_image = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates an account and returns a session token for it.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = TokenResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let token = state.accounts.register(payload).await?;
    Ok(Json(TokenResponse { token }))
}

/// login
///
/// [Public Route] Exchanges email and password for a fresh session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 400, description = "Invalid input or credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let token = state.accounts.login(payload).await?;
    Ok(Json(TokenResponse { token }))
}

/// get_me
///
/// [Authenticated Route] The caller's own account, without any credential field.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = AccountProfile),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AccountProfile>> {
    Ok(Json(state.accounts.current_user(&user).await?))
}

// --- Category Handlers ---

/// list_categories
///
/// [Public Route] All categories, sorted by name.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.content.list_categories().await?))
}

/// create_category
///
/// [Authenticated Route] Any signed-in account may create a category.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 409, description = "Name taken", body = ErrorBody)
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let Json(payload) = payload?;
    let category = state.content.create_category(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// --- Post Handlers ---

/// list_posts
///
/// [Public Route] One page of posts, newest first, with author and category resolved.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "A page of posts", body = PostPage))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PostPage>> {
    let page = parse_positive(query.page.as_deref());
    let limit = parse_positive(query.limit.as_deref());
    Ok(Json(state.content.list_posts(page, limit).await?))
}

/// get_post
///
/// [Public Route] A single post with author, category and comment authors resolved.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    Ok(Json(state.content.get_post(post_id(&id)?).await?))
}

/// create_post
///
/// [Authenticated Route] Multipart submission. The author is always the caller.
#[utoipa::path(
    post,
    path = "/posts",
    request_body(content = PostForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = PostView),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let form = read_post_form(multipart).await?;
    let post = state.content.create_post(&user, form).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Owner-only. Omitted fields keep their current values.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    request_body(content = PostForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = PostView),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<PostView>> {
    let id = post_id(&id)?;
    let form = read_post_form(multipart).await?;
    Ok(Json(state.content.update_post(&user, id, form).await?))
}

/// delete_post
///
/// [Authenticated Route] Owner-only, permanent.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.content.delete_post(&user, post_id(&id)?).await?;
    Ok(Json(MessageResponse {
        message: "Post deleted successfully".to_string(),
    }))
}

/// add_comment
///
/// [Authenticated Route] Any signed-in account may comment. Returns the post's full comment
/// list, newest first.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = String, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment added", body = [CommentView]),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> AppResult<Json<Vec<CommentView>>> {
    let Json(payload) = payload?;
    let comments = state
        .content
        .add_comment(&user, post_id(&id)?, &payload.text)
        .await?;
    Ok(Json(comments))
}
