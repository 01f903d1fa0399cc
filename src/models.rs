use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Entity Identifiers ---

/// Declares an opaque, typed identifier over a UUID.
///
/// The wrappers are transparent on the wire (serde) and in the database (sqlx), but distinct
/// in Rust, so an `AccountId` can never be compared against a `PostId` by accident.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
            Serialize, Deserialize, sqlx::Type, TS, ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        #[ts(export, type = "string")]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses the textual form. Returns `None` for anything that is not a UUID.
            pub fn parse(raw: &str) -> Option<Self> {
                Uuid::parse_str(raw.trim()).ok().map(Self)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifies an Account. The only value ownership is ever compared on.
    AccountId
);
entity_id!(CategoryId);
entity_id!(PostId);
entity_id!(CommentId);

// --- Stored Entities (Mapped to Database) ---

/// Account
///
/// A registered author. The credential hash is never serialized outward; use
/// `AccountProfile` for responses.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// NewAccount
///
/// Insert payload for the `accounts` table. The hash is computed by the account service.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// AccountSummary
///
/// The display-relevant slice of an Account used to populate `author`/`user` references.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
}

/// Category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// Embedded in its parent Post (the `posts.comments` JSONB array). Has no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: AccountId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A row of the `posts` table. `author` is set once at creation and never rewritten.
/// `comments` is kept newest-first.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    #[sqlx(rename = "category_id")]
    pub category: Option<CategoryId>,
    #[sqlx(rename = "author_id")]
    pub author: AccountId,
    /// Stored path of the featured image, or empty when the post has none.
    pub featured_image: String,
    #[sqlx(json)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewPost
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub category: Option<CategoryId>,
    pub author: AccountId,
    pub featured_image: String,
    pub created_at: DateTime<Utc>,
}

/// PostUpdate
///
/// Fully-resolved replacement values for an update. The fallback to the current values has
/// already been applied by the content service; `featured_image: None` leaves the stored
/// image untouched.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub content: String,
    pub category: Option<CategoryId>,
    pub featured_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// NewCategory
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /auth/register`. The password is hashed before it reaches the
/// repository and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub text: String,
}

/// PostForm
///
/// The multipart body of `POST /posts` and `PUT /posts/{id}` once parsed.
/// Only documented here; the handlers build it from the `Multipart` stream.
#[derive(Debug, Clone, Default, ToSchema)]
pub struct PostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Category identifier. Empty means "no category".
    pub category: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub featured_image: Option<crate::storage::UploadedFile>,
}

// --- Response Schemas (Output) ---

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// AccountProfile
///
/// Output schema for `GET /auth/me`. Carries no credential field at all.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountProfile {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            created_at: account.created_at,
        }
    }
}

/// AuthorRef
///
/// A resolved account reference: `{ id, username }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthorRef {
    pub id: AccountId,
    pub username: String,
}

impl From<AccountSummary> for AuthorRef {
    fn from(summary: AccountSummary) -> Self {
        Self {
            id: summary.id,
            username: summary.username,
        }
    }
}

/// CategoryRef
///
/// A resolved category reference: `{ id, name }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// CommentView
///
/// A comment with its author populated. The JSON key stays `user`, which is what the
/// browser client reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    pub id: CommentId,
    #[serde(rename = "user")]
    pub author: Option<AuthorRef>,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PostView
///
/// A post with `author`, `category` and every comment author populated.
/// A reference that no longer resolves is rendered as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostView {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub category: Option<CategoryRef>,
    pub author: Option<AuthorRef>,
    pub featured_image: String,
    pub comments: Vec<CommentView>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostPage
///
/// Output schema for `GET /posts`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u64,
}
