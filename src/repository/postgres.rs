use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::Repository;
use crate::error::{AppResult, conflict_or_storage};
use crate::models::{
    Account, AccountId, AccountSummary, Category, CategoryId, Comment, NewAccount, NewCategory,
    NewPost, Post, PostId, PostUpdate,
};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, created_at";
const POST_COLUMNS: &str =
    "id, title, content, category_id, author_id, featured_image, comments, created_at, updated_at";

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Comments are embedded in the post row as a JSONB
/// array so that a post and its comments are always read and written as one unit.
///
/// Queries are checked at runtime (`query_as` + `bind`), so building the crate never needs a
/// live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- ACCOUNTS ---

    /// create_account
    ///
    /// The unique indexes on `username` and `email` are the source of truth for duplicates;
    /// a violation maps to `Conflict`.
    async fn create_account(&self, account: NewAccount) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (id, username, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_storage(e, "User already exists"))
    }

    async fn find_account(&self, id: AccountId) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1 OR username = $2 LIMIT 1"
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_summaries(&self, ids: &[AccountId]) -> AppResult<Vec<AccountSummary>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = ids.iter().map(AccountId::as_uuid).collect();

        let summaries = sqlx::query_as::<_, AccountSummary>(
            "SELECT id, username FROM accounts WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, description, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, description, created_at",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_storage(e, "Category already exists"))
    }

    async fn find_categories(&self, ids: &[CategoryId]) -> AppResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = ids.iter().map(CategoryId::as_uuid).collect();

        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    // --- POSTS ---

    async fn insert_post(&self, post: NewPost) -> AppResult<Post> {
        let inserted = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (id, title, content, category_id, author_id, featured_image, \
             comments, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb, $7, $7) RETURNING {POST_COLUMNS}"
        ))
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category)
        .bind(post.author)
        .bind(&post.featured_image)
        .bind(post.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn find_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let post =
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(post)
    }

    /// list_posts
    ///
    /// `id` breaks ties between posts created in the same instant, so page boundaries are
    /// stable across requests.
    async fn list_posts(&self, skip: u64, limit: u64) -> AppResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn count_posts(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }

    /// update_post
    ///
    /// Single-statement write; the `comments` column is left alone so a concurrent
    /// `prepend_comment` is never clobbered. No version check: last writer wins.
    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts \
             SET title = $2, content = $3, category_id = $4, \
                 featured_image = COALESCE($5, featured_image), updated_at = $6 \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.content)
        .bind(update.category)
        .bind(&update.featured_image)
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: PostId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    /// prepend_comment
    ///
    /// Uses the JSONB concatenation operator inside one UPDATE, so two concurrent appends to
    /// the same post both land.
    async fn prepend_comment(
        &self,
        post_id: PostId,
        comment: Comment,
    ) -> AppResult<Option<Vec<Comment>>> {
        let comments: Option<Json<Vec<Comment>>> = sqlx::query_scalar(
            "UPDATE posts SET comments = jsonb_build_array($2::jsonb) || comments \
             WHERE id = $1 RETURNING comments",
        )
        .bind(post_id)
        .bind(Json(&comment))
        .fetch_optional(&self.pool)
        .await?;
        Ok(comments.map(|Json(comments)| comments))
    }
}
