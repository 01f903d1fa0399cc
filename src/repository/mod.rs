use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{
    Account, AccountId, AccountSummary, Category, CategoryId, Comment, NewAccount, NewCategory,
    NewPost, Post, PostId, PostUpdate,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The entity repository facade: typed reads and writes over Accounts, Categories and Posts
/// (with their embedded Comments). Services depend on this trait only, so the Postgres store
/// and the in-memory store are interchangeable.
///
/// Contract required from every implementation:
/// - each method reads or writes a single document atomically;
/// - unique-constraint violations surface as `AppError::Conflict`, everything else the store
///   gets wrong as `AppError::Storage`;
/// - `prepend_comment` is a single atomic update, never read-modify-write.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn create_account(&self, account: NewAccount) -> AppResult<Account>;
    async fn find_account(&self, id: AccountId) -> AppResult<Option<Account>>;
    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    async fn find_account_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AppResult<Option<Account>>;
    /// Id and username for every id that still exists. Missing ids are silently skipped.
    async fn find_account_summaries(&self, ids: &[AccountId]) -> AppResult<Vec<AccountSummary>>;

    // --- Categories ---
    /// All categories, ordered by name ascending.
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn create_category(&self, category: NewCategory) -> AppResult<Category>;
    async fn find_categories(&self, ids: &[CategoryId]) -> AppResult<Vec<Category>>;

    // --- Posts ---
    async fn insert_post(&self, post: NewPost) -> AppResult<Post>;
    async fn find_post(&self, id: PostId) -> AppResult<Option<Post>>;
    /// One page of posts, newest first.
    async fn list_posts(&self, skip: u64, limit: u64) -> AppResult<Vec<Post>>;
    async fn count_posts(&self) -> AppResult<u64>;
    /// Overwrites title, content and category; replaces the image only when one is given.
    /// Comments are never touched. Returns `None` when the post no longer exists.
    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>>;
    /// Returns false when there was nothing to delete.
    async fn delete_post(&self, id: PostId) -> AppResult<bool>;

    // --- Comments ---
    /// Atomically puts `comment` at the front of the post's comment sequence and returns the
    /// whole sequence, newest first. Returns `None` when the post does not exist.
    async fn prepend_comment(&self, post_id: PostId, comment: Comment)
    -> AppResult<Option<Vec<Comment>>>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in the application state.
pub type RepositoryState = Arc<dyn Repository>;
