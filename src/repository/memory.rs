use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::Repository;
use crate::error::{AppError, AppResult};
use crate::models::{
    Account, AccountId, AccountSummary, Category, CategoryId, Comment, NewAccount, NewCategory,
    NewPost, Post, PostId, PostUpdate,
};

#[derive(Default)]
struct Store {
    accounts: HashMap<AccountId, Account>,
    categories: HashMap<CategoryId, Category>,
    // Insertion order doubles as the tiebreak for posts created in the same instant.
    posts: Vec<Post>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It keeps the same uniqueness, ordering
/// and atomicity guarantees as the Postgres store (every method runs under one lock), and
/// backs local runs without `DATABASE_URL` as well as the test suite.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_account(&self, account: NewAccount) -> AppResult<Account> {
        let mut store = self.store.write().await;
        let taken = store
            .accounts
            .values()
            .any(|a| a.email == account.email || a.username == account.username);
        if taken {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let account = Account {
            id: account.id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            created_at: account.created_at,
        };
        store.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, id: AccountId) -> AppResult<Option<Account>> {
        Ok(self.store.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let store = self.store.read().await;
        Ok(store.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AppResult<Option<Account>> {
        let store = self.store.read().await;
        Ok(store
            .accounts
            .values()
            .find(|a| a.email == email || a.username == username)
            .cloned())
    }

    async fn find_account_summaries(&self, ids: &[AccountId]) -> AppResult<Vec<AccountSummary>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.accounts.get(id))
            .map(|a| AccountSummary {
                id: a.id,
                username: a.username.clone(),
            })
            .collect())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories: Vec<Category> = store.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> AppResult<Category> {
        let mut store = self.store.write().await;
        if store.categories.values().any(|c| c.name == category.name) {
            return Err(AppError::Conflict("Category already exists".to_string()));
        }

        let category = Category {
            id: category.id,
            name: category.name,
            description: category.description,
            created_at: category.created_at,
        };
        store.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_categories(&self, ids: &[CategoryId]) -> AppResult<Vec<Category>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.categories.get(id))
            .cloned()
            .collect())
    }

    async fn insert_post(&self, post: NewPost) -> AppResult<Post> {
        let post = Post {
            id: post.id,
            title: post.title,
            content: post.content,
            category: post.category,
            author: post.author,
            featured_image: post.featured_image,
            comments: vec![],
            created_at: post.created_at,
            updated_at: post.created_at,
        };
        self.store.write().await.posts.push(post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let store = self.store.read().await;
        Ok(store.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list_posts(&self, skip: u64, limit: u64) -> AppResult<Vec<Post>> {
        let store = self.store.read().await;

        // Newest inserted first, then a stable sort keeps that order among equal timestamps.
        let mut posts: Vec<&Post> = store.posts.iter().rev().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(posts
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_posts(&self) -> AppResult<u64> {
        Ok(self.store.read().await.posts.len() as u64)
    }

    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>> {
        let mut store = self.store.write().await;
        let Some(post) = store.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        post.title = update.title;
        post.content = update.content;
        post.category = update.category;
        if let Some(image) = update.featured_image {
            post.featured_image = image;
        }
        post.updated_at = update.updated_at;
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: PostId) -> AppResult<bool> {
        let mut store = self.store.write().await;
        let before = store.posts.len();
        store.posts.retain(|p| p.id != id);
        Ok(store.posts.len() < before)
    }

    async fn prepend_comment(
        &self,
        post_id: PostId,
        comment: Comment,
    ) -> AppResult<Option<Vec<Comment>>> {
        let mut store = self.store.write().await;
        Ok(store
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .map(|post| {
                post.comments.insert(0, comment);
                post.comments.clone()
            }))
    }
}
