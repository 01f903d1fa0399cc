use chrono::Utc;
use std::collections::{BTreeSet, HashMap};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        AccountId, AuthorRef, Category, CategoryId, CategoryRef, Comment, CommentId, CommentView,
        CreateCategoryRequest, NewCategory, NewPost, Post, PostForm, PostId, PostPage, PostUpdate,
        PostView,
    },
    repository::RepositoryState,
    storage::{self, UploadState},
};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Pagination
///
/// The effective page window for `GET /posts`, after defaults and the configured cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Missing or zero values fall back to page 1 / limit 10; `limit` is clamped to `max_limit`.
    pub fn new(page: Option<u32>, limit: Option<u32>, max_limit: u32) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(max_limit.max(1));
        Self { page, limit }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        u32::try_from(total.div_ceil(u64::from(self.limit))).unwrap_or(u32::MAX)
    }
}

/// Lenient query-string parsing: anything that is not a positive integer is "absent".
pub fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).filter(|v| *v > 0)
}

/// Returns the trimmed value, or a validation error carrying `message` when it is blank.
fn required(value: Option<&str>, message: &str) -> AppResult<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

/// A category field that is absent or blank means "no category"; anything else must be a
/// well-formed identifier. Existence is not checked.
fn parse_category(raw: Option<&str>) -> AppResult<Option<CategoryId>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => CategoryId::parse(v)
            .map(Some)
            .ok_or_else(|| AppError::Validation("Invalid category ID".to_string())),
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found".to_string())
}

/// ContentService
///
/// Authorization and mutation rules for posts, comments and categories, plus resolution of
/// stored references into display fields.
///
/// Ownership is the only authorization rule: the principal's `AccountId` must equal the
/// post's `author`. Reads are open to everyone.
#[derive(Clone)]
pub struct ContentService {
    repo: RepositoryState,
    uploads: UploadState,
    max_page_limit: u32,
}

impl ContentService {
    pub fn new(repo: RepositoryState, uploads: UploadState, max_page_limit: u32) -> Self {
        Self {
            repo,
            uploads,
            max_page_limit,
        }
    }

    pub fn pagination(&self, page: Option<u32>, limit: Option<u32>) -> Pagination {
        Pagination::new(page, limit, self.max_page_limit)
    }

    // --- Posts ---

    /// list_posts
    ///
    /// Newest first, `skip = (page - 1) * limit`. A page past the end is empty, not an error.
    pub async fn list_posts(&self, page: Option<u32>, limit: Option<u32>) -> AppResult<PostPage> {
        let window = self.pagination(page, limit);

        let posts = self
            .repo
            .list_posts(window.skip(), u64::from(window.limit))
            .await?;
        let total = self.repo.count_posts().await?;

        Ok(PostPage {
            posts: self.populate(posts).await?,
            current_page: window.page,
            total_pages: window.total_pages(total),
            total,
        })
    }

    pub async fn get_post(&self, id: PostId) -> AppResult<PostView> {
        let post = self.repo.find_post(id).await?.ok_or_else(post_not_found)?;
        self.populate_one(post).await
    }

    /// create_post
    ///
    /// The input is validated before any upload is stored, and an upload whose insert fails is
    /// discarded, so a rejected request leaves no orphaned file behind.
    pub async fn create_post(&self, principal: &AuthUser, form: PostForm) -> AppResult<PostView> {
        let title = required(form.title.as_deref(), "Title is required")?;
        let content = required(form.content.as_deref(), "Content is required")?;
        let category = parse_category(form.category.as_deref())?;

        let featured_image = storage::associate(self.uploads.as_ref(), form.featured_image.as_ref())
            .await?
            .unwrap_or_default();

        let inserted = self
            .repo
            .insert_post(NewPost {
                id: PostId::new(),
                title,
                content,
                category,
                author: principal.id,
                featured_image: featured_image.clone(),
                created_at: Utc::now(),
            })
            .await;
        let post = match inserted {
            Ok(post) => post,
            Err(e) => {
                storage::discard(self.uploads.as_ref(), &featured_image).await;
                return Err(e);
            }
        };

        tracing::info!(post_id = %post.id, account_id = %principal.id, "post created");
        self.populate_one(post).await
    }

    /// update_post
    ///
    /// Existence and ownership are checked before the payload, so a non-owner is refused
    /// whatever they sent. Omitted (or blank category) fields fall back to the stored values;
    /// an explicitly blank title or content is rejected rather than treated as "keep".
    /// There is no version check: concurrent updates to one post are last-writer-wins.
    pub async fn update_post(
        &self,
        principal: &AuthUser,
        id: PostId,
        form: PostForm,
    ) -> AppResult<PostView> {
        let current = self.repo.find_post(id).await?.ok_or_else(post_not_found)?;
        self.ensure_owner(principal, &current, "update")?;

        let title = match form.title.as_deref() {
            Some(raw) => required(Some(raw), "Title cannot be empty")?,
            None => current.title,
        };
        let content = match form.content.as_deref() {
            Some(raw) => required(Some(raw), "Content cannot be empty")?,
            None => current.content,
        };
        let category = parse_category(form.category.as_deref())?.or(current.category);

        let featured_image =
            storage::associate(self.uploads.as_ref(), form.featured_image.as_ref()).await?;

        let outcome = self
            .repo
            .update_post(
                id,
                PostUpdate {
                    title,
                    content,
                    category,
                    featured_image: featured_image.clone(),
                    updated_at: Utc::now(),
                },
            )
            .await;
        let updated = match outcome {
            Ok(Some(post)) => post,
            failed => {
                if let Some(path) = &featured_image {
                    storage::discard(self.uploads.as_ref(), path).await;
                }
                return Err(failed.err().unwrap_or_else(post_not_found));
            }
        };

        tracing::info!(post_id = %id, account_id = %principal.id, "post updated");
        self.populate_one(updated).await
    }

    /// delete_post
    ///
    /// Permanent; the embedded comments go with the post.
    pub async fn delete_post(&self, principal: &AuthUser, id: PostId) -> AppResult<()> {
        let current = self.repo.find_post(id).await?.ok_or_else(post_not_found)?;
        self.ensure_owner(principal, &current, "delete")?;

        if !self.repo.delete_post(id).await? {
            return Err(post_not_found());
        }

        tracing::info!(post_id = %id, account_id = %principal.id, "post deleted");
        Ok(())
    }

    /// add_comment
    ///
    /// Open to any authenticated principal. The prepend is a single atomic repository call,
    /// so concurrent comments on the same post are all kept.
    pub async fn add_comment(
        &self,
        principal: &AuthUser,
        post_id: PostId,
        text: &str,
    ) -> AppResult<Vec<CommentView>> {
        let text = required(Some(text), "Comment text is required")?;

        let comment = Comment {
            id: CommentId::new(),
            author: principal.id,
            text,
            created_at: Utc::now(),
        };

        let comments = self
            .repo
            .prepend_comment(post_id, comment)
            .await?
            .ok_or_else(post_not_found)?;

        tracing::info!(post_id = %post_id, account_id = %principal.id, "comment added");

        let authors = self
            .resolve_authors(comments.iter().map(|c| c.author).collect())
            .await?;
        Ok(comments
            .into_iter()
            .map(|c| comment_view(c, &authors))
            .collect())
    }

    fn ensure_owner(&self, principal: &AuthUser, post: &Post, action: &str) -> AppResult<()> {
        if post.author == principal.id {
            return Ok(());
        }
        tracing::warn!(
            post_id = %post.id,
            account_id = %principal.id,
            action,
            "non-owner attempted to modify post"
        );
        Err(AppError::Forbidden(format!(
            "Not authorized to {action} this post"
        )))
    }

    // --- Categories ---

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repo.list_categories().await
    }

    /// create_category
    ///
    /// Any authenticated principal may create one; there is no admin role.
    pub async fn create_category(
        &self,
        principal: &AuthUser,
        req: CreateCategoryRequest,
    ) -> AppResult<Category> {
        let name = required(Some(req.name.as_str()), "Category name is required")?;
        let description = req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let category = self
            .repo
            .create_category(NewCategory {
                id: CategoryId::new(),
                name,
                description,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(category_id = %category.id, account_id = %principal.id, "category created");
        Ok(category)
    }

    // --- Population ---

    async fn populate_one(&self, post: Post) -> AppResult<PostView> {
        self.populate(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Storage("population dropped a post".to_string()))
    }

    /// Resolves authors, categories and comment authors for a batch of posts with one lookup
    /// per entity kind. Dangling references become `None`.
    async fn populate(&self, posts: Vec<Post>) -> AppResult<Vec<PostView>> {
        let account_ids: Vec<AccountId> = posts
            .iter()
            .flat_map(|p| std::iter::once(p.author).chain(p.comments.iter().map(|c| c.author)))
            .collect();
        let authors = self.resolve_authors(account_ids).await?;

        let category_ids: Vec<CategoryId> = posts
            .iter()
            .filter_map(|p| p.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let categories: HashMap<CategoryId, CategoryRef> = self
            .repo
            .find_categories(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, CategoryRef { id: c.id, name: c.name }))
            .collect();

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                id: post.id,
                title: post.title,
                content: post.content,
                category: post.category.and_then(|id| categories.get(&id).cloned()),
                author: authors.get(&post.author).cloned(),
                featured_image: post.featured_image,
                comments: post
                    .comments
                    .into_iter()
                    .map(|c| comment_view(c, &authors))
                    .collect(),
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
            .collect())
    }

    async fn resolve_authors(
        &self,
        ids: Vec<AccountId>,
    ) -> AppResult<HashMap<AccountId, AuthorRef>> {
        let ids: Vec<AccountId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        Ok(self
            .repo
            .find_account_summaries(&ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, AuthorRef::from(summary)))
            .collect())
    }
}

fn comment_view(comment: Comment, authors: &HashMap<AccountId, AuthorRef>) -> CommentView {
    CommentView {
        id: comment.id,
        author: authors.get(&comment.author).cloned(),
        text: comment.text,
        created_at: comment.created_at,
    }
}
