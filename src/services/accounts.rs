use chrono::Utc;
use std::sync::LazyLock;
use validator::Validate;

use crate::{
    auth::{AuthUser, JwtKeys},
    error::{AppError, AppResult},
    models::{AccountId, AccountProfile, LoginRequest, NewAccount, RegisterRequest},
    password,
    repository::RepositoryState,
};

/// Verified against when the email is unknown, so both login failures cost one Argon2 run.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password::hash_password("inkwell-unknown-account").unwrap_or_default());

#[derive(Debug, Validate)]
struct Registration {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(email(message = "Please enter a valid email"))]
    email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    password: String,
}

#[derive(Debug, Validate)]
struct Credentials {
    #[validate(email(message = "Please enter a valid email"))]
    email: String,
}

/// AccountService
///
/// Registration, login and principal lookup. Owns password hashing and token issuance.
#[derive(Clone)]
pub struct AccountService {
    repo: RepositoryState,
    keys: JwtKeys,
}

impl AccountService {
    pub fn new(repo: RepositoryState, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    /// register
    ///
    /// Validates input, rejects duplicate email/username, stores an Argon2 hash and returns a
    /// token bound to the new account. The store's unique indexes still catch a registration
    /// racing this one.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<String> {
        let registration = Registration {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password: req.password,
        };
        registration.validate()?;

        if self
            .repo
            .find_account_by_email_or_username(&registration.email, &registration.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_off_thread(registration.password).await?;

        let account = self
            .repo
            .create_account(NewAccount {
                id: AccountId::new(),
                username: registration.username,
                email: registration.email,
                password_hash,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(account_id = %account.id, username = %account.username, "account registered");
        self.keys.issue(account.id)
    }

    /// login
    ///
    /// Unknown email and wrong password both fail with the same `InvalidCredentials`.
    pub async fn login(&self, req: LoginRequest) -> AppResult<String> {
        let credentials = Credentials {
            email: req.email.trim().to_string(),
        };
        credentials.validate()?;
        let password = req
            .password
            .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

        let Some(account) = self.repo.find_account_by_email(&credentials.email).await? else {
            let _ = verify_off_thread(password, None).await;
            tracing::warn!("login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let matches = verify_off_thread(password, Some(account.password_hash.clone())).await?;

        if !matches {
            tracing::warn!(account_id = %account.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(account_id = %account.id, "login succeeded");
        self.keys.issue(account.id)
    }

    /// current_user
    ///
    /// The principal's own account, credential omitted. An account deleted after the token
    /// was issued makes the token dangling, which is treated as unauthenticated.
    pub async fn current_user(&self, principal: &AuthUser) -> AppResult<AccountProfile> {
        self.repo
            .find_account(principal.id)
            .await?
            .map(AccountProfile::from)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Checks `plain` against `stored_hash` on the blocking pool. With no stored hash the check
/// runs against `DUMMY_HASH` and can only fail.
async fn verify_off_thread(plain: String, stored_hash: Option<String>) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => password::verify_password(&plain, &hash),
        None => password::verify_password(&plain, &DUMMY_HASH).map(|_| false),
    })
    .await
    .map_err(|e| AppError::Storage(format!("password verification task failed: {e}")))?
}

/// Runs Argon2 on the blocking pool.
async fn hash_off_thread(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Storage(format!("password hashing task failed: {e}")))?
}
