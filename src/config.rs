use std::env;

/// Fallback signing secret for local development and tests. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "inkwell-local-development-secret";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once in `main` and then
/// injected into the services and the router state; nothing reads the environment afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Shared HS256 secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Where featured images are written.
    pub upload_backend: UploadBackend,
    // Directory used by the local upload backend, also served under `/uploads`.
    pub uploads_dir: String,
    // S3-compatible storage settings, only read when `upload_backend` is `S3`.
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
    // Upper bound applied to the `limit` query parameter of `GET /posts`.
    pub max_page_limit: u32,
    // Request body limit for multipart post submissions.
    pub max_upload_bytes: usize,
}

/// Env
///
/// Defines the runtime context. `Production` demands explicit secrets and emits JSON logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// UploadBackend
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UploadBackend {
    Local,
    S3,
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests: in-memory store, local uploads, fixed secret.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:0".to_string(),
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            upload_backend: UploadBackend::Local,
            uploads_dir: "uploads".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "inkwell-test".to_string(),
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics when a variable required for the current environment is missing
    /// (`DATABASE_URL` and `JWT_SECRET` in production, the S3 credentials when the S3
    /// backend is selected in production) or when a numeric variable does not parse.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Local => env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        };

        let upload_backend = match env::var("UPLOAD_BACKEND").as_deref() {
            Ok("s3") => UploadBackend::S3,
            _ => UploadBackend::Local,
        };

        let (s3_key, s3_secret) = match (env, upload_backend) {
            (Env::Production, UploadBackend::S3) => (
                env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                env::var("S3_SECRET_KEY").expect("FATAL: S3_SECRET_KEY required in prod"),
            ),
            _ => (
                env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "admin".to_string()),
                env::var("S3_SECRET_KEY").unwrap_or_else(|_| "password".to_string()),
            ),
        };

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            db_url,
            jwt_secret,
            upload_backend,
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            s3_key,
            s3_secret,
            s3_bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "inkwell-uploads".to_string()),
            max_page_limit: parse_var("MAX_PAGE_LIMIT", DEFAULT_MAX_PAGE_LIMIT),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be a positive integer, got {raw:?}")),
        Err(_) => default,
    }
}
