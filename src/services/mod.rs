//! Business logic sitting between the HTTP handlers and the repository.
//!
//! Services receive their collaborators (repository, signing keys, upload store) at
//! construction time, so tests can swap in the in-memory repository and mock upload store.

pub mod accounts;
pub mod content;

pub use accounts::AccountService;
pub use content::{ContentService, Pagination};
