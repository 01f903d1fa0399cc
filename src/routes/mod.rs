/// Router Module Index
///
/// Routes are split by access level. Every route in the authenticated router is wrapped in
/// the principal check, so a handler placed there can never be reached anonymously even if it
/// forgets to take `AuthUser`.

/// Routes accessible to everyone (anonymous, read-only plus the login/registration gateway).
pub mod public;

/// Routes that require a verified session token.
pub mod authenticated;
