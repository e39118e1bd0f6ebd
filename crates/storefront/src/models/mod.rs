//! Request-scoped models that are not domain entities.

pub mod session;

pub use session::CurrentUser;
