//! Credo Core — domain models, the shared error taxonomy, and repository
//! trait definitions for the authentication and account-security core.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{CoreError, CoreResult};
