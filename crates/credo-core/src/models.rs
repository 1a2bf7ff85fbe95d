//! Domain models for the Credo authentication core.
//!
//! These are the types shared across all crates.

pub mod audit;
pub mod login_attempt;
pub mod session;
pub mod user;
