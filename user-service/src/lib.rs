//! Thin CRUD shell over the user table (spec.md's component out-of-scope
//! shell), plus the saga's `VALIDATE_USER` step target (spec.md §4.6).
//!
//! Registration, authentication, and credential storage are the external
//! collaborator spec.md §1 explicitly carves out of scope — this crate
//! owns only enough of a user record (`id`, `email`, `is_active`) for a
//! workflow to assert that the user it's acting on behalf of exists and is
//! allowed to transact.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod http;
pub mod store;
pub mod types;

pub use error::UserError;
pub use http::{build_router, AppState};
pub use store::UserStore;
pub use types::User;
