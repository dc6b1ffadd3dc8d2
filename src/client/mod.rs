//! Tableau Server API client and authentication.
//!
//! This module provides the [`TableauClient`] for interacting with the
//! Tableau Server REST API, along with the [`Auth`] credential type.

mod auth;
mod tableau;

pub use auth::Auth;
pub use tableau::TableauClient;
