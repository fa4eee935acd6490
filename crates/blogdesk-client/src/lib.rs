//! HTTP side of the blogdesk admin dashboard
//!
//! [`ApiClient`] talks to the REST API and serves list pages to the query
//! engine as a [`blogdesk_query::ListSource`]. The [`resources`] catalogue
//! says where each list lives and how long it stays fresh; [`Mutation`]
//! lists every write and the cached lists it makes stale; [`AdminApi`] runs
//! writes and publishes their invalidations.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod admin;
pub mod api_client;
pub mod mutations;
pub mod resources;

// Re-export commonly used types
pub use admin::{AdminApi, MutationOutcome};
pub use api_client::ApiClient;
pub use mutations::Mutation;
pub use resources::{Entity, ResourceSpec, Shape};
