//! DataDistillr REST client
//!
//! Structure:
//! - `session.rs`: login/logout and the authorization guard
//! - `client.rs`: `Transport` trait and the cookie-backed reqwest transport
//! - `directory.rs`: organization/project listings and name → token maps
//! - `project.rs`: query barrels, data sources, query creation
//! - `query.rs`: run, poll and paginate query results
//! - `result.rs`: assembled results, DataFrame conversion and file export
//! - `upload.rs`: file upload through pre-signed URLs
//! - `endpoint.rs`: API-key access to published endpoints
//! - `token.rs`, `models.rs`: wire types
//! - `error.rs`: error types

pub mod client;
pub mod directory;
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod models;
pub mod project;
pub mod query;
pub mod result;
pub mod session;
pub mod token;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpTransport, Transport};
pub use directory::TokenMap;
pub use endpoint::read_endpoint;
pub use error::{DistillrError, Result};
pub use project::Project;
pub use query::QueryExecutor;
pub use result::QueryResult;
pub use session::Session;
pub use token::Token;
pub use upload::FileUploader;
